//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for connector logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or full directives
    pub log_level: String,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Whether to enable ANSI colors in pretty output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "nav-connector".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NAV_SERVICE_NAME`: Service name (default: nav-connector)
    /// - `NAV_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `NAV_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("NAV_SERVICE_NAME")
                .unwrap_or_else(|_| "nav-connector".to_string()),

            log_level: env::var("NAV_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("NAV_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            ansi: !is_container,
        }
    }

    /// Quiet config for tests: warnings only, no colors.
    pub fn for_testing() -> Self {
        Self {
            log_level: "warn".to_string(),
            ansi: false,
            ..Self::default()
        }
    }
}

//! # NAV Telemetry
//!
//! Structured logging for applications embedding the connector.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nav_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     init_logging(&TelemetryConfig::from_env()).expect("logging");
//!     // Connector logs now go to stdout
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NAV_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `NAV_JSON_LOGS` | `false` (`true` in containers) | JSON formatted output |
//! | `NAV_SERVICE_NAME` | `nav-connector` | Service name field |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging, init_test_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Log filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

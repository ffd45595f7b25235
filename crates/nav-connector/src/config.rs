//! # Connector Configuration
//!
//! Endpoint, timeout, batch limit and status catalog for the connector, plus
//! the polling and retry knobs passed per `await_results` call.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{StatusCatalog, ValidationError, MAX_BATCH_SIZE};

/// Production endpoint.
pub const PRODUCTION_BASE_URL: &str = "https://api.onlineszamla.nav.gov.hu/invoiceService/v2/";

/// Test endpoint.
pub const TEST_BASE_URL: &str = "https://api-test.onlineszamla.nav.gov.hu/invoiceService/v2/";

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 70_000;

/// Connector configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Base URL; endpoints are appended to it.
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Largest batch accepted by `submit_invoices`.
    pub max_batch_size: usize,

    /// Classification of processing status codes.
    pub status_catalog: StatusCatalog,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_url: PRODUCTION_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_batch_size: MAX_BATCH_SIZE,
            status_catalog: StatusCatalog::default(),
        }
    }
}

impl ConnectorConfig {
    /// Config against the public test endpoint.
    pub fn for_testing() -> Self {
        Self {
            base_url: TEST_BASE_URL.to_string(),
            timeout_ms: 5_000,
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NAV_BASE_URL`: Base URL (default: production endpoint)
    /// - `NAV_TIMEOUT_MS`: Request timeout (default: 70000)
    /// - `NAV_MAX_BATCH_SIZE`: Batch limit (default: 100)
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("NAV_BASE_URL").unwrap_or_else(|_| PRODUCTION_BASE_URL.to_string()),

            timeout_ms: env_number(
                "NAV_TIMEOUT_MS",
                env::var("NAV_TIMEOUT_MS").ok(),
                DEFAULT_TIMEOUT_MS,
            ),

            max_batch_size: env_number(
                "NAV_MAX_BATCH_SIZE",
                env::var("NAV_MAX_BATCH_SIZE").ok(),
                MAX_BATCH_SIZE,
            ),

            status_catalog: StatusCatalog::default(),
        }
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Absolute URL of an endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    /// Reject unusable settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ValidationError::InvalidConfig(format!(
                "base URL {:?} is not an http(s) URL",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::InvalidConfig("timeout must be positive".to_string()));
        }
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(ValidationError::InvalidConfig(format!(
                "max batch size must be within 1..={}",
                MAX_BATCH_SIZE
            )));
        }
        self.status_catalog.validate()
    }
}

/// Parse a numeric setting, keeping `default` when unset or unparseable.
fn env_number<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = value else {
        return default;
    };
    match raw.trim().parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!("[nav] Ignoring {}={:?}: not a number, using {}", name, raw, default);
            default
        }
    }
}

/// Retry behavior for a single status query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Upper bound of the exponential delay.
    pub max_backoff_ms: u64,
    /// Random extra delay, uniformly `0..=jitter_ms`.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
            jitter_ms: 250,
        }
    }
}

/// Polling knobs for `await_results`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptions {
    /// Delay between the first and second query.
    pub initial_interval_ms: u64,
    /// Growth factor of the delay; 1 keeps it fixed.
    pub interval_multiplier: u32,
    /// Upper bound of the delay.
    pub max_interval_ms: u64,
    /// Deadline measured from the start of polling.
    pub max_wait_ms: u64,
    /// Transient failure handling for each query.
    pub retry: RetryPolicy,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            interval_multiplier: 2,
            max_interval_ms: 10_000,
            max_wait_ms: 120_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl PollOptions {
    /// Fast, fixed-interval polling for tests.
    pub fn for_testing() -> Self {
        Self {
            initial_interval_ms: 10,
            interval_multiplier: 1,
            max_interval_ms: 10,
            max_wait_ms: 1_000,
            retry: RetryPolicy {
                max_retries: 2,
                initial_backoff_ms: 5,
                max_backoff_ms: 20,
                jitter_ms: 0,
            },
        }
    }

    /// Same options with a different deadline.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait_ms = u64::try_from(max_wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Deadline as a duration.
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Delay after the `tick`-th query (0-based).
    pub fn interval_after(&self, tick: u32) -> Duration {
        let factor = u64::from(self.interval_multiplier.max(1)).saturating_pow(tick);
        let ms = self
            .initial_interval_ms
            .saturating_mul(factor)
            .min(self.max_interval_ms.max(self.initial_interval_ms));
        Duration::from_millis(ms)
    }

    /// Reject settings that would poll without pause.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_interval_ms == 0 {
            return Err(ValidationError::InvalidConfig(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.interval_multiplier == 0 {
            return Err(ValidationError::InvalidConfig(
                "interval multiplier must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

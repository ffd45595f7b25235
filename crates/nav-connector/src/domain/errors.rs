//! # Domain Errors
//!
//! Error taxonomy of the connector. Callers branch on the variant:
//!
//! | Variant | Raised when | Retried |
//! |---------|-------------|---------|
//! | `Validation` | Local input rejected before any network call | never |
//! | `Auth` | Service rejected credentials or signature | never |
//! | `Protocol` | Service returned a well-formed error envelope | never |
//! | `MalformedResponse` | Response could not be understood | never |
//! | `Transport` | Connection, timeout or transient HTTP status | by the poller only |
//! | `PollTimeout` | Deadline passed before every operation was terminal | never |

use std::fmt;
use std::time::Duration;

use nav_crypto::CryptoError;
use thiserror::Error;

use super::entities::{ProcessingResult, ValidationMessage};
use super::value_objects::{OperationKind, TransactionHandle};

/// Error codes the service uses for rejected credentials or signatures.
pub const AUTH_ERROR_CODES: &[&str] = &[
    "INVALID_SECURITY_USER",
    "INVALID_REQUEST_SIGNATURE",
    "INVALID_USER_RELATION",
    "NOT_REGISTERED_CUSTOMER",
    "INVALID_CUSTOMER",
    "FORBIDDEN",
    "INVALID_EXCHANGE_TOKEN",
];

/// Local input validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Batch has no operations.
    #[error("Invoice operation batch is empty")]
    EmptyBatch,

    /// Batch exceeds the protocol limit.
    #[error("Invoice operation batch too large: {size} > {max}")]
    BatchTooLarge {
        /// Operations in the batch
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Operation kind does not fit the batch annulment mode.
    #[error("Operation {index} has kind {kind}, not allowed when technical annulment is {technical_annulment}")]
    OperationKindMismatch {
        /// 1-based operation index
        index: usize,
        /// Offending kind
        kind: OperationKind,
        /// Batch annulment flag
        technical_annulment: bool,
    },

    /// Operation payload is empty.
    #[error("Operation {index} has an empty payload")]
    EmptyPayload {
        /// 1-based operation index
        index: usize,
    },

    /// Transaction id does not match the protocol pattern.
    #[error("Invalid transaction id: {0:?}")]
    InvalidTransactionId(String),

    /// Request id does not match the protocol pattern.
    #[error("Invalid request id: {0:?}")]
    InvalidRequestId(String),

    /// Tax number is not eight digits.
    #[error("Invalid tax number: {0:?}")]
    InvalidTaxNumber(String),

    /// Software id does not match `[0-9A-Z-]{18}`.
    #[error("Invalid software id: {0:?}")]
    InvalidSoftwareId(String),

    /// A required credential or identity field is empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Query parameters are inconsistent.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Unknown enumeration code.
    #[error("Unknown {field} code: {value:?}")]
    UnknownCode {
        /// Field being parsed
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Connector configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// Could not reach the service.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Non-success HTTP status without an understandable body.
    #[error("Unexpected HTTP status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Any other HTTP client failure.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Retry budget spent on a transient failure.
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// Last underlying failure
        last: Box<TransportError>,
    },
}

impl TransportError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout | TransportError::Connection(_) => true,
            TransportError::Status { status } => *status >= 500 || *status == 408 || *status == 429,
            TransportError::Request(_) | TransportError::RetriesExhausted { .. } => false,
        }
    }
}

/// Error reported by the service inside a well-formed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFault {
    /// Function code, normally `ERROR`.
    pub func_code: String,
    /// Service error code.
    pub error_code: Option<String>,
    /// Human readable message.
    pub message: Option<String>,
    /// Technical validation messages attached to the fault.
    pub validation_messages: Vec<ValidationMessage>,
}

impl ServiceFault {
    /// Whether the fault rejects credentials or the request signature.
    pub fn is_authentication(&self) -> bool {
        self.error_code
            .as_deref()
            .map(|code| AUTH_ERROR_CODES.contains(&code))
            .unwrap_or(false)
    }
}

impl fmt::Display for ServiceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.error_code.as_deref().unwrap_or("UNKNOWN"),
            self.message.as_deref().unwrap_or("no message")
        )
    }
}

/// Connector error types.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Local input rejected before any network call.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Credentials or signature rejected by the service.
    #[error("Authentication rejected: {0}")]
    Auth(ServiceFault),

    /// Service reported a business or request error.
    #[error("Service error: {0}")]
    Protocol(ServiceFault),

    /// Response body could not be understood.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Network-level failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Deadline passed before every operation reached a terminal status.
    #[error("Transaction {handle} not finished after {waited:?}")]
    PollTimeout {
        /// Transaction being polled
        handle: TransactionHandle,
        /// Time spent polling
        waited: Duration,
        /// Last observed results, empty if none were reported
        last_results: Vec<ProcessingResult>,
    },

    /// Exchange token could not be decoded with the exchange key.
    #[error("Exchange token decoding failed: {0}")]
    ExchangeToken(#[from] CryptoError),

    /// Request could not be serialized.
    #[error("Request encoding failed: {0}")]
    Encode(String),
}

impl ConnectorError {
    /// Classify a service fault.
    pub fn from_fault(fault: ServiceFault) -> Self {
        if fault.is_authentication() {
            ConnectorError::Auth(fault)
        } else {
            ConnectorError::Protocol(fault)
        }
    }

    /// Transient transport failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectorError::Transport(err) if err.is_retryable())
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ConnectorError::MalformedResponse(reason.into())
    }
}

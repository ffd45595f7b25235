//! # Domain Value Objects
//!
//! Immutable value types: secrets, protocol identifiers, operation codes and
//! the processing status catalog.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::errors::ValidationError;
use super::invariants::{is_protocol_identifier, PROTOCOL_IDENTIFIER_MAX_LEN};

// =============================================================================
// Secrets
// =============================================================================

/// A secret string that zeroizes on drop and never prints its value.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Borrow the secret. Use immediately and let go.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// True if the secret is the empty string.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for SecretString {}

// =============================================================================
// Protocol identifiers
// =============================================================================

/// Per-call request identifier, unique for every outbound request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh random identifier of maximal length.
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PROTOCOL_IDENTIFIER_MAX_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Validate an existing identifier.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if !is_protocol_identifier(value) {
            return Err(ValidationError::InvalidRequestId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Borrow as string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque transaction identifier returned by a batch submission.
///
/// Always matches `^[+a-zA-Z0-9_]{1,30}$`; the only way to obtain one is
/// through [`TransactionHandle::parse`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionHandle(String);

impl TransactionHandle {
    /// Validate a transaction identifier.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if !is_protocol_identifier(value) {
            return Err(ValidationError::InvalidTransactionId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Borrow as string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TransactionHandle {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TransactionHandle> for String {
    fn from(handle: TransactionHandle) -> Self {
        handle.0
    }
}

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Operation codes
// =============================================================================

/// Kind of a single invoice operation in a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Report a new invoice.
    Create,
    /// Report a modifying invoice.
    Modify,
    /// Report a cancelling (storno) invoice.
    Storno,
    /// Technical annulment of a previous report.
    Annul,
}

impl OperationKind {
    /// Wire code.
    pub fn as_code(&self) -> &'static str {
        match self {
            OperationKind::Create => "CREATE",
            OperationKind::Modify => "MODIFY",
            OperationKind::Storno => "STORNO",
            OperationKind::Annul => "ANNUL",
        }
    }
}

impl FromStr for OperationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(OperationKind::Create),
            "MODIFY" => Ok(OperationKind::Modify),
            "STORNO" => Ok(OperationKind::Storno),
            "ANNUL" => Ok(OperationKind::Annul),
            other => Err(ValidationError::UnknownCode {
                field: "invoiceOperation",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Direction of an invoice relative to the querying taxpayer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceDirection {
    /// Invoices received by the taxpayer.
    Inbound,
    /// Invoices issued by the taxpayer.
    Outbound,
}

impl InvoiceDirection {
    /// Wire code.
    pub fn as_code(&self) -> &'static str {
        match self {
            InvoiceDirection::Inbound => "INBOUND",
            InvoiceDirection::Outbound => "OUTBOUND",
        }
    }
}

impl FromStr for InvoiceDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INBOUND" => Ok(InvoiceDirection::Inbound),
            "OUTBOUND" => Ok(InvoiceDirection::Outbound),
            other => Err(ValidationError::UnknownCode {
                field: "invoiceDirection",
                value: other.to_string(),
            }),
        }
    }
}

/// How the calling software is operated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SoftwareOperation {
    /// Installed locally at the taxpayer.
    LocalSoftware,
    /// Operated as an online service.
    OnlineService,
}

impl SoftwareOperation {
    /// Wire code.
    pub fn as_code(&self) -> &'static str {
        match self {
            SoftwareOperation::LocalSoftware => "LOCAL_SOFTWARE",
            SoftwareOperation::OnlineService => "ONLINE_SERVICE",
        }
    }
}

impl FromStr for SoftwareOperation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCAL_SOFTWARE" => Ok(SoftwareOperation::LocalSoftware),
            "ONLINE_SERVICE" => Ok(SoftwareOperation::OnlineService),
            other => Err(ValidationError::UnknownCode {
                field: "softwareOperation",
                value: other.to_string(),
            }),
        }
    }
}

/// Severity of a validation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResultCode {
    /// Blocking error.
    Error,
    /// Non-blocking warning.
    Warn,
    /// Informational.
    Info,
}

impl ValidationResultCode {
    /// Wire code.
    pub fn as_code(&self) -> &'static str {
        match self {
            ValidationResultCode::Error => "ERROR",
            ValidationResultCode::Warn => "WARN",
            ValidationResultCode::Info => "INFO",
        }
    }
}

impl FromStr for ValidationResultCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ERROR" => Ok(ValidationResultCode::Error),
            "WARN" => Ok(ValidationResultCode::Warn),
            "INFO" => Ok(ValidationResultCode::Info),
            other => Err(ValidationError::UnknownCode {
                field: "validationResultCode",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Processing status
// =============================================================================

/// Processing status code reported for one operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessingStatus(String);

impl ProcessingStatus {
    /// Wrap a status code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Borrow the code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification of a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
    /// Still being processed.
    InProgress,
    /// Terminal, accepted.
    Succeeded,
    /// Terminal, rejected or aborted.
    Failed,
}

impl StatusClass {
    /// No further state change will be reported.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusClass::InProgress)
    }
}

/// Which status codes are terminal.
///
/// The code set belongs to the service schema version, so it is carried as
/// configuration rather than as a closed enum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCatalog {
    /// Codes meaning "still processing".
    pub in_progress: BTreeSet<String>,
    /// Terminal success codes.
    pub succeeded: BTreeSet<String>,
    /// Terminal failure codes.
    pub failed: BTreeSet<String>,
}

impl Default for StatusCatalog {
    fn default() -> Self {
        let set = |codes: &[&str]| codes.iter().map(|c| c.to_string()).collect();
        Self {
            in_progress: set(&["RECEIVED", "PROCESSING", "SAVED"]),
            succeeded: set(&["DONE"]),
            failed: set(&["ABORTED"]),
        }
    }
}

impl StatusCatalog {
    /// Classify a status code; `None` for codes outside the catalog.
    pub fn classify(&self, status: &ProcessingStatus) -> Option<StatusClass> {
        let code = status.as_str();
        if self.succeeded.contains(code) {
            Some(StatusClass::Succeeded)
        } else if self.failed.contains(code) {
            Some(StatusClass::Failed)
        } else if self.in_progress.contains(code) {
            Some(StatusClass::InProgress)
        } else {
            None
        }
    }

    /// True for known terminal codes.
    pub fn is_terminal(&self, status: &ProcessingStatus) -> bool {
        self.classify(status)
            .map(|class| class.is_terminal())
            .unwrap_or(false)
    }

    /// A catalog must name at least one terminal code and no code twice.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.succeeded.is_empty() && self.failed.is_empty() {
            return Err(ValidationError::InvalidConfig(
                "status catalog has no terminal codes".to_string(),
            ));
        }
        let total = self.in_progress.len() + self.succeeded.len() + self.failed.len();
        let distinct: BTreeSet<&String> = self
            .in_progress
            .iter()
            .chain(self.succeeded.iter())
            .chain(self.failed.iter())
            .collect();
        if distinct.len() != total {
            return Err(ValidationError::InvalidConfig(
                "status catalog lists a code in more than one class".to_string(),
            ));
        }
        Ok(())
    }
}

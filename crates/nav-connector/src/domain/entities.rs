//! # Domain Entities
//!
//! Credentials, batches, processing results and query records.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use nav_crypto::SignedOperation;
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;
use super::invariants::{is_software_id, is_tax_number};
use super::value_objects::{
    InvoiceDirection, OperationKind, ProcessingStatus, RequestId, SecretString,
    SoftwareOperation, TransactionHandle, ValidationResultCode,
};

// =============================================================================
// Identity
// =============================================================================

/// Technical user credentials.
///
/// Deliberately not `Serialize`: credentials never leave the process except
/// as the derived digests in a request envelope.
#[derive(Clone, Debug)]
pub struct TechnicalUser {
    login: String,
    password: SecretString,
    tax_number: String,
    signing_key: SecretString,
    exchange_key: SecretString,
}

impl TechnicalUser {
    /// Create a technical user.
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        tax_number: impl Into<String>,
        signing_key: impl Into<String>,
        exchange_key: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            password: SecretString::new(password),
            tax_number: tax_number.into(),
            signing_key: SecretString::new(signing_key),
            exchange_key: SecretString::new(exchange_key),
        }
    }

    /// Login name.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Password (secret).
    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Eight-digit tax number the user acts for.
    pub fn tax_number(&self) -> &str {
        &self.tax_number
    }

    /// Request signing key (secret).
    pub fn signing_key(&self) -> &SecretString {
        &self.signing_key
    }

    /// Exchange-token key (secret).
    pub fn exchange_key(&self) -> &SecretString {
        &self.exchange_key
    }

    /// Check that every field is present and the tax number is well formed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.login.is_empty() {
            return Err(ValidationError::MissingField("login"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }
        if self.signing_key.is_empty() {
            return Err(ValidationError::MissingField("signing_key"));
        }
        if self.exchange_key.is_empty() {
            return Err(ValidationError::MissingField("exchange_key"));
        }
        if !is_tax_number(&self.tax_number) {
            return Err(ValidationError::InvalidTaxNumber(self.tax_number.clone()));
        }
        Ok(())
    }
}

/// Identity of the calling software, attached to every request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareData {
    /// `[0-9A-Z-]{18}`
    pub software_id: String,
    /// Product name.
    pub software_name: String,
    /// How the software is operated.
    pub software_operation: SoftwareOperation,
    /// Main version.
    pub software_main_version: String,
    /// Developer name.
    pub software_dev_name: String,
    /// Developer contact (e-mail).
    pub software_dev_contact: String,
    /// Developer country code.
    pub software_dev_country_code: Option<String>,
    /// Developer tax number.
    pub software_dev_tax_number: Option<String>,
}

impl SoftwareData {
    /// Check mandatory fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_software_id(&self.software_id) {
            return Err(ValidationError::InvalidSoftwareId(self.software_id.clone()));
        }
        let required = [
            ("software_name", &self.software_name),
            ("software_main_version", &self.software_main_version),
            ("software_dev_name", &self.software_dev_name),
            ("software_dev_contact", &self.software_dev_contact),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// Per-call context: identifier, timestamp and the derived signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    /// Unique request id.
    pub request_id: RequestId,
    /// UTC send time, millisecond precision.
    pub timestamp: DateTime<Utc>,
    /// Request signature over id, timestamp and (for batches) operations.
    pub signature: String,
}

impl RequestContext {
    /// Create a context; the timestamp is truncated to milliseconds so the
    /// signed value and the serialized header agree.
    pub fn new(request_id: RequestId, timestamp: DateTime<Utc>, signature: String) -> Self {
        Self {
            request_id,
            timestamp: timestamp.trunc_subsecs(3),
            signature,
        }
    }
}

/// Plaintext exchange token obtained from the token exchange.
#[derive(Clone, Debug)]
pub struct ExchangeToken {
    /// Decoded token.
    pub token: SecretString,
    /// Start of validity, if reported.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of validity, if reported.
    pub valid_to: Option<DateTime<Utc>>,
}

// =============================================================================
// Batch submission
// =============================================================================

/// One invoice operation with its opaque payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceOperation {
    /// Operation kind.
    pub kind: OperationKind,
    /// Raw invoice document (or gzip of it in compressed batches).
    pub payload: Vec<u8>,
}

impl InvoiceOperation {
    /// Create an operation.
    pub fn new(kind: OperationKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Base64 form used on the wire.
    pub fn encoded_payload(&self) -> String {
        STANDARD.encode(&self.payload)
    }
}

/// Ordered set of operations submitted in one signed request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceOperationBatch {
    /// Every operation is an `ANNUL` of an earlier report.
    pub technical_annulment: bool,
    /// Payloads are gzip compressed.
    pub compressed_content: bool,
    /// Operations in submission order.
    pub operations: Vec<InvoiceOperation>,
}

impl InvoiceOperationBatch {
    /// Regular (non-annulment) batch.
    pub fn new(operations: Vec<InvoiceOperation>) -> Self {
        Self {
            technical_annulment: false,
            compressed_content: false,
            operations,
        }
    }

    /// Technical annulment batch.
    pub fn annulment(operations: Vec<InvoiceOperation>) -> Self {
        Self {
            technical_annulment: true,
            compressed_content: false,
            operations,
        }
    }

    /// Mark payloads as compressed.
    pub fn with_compressed_content(mut self, compressed: bool) -> Self {
        self.compressed_content = compressed;
        self
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True if there are no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Signer view of the operations, in batch order.
    pub fn signed_operations(&self) -> Vec<SignedOperation<'_>> {
        self.operations
            .iter()
            .map(|op| SignedOperation::new(op.kind.as_code(), &op.payload))
            .collect()
    }
}

// =============================================================================
// Processing results
// =============================================================================

/// Location a business validation message refers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPointer {
    /// Element name.
    pub tag: Option<String>,
    /// Offending value.
    pub value: Option<String>,
    /// Line in the invoice document.
    pub line: Option<u32>,
}

/// A business or technical validation message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    /// Severity.
    pub result_code: ValidationResultCode,
    /// Error code.
    pub error_code: Option<String>,
    /// Message text.
    pub message: Option<String>,
    /// Where the problem was found.
    pub pointer: Option<ValidationPointer>,
}

/// Outcome of one operation of a submitted batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// 1-based index within the submitted batch.
    pub index: u32,
    /// Processing status code.
    pub status: ProcessingStatus,
    /// Business validation messages.
    pub business_messages: Vec<ValidationMessage>,
    /// Technical validation messages.
    pub technical_messages: Vec<ValidationMessage>,
    /// Whether the stored invoice is compressed.
    pub compressed_content_indicator: bool,
    /// Original request payload, when asked for.
    pub original_request: Option<Vec<u8>>,
}

impl ProcessingResult {
    /// Result with no messages.
    pub fn new(index: u32, status: ProcessingStatus) -> Self {
        Self {
            index,
            status,
            business_messages: Vec::new(),
            technical_messages: Vec::new(),
            compressed_content_indicator: false,
            original_request: None,
        }
    }

    /// Any message of severity `ERROR`.
    pub fn has_errors(&self) -> bool {
        self.business_messages
            .iter()
            .chain(self.technical_messages.iter())
            .any(|m| m.result_code == ValidationResultCode::Error)
    }
}

/// Submission handle together with the final outcomes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagedBatch {
    /// Transaction handle of the submission.
    pub handle: TransactionHandle,
    /// Final per-operation outcomes, index aligned.
    pub results: Vec<ProcessingResult>,
}

// =============================================================================
// Queries
// =============================================================================

/// Selection criteria of an invoice data query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryCriteria {
    /// One invoice by number.
    InvoiceNumber {
        /// Invoice number.
        invoice_number: String,
        /// Direction.
        direction: InvoiceDirection,
        /// Also return modifications of the invoice.
        request_all_modification: bool,
    },
    /// Digests of invoices issued in a date range.
    IssueDateRange {
        /// First issue date, inclusive.
        from: NaiveDate,
        /// Last issue date, inclusive.
        to: NaiveDate,
        /// Direction.
        direction: InvoiceDirection,
    },
}

/// Invoice data query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDataQuery {
    /// 1-based page.
    pub page: u32,
    /// Criteria.
    pub criteria: QueryCriteria,
}

impl InvoiceDataQuery {
    /// Query one invoice by number.
    pub fn by_invoice_number(invoice_number: impl Into<String>, direction: InvoiceDirection) -> Self {
        Self {
            page: 1,
            criteria: QueryCriteria::InvoiceNumber {
                invoice_number: invoice_number.into(),
                direction,
                request_all_modification: false,
            },
        }
    }

    /// Query digests by issue date range.
    pub fn by_issue_date(from: NaiveDate, to: NaiveDate, direction: InvoiceDirection) -> Self {
        Self {
            page: 1,
            criteria: QueryCriteria::IssueDateRange {
                from,
                to,
                direction,
            },
        }
    }

    /// Select a page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Ask for every modification of the invoice too.
    pub fn with_all_modifications(mut self) -> Self {
        if let QueryCriteria::InvoiceNumber {
            request_all_modification,
            ..
        } = &mut self.criteria
        {
            *request_all_modification = true;
        }
        self
    }

    /// Check page and criteria.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.page == 0 {
            return Err(ValidationError::InvalidQuery("page numbering starts at 1".to_string()));
        }
        match &self.criteria {
            QueryCriteria::InvoiceNumber { invoice_number, .. } if invoice_number.trim().is_empty() => {
                Err(ValidationError::InvalidQuery("invoice number is empty".to_string()))
            }
            QueryCriteria::IssueDateRange { from, to, .. } if from > to => Err(
                ValidationError::InvalidQuery(format!("date range {} .. {} is reversed", from, to)),
            ),
            _ => Ok(()),
        }
    }
}

/// Audit record stored with a reported invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditData {
    /// Insertion time as reported.
    pub ins_date: Option<String>,
    /// Inserting user.
    pub ins_cus_user: Option<String>,
    /// Source of the report.
    pub source: Option<String>,
    /// Transaction that reported the invoice.
    pub transaction_id: Option<String>,
    /// Index within that transaction.
    pub index: Option<u32>,
    /// Schema version of the original request.
    pub original_request_version: Option<String>,
}

/// Full data of one invoice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceDetail {
    /// Invoice document as reported.
    pub invoice_data: Vec<u8>,
    /// Whether `invoice_data` is gzip compressed.
    pub compressed_content_indicator: bool,
    /// Audit record.
    pub audit_data: AuditData,
}

/// Digest of one invoice in a paginated listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDigest {
    /// Invoice number.
    pub invoice_number: String,
    /// Operation that reported it.
    pub invoice_operation: Option<String>,
    /// Supplier tax number.
    pub supplier_tax_number: Option<String>,
    /// Supplier name.
    pub supplier_name: Option<String>,
    /// Customer name.
    pub customer_name: Option<String>,
    /// Issue date.
    pub invoice_issue_date: Option<String>,
    /// Insertion time.
    pub ins_date: Option<String>,
    /// Reporting transaction.
    pub transaction_id: Option<String>,
}

/// One page of invoice digests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceDigestPage {
    /// Page returned.
    pub current_page: u32,
    /// Pages available.
    pub available_page: u32,
    /// Digests on this page.
    pub digests: Vec<InvoiceDigest>,
}

/// Result of an invoice data query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvoiceDataResult {
    /// No invoice matched.
    Empty,
    /// Exactly one invoice matched.
    Detail(InvoiceDetail),
    /// Listing page.
    Digest(InvoiceDigestPage),
}

impl InvoiceDataResult {
    /// Detail fields, if a single invoice matched.
    pub fn detail(&self) -> Option<&InvoiceDetail> {
        match self {
            InvoiceDataResult::Detail(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Registered address of a taxpayer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxpayerAddress {
    /// Country code.
    pub country_code: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Street name.
    pub street_name: Option<String>,
    /// Public place category (street, road, ...).
    pub public_place_category: Option<String>,
    /// House number.
    pub number: Option<String>,
}

/// Registered data of a taxpayer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxpayerData {
    /// Registered name.
    pub name: String,
    /// Short name.
    pub short_name: Option<String>,
    /// Registered address.
    pub address: Option<TaxpayerAddress>,
}

/// Result of a taxpayer query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxpayerInfo {
    /// Whether the tax number is valid.
    pub validity: bool,
    /// Registered data, present for valid taxpayers.
    pub data: Option<TaxpayerData>,
}

//! # Request Envelope Codec
//!
//! Maps typed envelopes to the wire documents and back.
//!
//! ```text
//! <ManageInvoiceRequest xmlns="http://schemas.nav.gov.hu/OSA/2.0/api">
//!   <header>requestId, timestamp, requestVersion, headerVersion</header>
//!   <user>login, passwordHash, taxNumber, requestSignature</user>
//!   <result>funcCode, errorCode, message</result>        (responses)
//!   <software>softwareId ... softwareDevTaxNumber</software>
//!   ... operation body ...
//! </ManageInvoiceRequest>
//! ```
//!
//! Encoding is deterministic: fixed element order, no indentation. Decoding
//! separates structural failures (`MalformedResponse`) from well-formed fault
//! envelopes (`Auth` / `Protocol`).

pub mod requests;
pub mod responses;
pub mod xml;

use chrono::{DateTime, Utc};

use crate::domain::{ConnectorError, ServiceFault, SoftwareData, SoftwareOperation};

pub use xml::{find_node, parse_document, write_document, XmlNode};

/// Default namespace of every envelope.
pub const API_NAMESPACE: &str = "http://schemas.nav.gov.hu/OSA/2.0/api";

/// Schema version announced in the header.
pub const REQUEST_VERSION: &str = "2.0";

/// Header layout version.
pub const HEADER_VERSION: &str = "1.0";

/// Header timestamp layout, millisecond precision, UTC.
const HEADER_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Function code of a failed call.
pub const FUNC_CODE_ERROR: &str = "ERROR";

/// Service operations and their endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceOperation {
    /// Obtain an exchange token.
    TokenExchange,
    /// Submit a batch of invoice operations.
    ManageInvoice,
    /// Processing status of a submitted batch.
    QueryTransactionStatus,
    /// Reported invoice data.
    QueryInvoiceData,
    /// Taxpayer registry lookup.
    QueryTaxpayer,
}

impl ServiceOperation {
    /// Every operation.
    pub const ALL: [ServiceOperation; 5] = [
        ServiceOperation::TokenExchange,
        ServiceOperation::ManageInvoice,
        ServiceOperation::QueryTransactionStatus,
        ServiceOperation::QueryInvoiceData,
        ServiceOperation::QueryTaxpayer,
    ];

    /// Path relative to the base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ServiceOperation::TokenExchange => "tokenExchange",
            ServiceOperation::ManageInvoice => "manageInvoice",
            ServiceOperation::QueryTransactionStatus => "queryTransactionStatus",
            ServiceOperation::QueryInvoiceData => "queryInvoiceData",
            ServiceOperation::QueryTaxpayer => "queryTaxpayer",
        }
    }

    fn element_stem(&self) -> &'static str {
        match self {
            ServiceOperation::TokenExchange => "TokenExchange",
            ServiceOperation::ManageInvoice => "ManageInvoice",
            ServiceOperation::QueryTransactionStatus => "QueryTransactionStatus",
            ServiceOperation::QueryInvoiceData => "QueryInvoiceData",
            ServiceOperation::QueryTaxpayer => "QueryTaxpayer",
        }
    }
}

/// Root element of an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeRoot {
    /// `<Op>Request`
    Request(ServiceOperation),
    /// `<Op>Response`
    Response(ServiceOperation),
    /// `GeneralErrorResponse`: fault with header and result block.
    GeneralError,
    /// `GeneralExceptionResponse`: bare fault, fields at the root.
    GeneralException,
}

impl EnvelopeRoot {
    /// Element name on the wire.
    pub fn element_name(&self) -> String {
        match self {
            EnvelopeRoot::Request(op) => format!("{}Request", op.element_stem()),
            EnvelopeRoot::Response(op) => format!("{}Response", op.element_stem()),
            EnvelopeRoot::GeneralError => "GeneralErrorResponse".to_string(),
            EnvelopeRoot::GeneralException => "GeneralExceptionResponse".to_string(),
        }
    }

    /// Inverse of [`EnvelopeRoot::element_name`].
    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "GeneralErrorResponse" => return Some(EnvelopeRoot::GeneralError),
            "GeneralExceptionResponse" => return Some(EnvelopeRoot::GeneralException),
            _ => {}
        }
        ServiceOperation::ALL.iter().find_map(|op| {
            let stem = op.element_stem();
            match name.strip_prefix(stem) {
                Some("Request") => Some(EnvelopeRoot::Request(*op)),
                Some("Response") => Some(EnvelopeRoot::Response(*op)),
                _ => None,
            }
        })
    }

    fn is_fault(&self) -> bool {
        matches!(self, EnvelopeRoot::GeneralError | EnvelopeRoot::GeneralException)
    }
}

/// `header` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// Request id (echoed in responses).
    pub request_id: String,
    /// Send time, millisecond precision.
    pub timestamp: DateTime<Utc>,
    /// Schema version.
    pub request_version: String,
    /// Header version.
    pub header_version: Option<String>,
}

/// `user` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserHeader {
    /// Technical user login.
    pub login: String,
    /// SHA-512 password digest.
    pub password_hash: String,
    /// Tax number the user acts for.
    pub tax_number: String,
    /// Request signature.
    pub request_signature: String,
}

/// `result` block of a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuncResult {
    /// `OK`, `WARN` or `ERROR`.
    pub func_code: String,
    /// Error code when the call failed.
    pub error_code: Option<String>,
    /// Message text.
    pub message: Option<String>,
}

/// A decoded or to-be-encoded envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Root element.
    pub root: EnvelopeRoot,
    /// `header` block.
    pub header: Option<EnvelopeHeader>,
    /// `user` block.
    pub user: Option<UserHeader>,
    /// `result` block (flattened into the root for `GeneralExceptionResponse`).
    pub result: Option<FuncResult>,
    /// `software` block.
    pub software: Option<SoftwareData>,
    /// Operation-specific body, in order.
    pub body: Vec<XmlNode>,
}

impl Envelope {
    /// Body of a response to `op`, or `MalformedResponse` for any other root.
    pub fn into_response_body(self, op: ServiceOperation) -> Result<Vec<XmlNode>, ConnectorError> {
        if self.root != EnvelopeRoot::Response(op) {
            return Err(ConnectorError::malformed(format!(
                "expected {} but received {}",
                EnvelopeRoot::Response(op).element_name(),
                self.root.element_name()
            )));
        }
        Ok(self.body)
    }

    /// The fault carried by this envelope, if any.
    pub fn fault(&self) -> Option<ServiceFault> {
        let failed = self
            .result
            .as_ref()
            .map(|r| r.func_code == FUNC_CODE_ERROR)
            .unwrap_or(false);
        if !self.root.is_fault() && !failed {
            return None;
        }

        let (func_code, error_code, message) = match &self.result {
            Some(result) => (
                result.func_code.clone(),
                result.error_code.clone(),
                result.message.clone(),
            ),
            None => (FUNC_CODE_ERROR.to_string(), None, None),
        };
        let validation_messages = self
            .body
            .iter()
            .filter(|n| n.name == "technicalValidationMessages")
            .filter_map(|n| responses::parse_validation_message(n).ok())
            .collect();

        Some(ServiceFault {
            func_code,
            error_code,
            message,
            validation_messages,
        })
    }
}

/// Encoder/decoder for envelopes.
pub struct RequestEnvelopeCodec;

impl RequestEnvelopeCodec {
    /// Serialize an envelope. Same input, same bytes.
    pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, ConnectorError> {
        let mut children = Vec::with_capacity(envelope.body.len() + 4);

        if let Some(header) = &envelope.header {
            children.push(header_node(header));
        }
        if let Some(user) = &envelope.user {
            children.push(user_node(user));
        }
        if let Some(result) = &envelope.result {
            let fields = result_fields(result);
            if envelope.root == EnvelopeRoot::GeneralException {
                children.extend(fields);
            } else {
                children.push(XmlNode::branch("result", fields));
            }
        }
        if let Some(software) = &envelope.software {
            children.push(software_node(software));
        }
        children.extend(envelope.body.iter().cloned());

        let root = XmlNode::branch(envelope.root.element_name(), children);
        write_document(&root, API_NAMESPACE)
    }

    /// Structural decode, faults included as data.
    pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, ConnectorError> {
        let root = parse_document(bytes)?;
        let kind = EnvelopeRoot::from_element_name(&root.name).ok_or_else(|| {
            ConnectorError::malformed(format!("unknown envelope root <{}>", root.name))
        })?;

        let mut envelope = Envelope {
            root: kind,
            header: None,
            user: None,
            result: None,
            software: None,
            body: Vec::new(),
        };
        let mut flat_result: Option<FuncResult> = None;

        for child in root.children {
            let name = child.name.clone();
            match name.as_str() {
                "header" if envelope.header.is_none() => {
                    envelope.header = Some(parse_header(&child)?);
                }
                "user" if envelope.user.is_none() => {
                    envelope.user = Some(parse_user(&child)?);
                }
                "result" if envelope.result.is_none() && kind != EnvelopeRoot::GeneralException => {
                    envelope.result = Some(parse_result(&child)?);
                }
                "software" if envelope.software.is_none() => {
                    envelope.software = Some(parse_software(&child)?);
                }
                "funcCode" | "errorCode" | "message" if kind == EnvelopeRoot::GeneralException => {
                    let result = flat_result.get_or_insert_with(|| FuncResult {
                        func_code: String::new(),
                        error_code: None,
                        message: None,
                    });
                    match name.as_str() {
                        "funcCode" => result.func_code = child.text.unwrap_or_default(),
                        "errorCode" => result.error_code = child.text,
                        _ => result.message = child.text,
                    }
                }
                _ => envelope.body.push(child),
            }
        }

        if let Some(result) = flat_result {
            if result.func_code.is_empty() {
                return Err(ConnectorError::malformed("fault without funcCode"));
            }
            envelope.result = Some(result);
        }
        Ok(envelope)
    }

    /// Decode and surface service faults as `Auth` or `Protocol` errors.
    pub fn decode(bytes: &[u8]) -> Result<Envelope, ConnectorError> {
        let envelope = Self::decode_envelope(bytes)?;
        match envelope.fault() {
            Some(fault) => Err(ConnectorError::from_fault(fault)),
            None => Ok(envelope),
        }
    }
}

// =============================================================================
// Block mapping
// =============================================================================

fn header_node(header: &EnvelopeHeader) -> XmlNode {
    let mut fields = vec![
        XmlNode::leaf("requestId", header.request_id.as_str()),
        XmlNode::leaf("timestamp", format_header_timestamp(&header.timestamp)),
        XmlNode::leaf("requestVersion", header.request_version.as_str()),
    ];
    if let Some(version) = &header.header_version {
        fields.push(XmlNode::leaf("headerVersion", version.as_str()));
    }
    XmlNode::branch("header", fields)
}

fn user_node(user: &UserHeader) -> XmlNode {
    XmlNode::branch(
        "user",
        vec![
            XmlNode::leaf("login", user.login.as_str()),
            XmlNode::leaf("passwordHash", user.password_hash.as_str()),
            XmlNode::leaf("taxNumber", user.tax_number.as_str()),
            XmlNode::leaf("requestSignature", user.request_signature.as_str()),
        ],
    )
}

fn result_fields(result: &FuncResult) -> Vec<XmlNode> {
    let mut fields = vec![XmlNode::leaf("funcCode", result.func_code.as_str())];
    if let Some(code) = &result.error_code {
        fields.push(XmlNode::leaf("errorCode", code.as_str()));
    }
    if let Some(message) = &result.message {
        fields.push(XmlNode::leaf("message", message.as_str()));
    }
    fields
}

fn software_node(software: &SoftwareData) -> XmlNode {
    let mut fields = vec![
        XmlNode::leaf("softwareId", software.software_id.as_str()),
        XmlNode::leaf("softwareName", software.software_name.as_str()),
        XmlNode::leaf("softwareOperation", software.software_operation.as_code()),
        XmlNode::leaf("softwareMainVersion", software.software_main_version.as_str()),
        XmlNode::leaf("softwareDevName", software.software_dev_name.as_str()),
        XmlNode::leaf("softwareDevContact", software.software_dev_contact.as_str()),
    ];
    if let Some(country) = &software.software_dev_country_code {
        fields.push(XmlNode::leaf("softwareDevCountryCode", country.as_str()));
    }
    if let Some(tax_number) = &software.software_dev_tax_number {
        fields.push(XmlNode::leaf("softwareDevTaxNumber", tax_number.as_str()));
    }
    XmlNode::branch("software", fields)
}

/// Header timestamp text, e.g. `2024-01-02T03:04:05.123Z`.
pub fn format_header_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(HEADER_TIMESTAMP_FORMAT).to_string()
}

fn parse_header(node: &XmlNode) -> Result<EnvelopeHeader, ConnectorError> {
    let raw_timestamp = node.required_text("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(raw_timestamp)
        .map_err(|e| ConnectorError::malformed(format!("bad header timestamp {:?}: {}", raw_timestamp, e)))?
        .with_timezone(&Utc);
    Ok(EnvelopeHeader {
        request_id: node.required_text("requestId")?.to_string(),
        timestamp,
        request_version: node.required_text("requestVersion")?.to_string(),
        header_version: node.child_text("headerVersion").map(str::to_string),
    })
}

fn parse_user(node: &XmlNode) -> Result<UserHeader, ConnectorError> {
    Ok(UserHeader {
        login: node.required_text("login")?.to_string(),
        password_hash: node.required_text("passwordHash")?.to_string(),
        tax_number: node.required_text("taxNumber")?.to_string(),
        request_signature: node.required_text("requestSignature")?.to_string(),
    })
}

fn parse_result(node: &XmlNode) -> Result<FuncResult, ConnectorError> {
    Ok(FuncResult {
        func_code: node.required_text("funcCode")?.to_string(),
        error_code: node.child_text("errorCode").map(str::to_string),
        message: node.child_text("message").map(str::to_string),
    })
}

fn parse_software(node: &XmlNode) -> Result<SoftwareData, ConnectorError> {
    let operation: SoftwareOperation = node
        .required_text("softwareOperation")?
        .parse()
        .map_err(|e| ConnectorError::malformed(format!("{}", e)))?;
    Ok(SoftwareData {
        software_id: node.required_text("softwareId")?.to_string(),
        software_name: node.required_text("softwareName")?.to_string(),
        software_operation: operation,
        software_main_version: node.required_text("softwareMainVersion")?.to_string(),
        software_dev_name: node.required_text("softwareDevName")?.to_string(),
        software_dev_contact: node.required_text("softwareDevContact")?.to_string(),
        software_dev_country_code: node.child_text("softwareDevCountryCode").map(str::to_string),
        software_dev_tax_number: node.child_text("softwareDevTaxNumber").map(str::to_string),
    })
}

//! Response body mappers.
//!
//! Each mapper takes the body of a successful response envelope. Missing
//! optional lists map to empty collections; missing mandatory fields are
//! `MalformedResponse`.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};

use super::{find_node, XmlNode};
use crate::domain::{
    AuditData, ConnectorError, InvoiceDataResult, InvoiceDetail, InvoiceDigest,
    InvoiceDigestPage, ProcessingResult, ProcessingStatus, TaxpayerAddress, TaxpayerData,
    TaxpayerInfo, TransactionHandle, ValidationMessage, ValidationPointer, ValidationResultCode,
};

/// Encoded token and its validity window from a `tokenExchange` response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedToken {
    /// Base64 of the AES encrypted token.
    pub encoded: String,
    /// Start of validity.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of validity.
    pub valid_to: Option<DateTime<Utc>>,
}

fn required<'a>(body: &'a [XmlNode], name: &str) -> Result<&'a XmlNode, ConnectorError> {
    find_node(body, name)
        .ok_or_else(|| ConnectorError::malformed(format!("response is missing <{}>", name)))
}

fn parse_bool(value: &str, field: &str) -> Result<bool, ConnectorError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ConnectorError::malformed(format!(
            "<{}> is not a boolean: {:?}",
            field, other
        ))),
    }
}

fn parse_number<T: FromStr>(value: &str, field: &str) -> Result<T, ConnectorError> {
    value
        .parse()
        .map_err(|_| ConnectorError::malformed(format!("<{}> is not a number: {:?}", field, value)))
}

fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>, ConnectorError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ConnectorError::malformed(format!("<{}> is not a timestamp: {}", field, e)))
}

fn optional_text(node: &XmlNode, name: &str) -> Option<String> {
    node.child_text(name).map(str::to_string)
}

/// `tokenExchange` response body.
pub fn parse_token_exchange(body: &[XmlNode]) -> Result<EncodedToken, ConnectorError> {
    let encoded = required(body, "encodedExchangeToken")?
        .text()
        .ok_or_else(|| ConnectorError::malformed("empty <encodedExchangeToken>"))?
        .to_string();
    let valid_from = find_node(body, "tokenValidityFrom")
        .and_then(XmlNode::text)
        .map(|v| parse_datetime(v, "tokenValidityFrom"))
        .transpose()?;
    let valid_to = find_node(body, "tokenValidityTo")
        .and_then(XmlNode::text)
        .map(|v| parse_datetime(v, "tokenValidityTo"))
        .transpose()?;
    Ok(EncodedToken {
        encoded,
        valid_from,
        valid_to,
    })
}

/// `manageInvoice` response body: the transaction handle.
pub fn parse_manage_invoice(body: &[XmlNode]) -> Result<TransactionHandle, ConnectorError> {
    let raw = required(body, "transactionId")?.text().unwrap_or_default();
    TransactionHandle::parse(raw)
        .map_err(|e| ConnectorError::malformed(format!("service returned {}", e)))
}

/// A validation message element (business or technical).
pub fn parse_validation_message(node: &XmlNode) -> Result<ValidationMessage, ConnectorError> {
    let result_code = ValidationResultCode::from_str(node.required_text("validationResultCode")?)
        .map_err(|e| ConnectorError::malformed(e.to_string()))?;
    let pointer = node
        .child("pointer")
        .map(|p| -> Result<ValidationPointer, ConnectorError> {
            Ok(ValidationPointer {
                tag: optional_text(p, "tag"),
                value: optional_text(p, "value"),
                line: p
                    .child_text("line")
                    .map(|v| parse_number(v, "line"))
                    .transpose()?,
            })
        })
        .transpose()?;
    Ok(ValidationMessage {
        result_code,
        error_code: optional_text(node, "validationErrorCode"),
        message: optional_text(node, "message"),
        pointer,
    })
}

/// `queryTransactionStatus` response body.
///
/// An absent or empty `processingResults` element yields no results; the
/// service reports nothing before it has started processing.
pub fn parse_processing_results(body: &[XmlNode]) -> Result<Vec<ProcessingResult>, ConnectorError> {
    let container = match find_node(body, "processingResults") {
        Some(node) => node,
        None => return Ok(Vec::new()),
    };

    container
        .children_named("processingResult")
        .map(|node| {
            let index = parse_number(node.required_text("index")?, "index")?;
            let mut result =
                ProcessingResult::new(index, ProcessingStatus::new(node.required_text("invoiceStatus")?));
            result.technical_messages = node
                .children_named("technicalValidationMessages")
                .map(parse_validation_message)
                .collect::<Result<_, _>>()?;
            result.business_messages = node
                .children_named("businessValidationMessages")
                .map(parse_validation_message)
                .collect::<Result<_, _>>()?;
            result.compressed_content_indicator = node
                .child_text("compressedContentIndicator")
                .map(|v| parse_bool(v, "compressedContentIndicator"))
                .transpose()?
                .unwrap_or(false);
            result.original_request = node
                .child_text("originalRequest")
                .map(|v| {
                    STANDARD
                        .decode(v)
                        .map_err(|e| ConnectorError::malformed(format!("<originalRequest>: {}", e)))
                })
                .transpose()?;
            Ok(result)
        })
        .collect()
}

fn parse_audit_data(node: &XmlNode) -> Result<AuditData, ConnectorError> {
    Ok(AuditData {
        ins_date: optional_text(node, "insdate"),
        ins_cus_user: optional_text(node, "insCusUser"),
        source: optional_text(node, "source"),
        transaction_id: optional_text(node, "transactionId"),
        index: node
            .child_text("index")
            .map(|v| parse_number(v, "index"))
            .transpose()?,
        original_request_version: optional_text(node, "originalRequestVersion"),
    })
}

fn parse_digest(node: &XmlNode) -> Result<InvoiceDigest, ConnectorError> {
    Ok(InvoiceDigest {
        invoice_number: node.required_text("invoiceNumber")?.to_string(),
        invoice_operation: optional_text(node, "invoiceOperation"),
        supplier_tax_number: optional_text(node, "supplierTaxNumber"),
        supplier_name: optional_text(node, "supplierName"),
        customer_name: optional_text(node, "customerName"),
        invoice_issue_date: optional_text(node, "invoiceIssueDate"),
        ins_date: optional_text(node, "insDate"),
        transaction_id: optional_text(node, "transactionId"),
    })
}

/// `queryInvoiceData` response body.
///
/// `invoiceDataResult` maps to [`InvoiceDataResult::Detail`],
/// `invoiceDigestResult` to [`InvoiceDataResult::Digest`], neither to
/// [`InvoiceDataResult::Empty`].
pub fn parse_invoice_data(body: &[XmlNode]) -> Result<InvoiceDataResult, ConnectorError> {
    if let Some(node) = find_node(body, "invoiceDataResult") {
        let encoded = node.required_text("invoiceData")?;
        let invoice_data = STANDARD
            .decode(encoded)
            .map_err(|e| ConnectorError::malformed(format!("<invoiceData>: {}", e)))?;
        let compressed_content_indicator = parse_bool(
            node.required_text("compressedContentIndicator")?,
            "compressedContentIndicator",
        )?;
        let audit = node
            .child("auditData")
            .ok_or_else(|| ConnectorError::malformed("<invoiceDataResult> is missing <auditData>"))?;
        return Ok(InvoiceDataResult::Detail(InvoiceDetail {
            invoice_data,
            compressed_content_indicator,
            audit_data: parse_audit_data(audit)?,
        }));
    }

    if let Some(node) = find_node(body, "invoiceDigestResult") {
        let digests = node
            .children_named("invoiceDigest")
            .map(parse_digest)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(InvoiceDataResult::Digest(InvoiceDigestPage {
            current_page: parse_number(node.required_text("currentPage")?, "currentPage")?,
            available_page: parse_number(node.required_text("availablePage")?, "availablePage")?,
            digests,
        }));
    }

    Ok(InvoiceDataResult::Empty)
}

/// `queryTaxpayer` response body.
pub fn parse_taxpayer(body: &[XmlNode]) -> Result<TaxpayerInfo, ConnectorError> {
    let validity = parse_bool(
        required(body, "taxpayerValidity")?.text().unwrap_or_default(),
        "taxpayerValidity",
    )?;

    let data = find_node(body, "taxpayerData")
        .map(|node| -> Result<TaxpayerData, ConnectorError> {
            let address = node.find("taxpayerAddress").map(|a| TaxpayerAddress {
                country_code: optional_text(a, "countryCode"),
                postal_code: optional_text(a, "postalCode"),
                city: optional_text(a, "city"),
                street_name: optional_text(a, "streetName"),
                public_place_category: optional_text(a, "publicPlaceCategory"),
                number: optional_text(a, "number"),
            });
            Ok(TaxpayerData {
                name: node.required_text("taxpayerName")?.to_string(),
                short_name: optional_text(node, "taxpayerShortName"),
                address,
            })
        })
        .transpose()?;

    Ok(TaxpayerInfo { validity, data })
}

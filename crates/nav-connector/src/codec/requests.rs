//! Request envelopes and operation bodies.

use nav_crypto::password_hash;

use super::{Envelope, EnvelopeHeader, EnvelopeRoot, ServiceOperation, UserHeader, XmlNode};
use super::{HEADER_VERSION, REQUEST_VERSION};
use crate::domain::{
    InvoiceDataQuery, InvoiceOperationBatch, QueryCriteria, RequestContext, SoftwareData,
    TechnicalUser, TransactionHandle,
};

/// Wrap a body in a signed request envelope.
pub fn request_envelope(
    op: ServiceOperation,
    context: &RequestContext,
    user: &TechnicalUser,
    software: &SoftwareData,
    body: Vec<XmlNode>,
) -> Envelope {
    Envelope {
        root: EnvelopeRoot::Request(op),
        header: Some(EnvelopeHeader {
            request_id: context.request_id.as_str().to_string(),
            timestamp: context.timestamp,
            request_version: REQUEST_VERSION.to_string(),
            header_version: Some(HEADER_VERSION.to_string()),
        }),
        user: Some(UserHeader {
            login: user.login().to_string(),
            password_hash: password_hash(user.password().expose()),
            tax_number: user.tax_number().to_string(),
            request_signature: context.signature.clone(),
        }),
        result: None,
        software: Some(software.clone()),
        body,
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// `manageInvoice` body: exchange token, then the operation list in batch order.
pub fn manage_invoice_body(exchange_token: &str, batch: &InvoiceOperationBatch) -> Vec<XmlNode> {
    let mut operations = vec![
        XmlNode::leaf("technicalAnnulment", bool_text(batch.technical_annulment)),
        XmlNode::leaf("compressedContent", bool_text(batch.compressed_content)),
    ];
    operations.extend(batch.operations.iter().enumerate().map(|(i, op)| {
        XmlNode::branch(
            "invoiceOperation",
            vec![
                XmlNode::leaf("index", (i + 1).to_string()),
                XmlNode::leaf("operation", op.kind.as_code()),
                XmlNode::leaf("invoiceData", op.encoded_payload()),
            ],
        )
    }));

    vec![
        XmlNode::leaf("exchangeToken", exchange_token),
        XmlNode::branch("invoiceOperations", operations),
    ]
}

/// `queryTransactionStatus` body.
pub fn query_transaction_status_body(
    handle: &TransactionHandle,
    return_original_request: bool,
) -> Vec<XmlNode> {
    let mut body = vec![XmlNode::leaf("transactionId", handle.as_str())];
    if return_original_request {
        body.push(XmlNode::leaf("returnOriginalRequest", "true"));
    }
    body
}

/// `queryInvoiceData` body.
///
/// Query fields are always emitted in schema order regardless of how the
/// query was built.
pub fn query_invoice_data_body(query: &InvoiceDataQuery) -> Vec<XmlNode> {
    let criteria = match &query.criteria {
        QueryCriteria::InvoiceNumber {
            invoice_number,
            direction,
            request_all_modification,
        } => {
            let mut fields = vec![
                XmlNode::leaf("invoiceNumber", invoice_number.as_str()),
                XmlNode::leaf("invoiceDirection", direction.as_code()),
            ];
            if *request_all_modification {
                fields.push(XmlNode::leaf("requestAllModification", "true"));
            }
            XmlNode::branch("invoiceQuery", fields)
        }
        QueryCriteria::IssueDateRange {
            from,
            to,
            direction,
        } => XmlNode::branch(
            "queryParams",
            vec![
                XmlNode::leaf("invoiceIssueDateFrom", from.format("%Y-%m-%d").to_string()),
                XmlNode::leaf("invoiceIssueDateTo", to.format("%Y-%m-%d").to_string()),
                XmlNode::leaf("invoiceDirection", direction.as_code()),
            ],
        ),
    };

    vec![XmlNode::leaf("page", query.page.to_string()), criteria]
}

/// `queryTaxpayer` body.
pub fn query_taxpayer_body(tax_number: &str) -> Vec<XmlNode> {
    vec![XmlNode::leaf("taxNumber", tax_number)]
}

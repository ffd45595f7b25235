//! # Fake Invoice Service
//!
//! In-memory stand-in for the reporting service, plugged in as a
//! [`Transport`]. It checks what the real service checks: envelope shape,
//! password hash, request signature (including per-operation digests),
//! unique request ids and single-use exchange tokens.
//!
//! Transactions report `PROCESSING` for a configurable number of status
//! queries, then `DONE` (or `ABORTED` for payloads that are not XML).
//! Invoices from finished transactions become queryable by invoice number.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use parking_lot::Mutex;

use nav_connector::codec::{
    find_node, format_header_timestamp, parse_document, Envelope, EnvelopeHeader, EnvelopeRoot,
    FuncResult, RequestEnvelopeCodec, ServiceOperation, XmlNode, REQUEST_VERSION,
};
use nav_connector::{Transport, TransportError, TransportResponse};
use nav_crypto::{batch_signature, encode_exchange_token, password_hash, request_signature, SignedOperation};

/// Registered technical user.
#[derive(Clone, Debug)]
pub struct FakeAccount {
    /// Login name.
    pub login: String,
    /// Plain password; the service compares hashes.
    pub password: String,
    /// Eight digit tax number.
    pub tax_number: String,
    /// Signing key.
    pub signing_key: String,
    /// 16 byte exchange key.
    pub exchange_key: String,
}

impl FakeAccount {
    /// Account used across the integration flows.
    pub fn sample() -> Self {
        Self {
            login: "techuser01".to_string(),
            password: "Secret-Password-1".to_string(),
            tax_number: "12345678".to_string(),
            signing_key: "ce-8f5e-215119fa7dd621DLMRHRLH2S".to_string(),
            exchange_key: "CE8F5E215119FA7D".to_string(),
        }
    }
}

/// Taxpayer record served by `queryTaxpayer`.
#[derive(Clone, Debug)]
pub struct FakeTaxpayer {
    /// Registered name.
    pub name: String,
    /// Short name.
    pub short_name: Option<String>,
    /// Settlement.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
}

#[derive(Clone, Debug)]
struct StoredOperation {
    kind: String,
    payload: Vec<u8>,
}

#[derive(Clone, Debug)]
struct StoredTransaction {
    operations: Vec<StoredOperation>,
    queries: u32,
    finished: bool,
}

#[derive(Clone, Debug)]
struct StoredInvoice {
    payload: Vec<u8>,
    operation: String,
    transaction_id: String,
    index: u32,
}

#[derive(Default)]
struct ServiceState {
    request_ids: HashSet<String>,
    tokens: HashSet<String>,
    token_counter: u32,
    transaction_counter: u32,
    transactions: HashMap<String, StoredTransaction>,
    invoices: HashMap<String, StoredInvoice>,
    taxpayers: HashMap<String, FakeTaxpayer>,
    injected: VecDeque<(String, TransportResponse)>,
    calls: Vec<String>,
}

/// Service fault to be rendered as a `GeneralErrorResponse`.
struct Fault {
    status: u16,
    code: &'static str,
    message: String,
}

impl Fault {
    fn new(status: u16, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

type Reply = Result<Vec<XmlNode>, Fault>;

/// In-memory reporting service.
pub struct FakeInvoiceService {
    account: FakeAccount,
    processing_polls: u32,
    state: Mutex<ServiceState>,
}

impl FakeInvoiceService {
    /// Service knowing one account; transactions stay in progress for
    /// `processing_polls` status queries.
    pub fn new(account: FakeAccount, processing_polls: u32) -> Self {
        Self {
            account,
            processing_polls,
            state: Mutex::new(ServiceState::default()),
        }
    }

    /// Register a taxpayer.
    pub fn add_taxpayer(&self, tax_number: &str, taxpayer: FakeTaxpayer) {
        self.state
            .lock()
            .taxpayers
            .insert(tax_number.to_string(), taxpayer);
    }

    /// Answer the next request to `endpoint` with a raw HTTP response
    /// instead of handling it.
    pub fn inject_response(&self, endpoint: &str, status: u16, body: &[u8]) {
        self.state.lock().injected.push_back((
            endpoint.to_string(),
            TransportResponse {
                status,
                body: body.to_vec(),
            },
        ));
    }

    /// Endpoints called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of accepted `manageInvoice` submissions.
    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    fn handle(&self, endpoint: &str, bytes: &[u8]) -> Result<(ServiceOperation, Vec<XmlNode>), Fault> {
        let envelope = RequestEnvelopeCodec::decode_envelope(bytes)
            .map_err(|e| Fault::new(400, "INVALID_REQUEST", e.to_string()))?;

        let op = match envelope.root {
            EnvelopeRoot::Request(op) if op.endpoint() == endpoint => op,
            other => {
                return Err(Fault::new(
                    400,
                    "INVALID_REQUEST",
                    format!("{} posted to {}", other.element_name(), endpoint),
                ))
            }
        };

        let header = envelope
            .header
            .as_ref()
            .ok_or_else(|| Fault::new(400, "INVALID_REQUEST", "missing header"))?;
        let user = envelope
            .user
            .as_ref()
            .ok_or_else(|| Fault::new(400, "INVALID_REQUEST", "missing user"))?;

        if user.login != self.account.login
            || user.password_hash != password_hash(&self.account.password)
        {
            return Err(Fault::new(401, "INVALID_SECURITY_USER", "unknown user"));
        }
        if user.tax_number != self.account.tax_number {
            return Err(Fault::new(403, "INVALID_USER_RELATION", "tax number mismatch"));
        }

        let expected = if op == ServiceOperation::ManageInvoice {
            let operations = read_operations(&envelope.body)?;
            let signed: Vec<SignedOperation<'_>> = operations
                .iter()
                .map(|o| SignedOperation {
                    kind: &o.kind,
                    payload: &o.payload,
                })
                .collect();
            batch_signature(
                &header.request_id,
                &header.timestamp,
                &self.account.signing_key,
                &signed,
            )
        } else {
            request_signature(&header.request_id, &header.timestamp, &self.account.signing_key)
        };
        if user.request_signature != expected {
            return Err(Fault::new(400, "INVALID_REQUEST_SIGNATURE", "signature mismatch"));
        }

        if !self.state.lock().request_ids.insert(header.request_id.clone()) {
            return Err(Fault::new(400, "INVALID_REQUEST", "request id already used"));
        }

        let body = match op {
            ServiceOperation::TokenExchange => self.token_exchange(),
            ServiceOperation::ManageInvoice => self.manage_invoice(&envelope.body),
            ServiceOperation::QueryTransactionStatus => self.transaction_status(&envelope.body),
            ServiceOperation::QueryInvoiceData => self.invoice_data(&envelope.body),
            ServiceOperation::QueryTaxpayer => self.taxpayer(&envelope.body),
        }?;
        Ok((op, body))
    }

    fn token_exchange(&self) -> Reply {
        let mut state = self.state.lock();
        state.token_counter += 1;
        let token = format!("exchange-token-{:04}", state.token_counter);
        state.tokens.insert(token.clone());

        let encoded = encode_exchange_token(&token, &self.account.exchange_key)
            .map_err(|e| Fault::new(500, "OPERATION_FAILED", e.to_string()))?;
        let now = Utc::now();
        Ok(vec![
            XmlNode::leaf("encodedExchangeToken", encoded),
            XmlNode::leaf("tokenValidityFrom", format_header_timestamp(&now)),
            XmlNode::leaf(
                "tokenValidityTo",
                format_header_timestamp(&(now + chrono::Duration::minutes(5))),
            ),
        ])
    }

    fn manage_invoice(&self, body: &[XmlNode]) -> Reply {
        let token = find_node(body, "exchangeToken")
            .and_then(XmlNode::text)
            .unwrap_or_default();
        let operations = read_operations(body)?;

        let mut state = self.state.lock();
        if !state.tokens.remove(token) {
            return Err(Fault::new(400, "INVALID_EXCHANGE_TOKEN", "token unknown or used"));
        }
        state.transaction_counter += 1;
        let transaction_id = format!("4Z8F{:08}ABC", state.transaction_counter);
        state.transactions.insert(
            transaction_id.clone(),
            StoredTransaction {
                operations,
                queries: 0,
                finished: false,
            },
        );
        Ok(vec![XmlNode::leaf("transactionId", transaction_id)])
    }

    fn transaction_status(&self, body: &[XmlNode]) -> Reply {
        let id = find_node(body, "transactionId")
            .and_then(XmlNode::text)
            .unwrap_or_default()
            .to_string();
        let return_original = find_node(body, "returnOriginalRequest").and_then(XmlNode::text)
            == Some("true");

        let mut state = self.state.lock();
        let processing_polls = self.processing_polls;
        let transaction = match state.transactions.get_mut(&id) {
            Some(transaction) => transaction,
            None => return Ok(Vec::new()),
        };
        transaction.queries += 1;
        let done = transaction.queries > processing_polls;
        let first_completion = done && !transaction.finished;
        transaction.finished = done;
        let operations = transaction.operations.clone();

        let mut results = Vec::with_capacity(operations.len());
        for (i, operation) in operations.iter().enumerate() {
            let index = i as u32 + 1;
            let invoice_number = invoice_number(&operation.payload);
            let status = match (done, &invoice_number) {
                (false, _) => "PROCESSING",
                (true, Some(_)) => "DONE",
                (true, None) => "ABORTED",
            };

            let mut fields = vec![
                XmlNode::leaf("index", index.to_string()),
                XmlNode::leaf("invoiceStatus", status),
            ];
            if status == "ABORTED" {
                fields.push(XmlNode::branch(
                    "technicalValidationMessages",
                    vec![
                        XmlNode::leaf("validationResultCode", "ERROR"),
                        XmlNode::leaf("validationErrorCode", "SCHEMA_VIOLATION"),
                        XmlNode::leaf("message", "invoice data is not well-formed XML"),
                    ],
                ));
            }
            fields.push(XmlNode::leaf("compressedContentIndicator", "false"));
            if return_original {
                fields.push(XmlNode::leaf("originalRequest", STANDARD.encode(&operation.payload)));
            }
            results.push(XmlNode::branch("processingResult", fields));

            if let (true, Some(number)) = (first_completion, invoice_number) {
                state.invoices.insert(
                    number,
                    StoredInvoice {
                        payload: operation.payload.clone(),
                        operation: operation.kind.clone(),
                        transaction_id: id.clone(),
                        index,
                    },
                );
            }
        }

        Ok(vec![XmlNode::branch("processingResults", results)])
    }

    fn invoice_data(&self, body: &[XmlNode]) -> Reply {
        let state = self.state.lock();

        if let Some(query) = find_node(body, "invoiceQuery") {
            let number = query.child_text("invoiceNumber").unwrap_or_default();
            return Ok(match state.invoices.get(number) {
                Some(invoice) => vec![XmlNode::branch(
                    "invoiceDataResult",
                    vec![
                        XmlNode::leaf("invoiceData", STANDARD.encode(&invoice.payload)),
                        XmlNode::branch(
                            "auditData",
                            vec![
                                XmlNode::leaf("insdate", format_header_timestamp(&Utc::now())),
                                XmlNode::leaf("insCusUser", self.account.login.as_str()),
                                XmlNode::leaf("source", "MGM"),
                                XmlNode::leaf("transactionId", invoice.transaction_id.as_str()),
                                XmlNode::leaf("index", invoice.index.to_string()),
                                XmlNode::leaf("originalRequestVersion", REQUEST_VERSION),
                            ],
                        ),
                        XmlNode::leaf("compressedContentIndicator", "false"),
                    ],
                )],
                None => Vec::new(),
            });
        }

        if find_node(body, "queryParams").is_some() {
            let mut numbers: Vec<&String> = state.invoices.keys().collect();
            numbers.sort();
            let mut fields = vec![
                XmlNode::leaf("currentPage", "1"),
                XmlNode::leaf("availablePage", "1"),
            ];
            fields.extend(numbers.into_iter().map(|number| {
                let invoice = &state.invoices[number];
                XmlNode::branch(
                    "invoiceDigest",
                    vec![
                        XmlNode::leaf("invoiceNumber", number.as_str()),
                        XmlNode::leaf("invoiceOperation", invoice.operation.as_str()),
                        XmlNode::leaf("supplierTaxNumber", self.account.tax_number.as_str()),
                        XmlNode::leaf("transactionId", invoice.transaction_id.as_str()),
                    ],
                )
            }));
            return Ok(vec![XmlNode::branch("invoiceDigestResult", fields)]);
        }

        Err(Fault::new(400, "INVALID_REQUEST", "no query criteria"))
    }

    fn taxpayer(&self, body: &[XmlNode]) -> Reply {
        let tax_number = find_node(body, "taxNumber")
            .and_then(XmlNode::text)
            .unwrap_or_default();
        let state = self.state.lock();
        Ok(match state.taxpayers.get(tax_number) {
            Some(taxpayer) => {
                let mut data = vec![XmlNode::leaf("taxpayerName", taxpayer.name.as_str())];
                if let Some(short) = &taxpayer.short_name {
                    data.push(XmlNode::leaf("taxpayerShortName", short.as_str()));
                }
                data.push(XmlNode::branch(
                    "taxpayerAddressList",
                    vec![XmlNode::branch(
                        "taxpayerAddressItem",
                        vec![
                            XmlNode::leaf("taxpayerAddressType", "HQ"),
                            XmlNode::branch(
                                "taxpayerAddress",
                                vec![
                                    XmlNode::leaf("countryCode", "HU"),
                                    XmlNode::leaf("postalCode", taxpayer.postal_code.as_str()),
                                    XmlNode::leaf("city", taxpayer.city.as_str()),
                                ],
                            ),
                        ],
                    )],
                ));
                vec![
                    XmlNode::leaf("taxpayerValidity", "true"),
                    XmlNode::branch("taxpayerData", data),
                ]
            }
            None => vec![XmlNode::leaf("taxpayerValidity", "false")],
        })
    }
}

fn read_operations(body: &[XmlNode]) -> Result<Vec<StoredOperation>, Fault> {
    let container = find_node(body, "invoiceOperations")
        .ok_or_else(|| Fault::new(400, "INVALID_REQUEST", "missing invoiceOperations"))?;
    container
        .children_named("invoiceOperation")
        .map(|node| {
            let kind = node.child_text("operation").unwrap_or_default().to_string();
            let payload = STANDARD
                .decode(node.child_text("invoiceData").unwrap_or_default())
                .map_err(|e| Fault::new(400, "INVALID_REQUEST", e.to_string()))?;
            Ok(StoredOperation { kind, payload })
        })
        .collect()
}

fn invoice_number(payload: &[u8]) -> Option<String> {
    let root = parse_document(payload).ok()?;
    root.find("invoiceNumber")
        .and_then(XmlNode::text)
        .map(str::to_string)
}

fn render(root: EnvelopeRoot, result: FuncResult, body: Vec<XmlNode>) -> Vec<u8> {
    let envelope = Envelope {
        root,
        header: Some(EnvelopeHeader {
            request_id: format!("SRV{}", Utc::now().timestamp_millis()),
            timestamp: Utc::now(),
            request_version: REQUEST_VERSION.to_string(),
            header_version: None,
        }),
        user: None,
        result: Some(result),
        software: None,
        body,
    };
    RequestEnvelopeCodec::encode(&envelope).unwrap_or_default()
}

#[async_trait]
impl Transport for FakeInvoiceService {
    async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<TransportResponse, TransportError> {
        {
            let mut state = self.state.lock();
            state.calls.push(endpoint.to_string());
            let position = state.injected.iter().position(|(e, _)| e == endpoint);
            if let Some((_, injected)) = position.and_then(|i| state.injected.remove(i)) {
                return Ok(injected);
            }
        }

        Ok(match self.handle(endpoint, &body) {
            Ok((op, body)) => TransportResponse {
                status: 200,
                body: render(
                    EnvelopeRoot::Response(op),
                    FuncResult {
                        func_code: "OK".to_string(),
                        error_code: None,
                        message: None,
                    },
                    body,
                ),
            },
            Err(fault) => TransportResponse {
                status: fault.status,
                body: render(
                    EnvelopeRoot::GeneralError,
                    FuncResult {
                        func_code: "ERROR".to_string(),
                        error_code: Some(fault.code.to_string()),
                        message: Some(fault.message),
                    },
                    Vec::new(),
                ),
            },
        })
    }
}

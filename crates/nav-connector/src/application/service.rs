//! # Connector Service
//!
//! Application service composing signer, codec, transport and poller.
//!
//! Every call builds its own [`RequestContext`]; the connector itself holds
//! only read-only configuration and credentials, so one instance can serve
//! concurrent calls.

use async_trait::async_trait;
use nav_crypto::{batch_signature, decode_exchange_token, request_signature, EXCHANGE_KEY_LEN};
use tracing::{debug, info, warn};

use crate::adapters::{HttpTransport, SystemClock};
use crate::algorithms::TransactionPoller;
use crate::codec::requests::{
    manage_invoice_body, query_invoice_data_body, query_taxpayer_body,
    query_transaction_status_body, request_envelope,
};
use crate::codec::responses::{
    parse_invoice_data, parse_manage_invoice, parse_processing_results, parse_taxpayer,
    parse_token_exchange,
};
use crate::codec::{RequestEnvelopeCodec, ServiceOperation, XmlNode};
use crate::config::{ConnectorConfig, PollOptions};
use crate::domain::{
    invariant_batch, is_tax_number, ConnectorError, ExchangeToken, InvoiceDataQuery,
    InvoiceDataResult, InvoiceOperationBatch, ManagedBatch, ProcessingResult, RequestContext,
    RequestId, SecretString, SoftwareData, TaxpayerInfo, TechnicalUser, TransactionHandle,
    TransportError, ValidationError,
};
use crate::ports::{Clock, InvoiceConnectorApi, StatusSource, Transport};

/// Invoice reporting connector.
pub struct Connector<T = HttpTransport, C = SystemClock> {
    /// Configuration.
    config: ConnectorConfig,
    /// Technical user credentials.
    user: TechnicalUser,
    /// Calling software identity.
    software: SoftwareData,
    /// HTTP transport.
    transport: T,
    /// Time source for timestamps and polling.
    clock: C,
}

impl Connector<HttpTransport, SystemClock> {
    /// Create a connector talking HTTPS to `config.base_url`.
    pub fn new(
        config: ConnectorConfig,
        user: TechnicalUser,
        software: SoftwareData,
    ) -> Result<Self, ConnectorError> {
        let transport = HttpTransport::new(&config)?;
        Self::with_parts(config, user, software, transport, SystemClock::new())
    }
}

impl<T: Transport, C: Clock> Connector<T, C> {
    /// Create a connector from explicit collaborators.
    pub fn with_parts(
        config: ConnectorConfig,
        user: TechnicalUser,
        software: SoftwareData,
        transport: T,
        clock: C,
    ) -> Result<Self, ConnectorError> {
        config.validate()?;
        user.validate()?;
        software.validate()?;
        if user.exchange_key().expose().len() != EXCHANGE_KEY_LEN {
            return Err(ValidationError::InvalidConfig(format!(
                "exchange key must be {} bytes",
                EXCHANGE_KEY_LEN
            ))
            .into());
        }

        info!(
            "[nav] Connector for {} ({}) targeting {}",
            user.login(),
            user.tax_number(),
            config.base_url
        );
        Ok(Self {
            config,
            user,
            software,
            transport,
            clock,
        })
    }

    /// Configuration.
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Technical user.
    pub fn technical_user(&self) -> &TechnicalUser {
        &self.user
    }

    /// Software identity.
    pub fn software(&self) -> &SoftwareData {
        &self.software
    }

    /// Fresh request context. For batch submissions the signature covers the
    /// operations exactly as they will be encoded.
    fn new_context(&self, batch: Option<&InvoiceOperationBatch>) -> RequestContext {
        let request_id = RequestId::generate();
        let context = RequestContext::new(request_id, self.clock.now(), String::new());
        let signing_key = self.user.signing_key().expose();
        let signature = match batch {
            Some(batch) => batch_signature(
                context.request_id.as_str(),
                &context.timestamp,
                signing_key,
                &batch.signed_operations(),
            ),
            None => request_signature(context.request_id.as_str(), &context.timestamp, signing_key),
        };
        RequestContext { signature, ..context }
    }

    /// One request/response round trip; returns the response body.
    async fn call(
        &self,
        op: ServiceOperation,
        context: RequestContext,
        body: Vec<XmlNode>,
    ) -> Result<Vec<XmlNode>, ConnectorError> {
        let envelope = request_envelope(op, &context, &self.user, &self.software, body);
        let bytes = RequestEnvelopeCodec::encode(&envelope)?;
        debug!(request_id = %context.request_id, "[nav] {} request", op.endpoint());

        let response = self.transport.post(op.endpoint(), bytes).await?;

        match RequestEnvelopeCodec::decode(&response.body) {
            Ok(envelope) => envelope.into_response_body(op),
            Err(ConnectorError::MalformedResponse(reason)) if !response.is_success() => {
                let status = TransportError::Status {
                    status: response.status,
                };
                if status.is_retryable() {
                    Err(status.into())
                } else {
                    Err(ConnectorError::malformed(format!(
                        "HTTP {}: {}",
                        response.status, reason
                    )))
                }
            }
            Err(err) => {
                if let ConnectorError::Auth(fault) | ConnectorError::Protocol(fault) = &err {
                    warn!(
                        request_id = %context.request_id,
                        "[nav] {} request rejected: {}",
                        op.endpoint(),
                        fault
                    );
                }
                Err(err)
            }
        }
    }

    async fn fetch_status(
        &self,
        handle: &TransactionHandle,
        return_original_request: bool,
    ) -> Result<Vec<ProcessingResult>, ConnectorError> {
        let context = self.new_context(None);
        let body = query_transaction_status_body(handle, return_original_request);
        let body = self
            .call(ServiceOperation::QueryTransactionStatus, context, body)
            .await?;
        parse_processing_results(&body)
    }
}

#[async_trait]
impl<T: Transport, C: Clock> StatusSource for Connector<T, C> {
    async fn query_status(
        &self,
        handle: &TransactionHandle,
    ) -> Result<Vec<ProcessingResult>, ConnectorError> {
        self.fetch_status(handle, false).await
    }
}

#[async_trait]
impl<T: Transport, C: Clock> InvoiceConnectorApi for Connector<T, C> {
    async fn submit_invoices(
        &self,
        batch: &InvoiceOperationBatch,
    ) -> Result<TransactionHandle, ConnectorError> {
        invariant_batch(batch, self.config.max_batch_size)?;

        let token = self.token_exchange().await?;
        let context = self.new_context(Some(batch));
        let body = manage_invoice_body(token.token.expose(), batch);
        let body = self
            .call(ServiceOperation::ManageInvoice, context, body)
            .await?;
        let handle = parse_manage_invoice(&body)?;

        info!(
            transaction_id = %handle,
            operations = batch.len(),
            "[nav] Batch submitted"
        );
        Ok(handle)
    }

    async fn await_results(
        &self,
        handle: &TransactionHandle,
        options: &PollOptions,
    ) -> Result<Vec<ProcessingResult>, ConnectorError> {
        TransactionPoller::new(self, &self.clock, &self.config.status_catalog, options)
            .poll(handle)
            .await
    }

    async fn manage_invoice(
        &self,
        batch: &InvoiceOperationBatch,
        options: &PollOptions,
    ) -> Result<ManagedBatch, ConnectorError> {
        let handle = self.submit_invoices(batch).await?;
        let results = self.await_results(&handle, options).await?;
        if results.len() != batch.len() {
            return Err(ConnectorError::malformed(format!(
                "transaction {} reported {} results for {} operations",
                handle,
                results.len(),
                batch.len()
            )));
        }
        Ok(ManagedBatch { handle, results })
    }

    async fn query_transaction_status(
        &self,
        handle: &TransactionHandle,
        return_original_request: bool,
    ) -> Result<Vec<ProcessingResult>, ConnectorError> {
        let mut results = self.fetch_status(handle, return_original_request).await?;
        results.sort_by_key(|r| r.index);
        Ok(results)
    }

    async fn query_invoice_data(
        &self,
        query: &InvoiceDataQuery,
    ) -> Result<InvoiceDataResult, ConnectorError> {
        query.validate()?;
        let context = self.new_context(None);
        let body = self
            .call(
                ServiceOperation::QueryInvoiceData,
                context,
                query_invoice_data_body(query),
            )
            .await?;
        parse_invoice_data(&body)
    }

    async fn query_taxpayer(&self, tax_number: &str) -> Result<TaxpayerInfo, ConnectorError> {
        if !is_tax_number(tax_number) {
            return Err(ValidationError::InvalidTaxNumber(tax_number.to_string()).into());
        }
        let context = self.new_context(None);
        let body = self
            .call(
                ServiceOperation::QueryTaxpayer,
                context,
                query_taxpayer_body(tax_number),
            )
            .await?;
        parse_taxpayer(&body)
    }

    async fn token_exchange(&self) -> Result<ExchangeToken, ConnectorError> {
        let context = self.new_context(None);
        let body = self
            .call(ServiceOperation::TokenExchange, context, Vec::new())
            .await?;
        let encoded = parse_token_exchange(&body)?;
        let token = decode_exchange_token(&encoded.encoded, self.user.exchange_key().expose())?;
        Ok(ExchangeToken {
            token: SecretString::new(token),
            valid_from: encoded.valid_from,
            valid_to: encoded.valid_to,
        })
    }

    async fn test_connection(&self) -> Result<(), ConnectorError> {
        let token = self.token_exchange().await?;
        debug!(
            "[nav] Connection ok, token valid until {:?}",
            token.valid_to
        );
        Ok(())
    }
}

//! # Inbound Ports
//!
//! API trait defining what the connector can do.

use async_trait::async_trait;

use crate::config::PollOptions;
use crate::domain::{
    ConnectorError, ExchangeToken, InvoiceDataQuery, InvoiceDataResult, InvoiceOperationBatch,
    ManagedBatch, ProcessingResult, TaxpayerInfo, TransactionHandle,
};

/// Invoice reporting API - inbound port.
#[async_trait]
pub trait InvoiceConnectorApi: Send + Sync {
    /// Submit a signed batch and return its transaction handle.
    async fn submit_invoices(
        &self,
        batch: &InvoiceOperationBatch,
    ) -> Result<TransactionHandle, ConnectorError>;

    /// Poll until every operation of the transaction is terminal.
    async fn await_results(
        &self,
        handle: &TransactionHandle,
        options: &PollOptions,
    ) -> Result<Vec<ProcessingResult>, ConnectorError>;

    /// Submit and await in one call.
    ///
    /// On timeout the error still names the handle, so polling can resume
    /// through [`InvoiceConnectorApi::await_results`].
    async fn manage_invoice(
        &self,
        batch: &InvoiceOperationBatch,
        options: &PollOptions,
    ) -> Result<ManagedBatch, ConnectorError>;

    /// One status query without retry.
    async fn query_transaction_status(
        &self,
        handle: &TransactionHandle,
        return_original_request: bool,
    ) -> Result<Vec<ProcessingResult>, ConnectorError>;

    /// Reported invoice data.
    async fn query_invoice_data(
        &self,
        query: &InvoiceDataQuery,
    ) -> Result<InvoiceDataResult, ConnectorError>;

    /// Taxpayer registry lookup.
    async fn query_taxpayer(&self, tax_number: &str) -> Result<TaxpayerInfo, ConnectorError>;

    /// Obtain and decode an exchange token.
    async fn token_exchange(&self) -> Result<ExchangeToken, ConnectorError>;

    /// Check credentials, signature and exchange key against the service.
    async fn test_connection(&self) -> Result<(), ConnectorError>;
}

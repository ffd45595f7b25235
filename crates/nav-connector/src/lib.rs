//! # NAV Connector
//!
//! Client for the online invoice reporting service (API 2.0): signed batch
//! submission, transaction status polling and the read-only queries.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Call Flow
//!
//! ```text
//! submit_invoices ──► tokenExchange ──► manageInvoice ──► TransactionHandle
//!                                                               │
//! await_results ◄── queryTransactionStatus (poll, backoff) ◄────┘
//! ```
//!
//! Every request carries a fresh request id, a millisecond UTC timestamp,
//! the SHA-512 password hash and a SHA3-512 request signature. Batch
//! submissions extend the signature with one digest per operation.
//!
//! ## Failure Model
//!
//! | Error | Meaning |
//! |-------|---------|
//! | `Validation` | Rejected locally, nothing was sent |
//! | `Auth` | Credentials or signature rejected |
//! | `Protocol` | Service error envelope |
//! | `MalformedResponse` | Unreadable response |
//! | `Transport` | Network failure or transient HTTP status |
//! | `PollTimeout` | Deadline passed; the handle stays valid |
//!
//! Only status queries inside `await_results` are retried. A batch is never
//! resubmitted automatically.
//!
//! ## Module Structure
//!
//! ```text
//! nav-connector/
//! ├── domain/          # Credentials, batches, results, errors, invariants
//! ├── codec/           # Envelope codec and per-operation bodies
//! ├── algorithms/      # Backoff and the transaction poller
//! ├── ports/           # API trait (inbound) + transport/clock traits (outbound)
//! ├── adapters/        # reqwest transport, tokio clock
//! ├── application/     # Connector orchestrating everything
//! └── config.rs        # ConnectorConfig, PollOptions, RetryPolicy
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod codec;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{HttpTransport, SystemClock};
pub use algorithms::{backoff_delay, retry_with_backoff, PollState, RetryError, TransactionPoller};
pub use application::Connector;
pub use codec::{Envelope, EnvelopeRoot, RequestEnvelopeCodec, ServiceOperation};
pub use config::{
    ConnectorConfig, PollOptions, RetryPolicy, DEFAULT_TIMEOUT_MS, PRODUCTION_BASE_URL,
    TEST_BASE_URL,
};
pub use domain::{
    ConnectorError, ExchangeToken, InvoiceDataQuery, InvoiceDataResult, InvoiceDetail,
    InvoiceDirection, InvoiceOperation, InvoiceOperationBatch, ManagedBatch, OperationKind,
    ProcessingResult, ProcessingStatus, RequestContext, RequestId, SecretString, ServiceFault,
    SoftwareData, SoftwareOperation, StatusCatalog, StatusClass, TaxpayerInfo, TechnicalUser,
    TransactionHandle, TransportError, ValidationError, ValidationMessage, MAX_BATCH_SIZE,
};
pub use ports::{
    Clock, InvoiceConnectorApi, ManualClock, ScriptedStatusSource, ScriptedTransport,
    StatusSource, Transport, TransportResponse,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

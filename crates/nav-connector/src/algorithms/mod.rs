//! # Algorithms Module
//!
//! Retry backoff and the transaction polling state machine.

pub mod backoff;
pub mod poller;

pub use backoff::{backoff_delay, retry_with_backoff, RetryError};
pub use poller::{PollState, TransactionPoller};

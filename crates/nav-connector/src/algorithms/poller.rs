//! # Transaction Poller
//!
//! Drives one transaction handle to a terminal outcome.
//!
//! ```text
//!            empty answer             some in progress
//!   Pending ───────────────▶ Pending ─────────────────▶ InProgress ──┐
//!      │                                                   ▲   │     │
//!      │ all terminal                                      └───┘     │ all terminal
//!      ▼                                                             ▼
//!    Done ◀──────────────────────────────────────────────────────── Done
//!
//!   any state ── deadline ──▶ TimedOut(last results)
//!   any state ── fatal / retries exhausted ──▶ QueryFailed(error)
//! ```
//!
//! A query is only sent while the clock is within the deadline and gets just
//! the time left before it; a query still in flight at the deadline is
//! dropped. The poller never sleeps past the deadline either: if the next
//! tick would land after it, it gives up at once.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::backoff::{retry_with_backoff, RetryError};
use crate::config::PollOptions;
use crate::domain::{
    invariant_results_aligned, ConnectorError, ProcessingResult, StatusCatalog, TransactionHandle,
    TransportError,
};
use crate::ports::{Clock, StatusSource};

/// Observable state of a transaction being polled.
#[derive(Debug)]
pub enum PollState {
    /// No processing result reported yet.
    Pending,
    /// At least one operation still being processed.
    InProgress(Vec<ProcessingResult>),
    /// Every operation terminal; sorted by index.
    Done(Vec<ProcessingResult>),
    /// Deadline passed; last results seen, possibly none.
    TimedOut(Vec<ProcessingResult>),
    /// Query failed for good.
    QueryFailed(ConnectorError),
}

impl PollState {
    /// No further transition happens.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Done(_) | PollState::TimedOut(_) | PollState::QueryFailed(_)
        )
    }

    /// Results seen in this state.
    pub fn last_results(&self) -> &[ProcessingResult] {
        match self {
            PollState::InProgress(results)
            | PollState::Done(results)
            | PollState::TimedOut(results) => results,
            PollState::Pending | PollState::QueryFailed(_) => &[],
        }
    }

    /// Transition on a status answer.
    pub fn observe(self, mut results: Vec<ProcessingResult>, catalog: &StatusCatalog) -> PollState {
        if results.is_empty() {
            return match self {
                PollState::InProgress(last) => PollState::InProgress(last),
                _ => PollState::Pending,
            };
        }

        let mut all_terminal = true;
        for result in &results {
            match catalog.classify(&result.status) {
                Some(class) => all_terminal &= class.is_terminal(),
                None => {
                    return PollState::QueryFailed(ConnectorError::malformed(format!(
                        "unknown processing status {:?} for operation {}",
                        result.status.as_str(),
                        result.index
                    )))
                }
            }
        }

        if all_terminal {
            match invariant_results_aligned(&mut results) {
                Ok(()) => PollState::Done(results),
                Err(err) => PollState::QueryFailed(err),
            }
        } else {
            results.sort_by_key(|r| r.index);
            PollState::InProgress(results)
        }
    }

    /// Transition on deadline expiry.
    pub fn time_out(self) -> PollState {
        match self {
            PollState::Pending => PollState::TimedOut(Vec::new()),
            PollState::InProgress(results) => PollState::TimedOut(results),
            terminal => terminal,
        }
    }

    /// Final outcome of a polling run.
    pub fn into_result(
        self,
        handle: &TransactionHandle,
        waited: Duration,
    ) -> Result<Vec<ProcessingResult>, ConnectorError> {
        match self.time_out() {
            PollState::Done(results) => Ok(results),
            PollState::QueryFailed(err) => Err(err),
            PollState::TimedOut(last_results) => Err(ConnectorError::PollTimeout {
                handle: handle.clone(),
                waited,
                last_results,
            }),
            PollState::Pending | PollState::InProgress(_) => Err(ConnectorError::PollTimeout {
                handle: handle.clone(),
                waited,
                last_results: Vec::new(),
            }),
        }
    }
}

/// Polls a [`StatusSource`] until the transaction is done or the deadline passes.
///
/// Holds only borrowed collaborators; every call to [`TransactionPoller::poll`]
/// is independent.
pub struct TransactionPoller<'a, S: ?Sized, C: ?Sized> {
    source: &'a S,
    clock: &'a C,
    catalog: &'a StatusCatalog,
    options: &'a PollOptions,
}

impl<'a, S, C> TransactionPoller<'a, S, C>
where
    S: StatusSource + ?Sized,
    C: Clock + ?Sized,
{
    /// Create a poller.
    pub fn new(
        source: &'a S,
        clock: &'a C,
        catalog: &'a StatusCatalog,
        options: &'a PollOptions,
    ) -> Self {
        Self {
            source,
            clock,
            catalog,
            options,
        }
    }

    /// Poll `handle` to a terminal state.
    pub async fn poll(
        &self,
        handle: &TransactionHandle,
    ) -> Result<Vec<ProcessingResult>, ConnectorError> {
        self.options.validate()?;

        let start = self.clock.elapsed();
        let deadline = start.saturating_add(self.options.max_wait());
        let mut state = PollState::Pending;
        let mut tick = 0u32;

        let source = self.source;
        while !state.is_terminal() {
            let answer = retry_with_backoff(self.clock, &self.options.retry, deadline, move || {
                source.query_status(handle)
            })
            .await;

            state = match answer {
                Ok(results) => state.observe(results, self.catalog),
                Err(RetryError::Fatal(err)) => PollState::QueryFailed(err),
                Err(RetryError::Exhausted { attempts, last }) => {
                    warn!(transaction_id = %handle, attempts, "[nav] Status query failed");
                    PollState::QueryFailed(ConnectorError::Transport(
                        TransportError::RetriesExhausted {
                            attempts,
                            last: Box::new(last),
                        },
                    ))
                }
                Err(RetryError::DeadlineReached(last)) => {
                    debug!(
                        transaction_id = %handle,
                        "[nav] Deadline reached while querying: {}",
                        last
                    );
                    state.time_out()
                }
            };
            if state.is_terminal() {
                break;
            }

            let interval = self.options.interval_after(tick);
            tick += 1;
            if self.clock.elapsed().saturating_add(interval) > deadline {
                state = state.time_out();
                break;
            }
            debug!(
                transaction_id = %handle,
                results = state.last_results().len(),
                "[nav] Transaction not finished, next query in {:?}",
                interval
            );
            self.clock.sleep(interval).await;
        }

        let waited = self.clock.elapsed().saturating_sub(start);
        match &state {
            PollState::Done(results) => info!(
                transaction_id = %handle,
                results = results.len(),
                "[nav] Transaction done after {:?}",
                waited
            ),
            PollState::TimedOut(results) => warn!(
                transaction_id = %handle,
                results = results.len(),
                "[nav] Transaction still processing after {:?}",
                waited
            ),
            _ => {}
        }
        state.into_result(handle, waited)
    }
}

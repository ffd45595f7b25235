//! # Outbound Ports
//!
//! Traits for external dependencies: the HTTP transport, the clock and the
//! transaction status source used by the poller.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::{ConnectorError, ProcessingResult, TransactionHandle, TransportError};

/// Raw HTTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport - outbound port.
///
/// Implementations send `body` as-is to `endpoint` under their base URL with
/// the XML content headers. Any HTTP status is a response, not an error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a request document.
    async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<TransportResponse, TransportError>;
}

/// Time source - outbound port.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since an arbitrary fixed origin.
    fn elapsed(&self) -> Duration;

    /// Current wall-clock time, used for request timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the caller.
    async fn sleep(&self, duration: Duration);

    /// Run `fut` for at most `limit`; `None` when the limit passed first.
    async fn timeout<F>(&self, limit: Duration, fut: F) -> Option<F::Output>
    where
        F: Future + Send,
        F::Output: Send;
}

/// Processing status of a submitted transaction - outbound port of the poller.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// One status query, no retry.
    async fn query_status(
        &self,
        handle: &TransactionHandle,
    ) -> Result<Vec<ProcessingResult>, ConnectorError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<TransportResponse, TransportError> {
        (**self).post(endpoint, body).await
    }
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn elapsed(&self) -> Duration {
        (**self).elapsed()
    }

    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await
    }

    async fn timeout<F>(&self, limit: Duration, fut: F) -> Option<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        (**self).timeout(limit, fut).await
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Clock that only moves when slept on or advanced.
pub struct ManualClock {
    wall_origin: DateTime<Utc>,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Clock starting at the given wall time.
    pub fn new(wall_origin: DateTime<Utc>) -> Self {
        Self {
            wall_origin,
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }

    /// Every sleep requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }

    fn now(&self) -> DateTime<Utc> {
        let offset = *self.offset.lock();
        self.wall_origin + chrono::Duration::milliseconds(offset.as_millis() as i64)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
    }

    /// Runs `fut` to completion, then reports expiry if the clock moved past
    /// `limit` meanwhile.
    async fn timeout<F>(&self, limit: Duration, fut: F) -> Option<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        let started = self.elapsed();
        let output = fut.await;
        if self.elapsed().saturating_sub(started) > limit {
            None
        } else {
            Some(output)
        }
    }
}

/// Transport replaying scripted responses and recording requests.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedTransport {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.script.lock().push_back(Ok(TransportResponse {
            status,
            body: body.into(),
        }));
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: TransportError) {
        self.script.lock().push_back(Err(error));
    }

    /// Requests sent so far as `(endpoint, body)`.
    pub fn requests(&self) -> Vec<(String, Vec<u8>)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push((endpoint.to_string(), body));
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("script exhausted".to_string())))
    }
}

/// Status source replaying scripted answers.
///
/// Once the script runs out the last successful answer repeats, which models a
/// transaction that stays in the same state.
#[derive(Default)]
pub struct ScriptedStatusSource {
    script: Mutex<VecDeque<Result<Vec<ProcessingResult>, ConnectorError>>>,
    last: Mutex<Option<Vec<ProcessingResult>>>,
    calls: Mutex<usize>,
}

impl ScriptedStatusSource {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer.
    pub fn push_results(&self, results: Vec<ProcessingResult>) {
        self.script.lock().push_back(Ok(results));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: ConnectorError) {
        self.script.lock().push_back(Err(error));
    }

    /// Queries received so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl StatusSource for ScriptedStatusSource {
    async fn query_status(
        &self,
        _handle: &TransactionHandle,
    ) -> Result<Vec<ProcessingResult>, ConnectorError> {
        *self.calls.lock() += 1;
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(results)) => {
                *self.last.lock() = Some(results.clone());
                Ok(results)
            }
            Some(Err(error)) => Err(error),
            None => self
                .last
                .lock()
                .clone()
                .ok_or_else(|| ConnectorError::malformed("status script is empty")),
        }
    }
}

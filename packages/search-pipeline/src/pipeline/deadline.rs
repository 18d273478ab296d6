//! Request deadline and cooperative cancellation.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One request's overall deadline plus an external cancellation signal.
///
/// Every external call in a run goes through [`Deadline::run`], so once the
/// deadline passes (or the token fires) each pending call resolves to `None`
/// and the stage keeps whatever it already had.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    cancel: CancellationToken,
}

impl Deadline {
    pub fn new(after: Duration, cancel: CancellationToken) -> Self {
        Self {
            at: Instant::now() + after,
            cancel,
        }
    }

    pub fn expired(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.at
    }

    /// Why work stopped, for error reporting.
    pub fn reason(&self) -> &'static str {
        if self.cancel.is_cancelled() {
            "request cancelled"
        } else {
            "request deadline exceeded"
        }
    }

    /// Drive `fut` until it completes, the deadline passes or the token fires.
    pub async fn run<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = tokio::time::timeout_at(self.at, fut) => result.ok(),
        }
    }
}

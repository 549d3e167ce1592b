use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cancellation and deadline shared by every step of one reconcile or
/// submission invocation.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    cancel: CancellationToken,
    deadline: Instant,
}

impl InvocationContext {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        InvocationContext { cancel, deadline: Instant::now() + timeout }
    }

    /// A context that is never cancelled and times out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), timeout)
    }

    /// Runs one fallible step, aborting it on cancellation or deadline expiry.
    pub async fn run<F, T>(&self, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout_at(self.deadline, step) => match outcome {
                Ok(result) => result,
                Err(_) => Err(Error::DeadlineExceeded),
            },
        }
    }
}

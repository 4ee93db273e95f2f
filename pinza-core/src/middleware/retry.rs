use super::{Middleware, Next, Response};
use crate::{client::RequestContext, error::CallError};
use futures_util::future::BoxFuture;
use std::time::Duration;
use tokio::time::Instant;

/// Re-forwards a call that failed with a retryable transport error.
///
/// Only [`CallError::Transport`] errors for which
/// [`TransportError::is_retryable`](crate::transport::TransportError::is_retryable) holds are
/// retried; every other outcome is returned as is. The call's deadline and cancellation
/// token cover all attempts together: no attempt is sent once the deadline has passed,
/// and a backoff that would end past it gives up with the last error.
#[derive(Debug, Clone)]
pub struct Retry {
    max_attempts: u32,
    backoff: Duration,
}

impl Retry {
    /// Allows up to `max_attempts` attempts in total (at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(100),
        }
    }

    /// Fixed pause between two attempts.
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether another attempt, backoff included, can start before `deadline`.
    fn fits_before(&self, deadline: Option<Instant>) -> bool {
        deadline.is_none_or(|deadline| Instant::now() + self.backoff < deadline)
    }
}

impl Middleware for Retry {
    fn handle<'a>(
        &'a self,
        context: RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, CallError>> {
        Box::pin(async move {
            let mut attempt = 1;

            loop {
                match next.run(context.clone()).await {
                    Err(CallError::Transport(err))
                        if err.is_retryable()
                            && attempt < self.max_attempts
                            && self.fits_before(context.deadline()) =>
                    {
                        tracing::warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            error = %err,
                            "retrying call"
                        );

                        tokio::select! {
                            _ = context.cancellation().cancelled() => {
                                return Err(CallError::Cancelled);
                            }
                            _ = tokio::time::sleep(self.backoff) => {}
                        }

                        attempt += 1;
                    }
                    outcome => return outcome,
                }
            }
        })
    }

    fn name(&self) -> &'static str {
        "retry"
    }
}

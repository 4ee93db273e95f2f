use super::{Middleware, Next, Response};
use crate::{client::RequestContext, error::CallError};
use futures_util::future::BoxFuture;
use std::time::Instant;
use tracing::Instrument;

/// Opens an `rpc` span around the rest of the stack and logs the outcome of each call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn handle<'a>(
        &'a self,
        context: RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, CallError>> {
        let span = tracing::info_span!(
            "rpc",
            service = context.target().service_name(),
            method = context.target().method_name(),
            verb = %context.verb(),
            path = context.path(),
        );

        Box::pin(
            async move {
                let started = Instant::now();
                let result = next.run(context).await;
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) => {
                        tracing::info!(status = %response.status, elapsed_ms, "call succeeded")
                    }
                    Err(err) => {
                        tracing::warn!(kind = ?err.kind(), error = %err, elapsed_ms, "call failed")
                    }
                }

                result
            }
            .instrument(span),
        )
    }

    fn name(&self) -> &'static str {
        "trace"
    }
}

//! # Middleware Stack
//!
//! A call travels through an ordered list of [`Middleware`] units before reaching the
//! terminal transport handler. Each unit receives the [`RequestContext`] and a [`Next`]
//! handle and either:
//!
//! * **forwards** the call with [`Next::run`], optionally mutating the context before and
//!   post-processing the response after, or
//! * **short-circuits** by resolving the call itself (a cache hit, a validation rejection).
//!
//! For a stack `[A, B, C]` over transport `T` the request visits `A → B → C → T` and the
//! response unwinds `T → C → B → A`.
//!
//! ## Example
//!
//! ```rust
//! use pinza_core::{
//!     client::RequestContext,
//!     error::CallError,
//!     middleware::{Middleware, Next, Response},
//! };
//! use futures_util::future::BoxFuture;
//!
//! struct UserAgent;
//!
//! impl Middleware for UserAgent {
//!     fn handle<'a>(
//!         &'a self,
//!         mut context: RequestContext,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Result<Response, CallError>> {
//!         context
//!             .headers_mut()
//!             .insert("user-agent", "pinza".parse().unwrap());
//!         next.run(context)
//!     }
//! }
//! ```
mod headers;
mod retry;
mod trace;

pub use headers::{BearerAuth, SetHeader};
pub use retry::Retry;
pub use trace::Trace;

use crate::{
    client::RequestContext,
    error::CallError,
    message::MessageEnvelope,
    transport::{Transport, TransportError},
};
use futures_util::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use std::{fmt, future::Future, sync::Arc};
use tokio::time::Instant;

/// A decoded response, as seen by middleware on the way out.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub message: MessageEnvelope,
}

/// A request/response handler wrapping the rest of the stack.
///
/// Units that do not touch the network should not suspend before forwarding, which keeps
/// the unwind order of a call deterministic.
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        context: RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, CallError>>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The remainder of the stack below the current unit.
///
/// `Next` is `Copy`: a unit may forward the same call more than once (e.g. to retry it).
#[derive(Clone, Copy)]
pub struct Next<'a> {
    layers: &'a [Arc<dyn Middleware>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    /// Forwards the call to the next unit, or to the transport when no unit is left.
    ///
    /// A cancelled context resolves with [`CallError::Cancelled`] without invoking anything
    /// further down.
    pub fn run(self, context: RequestContext) -> BoxFuture<'a, Result<Response, CallError>> {
        if context.is_cancelled() {
            return Box::pin(async { Err(CallError::Cancelled) });
        }

        match self.layers.split_first() {
            Some((layer, rest)) => {
                let next = Next {
                    layers: rest,
                    transport: self.transport,
                };
                layer.handle(context, next)
            }
            None => Box::pin(dispatch(self.transport, context)),
        }
    }

    /// Number of units left before the transport.
    pub fn remaining(&self) -> usize {
        self.layers.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.layers.len())
            .finish()
    }
}

/// The terminal handler: performs the transport call, then decodes the body with the
/// method's response type.
async fn dispatch(
    transport: &dyn Transport,
    context: RequestContext,
) -> Result<Response, CallError> {
    let target = context.target().clone();
    let cancellation = context.cancellation().clone();
    let deadline = context.deadline();

    tracing::debug!(
        service = target.service_name(),
        method = target.method_name(),
        verb = %context.verb(),
        path = context.path(),
        "dispatching call"
    );

    let exchange = with_deadline(deadline, transport.execute(context.into_transport_request()));

    let response = tokio::select! {
        biased;
        _ = cancellation.cancelled() => return Err(CallError::Cancelled),
        result = exchange => result?,
    };

    let message = MessageEnvelope::decode(
        target.response_type.clone(),
        &response.body,
        target.format,
        &target.registry,
    )?;

    Ok(Response {
        status: response.status,
        headers: response.headers,
        message,
    })
}

async fn with_deadline<T>(
    deadline: Option<Instant>,
    exchange: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, exchange)
            .await
            .unwrap_or(Err(TransportError::Timeout)),
        None => exchange.await,
    }
}

/// An immutable, shareable stack of middleware units over a terminal transport.
///
/// Built once with [`MiddlewareStack::builder`] and shared between clients behind an
/// [`Arc`]; it holds no per-call state.
#[derive(Clone)]
pub struct MiddlewareStack {
    layers: Vec<Arc<dyn Middleware>>,
    transport: Arc<dyn Transport>,
}

impl MiddlewareStack {
    /// The default stack: the terminal transport handler alone.
    pub fn new(transport: impl Transport) -> Self {
        Self {
            layers: Vec::new(),
            transport: Arc::new(transport),
        }
    }

    pub fn builder() -> StackBuilder {
        StackBuilder::default()
    }

    /// Number of middleware units, the transport excluded.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Submits a context to the outermost unit.
    pub fn dispatch(&self, context: RequestContext) -> BoxFuture<'_, Result<Response, CallError>> {
        let next = Next {
            layers: &self.layers,
            transport: self.transport.as_ref(),
        };
        next.run(context)
    }
}

impl fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field(
                "layers",
                &self.layers.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Collects middleware units in outer-to-inner order.
#[derive(Default)]
pub struct StackBuilder {
    layers: Vec<Arc<dyn Middleware>>,
}

impl StackBuilder {
    /// Appends a unit. The first unit added is the outermost one.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared unit.
    pub fn layer_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.layers.push(middleware);
        self
    }

    /// Closes the stack over its terminal transport.
    pub fn build(self, transport: impl Transport) -> MiddlewareStack {
        MiddlewareStack {
            layers: self.layers,
            transport: Arc::new(transport),
        }
    }
}

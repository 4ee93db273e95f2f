//! # Service Client
//!
//! A [`ServiceClient`] binds one [`ServiceDescriptor`] to a [`MiddlewareStack`] and a set of
//! default headers. On construction every method of the service is resolved into a
//! [`BoundMethod`], so a client exposes a table of method name → callable.
//!
//! Invoking a method:
//!
//! 1. validates the JSON arguments against the request type (before any network activity),
//! 2. builds a fresh [`RequestContext`]: path substitution, query or body, headers,
//! 3. submits it to the outermost unit of the stack,
//! 4. resolves once, with the decoded response or a [`CallError`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use pinza_core::{
//!     client::{ClientOptions, ServiceClient},
//!     registry::Registry,
//!     transport::http::HttpTransport,
//! };
//!
//! # async fn run(registry: Registry) -> Result<(), Box<dyn std::error::Error>> {
//! let service = registry.scope("dropbox.core.v1").lookup_service("services.FileDataService")?;
//! let options = ClientOptions::new(HttpTransport::new("https://api.example.com")?)
//!     .header("authorization".parse()?, "Bearer my-token".parse()?);
//!
//! let client = ServiceClient::new(&registry, service, options)?;
//! let metadata = client
//!     .method("Metadata")?
//!     .call(serde_json::json!({ "path": "/", "list": true }))
//!     .await?;
//!
//! println!("{}", metadata.as_structural_view());
//! # Ok(())
//! # }
//! ```
mod context;

pub use context::{CallTarget, RequestContext};

use crate::{
    error::CallError,
    message::{MessageEnvelope, Strictness, WireFormat},
    middleware::{MiddlewareStack, Response},
    registry::{NameNotFound, Registry},
    schema::ServiceDescriptor,
    transport::Transport,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Configuration shared by every call of a [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Default headers merged into every request. Per-call headers override them.
    pub headers: HeaderMap,
    /// The stack every call goes through.
    pub stack: Arc<MiddlewareStack>,
    /// Encoding of request and response bodies.
    pub format: WireFormat,
}

impl ClientOptions {
    /// Options using the default stack: the transport alone, no middleware.
    pub fn new(transport: impl Transport) -> Self {
        Self::with_stack(Arc::new(MiddlewareStack::new(transport)))
    }

    /// Options using a custom, possibly shared, stack.
    pub fn with_stack(stack: Arc<MiddlewareStack>) -> Self {
        Self {
            headers: HeaderMap::new(),
            stack,
            format: WireFormat::default(),
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn stack(mut self, stack: Arc<MiddlewareStack>) -> Self {
        self.stack = stack;
        self
    }

    pub fn format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Headers for this call only. They replace client defaults with the same name.
    pub headers: HeaderMap,
    /// Time budget of the call, transport included.
    pub timeout: Option<Duration>,
    /// Token aborting the call when cancelled.
    pub cancellation: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// One method of a service, resolved and ready to be called.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    target: Arc<CallTarget>,
    headers: Arc<HeaderMap>,
    stack: Arc<MiddlewareStack>,
}

impl BoundMethod {
    pub fn target(&self) -> &Arc<CallTarget> {
        &self.target
    }

    pub fn name(&self) -> &str {
        self.target.method_name()
    }

    /// Calls the method and returns the decoded response message.
    pub async fn call(&self, args: Value) -> Result<MessageEnvelope, CallError> {
        self.call_with(args, CallOptions::default()).await
    }

    /// Calls the method with per-call options and returns the decoded response message.
    pub async fn call_with(
        &self,
        args: Value,
        options: CallOptions,
    ) -> Result<MessageEnvelope, CallError> {
        self.invoke(args, options).await.map(|response| response.message)
    }

    /// Calls the method and returns the full response, status and headers included.
    pub async fn invoke(&self, args: Value, options: CallOptions) -> Result<Response, CallError> {
        let target = &self.target;

        if target.format == WireFormat::Protobuf {
            for message_type in [&target.request_type, &target.response_type] {
                if message_type.protobuf_descriptor().is_none() {
                    return Err(CallError::UnsupportedFormat(message_type.name().to_string()));
                }
            }
        }

        let request = MessageEnvelope::from_value(
            target.request_type.clone(),
            &args,
            &target.registry,
            Strictness::Strict,
        )
        .map_err(|e| CallError::InvalidRequest(e.to_string()))?;

        let context = RequestContext::build(
            target.clone(),
            &request,
            &self.headers,
            &options.headers,
            options.cancellation.unwrap_or_default(),
            options.timeout.map(|timeout| Instant::now() + timeout),
        )?;

        self.stack.dispatch(context).await
    }
}

/// A callable client bound to one service.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    service: Arc<ServiceDescriptor>,
    methods: BTreeMap<String, BoundMethod>,
}

impl ServiceClient {
    /// Binds every method of `service`, resolving its request and response types.
    ///
    /// # Returns
    ///
    /// * `Ok(ServiceClient)` - The bound client.
    /// * `Err(NameNotFound)` - If a request or response type is not registered.
    pub fn new(
        registry: &Registry,
        service: Arc<ServiceDescriptor>,
        options: ClientOptions,
    ) -> Result<Self, NameNotFound> {
        let headers = Arc::new(options.headers);
        let mut methods = BTreeMap::new();

        for method in service.methods() {
            let target = CallTarget {
                service: service.clone(),
                method: method.clone(),
                binding: method.binding_for(service.name()),
                request_type: registry.lookup_message(method.request_type())?,
                response_type: registry.lookup_message(method.response_type())?,
                format: options.format,
                registry: registry.clone(),
            };

            methods.insert(
                method.name().to_string(),
                BoundMethod {
                    target: Arc::new(target),
                    headers: headers.clone(),
                    stack: options.stack.clone(),
                },
            );
        }

        tracing::debug!(
            service = service.name(),
            methods = methods.len(),
            "bound service client"
        );

        Ok(Self { service, methods })
    }

    pub fn service(&self) -> &Arc<ServiceDescriptor> {
        &self.service
    }

    /// Returns the bound method called `name`.
    pub fn method(&self, name: &str) -> Result<&BoundMethod, NameNotFound> {
        self.methods
            .get(name)
            .ok_or_else(|| NameNotFound(format!("{}.{}", self.service.name(), name)))
    }

    /// Iterates over the method table, in name order.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &BoundMethod)> {
        self.methods
            .iter()
            .map(|(name, method)| (name.as_str(), method))
    }

    /// Shorthand for `self.method(name)?.call(args)`.
    pub async fn call(&self, name: &str, args: Value) -> Result<MessageEnvelope, CallError> {
        self.method(name)?.call(args).await
    }

    /// Shorthand for `self.method(name)?.call_with(args, options)`.
    pub async fn call_with(
        &self,
        name: &str,
        args: Value,
        options: CallOptions,
    ) -> Result<MessageEnvelope, CallError> {
        self.method(name)?.call_with(args, options).await
    }
}

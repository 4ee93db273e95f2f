//! # Core Orchestration Layer
//!
//! This module drives a single execution of the CLI on top of `pinza_core`:
//!
//! 1. **Schema Loading**: Every `--bundle` and `--descriptor-set` file is registered into one
//!    [`Registry`].
//! 2. **Resolution**: Names given on the command line are resolved inside the `--scope`.
//! 3. **Dispatch**: The service is bound to a middleware stack over an HTTP or gRPC transport
//!    and the requested method is invoked.
//!
//! Setup failures (unreadable files, unknown names, unreachable gRPC servers) are reported as
//! [`anyhow::Error`]; failures of the call itself are kept as [`CallError`].
use anyhow::Context;
use pinza_core::{
    client::{CallOptions, ClientOptions, ServiceClient},
    error::CallError,
    http::{HeaderMap, HeaderName, HeaderValue},
    message::WireFormat,
    middleware::{BearerAuth, MiddlewareStack, Retry, Trace},
    registry::{Descriptor, Registry},
    schema::{Bundle, MethodDescriptor, ServiceDescriptor},
    transport::{grpc::GrpcTransport, http::HttpTransport},
};
use std::{fs::File, io::BufReader, path::PathBuf, sync::Arc, time::Duration};

pub struct CallInput {
    pub url: String,
    pub service: String,
    pub method: String,
    pub body: serde_json::Value,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub token: Option<String>,
    pub grpc: bool,
    pub timeout: Option<Duration>,
    pub retries: u32,
}

/// What `describe` resolved a name to.
pub enum Definition {
    Descriptor(Descriptor),
    Method(Arc<ServiceDescriptor>, MethodDescriptor),
}

/// Builds a registry out of every bundle and descriptor set given on the command line.
pub fn load_registry(
    bundles: &[PathBuf],
    descriptor_sets: &[PathBuf],
) -> anyhow::Result<Registry> {
    let registry = Registry::new();

    for path in bundles {
        let file = File::open(path)
            .with_context(|| format!("Failed to open bundle {}", path.display()))?;
        let bundle = Bundle::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to load bundle {}", path.display()))?;
        registry
            .register(&bundle)
            .with_context(|| format!("Failed to register bundle {}", path.display()))?;
    }

    for path in descriptor_sets {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read descriptor set {}", path.display()))?;
        let bundle = Bundle::from_file_descriptor_set(&bytes)
            .with_context(|| format!("Failed to load descriptor set {}", path.display()))?;
        registry
            .register(&bundle)
            .with_context(|| format!("Failed to register descriptor set {}", path.display()))?;
    }

    tracing::debug!(definitions = registry.len(), "schema loaded");

    Ok(registry)
}

/// Names of every service visible in `scope`.
pub fn list_services(registry: &Registry, scope: &str) -> Vec<String> {
    registry
        .scope(scope)
        .services()
        .iter()
        .map(|service| service.name().to_string())
        .collect()
}

/// Resolves a message or service name, or a `Service/Method` pair.
pub fn describe(registry: &Registry, scope: &str, name: &str) -> anyhow::Result<Definition> {
    let scope = registry.scope(scope);

    match name.split_once('/') {
        Some((service, method)) => {
            let service = scope.lookup_service(service)?;
            let method = service
                .method(method)
                .cloned()
                .with_context(|| format!("Service '{}' has no method '{method}'", service.name()))?;
            Ok(Definition::Method(service, method))
        }
        None => Ok(Definition::Descriptor(scope.lookup(name)?)),
    }
}

/// Binds the requested service and performs one call.
///
/// The outer result reports setup failures; the inner one is the outcome of the call.
pub async fn call(
    registry: &Registry,
    scope: &str,
    input: CallInput,
) -> anyhow::Result<Result<serde_json::Value, CallError>> {
    let service = registry.scope(scope).lookup_service(&input.service)?;

    let mut builder = MiddlewareStack::builder().layer(Trace);
    if input.retries > 0 {
        builder = builder.layer(Retry::new(input.retries.saturating_add(1)));
    }
    if let Some(token) = &input.token {
        builder = builder.layer(BearerAuth::new(token).context("Invalid bearer token")?);
    }

    let (stack, format) = if input.grpc {
        let transport = GrpcTransport::connect(&input.url).await?;
        (builder.build(transport), WireFormat::Protobuf)
    } else {
        let transport = HttpTransport::new(&input.url)?;
        (builder.build(transport), WireFormat::Json)
    };

    let mut headers = HeaderMap::new();
    for (name, value) in input.headers {
        headers.append(name, value);
    }

    let options = ClientOptions::with_stack(Arc::new(stack))
        .headers(headers)
        .format(format);
    let client = ServiceClient::new(registry, service, options)?;

    let mut call_options = CallOptions::new();
    if let Some(timeout) = input.timeout {
        call_options = call_options.timeout(timeout);
    }

    let result = client
        .call_with(&input.method, input.body, call_options)
        .await
        .map(|message| message.as_structural_view());

    Ok(result)
}

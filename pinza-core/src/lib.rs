//! # Pinza Core
//!
//! `pinza-core` is the runtime powering the Pinza CLI. It provides a schema-driven RPC client:
//! message and service definitions are loaded at runtime from a schema bundle, and every call
//! travels through an ordered, user-extensible middleware stack before reaching the transport.
//!
//! ## Key Components
//!
//! * **[`Registry`](registry::Registry) & [`Scope`](registry::Scope):** The index of every
//!   registered message type and service descriptor, and namespaced views over it.
//! * **[`MessageEnvelope`](message::MessageEnvelope):** A decoded instance of a message type,
//!   with a plain JSON structural view.
//! * **[`MiddlewareStack`](middleware::MiddlewareStack):** Request/response handlers nested
//!   around a terminal [`Transport`](transport::Transport).
//! * **[`ServiceClient`](client::ServiceClient):** A service bound to a stack and a set of
//!   default headers. Each of its methods issues one RPC.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pinza_core::{
//!     client::{ClientOptions, ServiceClient},
//!     middleware::{BearerAuth, MiddlewareStack},
//!     registry::Registry,
//!     schema::Bundle,
//!     transport::http::HttpTransport,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new();
//! registry.register(&Bundle::from_json(&std::fs::read_to_string("bundle.json")?)?)?;
//!
//! let scope = registry.scope("dropbox.core.v1");
//! let service = scope.lookup_service("services.AccountService")?;
//!
//! let stack = MiddlewareStack::builder()
//!     .layer(BearerAuth::new("my-token")?)
//!     .build(HttpTransport::new("https://api.example.com")?);
//!
//! let options = ClientOptions::with_stack(Arc::new(stack));
//! let client = ServiceClient::new(&registry, service, options)?;
//! let account = client.call("Info", serde_json::json!({})).await?;
//! println!("{}", account.as_structural_view());
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports `http`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod error;
pub mod message;
pub mod middleware;
pub mod registry;
pub mod schema;
pub mod transport;

// Re-exports
pub use http;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

//! # Transport Boundary
//!
//! The [`Transport`] trait is the only place where a call performs network I/O. It receives a
//! fully formed [`TransportRequest`] (verb, resolved path, query, headers, body) and returns
//! the raw response or a [`TransportError`].
//!
//! Which response statuses count as failures is a transport concern:
//!
//! * [`http::HttpTransport`]: any non-2xx status becomes [`TransportError::Status`].
//! * [`grpc::GrpcTransport`]: any non-OK gRPC status becomes [`TransportError::Grpc`].
pub mod grpc;
pub mod http;

use crate::BoxError;
use ::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Everything a transport needs to perform one call.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// The resolved path, placeholders already substituted (e.g. `/files/auto/metadata`).
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Raw response bytes plus status metadata.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect: '{0}'")]
    Connect(#[source] BoxError),
    #[error("Request timed out")]
    Timeout,
    #[error("Server answered with status {status}")]
    Status { status: StatusCode, body: Bytes },
    #[error("gRPC call failed: code={code:?} message={message:?}")]
    Grpc { code: tonic::Code, message: String },
    #[error("Invalid transport request: '{0}'")]
    InvalidRequest(String),
    #[error("Transport failure: '{0}'")]
    Other(#[source] BoxError),
}

impl TransportError {
    /// Whether repeating the same request may succeed: connection failures, timeouts,
    /// 5xx statuses, `429 Too Many Requests` and gRPC `Unavailable`.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connect(_) | TransportError::Timeout => true,
            TransportError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            TransportError::Grpc { code, .. } => *code == tonic::Code::Unavailable,
            TransportError::InvalidRequest(_) | TransportError::Other(_) => false,
        }
    }
}

/// The terminal collaborator performing the network call.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>>;
}

impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        (**self).execute(request)
    }
}

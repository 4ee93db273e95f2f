//! # gRPC Transport
//!
//! A [`Transport`] that performs unary gRPC calls with `tonic`.
//!
//! Bodies are already protobuf-encoded by the call pipeline, so the transport uses a
//! pass-through [`codec::RawCodec`] and only handles framing, metadata and status mapping.
//! It requires clients using [`WireFormat::Protobuf`](crate::message::WireFormat::Protobuf)
//! and methods bound to `POST /{package.Service}/{Method}`, which is what
//! [`Bundle::from_file_descriptor_set`](crate::schema::Bundle::from_file_descriptor_set)
//! produces.
pub mod codec;

use super::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::BoxError;
use codec::RawCodec;
use futures_util::future::BoxFuture;
use http::{StatusCode, header::CONTENT_TYPE, uri::PathAndQuery};
use http_body::Body as HttpBody;
use std::str::FromStr;
use tonic::{
    Code,
    client::GrpcService,
    metadata::MetadataMap,
    transport::{Channel, Endpoint},
};

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// Unary gRPC transport over any Tonic service (a [`Channel`] by default).
#[derive(Debug, Clone)]
pub struct GrpcTransport<S = Channel> {
    client: tonic::client::Grpc<S>,
}

impl GrpcTransport<Channel> {
    /// Connects to a gRPC server.
    ///
    /// # Arguments
    ///
    /// * `addr` - The server URI (e.g., `http://localhost:50051`).
    pub async fn connect(addr: &str) -> Result<Self, ConnectError> {
        let endpoint = Endpoint::new(addr.to_string())
            .map_err(|e| ConnectError::InvalidUrl(addr.to_string(), e))?;

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ConnectError::ConnectionFailed(addr.to_string(), e))?;

        Ok(Self::from_service(channel))
    }

    /// Creates a transport whose channel connects on first use.
    pub fn connect_lazy(addr: &str) -> Result<Self, ConnectError> {
        let endpoint = Endpoint::new(addr.to_string())
            .map_err(|e| ConnectError::InvalidUrl(addr.to_string(), e))?;

        Ok(Self::from_service(endpoint.connect_lazy()))
    }
}

impl<S> GrpcTransport<S> {
    /// Creates a transport from an existing Tonic service/channel.
    pub fn from_service(service: S) -> Self {
        Self {
            client: tonic::client::Grpc::new(service),
        }
    }
}

impl<S> Transport for GrpcTransport<S>
where
    S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError> + Send,
    S::Future: Send,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        let mut client = self.client.clone();

        Box::pin(async move {
            if request.method != http::Method::POST {
                return Err(TransportError::InvalidRequest(format!(
                    "gRPC calls must be bound to POST, got {}",
                    request.method
                )));
            }

            let path = PathAndQuery::from_str(&request.path).map_err(|e| {
                TransportError::InvalidRequest(format!("invalid gRPC path '{}': {e}", request.path))
            })?;

            let mut headers = request.headers;
            headers.remove(CONTENT_TYPE);

            let mut grpc_request = tonic::Request::new(request.body);
            *grpc_request.metadata_mut() = MetadataMap::from_headers(headers);

            client
                .ready()
                .await
                .map_err(|e| TransportError::Connect(e.into()))?;

            tracing::debug!(path = %path, "sending unary gRPC request");

            match client.unary(grpc_request, path, RawCodec).await {
                Ok(response) => {
                    let (metadata, body, _) = response.into_parts();
                    Ok(TransportResponse {
                        status: StatusCode::OK,
                        headers: metadata.into_headers(),
                        body,
                    })
                }
                Err(status) if status.code() == Code::DeadlineExceeded => {
                    Err(TransportError::Timeout)
                }
                Err(status) => Err(TransportError::Grpc {
                    code: status.code(),
                    message: status.message().to_string(),
                }),
            }
        })
    }
}

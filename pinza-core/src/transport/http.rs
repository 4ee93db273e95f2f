//! # HTTP Transport
//!
//! A [`Transport`] issuing plain HTTP requests with `reqwest`: the binding's verb, the
//! resolved path appended to a base URL, query parameters, headers and the encoded body.
use super::{Transport, TransportError, TransportRequest, TransportResponse};
use futures_util::future::BoxFuture;
use reqwest::{Client, Url};
use std::time::Duration;

/// HTTP transport rooted at a base URL (e.g. `https://api.example.com/2`).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport with a default `reqwest` client.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a transport whose connections give up after `timeout`.
    pub fn with_connect_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.into()))?;
        Self::with_client(client, base_url)
    }

    /// Creates a transport reusing an existing `reqwest` client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid base URL '{base_url}': {e}"))
        })?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &TransportRequest) -> Result<Url, TransportError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = request.path.trim_start_matches('/');

        let mut url = Url::parse(&format!("{base}/{path}")).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid path '{}': {e}", request.path))
        })?;

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        Box::pin(async move {
            let url = self.url_for(&request)?;

            tracing::debug!(method = %request.method, %url, "sending HTTP request");

            let response = self
                .client
                .request(request.method, url)
                .headers(request.headers)
                .body(request.body)
                .send()
                .await
                .map_err(map_error)?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(map_error)?;

            if !status.is_success() {
                return Err(TransportError::Status { status, body });
            }

            Ok(TransportResponse {
                status,
                headers,
                body,
            })
        })
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.into())
    } else {
        TransportError::Other(err.into())
    }
}

// Shared by several test binaries; each one uses a different subset.
#![allow(dead_code)]

pub mod echo;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use pinza_core::{
    registry::Registry,
    schema::Bundle,
    transport::{Transport, TransportError, TransportRequest, TransportResponse},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

pub const BUNDLE: &str = r#"{
    "messages": [
        { "name": "dropbox.core.v1.Empty" },
        { "name": "dropbox.core.v1.Account",
          "fields": [
            { "name": "name", "number": 1, "type": "string" },
            { "name": "email", "number": 2, "type": "string" },
            { "name": "quota", "number": 3, "type": { "message": "dropbox.core.v1.Quota" } }
          ] },
        { "name": "dropbox.core.v1.Quota",
          "fields": [
            { "name": "used", "number": 1, "type": "uint64" },
            { "name": "total", "number": 2, "type": "uint64" }
          ] },
        { "name": "dropbox.core.v1.MetadataRequest",
          "fields": [
            { "name": "root", "number": 1, "type": "string" },
            { "name": "path", "number": 2, "type": "string", "label": "required" },
            { "name": "list", "number": 3, "type": "bool" },
            { "name": "fields", "number": 4, "type": "string", "label": "repeated" }
          ] },
        { "name": "dropbox.core.v1.Metadata",
          "fields": [
            { "name": "path", "number": 1, "type": "string", "label": "required" },
            { "name": "is_dir", "number": 2, "type": "bool" },
            { "name": "contents", "number": 3, "type": { "message": "dropbox.core.v1.Metadata" }, "label": "repeated" }
          ] },
        { "name": "dropbox.core.v1.UploadRequest",
          "fields": [
            { "name": "path", "number": 1, "type": "string", "label": "required" },
            { "name": "data", "number": 2, "type": "bytes" }
          ] },
        { "name": "shared.Status",
          "fields": [ { "name": "code", "number": 1, "type": "int32" } ] }
    ],
    "services": [
        { "name": "dropbox.core.v1.services.AccountService",
          "methods": [
            { "name": "Info", "request": "dropbox.core.v1.Empty", "response": "dropbox.core.v1.Account",
              "http": { "verb": "GET", "path": "/account/info" } }
          ] },
        { "name": "dropbox.core.v1.services.FileDataService",
          "methods": [
            { "name": "Metadata", "request": "dropbox.core.v1.MetadataRequest", "response": "dropbox.core.v1.Metadata",
              "http": { "verb": "GET", "path": "/metadata/{root}{path}" } },
            { "name": "Upload", "request": "dropbox.core.v1.UploadRequest", "response": "dropbox.core.v1.Metadata",
              "http": { "verb": "PUT", "path": "/files_put/auto{path}" } }
          ] },
        { "name": "shared.HealthService",
          "methods": [
            { "name": "Check", "request": "dropbox.core.v1.Empty", "response": "shared.Status" }
          ] }
    ]
}"#;

pub fn bundle() -> Bundle {
    Bundle::from_json(BUNDLE).unwrap()
}

pub fn registry() -> Registry {
    let registry = Registry::new();
    registry.register(&bundle()).unwrap();
    registry
}

pub fn json_response(body: serde_json::Value) -> TransportResponse {
    TransportResponse {
        status: StatusCode::OK,
        headers: HeaderMap::new(),
        body: Bytes::from(serde_json::to_vec(&body).unwrap()),
    }
}

type Responder =
    Box<dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// A transport answering from a closure and recording every request it receives.
pub struct StubTransport {
    calls: AtomicUsize,
    requests: Mutex<Vec<TransportRequest>>,
    respond: Responder,
}

impl StubTransport {
    pub fn new(
        respond: impl Fn(&TransportRequest) -> Result<TransportResponse, TransportError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    /// Always answers `200` with the given JSON body.
    pub fn json(body: serde_json::Value) -> Arc<Self> {
        Self::new(move |_| Ok(json_response(body.clone())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> TransportRequest {
        self.requests().pop().expect("no request was sent")
    }
}

impl Transport for StubTransport {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.respond)(&request);
        self.requests.lock().unwrap().push(request);
        Box::pin(async move { result })
    }
}

/// A transport that never answers.
pub struct HangingTransport {
    calls: AtomicUsize,
}

impl HangingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for HangingTransport {
    fn execute(
        &self,
        _request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(std::future::pending())
    }
}

use futures_util::future::{BoxFuture, join_all};
use http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION};
use pinza_core::{
    client::{CallOptions, ClientOptions, RequestContext, ServiceClient},
    error::{CallError, ErrorKind},
    message::MessageEnvelope,
    middleware::{BearerAuth, Middleware, MiddlewareStack, Next, Response, Retry, SetHeader, Trace},
    transport::{Transport, TransportError},
};
use serde_json::json;
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;

mod common;

use common::{HangingTransport, StubTransport};

type Log = Arc<Mutex<Vec<String>>>;

fn account_client(stack: MiddlewareStack) -> ServiceClient {
    let registry = common::registry();
    let service = registry
        .lookup_service("dropbox.core.v1.services.AccountService")
        .unwrap();

    ServiceClient::new(&registry, service, ClientOptions::with_stack(Arc::new(stack))).unwrap()
}

fn call_id(context: &RequestContext) -> String {
    context
        .headers()
        .get("x-call-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

/// Logs `<id> <name>-in` before forwarding and `<id> <name>-out` after.
struct Recorder {
    name: &'static str,
    log: Log,
}

impl Middleware for Recorder {
    fn handle<'a>(
        &'a self,
        context: RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, CallError>> {
        Box::pin(async move {
            let id = call_id(&context);
            self.log.lock().unwrap().push(format!("{id} {}-in", self.name));
            let result = next.run(context).await;
            self.log.lock().unwrap().push(format!("{id} {}-out", self.name));
            result
        })
    }
}

/// Answers every call with an empty response message, without forwarding.
struct ShortCircuit;

impl Middleware for ShortCircuit {
    fn handle<'a>(
        &'a self,
        context: RequestContext,
        _next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, CallError>> {
        let message = MessageEnvelope::empty(context.target().response_type().clone());
        Box::pin(async move {
            Ok(Response {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                message,
            })
        })
    }
}

/// Rejects every call without forwarding.
struct Reject;

impl Middleware for Reject {
    fn handle<'a>(
        &'a self,
        _context: RequestContext,
        _next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, CallError>> {
        Box::pin(async { Err(CallError::InvalidRequest("rejected by policy".to_string())) })
    }
}

/// Moves every call under `/v2`.
struct Versioned;

impl Middleware for Versioned {
    fn handle<'a>(
        &'a self,
        mut context: RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, CallError>> {
        let path = format!("/v2{}", context.path());
        context.set_path(path);
        next.run(context)
    }
}

fn logging_transport(log: Log) -> Arc<StubTransport> {
    StubTransport::new(move |request| {
        let id = request
            .headers
            .get("x-call-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        log.lock().unwrap().push(format!("{id} T"));
        Ok(common::json_response(json!({ "name": "Ada" })))
    })
}

#[tokio::test]
async fn test_onion_order() {
    let log: Log = Arc::default();

    let stack = MiddlewareStack::builder()
        .layer(Recorder { name: "A", log: log.clone() })
        .layer(Recorder { name: "B", log: log.clone() })
        .build(logging_transport(log.clone()));

    let client = account_client(stack);
    let account = client.call("Info", json!({})).await.unwrap();

    assert_eq!(account.as_structural_view(), json!({ "name": "Ada" }));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["- A-in", "- B-in", "- T", "- B-out", "- A-out"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_onion_order_holds_per_call_under_concurrency() {
    let log: Log = Arc::default();

    let stack = MiddlewareStack::builder()
        .layer(Recorder { name: "A", log: log.clone() })
        .layer(Recorder { name: "B", log: log.clone() })
        .build(logging_transport(log.clone()));

    let client = account_client(stack);

    let calls = (0..16).map(|i| {
        let options = CallOptions::new().header(
            "x-call-id".parse().unwrap(),
            HeaderValue::from_str(&i.to_string()).unwrap(),
        );
        client.call_with("Info", json!({}), options)
    });

    for result in join_all(calls).await {
        assert!(result.is_ok());
    }

    let log = log.lock().unwrap();
    for i in 0..16 {
        let prefix = format!("{i} ");
        let events: Vec<_> = log
            .iter()
            .filter_map(|e| e.strip_prefix(&prefix))
            .collect();
        assert_eq!(events, vec!["A-in", "B-in", "T", "B-out", "A-out"]);
    }
}

#[tokio::test]
async fn test_short_circuit_skips_inner_units_and_transport() {
    let log: Log = Arc::default();
    let transport = logging_transport(log.clone());

    let stack = MiddlewareStack::builder()
        .layer(Recorder { name: "A", log: log.clone() })
        .layer(ShortCircuit)
        .layer(Recorder { name: "C", log: log.clone() })
        .build(transport.clone());

    let client = account_client(stack);
    let account = client.call("Info", json!({})).await.unwrap();

    assert!(account.is_empty());
    assert_eq!(transport.calls(), 0);
    assert_eq!(*log.lock().unwrap(), vec!["- A-in", "- A-out"]);
}

#[tokio::test]
async fn test_middleware_can_fail_the_call() {
    let transport = StubTransport::json(json!({}));

    let stack = MiddlewareStack::builder()
        .layer(Trace)
        .layer(Reject)
        .build(transport.clone());

    let err = account_client(stack)
        .call("Info", json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_middleware_can_rewrite_the_request() {
    let transport = StubTransport::json(json!({ "name": "Ada" }));

    let stack = MiddlewareStack::builder()
        .layer(Versioned)
        .layer(BearerAuth::new("secret").unwrap())
        .build(transport.clone());

    account_client(stack).call("Info", json!({})).await.unwrap();

    let request = transport.last_request();
    assert_eq!(request.path, "/v2/account/info");
    assert_eq!(request.headers[AUTHORIZATION], "Bearer secret");
}

#[tokio::test]
async fn test_set_header_modes() {
    let transport = StubTransport::json(json!({}));

    let stack = MiddlewareStack::builder()
        .layer(SetHeader::if_missing(
            "x-tenant".parse().unwrap(),
            HeaderValue::from_static("default"),
        ))
        .layer(SetHeader::overriding(
            "x-client".parse().unwrap(),
            HeaderValue::from_static("pinza"),
        ))
        .build(transport.clone());

    let client = account_client(stack);
    let options = CallOptions::new()
        .header("x-tenant".parse().unwrap(), HeaderValue::from_static("acme"))
        .header("x-client".parse().unwrap(), HeaderValue::from_static("other"));

    client.call_with("Info", json!({}), options).await.unwrap();

    let request = transport.last_request();
    assert_eq!(request.headers["x-tenant"], "acme");
    assert_eq!(request.headers["x-client"], "pinza");
}

#[tokio::test]
async fn test_cancelled_before_dispatch() {
    let transport = StubTransport::json(json!({}));
    let client = account_client(MiddlewareStack::new(transport.clone()));

    let token = CancellationToken::new();
    token.cancel();

    let err = client
        .call_with("Info", json!({}), CallOptions::new().cancellation(token))
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Cancelled));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_while_in_flight() {
    let transport = HangingTransport::new();
    let client = account_client(MiddlewareStack::new(transport.clone()));

    let token = CancellationToken::new();
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    };

    let (result, ()) = tokio::join!(
        client.call_with("Info", json!({}), CallOptions::new().cancellation(token.clone())),
        canceller,
    );

    assert!(matches!(result, Err(CallError::Cancelled)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expires_as_timeout() {
    let transport = HangingTransport::new();
    let client = account_client(MiddlewareStack::new(transport));

    let err = client
        .call_with(
            "Info",
            json!({}),
            CallOptions::new().timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Transport(TransportError::Timeout)));
}

fn flaky_transport(failures: usize, status: StatusCode) -> Arc<StubTransport> {
    let seen = AtomicUsize::new(0);
    StubTransport::new(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) < failures {
            Err(TransportError::Status {
                status,
                body: Default::default(),
            })
        } else {
            Ok(common::json_response(json!({ "name": "Ada" })))
        }
    })
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failures() {
    let transport = flaky_transport(2, StatusCode::SERVICE_UNAVAILABLE);

    let stack = MiddlewareStack::builder()
        .layer(Retry::new(3).backoff(Duration::ZERO))
        .build(transport.clone());

    let account = account_client(stack).call("Info", json!({})).await.unwrap();

    assert_eq!(account.as_structural_view()["name"], "Ada");
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_retry_gives_up_after_max_attempts() {
    let transport = flaky_transport(usize::MAX, StatusCode::BAD_GATEWAY);

    let stack = MiddlewareStack::builder()
        .layer(Retry::new(2).backoff(Duration::ZERO))
        .build(transport.clone());

    let err = account_client(stack)
        .call("Info", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CallError::Transport(TransportError::Status { status, .. })
            if status == StatusCode::BAD_GATEWAY
    ));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_retry_ignores_client_errors() {
    let transport = flaky_transport(1, StatusCode::NOT_FOUND);

    let stack = MiddlewareStack::builder()
        .layer(Retry::new(5).backoff(Duration::ZERO))
        .build(transport.clone());

    let err = account_client(stack)
        .call("Info", json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_stops_at_the_deadline() {
    let transport = HangingTransport::new();

    let stack = MiddlewareStack::builder()
        .layer(Retry::new(3).backoff(Duration::ZERO))
        .build(transport.clone());

    let err = account_client(stack)
        .call_with(
            "Info",
            json!({}),
            CallOptions::new().timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Transport(TransportError::Timeout)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_skips_backoff_past_the_deadline() {
    let transport = flaky_transport(usize::MAX, StatusCode::SERVICE_UNAVAILABLE);

    let stack = MiddlewareStack::builder()
        .layer(Retry::new(3).backoff(Duration::from_secs(10)))
        .build(transport.clone());

    let err = account_client(stack)
        .call_with(
            "Info",
            json!({}),
            CallOptions::new().timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CallError::Transport(TransportError::Status { status, .. })
            if status == StatusCode::SERVICE_UNAVAILABLE
    ));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_each_call_reaches_the_transport_once() {
    let transport = StubTransport::json(json!({ "name": "Ada" }));
    let client = account_client(MiddlewareStack::new(transport.clone()));

    for _ in 0..3 {
        client.call("Info", json!({})).await.unwrap();
    }

    assert_eq!(transport.calls(), 3);
}

#[test]
fn test_stack_debug_lists_layer_names() {
    let stack = MiddlewareStack::builder()
        .layer(Trace)
        .layer(Retry::new(2))
        .build(StubTransport::json(json!({})));

    assert_eq!(stack.len(), 2);
    let debug = format!("{stack:?}");
    assert!(debug.contains("trace"));
    assert!(debug.contains("retry"));
}

#[test]
fn test_stack_is_shareable() {
    fn assert_shareable<T: Send + Sync + 'static>() {}
    assert_shareable::<MiddlewareStack>();
    assert_shareable::<ServiceClient>();
    assert_shareable::<Arc<dyn Transport>>();
}

//! Request lifecycle tests: argument binding, body policies, failures, CORS.

use std::future::{ready, Ready};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures_util::stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use switchyard::config::{BodyPolicy, ServerConfig};
use switchyard::{BoxError, CorsPolicy, Handler, HandlerTree, HttpServer, Outcome};

mod common;

fn json_request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn counting_server(config: ServerConfig, calls: &Arc<AtomicUsize>) -> HttpServer {
    let tree = HandlerTree::builder()
        .route(common::counting("postSum", &["a", "b"], calls.clone()))
        .build()
        .unwrap();
    HttpServer::new(tree, config)
}

fn eager() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.body.policy = BodyPolicy::Eager;
    config
}

#[tokio::test]
async fn test_arguments_from_query_and_body() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = counting_server(ServerConfig::default(), &calls);

    let response = server
        .handle(json_request("POST", "/sum?a=1", r#"{"b":2}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    assert_eq!(read_json(response).await, json!({ "args": ["1", 2] }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_body_wins_over_query() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = counting_server(ServerConfig::default(), &calls);

    let response = server
        .handle(json_request("POST", "/sum?a=query&a=second", r#"{"a":"body"}"#))
        .await
        .unwrap();

    assert_eq!(read_json(response).await, json!({ "args": ["body", null] }));
}

#[tokio::test]
async fn test_miss_is_404_without_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = counting_server(ServerConfig::default(), &calls);

    let response = server
        .handle(json_request("POST", "/nothing/here", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_json_is_400_without_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = counting_server(ServerConfig::default(), &calls);

    let response = server
        .handle(json_request("POST", "/sum", r#"{"a":"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server.handle(json_request("POST", "/sum", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_json_body_is_passed_raw() {
    let tree = HandlerTree::builder()
        .route(Handler::http("postNote", &["tag"], |ctx, args| async move {
            Outcome::json(json!({
                "raw": ctx.request.raw_body,
                "tag": args.str(0),
                "json": ctx.request.json,
            }))
        }))
        .build()
        .unwrap();
    let server = HttpServer::new(tree, ServerConfig::default());

    let request = Request::builder()
        .method("POST")
        .uri("/note?tag=x")
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from("{not json"))
        .unwrap();
    let response = server.handle(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({ "raw": "{not json", "tag": "x", "json": null })
    );
}

#[tokio::test]
async fn test_body_over_limit_is_413() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = ServerConfig::default();
    config.body.max_bytes = 8;
    let server = counting_server(config, &calls);

    let response = server
        .handle(json_request("POST", "/sum", r#"{"a":1,"b":2,"c":3}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_eager_single_invocation_across_chunks() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = counting_server(eager(), &calls);

    let chunks = stream::iter(vec![
        Ok::<_, io::Error>(r#"{"a":1"#),
        Ok(r#","b":2}"#),
        Ok("  \n"),
    ]);
    let response = server
        .handle(json_request("POST", "/sum", Body::from_stream(chunks)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "args": [1, 2] }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_eager_falls_back_at_stream_end() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = counting_server(eager(), &calls);

    // The probe after the second chunk fails; the stream-end parse rejects.
    let chunks = stream::iter(vec![Ok::<_, io::Error>(r#"{"a":"#), Ok(r#"true, "b": {}"#)]);
    let response = server
        .handle(json_request("POST", "/sum", Body::from_stream(chunks)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Body stream fed by the test: the first chunk is sent, the stream stays open.
fn open_body() -> (mpsc::UnboundedSender<&'static str>, Body) {
    let (tx, rx) = mpsc::unbounded_channel::<&'static str>();
    let chunks = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, io::Error>(chunk), rx))
    });
    (tx, Body::from_stream(chunks))
}

fn signalling_server(config: ServerConfig, called: mpsc::UnboundedSender<()>) -> Arc<HttpServer> {
    let tree = HandlerTree::builder()
        .route(Handler::http("postPing", &["n"], move |_ctx, args| {
            let called = called.clone();
            async move {
                let _ = called.send(());
                Outcome::json(json!({ "n": args.get(0) }))
            }
        }))
        .build()
        .unwrap();
    Arc::new(HttpServer::new(tree, config))
}

#[tokio::test]
async fn test_eager_dispatches_before_body_ends() {
    let (called_tx, mut called_rx) = mpsc::unbounded_channel();
    let server = signalling_server(eager(), called_tx);
    let (body_tx, body) = open_body();

    let in_flight = server.clone();
    let task = tokio::spawn(async move {
        in_flight
            .handle(json_request("POST", "/ping", body))
            .await
            .unwrap()
    });

    body_tx.send(r#"{"n":5}"#).unwrap();
    tokio::time::timeout(Duration::from_secs(2), called_rx.recv())
        .await
        .expect("handler should run while the body is still open");

    body_tx.send(" ").unwrap();
    drop(body_tx);

    let response = task.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "n": 5 }));
    assert!(called_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_deferred_waits_for_body_end() {
    let (called_tx, mut called_rx) = mpsc::unbounded_channel();
    let server = signalling_server(ServerConfig::default(), called_tx);
    let (body_tx, body) = open_body();

    let in_flight = server.clone();
    let task = tokio::spawn(async move {
        in_flight
            .handle(json_request("POST", "/ping", body))
            .await
            .unwrap()
    });

    body_tx.send(r#"{"n":5}"#).unwrap();
    let early = tokio::time::timeout(Duration::from_millis(100), called_rx.recv()).await;
    assert!(early.is_err(), "deferred policy must not dispatch before the body ends");

    drop(body_tx);
    let response = task.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(called_rx.recv().await.is_some());
}

fn failing_tree() -> HandlerTree {
    HandlerTree::builder()
        .route(Handler::http("getBroken", &[], |_ctx, _args| async {
            Err::<Outcome, BoxError>("database unavailable".into())
        }))
        .route(Handler::http("getPanics", &[], |_ctx, _args| async {
            if true {
                panic!("boom");
            }
            Outcome::empty()
        }))
        .route(Handler::http(
            "getEarly",
            &[],
            |_ctx, _args| -> Ready<Result<Outcome, BoxError>> { panic!("before the future") },
        ))
        .route(Handler::http("getPinned", &[], |ctx, _args| {
            ctx.response.set_header(
                "access-control-allow-origin",
                "https://app.example".parse().unwrap(),
            );
            ready(Outcome::empty())
        }))
        .route(Handler::http("getInvalid", &[], |_ctx, _args| async {
            Outcome::failure(json!({ "reason": "invalid" }))
        }))
        .route(Handler::http("getGone", &[], |ctx, _args| async move {
            ctx.response.set_status(StatusCode::GONE);
            Outcome::failure(json!({ "reason": "gone" }))
        }))
        .route(Handler::http("postCreate", &[], |ctx, _args| async move {
            ctx.response.set_status(StatusCode::CREATED);
            Outcome::json(json!({ "id": 1 }))
        }))
        .build()
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_handler_error_without_hook() {
    let server = HttpServer::new(failing_tree(), ServerConfig::default());

    let response = server.handle(get("/broken")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());

    let response = server.handle(get("/panics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_handler_error_hook_writes_body() {
    let server = HttpServer::builder(failing_tree())
        .on_handler_error(|_ctx, err| async move {
            Outcome::json(json!({ "error": err.to_string() }))
        })
        .build();

    let response = server.handle(get("/broken")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await, json!({ "error": "database unavailable" }));

    let response = server.handle(get("/panics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await, json!({ "error": "handler panicked: boom" }));
}

#[tokio::test]
async fn test_panic_before_future_is_500() {
    let server = HttpServer::new(failing_tree(), ServerConfig::default());
    let response = server.handle(get("/early")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let server = HttpServer::builder(failing_tree())
        .on_handler_error(|_ctx, err| async move {
            Outcome::json(json!({ "error": err.to_string() }))
        })
        .build();
    let response = server.handle(get("/early")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_json(response).await,
        json!({ "error": "handler panicked: before the future" })
    );
}

#[tokio::test]
async fn test_hook_panic_before_future_yields_empty_500() {
    let server = HttpServer::builder(failing_tree())
        .on_handler_error(|_ctx, _err| -> Ready<Result<Outcome, BoxError>> {
            panic!("hook gave up")
        })
        .build();

    let response = server.handle(get("/broken")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_panic_before_future_over_tcp() {
    let running = common::spawn(HttpServer::new(failing_tree(), ServerConfig::default())).await;

    let res = common::client().get(running.url("/early")).send().await.unwrap();
    assert_eq!(res.status(), 500);

    running.stop();
}

#[tokio::test]
async fn test_failing_hook_yields_empty_500() {
    let server = HttpServer::builder(failing_tree())
        .on_handler_error(|_ctx, _err| async {
            Err::<Outcome, BoxError>("hook failed too".into())
        })
        .build();

    let response = server.handle(get("/broken")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_failure_outcome() {
    let server = HttpServer::new(failing_tree(), ServerConfig::default());

    let response = server.handle(get("/invalid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await, json!({ "reason": "invalid" }));

    // An error status chosen by the handler is kept.
    let response = server.handle(get("/gone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn test_failure_hook_replaces_body() {
    let server = HttpServer::builder(failing_tree())
        .on_error_result(|ctx, value| async move {
            ctx.response.set_status(StatusCode::UNPROCESSABLE_ENTITY);
            Outcome::json(json!({ "wrapped": value }))
        })
        .build();

    let response = server.handle(get("/invalid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(response).await, json!({ "wrapped": { "reason": "invalid" } }));
}

#[tokio::test]
async fn test_handler_sets_status() {
    let server = HttpServer::new(failing_tree(), ServerConfig::default());
    let request = Request::builder()
        .method("POST")
        .uri("/create")
        .body(Body::empty())
        .unwrap();

    let response = server.handle(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json(response).await, json!({ "id": 1 }));
}

fn options(uri: &str) -> Request<Body> {
    Request::builder()
        .method("OPTIONS")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cors_disabled_options_is_404() {
    let server = HttpServer::new(failing_tree(), ServerConfig::default());
    let response = server.handle(options("/anything")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_permissive() {
    let config = ServerConfig {
        cors: true,
        ..Default::default()
    };
    let server = HttpServer::new(failing_tree(), config);

    let response = server.handle(options("/anything")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(response.headers()["access-control-allow-methods"], "GET,POST");

    let response = server.handle(get("/invalid")).await.unwrap();
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    // Headers the handler set itself are not overwritten.
    let response = server.handle(get("/pinned")).await.unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://app.example"
    );
    assert_eq!(response.headers()["access-control-allow-methods"], "GET,POST");
}

#[tokio::test]
async fn test_cors_custom_handler() {
    let custom = Handler::http("options", &[], |ctx, _args| async move {
        ctx.response.set_status(StatusCode::NO_CONTENT);
        ctx.response.set_header(
            "access-control-allow-origin",
            "https://app.example".parse().unwrap(),
        );
        Outcome::empty()
    });
    let server = HttpServer::builder(failing_tree())
        .cors(CorsPolicy::Custom(custom))
        .build();

    let response = server.handle(options("/anything")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://app.example"
    );
}

#[tokio::test]
async fn test_round_trip_over_tcp() {
    let tree = HandlerTree::builder()
        .route(Handler::http("postEcho", &[], |ctx, _args| async move {
            Outcome::json(ctx.request.json.clone())
        }))
        .build()
        .unwrap();
    let server = common::spawn(HttpServer::new(tree, ServerConfig::default())).await;
    let client = common::client();

    let res = client
        .post(server.url("/echo"))
        .json(&json!({ "x": 1 }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "x": 1 }));

    let res = client
        .post(server.url("/echo"))
        .header("x-request-id", "trace-me")
        .json(&json!({ "x": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me");

    server.stop();
}

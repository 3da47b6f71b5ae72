//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use switchyard::lifecycle::Shutdown;
use switchyard::{Handler, HttpServer, Outcome};

/// A running server; dropping it does not stop the server, call `stop`.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn stop(self) {
        self.shutdown.trigger();
    }
}

/// Serve `server` on an ephemeral localhost port.
pub async fn spawn(server: HttpServer) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    TestServer { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// HTTP handler that counts its invocations and echoes its arguments.
#[allow(dead_code)]
pub fn counting(name: &str, params: &[&str], calls: Arc<AtomicUsize>) -> Handler {
    Handler::http(name, params, move |_ctx, args| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Outcome::json(json!({ "args": args.into_vec() }))
        }
    })
}

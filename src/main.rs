//! switchyard demo server.
//!
//! Serves a small handler tree:
//! - `GET  /health`
//! - `GET  /user/profile?id=...`
//! - `POST /user/rename` with `{"id": ..., "name": ...}`
//! - `ws   /echo`

use std::path::PathBuf;

use axum::extract::ws::{Message, WebSocket};
use clap::Parser;
use serde_json::json;

use switchyard::config::{load_config, BodyPolicy, ServerConfig};
use switchyard::http::RequestHead;
use switchyard::observability::{init_logging, metrics};
use switchyard::{Handler, HandlerTree, HttpServer, Outcome, TreeBuilder};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Convention-routed HTTP/WebSocket server", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Resolve through the flat mapping table instead of the tree walk.
    #[arg(long)]
    static_mapping: bool,

    /// Dispatch JSON requests as soon as the body parses.
    #[arg(long)]
    eager_body: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if cli.static_mapping {
        config.static_mapping = true;
    }
    if cli.eager_body {
        config.body.policy = BodyPolicy::Eager;
    }

    init_logging(&config.logging)?;
    tracing::info!("switchyard v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::builder(demo_tree()?).config(config).build();
    server.listen(cli.port).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_tree() -> Result<HandlerTree, switchyard::RegistryError> {
    let user = TreeBuilder::default()
        .route(Handler::http("getProfile", &["id"], |_ctx, args| async move {
            let id: u64 = args.require(0, "id")?;
            Outcome::json(json!({ "id": id, "name": format!("user-{id}") }))
        }))
        .route(Handler::http("postRename", &["id", "name"], |_ctx, args| async move {
            let id: u64 = args.require(0, "id")?;
            let name: String = args.require(1, "name")?;
            Outcome::json(json!({ "id": id, "name": name }))
        }));

    HandlerTree::builder()
        .route(Handler::http("getHealth", &[], |_ctx, _args| async {
            Outcome::json(json!({ "status": "ok" }))
        }))
        .group("user", user)
        .route(Handler::socket("wsEcho", echo))
        .build()
}

async fn echo(mut socket: WebSocket, head: RequestHead) {
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(_) | Message::Binary(_) => {
                if socket.send(msg).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    tracing::debug!(peer = %head.peer, "Echo session ended");
}

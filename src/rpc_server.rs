//! bookdash RPC Server: JSON-RPC over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.create", "params":{"userId":"...","title":"...",...}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//!
//! Each request runs in its own task, so a slow favicon fetch does not hold up
//! other requests. Clients match responses by `id`.
//!
//! Logs go to stderr; `RUST_LOG` controls the filter (default `bookdash=info`).
//! `BOOKDASH_CONFIG` points at the config file.

use std::sync::Arc;
use std::time::Instant;

use bookdash::app::App;
use bookdash::rpc_handler::handle_method;
use bookdash::services::config_engine::{ConfigEngine, ConfigEngineTrait};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Responses waiting for the stdout writer.
const RESPONSE_QUEUE: usize = 256;

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        let elapsed = self.window_start.elapsed();
        if elapsed.as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

async fn write_line(stdout: &mut tokio::io::Stdout, value: &Value) -> std::io::Result<()> {
    let mut line = value.to_string();
    line.push('\n');
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await
}

/// Owns stdout. Responses arrive in completion order, not request order.
async fn run_writer(mut rx: mpsc::Receiver<Value>) {
    let mut stdout = tokio::io::stdout();
    while let Some(value) = rx.recv().await {
        if let Err(e) = write_line(&mut stdout, &value).await {
            error!(error = %e, "stdout closed, dropping responses");
            break;
        }
    }
}

async fn dispatch(app: Arc<App>, req: Value, id: Value, tx: mpsc::Sender<Value>) {
    let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
    let params = req.get("params").cloned().unwrap_or(json!({}));

    let response = match handle_method(&app, method, &params).await {
        Ok(val) => json!({"id": id, "result": val}),
        Err(err) => {
            error!(method, error = %err, "request failed");
            json!({"id": id, "error": err})
        }
    };
    if tx.send(response).await.is_err() {
        warn!(method, "writer gone, response dropped");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "bookdash=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut engine = ConfigEngine::new(std::env::var("BOOKDASH_CONFIG").ok());
    engine.load()?;
    engine.apply_env_overrides()?;
    let config = engine.get_config().clone();
    info!(config = %engine.get_config_path(), "configuration loaded");

    let app = Arc::new(App::new(config)?);
    app.startup()?;

    let (tx, rx) = mpsc::channel::<Value>(RESPONSE_QUEUE);
    let writer = tokio::spawn(run_writer(rx));
    tx.send(json!({"event":"ready","version":env!("CARGO_PKG_VERSION")})).await?;

    let mut rate_limiter = RateLimiter::new(app.config.rate_limit_per_second);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                tx.send(json!({"id":null,"error":format!("parse error: {}",e)})).await?;
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            tx.send(json!({"id": id, "error": "rate limit exceeded"})).await?;
            continue;
        }

        tokio::spawn(dispatch(Arc::clone(&app), req, id, tx.clone()));
    }

    info!("stdin closed, waiting for in-flight requests");
    drop(tx);
    writer.await?;
    Ok(())
}

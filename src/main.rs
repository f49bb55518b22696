//! User record service.
//!
//! A small HTTP API over an in-memory user store, instrumented so that every
//! log line of a request carries its diagnostic context.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server ──▶ http::handlers ──▶ store::UserStore
//!                         │                 │                   │
//!                         │        http::scope (request ID,     │
//!                         │        diagnostic context, span)    │
//!     Client Response     ▼                 ▼                   ▼
//!     ◀───────────── http::response   observability (logs, spans, metrics)
//! ```

use std::path::PathBuf;

use clap::Parser;

use user_service::config::{load_config, ServiceConfig};
use user_service::lifecycle::{startup, Shutdown};
use user_service::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "user-service")]
#[command(about = "User record HTTP service", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability)?;

    tracing::info!("user-service v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        seed_sample_users = config.store.seed_sample_users,
        metrics_enabled = config.observability.metrics_enabled,
        "Configuration loaded"
    );

    if let Err(err) = startup::run(config, Shutdown::new()).await {
        tracing::error!(error = %err, "Service failed");
        return Err(err.into());
    }
    Ok(())
}

//! Telegraph ingest service: binary entrypoint.
//! Boots the Axum HTTP server, wiring the service, metrics and middleware.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telegraph_ingest::analyzer::KeywordAnalyzer;
use telegraph_ingest::driver::HttpPageDriver;
use telegraph_ingest::metrics::Metrics;
use telegraph_ingest::{config, create_router, AppState, TelegraphService};

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("telegraph_ingest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default().context("loading telegraph config")?;
    let metrics = Metrics::init()?;

    let drivers = HttpPageDriver::factory(cfg.user_agent.clone(), cfg.page_timeout());
    let service = Arc::new(TelegraphService::new(
        cfg.clone(),
        drivers,
        Arc::new(KeywordAnalyzer::new()),
    ));

    let router = create_router(AppState { service }).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, source = %cfg.source_url, "telegraph ingest listening");

    axum::serve(listener, router).await.context("http server")?;
    Ok(())
}

// src/metrics.rs
use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("telegraph_cycles_total", "Scheduler fetch cycles run.");
        describe_counter!(
            "telegraph_cycle_errors_total",
            "Scheduler cycles skipped because extraction failed or timed out."
        );
        describe_counter!(
            "telegraph_new_records_total",
            "Records seen for the first time by the scheduler."
        );
        describe_counter!(
            "telegraph_strategy_hits_total",
            "Batches produced, by extraction strategy."
        );
        describe_counter!(
            "telegraph_detail_fetch_total",
            "Article body lookups, by outcome (cached/fetched/failed)."
        );
        describe_histogram!("telegraph_extract_ms", "List extraction time in milliseconds.");
        describe_gauge!("telegraph_store_records", "Records held by the news store.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once per process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_metrics();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

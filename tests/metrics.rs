// tests/metrics.rs
mod common;

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::{driver_with, extractor, NEXT_DATA_PAGE};
use telegraph_ingest::metrics::Metrics;
use telegraph_ingest::NewsStore;

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    // Installs the global recorder; keep this the only test in the binary.
    let metrics = Metrics::init().expect("install prometheus recorder");

    let mut ex = extractor(driver_with(NEXT_DATA_PAGE), Arc::new(NewsStore::new()));
    ex.fetch_batch(0, false).await.unwrap();

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "telegraph_store_records",
        "telegraph_strategy_hits_total",
        "telegraph_extract_ms",
    ] {
        assert!(text.contains(needle), "missing series {needle} in:\n{text}");
    }
    assert!(text.contains(r#"strategy="next_data""#));
}

// tests/common/mod.rs
// Shared fixtures: canned telegraph pages served by StaticPageDriver.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;

use telegraph_ingest::config::AppConfig;
use telegraph_ingest::driver::{DriverFactory, DynPageDriver, PageDriver, StaticPageDriver};
use telegraph_ingest::error::DriverError;
use telegraph_ingest::{Extractor, ExtractorConfig, NewsRecord, NewsStore};

pub const LIST_URL: &str = "https://fixture.test/telegraph";
pub const NEXT_DATA_PAGE: &str = include_str!("../fixtures/telegraph_next_data.html");
pub const DOM_PAGE: &str = include_str!("../fixtures/telegraph_dom.html");
pub const DETAIL_PAGE: &str = include_str!("../fixtures/telegraph_detail.html");

/// `__NEXT_DATA__` page with the given (id, title, ctime) items.
pub fn next_data_page(items: &[(&str, &str, i64)]) -> String {
    let list: Vec<_> = items
        .iter()
        .map(|(id, title, ctime)| json!({ "id": id, "title": title, "content": title, "ctime": ctime }))
        .collect();
    let blob = json!({ "props": { "initialState": { "telegraph": { "telegraphList": list } } } });
    format!(r#"<html><body><script id="__NEXT_DATA__" type="application/json">{blob}</script></body></html>"#)
}

pub fn driver_with(html: &str) -> Arc<StaticPageDriver> {
    Arc::new(StaticPageDriver::new().with_page(LIST_URL, html))
}

pub fn extractor_cfg() -> ExtractorConfig {
    ExtractorConfig::immediate().with_source_url(LIST_URL)
}

pub fn extractor(driver: Arc<StaticPageDriver>, store: Arc<NewsStore>) -> Extractor {
    Extractor::new(driver, store, extractor_cfg())
}

/// Service config pointing at the fixture site with no pauses.
pub fn app_cfg() -> AppConfig {
    AppConfig {
        source_url: LIST_URL.to_string(),
        list_settle_ms: 0,
        detail_settle_ms: 0,
        detail_jitter: false,
        ..AppConfig::default()
    }
}

pub fn factory(driver: Arc<StaticPageDriver>) -> DriverFactory {
    Arc::new(move || driver.clone() as DynPageDriver)
}

/// Fixture driver whose navigations take `delay` and which remembers the
/// most navigations ever in flight at once.
pub struct SlowDriver {
    pub pages: StaticPageDriver,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowDriver {
    pub fn new(html: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            pages: StaticPageDriver::new().with_page(LIST_URL, html),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.pages.navigations()
    }
}

#[async_trait]
impl PageDriver for SlowDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let out = self.pages.navigate(url).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }

    async fn wait_load(&self) -> Result<(), DriverError> {
        self.pages.wait_load().await
    }

    async fn evaluate(&self, script: &str) -> Result<String, DriverError> {
        self.pages.evaluate(script).await
    }

    async fn html(&self) -> Result<String, DriverError> {
        self.pages.html().await
    }

    fn current_url(&self) -> Option<String> {
        self.pages.current_url()
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

pub fn slow_factory(driver: Arc<SlowDriver>) -> DriverFactory {
    Arc::new(move || driver.clone() as DynPageDriver)
}

pub fn record(id: &str, title: &str, secs: i64) -> NewsRecord {
    NewsRecord {
        id: id.to_string(),
        title: title.to_string(),
        content: format!("{title} body"),
        brief: String::new(),
        publish_time: Utc.timestamp_opt(secs, 0).unwrap(),
        source: "CLS".to_string(),
        tags: vec![],
        url: String::new(),
    }
}

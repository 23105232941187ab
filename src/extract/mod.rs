// src/extract/mod.rs
//! Extractor: drives a page, runs the strategy chain, dedups and merges the
//! batch into the shared store, and optionally fills in article bodies.

pub mod dom;
pub mod payload;
pub mod strategy;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use rand::Rng;

use crate::content_cache::ContentCache;
use crate::dedup::dedup_by_id;
use crate::driver::{DynPageDriver, PageDriver};
use crate::error::{DriverError, ExtractError, ExtractResult};
use crate::store::NewsStore;
use crate::types::{truncate_chars, NewsRecord};

pub use strategy::{default_strategies, ExtractStrategy, StrategyContext};

pub const DEFAULT_SOURCE_URL: &str = "https://www.cls.cn/telegraph";
pub const DEFAULT_DETAIL_BASE_URL: &str = "https://www.cls.cn/detail/";
pub const DEFAULT_SOURCE_LABEL: &str = "财联社";

/// Site-local clock (UTC+8) used for bare time-of-day stamps.
const SITE_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub source_url: String,
    pub detail_base_url: String,
    pub source_label: String,
    /// Upper bound for every single driver call.
    pub page_timeout: Duration,
    /// Pause after the list page loads so dynamic content can render.
    pub list_settle: Duration,
    pub detail_settle: Duration,
    /// Random pause before each article fetch, in ms (inclusive range).
    /// `None` disables it.
    pub detail_jitter_ms: Option<(u64, u64)>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            detail_base_url: DEFAULT_DETAIL_BASE_URL.to_string(),
            source_label: DEFAULT_SOURCE_LABEL.to_string(),
            page_timeout: Duration::from_secs(60),
            list_settle: Duration::from_secs(5),
            detail_settle: Duration::from_secs(2),
            detail_jitter_ms: Some((1_000, 2_000)),
        }
    }
}

impl ExtractorConfig {
    /// No settle pauses and no jitter; for fixtures and tests.
    pub fn immediate() -> Self {
        Self {
            list_settle: Duration::ZERO,
            detail_settle: Duration::ZERO,
            detail_jitter_ms: None,
            ..Self::default()
        }
    }

    pub fn with_source_url(mut self, url: &str) -> Self {
        self.source_url = url.to_string();
        self
    }
}

/// Normalize scraped text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    let stripped = re_tags.replace_all(&decoded, " ");

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a publish stamp: RFC 3339, `YYYY-MM-DD HH:MM[:SS]` or a bare
/// `HH:MM[:SS]` (today, site-local). `None` when nothing fits.
pub fn parse_publish_time(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let site = FixedOffset::east_opt(SITE_OFFSET_SECS)?;
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return site
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            let today = now.with_timezone(&site).date_naive();
            return site
                .from_local_datetime(&today.and_time(t))
                .single()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    None
}

/// Wraps a driver so every call is bounded by the page timeout.
struct TimedDriver {
    inner: DynPageDriver,
    limit: Duration,
}

impl TimedDriver {
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, DriverError>> + Send,
    ) -> Result<T, DriverError> {
        tokio::time::timeout(self.limit, fut)
            .await
            .map_err(|_| DriverError::Timeout {
                op,
                after: self.limit,
            })?
    }
}

#[async_trait]
impl PageDriver for TimedDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.bounded("navigate", self.inner.navigate(url)).await
    }

    async fn wait_load(&self) -> Result<(), DriverError> {
        self.bounded("wait_load", self.inner.wait_load()).await
    }

    async fn evaluate(&self, script: &str) -> Result<String, DriverError> {
        self.bounded("evaluate", self.inner.evaluate(script)).await
    }

    async fn html(&self) -> Result<String, DriverError> {
        self.bounded("html", self.inner.html()).await
    }

    fn current_url(&self) -> Option<String> {
        self.inner.current_url()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

async fn settle(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// One scraping session: a page driver, its content cache, and a handle to
/// the shared store.
pub struct Extractor {
    driver: TimedDriver,
    store: Arc<NewsStore>,
    content_cache: ContentCache,
    strategies: Vec<Box<dyn ExtractStrategy>>,
    cfg: ExtractorConfig,
}

impl Extractor {
    pub fn new(driver: DynPageDriver, store: Arc<NewsStore>, cfg: ExtractorConfig) -> Self {
        crate::metrics::describe_metrics();
        Self {
            driver: TimedDriver {
                inner: driver,
                limit: cfg.page_timeout,
            },
            store,
            content_cache: ContentCache::new(),
            strategies: default_strategies(),
            cfg,
        }
    }

    /// Replace the strategy chain (order matters).
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn store(&self) -> &Arc<NewsStore> {
        &self.store
    }

    pub fn content_cache(&self) -> &ContentCache {
        &self.content_cache
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.cfg
    }

    /// Load the list page and run the strategy chain. No dedup, no merge.
    pub async fn extract_page(&self) -> ExtractResult<Vec<NewsRecord>> {
        let t0 = Instant::now();
        tracing::info!(url = %self.cfg.source_url, driver = self.driver.name(), "loading telegraph page");
        self.driver.navigate(&self.cfg.source_url).await?;
        self.driver.wait_load().await?;
        settle(self.cfg.list_settle).await;

        let ctx = StrategyContext::new(&self.cfg);
        for strat in &self.strategies {
            match strat.try_extract(&self.driver, &ctx).await {
                Ok(records) if !records.is_empty() => {
                    counter!("telegraph_strategy_hits_total", "strategy" => strat.name())
                        .increment(1);
                    histogram!("telegraph_extract_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                    tracing::info!(strategy = strat.name(), count = records.len(), "records extracted");
                    return Ok(records);
                }
                Ok(_) => tracing::debug!(strategy = strat.name(), "strategy yielded nothing"),
                Err(e) => {
                    tracing::debug!(strategy = strat.name(), error = %e, "strategy failed, trying next")
                }
            }
        }

        if let Ok(html) = self.driver.html().await {
            tracing::debug!(bytes = html.len(), "page html length on empty extraction");
        }
        tracing::warn!(url = %self.cfg.source_url, "no strategy extracted any records");
        Err(ExtractError::NoData)
    }

    /// Extract, dedup, merge into the store and return the newest `limit`
    /// records from it (`0` = all). With `want_detail`, article bodies are
    /// filled in from the content cache or fetched one by one.
    pub async fn fetch_batch(
        &mut self,
        limit: usize,
        want_detail: bool,
    ) -> ExtractResult<Vec<NewsRecord>> {
        let raw = self.extract_page().await?;
        let raw_len = raw.len();

        let mut batch = dedup_by_id(raw);
        tracing::info!(raw = raw_len, kept = batch.len(), "deduplicated batch");
        for rec in &mut batch {
            if rec.source.is_empty() {
                rec.source = self.cfg.source_label.clone();
            }
        }

        self.store.merge(&batch);
        let mut list = self.store.snapshot(limit);
        tracing::info!(count = list.len(), limit, "returning newest records from store");

        if !want_detail {
            tracing::debug!("skipping article bodies (fast mode)");
            return Ok(list);
        }

        self.fill_details(&mut list).await;
        Ok(list)
    }

    async fn fill_details(&mut self, list: &mut [NewsRecord]) {
        let total = list.len();
        let (mut fetched, mut cached) = (0usize, 0usize);

        for (i, rec) in list.iter_mut().enumerate() {
            if rec.url.is_empty() {
                continue;
            }
            if let Some(body) = self.content_cache.get(&rec.url) {
                rec.content = body.to_string();
                cached += 1;
                counter!("telegraph_detail_fetch_total", "outcome" => "cached").increment(1);
                continue;
            }

            match self.fetch_detail(&rec.url).await {
                Ok(body) => {
                    tracing::debug!(index = i + 1, total, chars = body.chars().count(), "article body fetched");
                    rec.content = body.clone();
                    self.content_cache.put(rec.url.clone(), body);
                    fetched += 1;
                    counter!("telegraph_detail_fetch_total", "outcome" => "fetched").increment(1);
                }
                Err(e) => {
                    tracing::warn!(index = i + 1, total, url = %rec.url, error = %e, "article body fetch failed, keeping brief");
                    counter!("telegraph_detail_fetch_total", "outcome" => "failed").increment(1);
                }
            }
        }

        tracing::info!(
            total,
            ok = fetched + cached,
            cache_hits = cached,
            "article bodies filled"
        );
    }

    /// Full body text of one article.
    pub async fn fetch_detail(&self, url: &str) -> ExtractResult<String> {
        if let Some((lo, hi)) = self.cfg.detail_jitter_ms {
            let ms = {
                let mut rng = rand::rng();
                rng.random_range(lo.min(hi)..=hi.max(lo))
            };
            tracing::debug!(delay_ms = ms, "pausing before article fetch");
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        self.driver.navigate(url).await?;
        self.driver.wait_load().await?;
        settle(self.cfg.detail_settle).await;

        let html = self.driver.html().await?;
        dom::extract_detail_text(&html).ok_or_else(|| ExtractError::NoContent {
            url: url.to_string(),
        })
    }

    /// Load a single record page by id. Not merged into the store.
    pub async fn fetch_record(&self, id: &str) -> ExtractResult<NewsRecord> {
        let url = format!("{}/{}", self.cfg.source_url.trim_end_matches('/'), id);
        self.driver.navigate(&url).await?;
        self.driver.wait_load().await?;
        settle(self.cfg.detail_settle).await;

        let html = self.driver.html().await?;
        let (title, content, time) = dom::extract_record_fields(&html);
        if title.is_empty() && content.is_empty() {
            return Err(ExtractError::NoContent { url });
        }

        let now = Utc::now();
        Ok(NewsRecord {
            id: id.to_string(),
            brief: truncate_chars(&content, 200),
            title,
            content,
            publish_time: time
                .as_deref()
                .and_then(|t| parse_publish_time(t, now))
                .unwrap_or(now),
            source: self.cfg.source_label.clone(),
            tags: Vec::new(),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn normalize_strips_tags_and_entities() {
        assert_eq!(
            normalize_text("  <b>Hello</b>&nbsp;&amp;\n\n world  "),
            "Hello & world"
        );
    }

    #[test]
    fn normalize_keeps_comparison_text() {
        assert_eq!(normalize_text("a < b and c > d"), "a < b and c > d");
    }

    #[test]
    fn publish_time_formats() {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 3, 0, 0).unwrap();

        let rfc = parse_publish_time("2024-05-06T01:02:03Z", now).unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2024, 5, 6, 1, 2, 3).unwrap());

        // Site-local (UTC+8) wall clock.
        let full = parse_publish_time("2024-05-06 10:00:00", now).unwrap();
        assert_eq!(full, Utc.with_ymd_and_hms(2024, 5, 6, 2, 0, 0).unwrap());

        let bare = parse_publish_time("09:30", now).unwrap();
        assert_eq!(bare.hour(), 1);
        assert_eq!(bare.minute(), 30);

        assert!(parse_publish_time("yesterday-ish", now).is_none());
        assert!(parse_publish_time("   ", now).is_none());
    }
}

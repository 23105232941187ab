// src/service.rs
//! Service façade: one place that owns the shared store, opens driver
//! sessions on demand and manages the (optional) refresh scheduler.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::{annotate, DynAnalyzer};
use crate::config::AppConfig;
use crate::driver::DriverFactory;
use crate::error::ExtractResult;
use crate::extract::{Extractor, ExtractorConfig};
use crate::scheduler::{NewRecordsCallback, NewsScheduler};
use crate::store::NewsStore;
use crate::types::{NewsRecord, NewsWithAnalysis};

const STATUS_TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsListResponse {
    pub news: Vec<NewsRecord>,
    pub count: usize,
}

impl From<Vec<NewsRecord>> for NewsListResponse {
    fn from(news: Vec<NewsRecord>) -> Self {
        Self {
            count: news.len(),
            news,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub news: Vec<NewsRecord>,
    pub count: usize,
    pub keyword: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub items: Vec<NewsWithAnalysis>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSchedulerResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSchedulerResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub cached_count: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub last_update_str: String,
}

/// Start requests are serialized and a second start waits out the first
/// one's initial cycle. Stop and status never wait on a start: a stop that
/// lands during that first cycle stops the scheduler being started.
pub struct TelegraphService {
    cfg: AppConfig,
    store: Arc<NewsStore>,
    drivers: DriverFactory,
    analyzer: DynAnalyzer,
    scheduler: RwLock<Option<Arc<NewsScheduler>>>,
    /// Serializes start requests.
    control: tokio::sync::Mutex<()>,
}

impl TelegraphService {
    pub fn new(cfg: AppConfig, drivers: DriverFactory, analyzer: DynAnalyzer) -> Self {
        let store = Arc::new(NewsStore::with_capacity(cfg.store_capacity));
        Self::with_store(cfg, drivers, analyzer, store)
    }

    pub fn with_store(
        cfg: AppConfig,
        drivers: DriverFactory,
        analyzer: DynAnalyzer,
        store: Arc<NewsStore>,
    ) -> Self {
        Self {
            cfg,
            store,
            drivers,
            analyzer,
            scheduler: RwLock::new(None),
            control: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<NewsStore> {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    fn session(&self) -> Extractor {
        Extractor::new(
            (self.drivers)(),
            Arc::clone(&self.store),
            ExtractorConfig::from(&self.cfg),
        )
    }

    fn current_scheduler(&self) -> Option<Arc<NewsScheduler>> {
        self.scheduler
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Newest `limit` records (`0` = all) after a fresh extraction.
    pub async fn fetch_latest(
        &self,
        limit: usize,
        fetch_detail: bool,
    ) -> ExtractResult<NewsListResponse> {
        let mut session = self.session();
        let news = session.fetch_batch(limit, fetch_detail).await?;
        Ok(news.into())
    }

    /// Case-insensitive title/content match over a fast fetch of everything.
    pub async fn search(&self, keyword: &str, limit: usize) -> ExtractResult<SearchResponse> {
        let mut session = self.session();
        let all = session.fetch_batch(0, false).await?;
        let news = filter_by_keyword(all, keyword, limit);
        tracing::info!(keyword, count = news.len(), "search finished");
        Ok(SearchResponse {
            count: news.len(),
            news,
            keyword: keyword.to_string(),
        })
    }

    pub async fn fetch_record(&self, id: &str) -> ExtractResult<NewsRecord> {
        self.session().fetch_record(id).await
    }

    /// Store snapshot, no network.
    pub fn cached_news(&self, limit: usize) -> NewsListResponse {
        self.store.snapshot(limit).into()
    }

    pub fn analyze(&self, records: Vec<NewsRecord>) -> AnalyzeResponse {
        let items = annotate(self.analyzer.as_ref(), records);
        AnalyzeResponse {
            count: items.len(),
            items,
        }
    }

    /// Start a scheduler refreshing every `interval_minutes` (0 = configured
    /// default). Runs the first cycle before returning.
    pub async fn start_scheduler(&self, interval_minutes: u64) -> StartSchedulerResponse {
        let _gate = self.control.lock().await;
        if let Some(s) = self.current_scheduler() {
            if s.is_running() {
                return StartSchedulerResponse {
                    success: true,
                    message: "scheduler already running".into(),
                    interval: String::new(),
                };
            }
        }

        let sched_cfg = self.cfg.scheduler(interval_minutes);
        let scheduler = Arc::new(
            NewsScheduler::new(self.session(), sched_cfg).with_analyzer(Arc::clone(&self.analyzer)),
        );
        scheduler.set_callback(log_new_records());
        // Published first so a stop can reach it during the initial cycle.
        *self.scheduler.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::clone(&scheduler));
        scheduler.start().await;

        StartSchedulerResponse {
            success: true,
            message: "scheduler started".into(),
            interval: format!("{}m", scheduler.config().interval.as_secs() / 60),
        }
    }

    pub async fn stop_scheduler(&self) -> StopSchedulerResponse {
        match self.current_scheduler() {
            Some(s) if s.is_running() => {
                s.stop();
                StopSchedulerResponse {
                    success: true,
                    message: "scheduler stopped".into(),
                }
            }
            _ => StopSchedulerResponse {
                success: true,
                message: "scheduler not running".into(),
            },
        }
    }

    pub fn scheduler_status(&self) -> SchedulerStatus {
        let Some(s) = self.current_scheduler() else {
            return SchedulerStatus::default();
        };
        let (cached_count, last_update) = s.cache_info();
        SchedulerStatus {
            running: s.is_running(),
            cached_count,
            last_update,
            last_update_str: last_update
                .map(|t| t.format(STATUS_TIME_FMT).to_string())
                .unwrap_or_default(),
        }
    }
}

/// First `limit` matches (`0` = all), in input order.
pub fn filter_by_keyword(records: Vec<NewsRecord>, keyword: &str, limit: usize) -> Vec<NewsRecord> {
    let needle = keyword.to_lowercase();
    let matches = records.into_iter().filter(|r| {
        r.title.to_lowercase().contains(&needle) || r.content.to_lowercase().contains(&needle)
    });
    if limit == 0 {
        matches.collect()
    } else {
        matches.take(limit).collect()
    }
}

fn log_new_records() -> NewRecordsCallback {
    Arc::new(|fresh: &[NewsWithAnalysis]| {
        tracing::info!(count = fresh.len(), "new telegraph records");
        for item in fresh {
            match &item.analysis {
                Some(a) => tracing::info!(
                    title = %item.news.title,
                    sentiment = a.sentiment.as_str(),
                    industries = ?a.industries,
                    prediction = %a.prediction,
                    "new record"
                ),
                None => tracing::info!(title = %item.news.title, "new record"),
            }
        }
    })
}

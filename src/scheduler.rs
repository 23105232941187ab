// src/scheduler.rs
//! Periodic refresh of the latest-batch cache.
//!
//! One background task per running scheduler. Every cycle (timer-driven or
//! forced) takes the same session lock, so cycles never overlap. State
//! accessors (`is_running`, `cache_info`, `cached`) never touch that lock.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::counter;
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};

use crate::analyzer::{annotate, DynAnalyzer};
use crate::cache::BatchCache;
use crate::error::{DriverError, ExtractError, ExtractResult};
use crate::extract::Extractor;
use crate::types::{NewsRecord, NewsWithAnalysis};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_FETCH_LIMIT: usize = 20;
/// Longest refresh period a scheduler accepts; longer requests are clamped.
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Shortest refresh period; a zero period is raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Receives the records a cycle saw for the first time. Runs on the cycle
/// path while the session lock is held: it must return promptly and must
/// not call back into `force_update`.
pub type NewRecordsCallback = Arc<dyn Fn(&[NewsWithAnalysis]) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub cycle_timeout: Duration,
    pub fetch_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }
}

impl SchedulerConfig {
    /// Same settings with `interval` clamped into `MIN_INTERVAL..=MAX_INTERVAL`.
    pub fn bounded(self) -> Self {
        Self {
            interval: self.interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
            ..self
        }
    }
}

/// Records of `current` whose id does not appear in `previous`.
pub fn find_new_records(
    current: &[NewsWithAnalysis],
    previous: &[NewsWithAnalysis],
) -> Vec<NewsWithAnalysis> {
    if previous.is_empty() {
        return current.to_vec();
    }
    let seen: HashSet<&str> = previous.iter().map(|r| r.news.id.as_str()).collect();
    current
        .iter()
        .filter(|r| !seen.contains(r.news.id.as_str()))
        .cloned()
        .collect()
}

struct Inner {
    session: Mutex<Extractor>,
    cache: BatchCache,
    callback: RwLock<Option<NewRecordsCallback>>,
    analyzer: Option<DynAnalyzer>,
    cfg: SchedulerConfig,
}

impl Inner {
    async fn run_cycle(&self) -> ExtractResult<usize> {
        let mut session = self.session.lock().await;
        counter!("telegraph_cycles_total").increment(1);
        tracing::info!(limit = self.cfg.fetch_limit, "refresh cycle started");

        let fetched = tokio::time::timeout(
            self.cfg.cycle_timeout,
            session.fetch_batch(self.cfg.fetch_limit, false),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ExtractError::Driver(DriverError::Timeout {
                op: "cycle",
                after: self.cfg.cycle_timeout,
            }))
        });
        let batch = match fetched {
            Ok(b) => b,
            Err(e) => {
                counter!("telegraph_cycle_errors_total").increment(1);
                return Err(e);
            }
        };

        let items = self.prepare(batch);
        let (previous, _) = self.cache.get();
        let fresh = find_new_records(&items, &previous);
        let total = items.len();
        self.cache.set(items);

        counter!("telegraph_new_records_total").increment(fresh.len() as u64);
        tracing::info!(total, new = fresh.len(), "refresh cycle finished");

        if !fresh.is_empty() {
            let cb = self
                .callback
                .read()
                .unwrap_or_else(|p| p.into_inner())
                .clone();
            if let Some(cb) = cb {
                cb(&fresh);
            }
        }
        Ok(fresh.len())
    }

    fn prepare(&self, batch: Vec<NewsRecord>) -> Vec<NewsWithAnalysis> {
        match &self.analyzer {
            Some(a) => annotate(a.as_ref(), batch),
            None => batch.into_iter().map(NewsWithAnalysis::from).collect(),
        }
    }

    /// Tick-driven cycles swallow their errors; the next tick retries.
    async fn run_cycle_logged(&self) {
        if let Err(e) = self.run_cycle().await {
            tracing::warn!(error = %e, "refresh cycle skipped");
        }
    }
}

#[derive(Default)]
struct RunState {
    running: bool,
    stop_tx: Option<watch::Sender<bool>>,
}

pub struct NewsScheduler {
    inner: Arc<Inner>,
    run: RwLock<RunState>,
    /// Never sent on; dropping it ends any background task still alive.
    lifetime: watch::Sender<()>,
}

impl NewsScheduler {
    pub fn new(session: Extractor, cfg: SchedulerConfig) -> Self {
        crate::metrics::describe_metrics();
        let bounded = cfg.bounded();
        if bounded.interval != cfg.interval {
            tracing::warn!(requested = ?cfg.interval, used = ?bounded.interval, "scheduler interval clamped");
        }
        let cfg = bounded;
        let (lifetime, _) = watch::channel(());
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(session),
                cache: BatchCache::new(),
                callback: RwLock::new(None),
                analyzer: None,
                cfg,
            }),
            run: RwLock::new(RunState::default()),
            lifetime,
        }
    }

    /// Annotate every cached batch with `analyzer`. Only valid before the
    /// first start; later calls are ignored.
    pub fn with_analyzer(mut self, analyzer: DynAnalyzer) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.analyzer = Some(analyzer),
            None => tracing::warn!("scheduler already shared, analyzer not installed"),
        }
        self
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.cfg
    }

    pub fn set_callback(&self, cb: NewRecordsCallback) {
        *self
            .inner
            .callback
            .write()
            .unwrap_or_else(|p| p.into_inner()) = Some(cb);
    }

    pub fn is_running(&self) -> bool {
        self.run.read().unwrap_or_else(|p| p.into_inner()).running
    }

    /// Run one cycle now, then refresh every `interval` in the background.
    /// A no-op when already running. The first cycle's error is logged,
    /// not returned; the loop keeps going either way.
    pub async fn start(&self) {
        let stop_rx = {
            let mut run = self.run.write().unwrap_or_else(|p| p.into_inner());
            if run.running {
                tracing::info!("scheduler already running");
                return;
            }
            let (tx, rx) = watch::channel(false);
            run.running = true;
            run.stop_tx = Some(tx);
            rx
        };
        tracing::info!(interval = ?self.inner.cfg.interval, "scheduler started");

        self.inner.run_cycle_logged().await;

        let inner = Arc::clone(&self.inner);
        let life_rx = self.lifetime.subscribe();
        tokio::spawn(run_loop(inner, stop_rx, life_rx));
    }

    /// Signal the loop to exit. Does not wait for an in-flight cycle.
    pub fn stop(&self) {
        let mut run = self.run.write().unwrap_or_else(|p| p.into_inner());
        if !run.running {
            return;
        }
        if let Some(tx) = run.stop_tx.take() {
            let _ = tx.send(true);
        }
        run.running = false;
        tracing::info!("scheduler stopped");
    }

    /// Out-of-band cycle; returns how many records were new. Errors propagate.
    pub async fn force_update(&self) -> ExtractResult<usize> {
        tracing::info!("forced refresh requested");
        self.inner.run_cycle().await
    }

    /// Latest cached batch, first `limit` items (`0` = all).
    pub fn cached(&self, limit: usize) -> Vec<NewsWithAnalysis> {
        self.inner.cache.latest(limit)
    }

    /// (cached count, last update).
    pub fn cache_info(&self) -> (usize, Option<chrono::DateTime<chrono::Utc>>) {
        self.inner.cache.info()
    }
}

impl Drop for NewsScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Waits on tick, stop and scheduler drop at a single point. When several are
/// ready at once `select!` picks one at random; a tick that wins against a
/// stop just runs one more cycle.
async fn run_loop(
    inner: Arc<Inner>,
    mut stop_rx: watch::Receiver<bool>,
    mut life_rx: watch::Receiver<()>,
) {
    let period = inner.cfg.interval;
    let now = Instant::now();
    let first = now
        .checked_add(period)
        .unwrap_or_else(|| now + DEFAULT_INTERVAL);
    let mut ticker = tokio::time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => inner.run_cycle_logged().await,
            _ = stop_rx.changed() => break,
            _ = life_rx.changed() => break,
        }
    }
    tracing::debug!("scheduler loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewsRecord;
    use chrono::Utc;

    fn item(id: &str) -> NewsWithAnalysis {
        NewsRecord {
            id: id.into(),
            title: format!("title {id}"),
            content: String::new(),
            brief: String::new(),
            publish_time: Utc::now(),
            source: "CLS".into(),
            tags: vec![],
            url: String::new(),
        }
        .into()
    }

    #[test]
    fn delta_against_empty_previous_is_everything() {
        let cur = vec![item("1"), item("2")];
        assert_eq!(find_new_records(&cur, &[]), cur);
    }

    #[test]
    fn delta_keeps_only_unseen_ids_in_order() {
        let prev = vec![item("1"), item("2")];
        let cur = vec![item("3"), item("2"), item("4"), item("1")];
        let ids: Vec<String> = find_new_records(&cur, &prev)
            .into_iter()
            .map(|r| r.news.id)
            .collect();
        assert_eq!(ids, vec!["3", "4"]);
    }

    #[test]
    fn interval_is_clamped_into_bounds() {
        let huge = SchedulerConfig {
            interval: Duration::MAX,
            ..SchedulerConfig::default()
        };
        assert_eq!(huge.bounded().interval, MAX_INTERVAL);
        let zero = SchedulerConfig {
            interval: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert_eq!(zero.bounded().interval, MIN_INTERVAL);
        assert_eq!(SchedulerConfig::default().bounded().interval, DEFAULT_INTERVAL);
    }

    #[test]
    fn delta_is_empty_when_nothing_new() {
        let prev = vec![item("1"), item("2")];
        assert!(find_new_records(&[item("2")], &prev).is_empty());
    }
}

// src/store.rs
//! NewsStore: bounded in-memory table of telegraph records keyed by id.
//!
//! Merges are insert-or-replace (last write wins). Once the table grows past
//! its capacity it keeps only the newest records by publish time; eviction is
//! silent. Readers always get owned snapshots, never references into the table.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use metrics::gauge;

use crate::types::NewsRecord;

pub const DEFAULT_CAPACITY: usize = 100;

/// Counters describing what a single merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub replaced: usize,
    pub skipped_no_id: usize,
    pub evicted: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct NewsStore {
    inner: RwLock<Inner>,
    cap: usize,
}

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<String, NewsRecord>,
    last_update: Option<DateTime<Utc>>,
}

/// Publish time descending, id ascending on ties.
pub fn newest_first(a: &NewsRecord, b: &NewsRecord) -> Ordering {
    b.publish_time
        .cmp(&a.publish_time)
        .then_with(|| a.id.cmp(&b.id))
}

impl Default for NewsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NewsStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Capacity below 1 is treated as 1.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            cap: cap.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Insert-or-replace every record that carries an id, then evict down to
    /// capacity. The whole call runs under one write lock.
    pub fn merge(&self, batch: &[NewsRecord]) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut inner = self.write();
        let before = inner.by_id.len();

        for rec in batch {
            if !rec.has_id() {
                stats.skipped_no_id += 1;
                continue;
            }
            if inner.by_id.insert(rec.id.clone(), rec.clone()).is_some() {
                stats.replaced += 1;
            } else {
                stats.added += 1;
            }
        }

        if inner.by_id.len() > self.cap {
            let mut all: Vec<NewsRecord> = inner.by_id.drain().map(|(_, v)| v).collect();
            all.sort_by(newest_first);
            stats.evicted = all.len() - self.cap;
            all.truncate(self.cap);
            inner.by_id = all.into_iter().map(|r| (r.id.clone(), r)).collect();
        }

        inner.last_update = Some(Utc::now());
        stats.total = inner.by_id.len();
        gauge!("telegraph_store_records").set(stats.total as f64);

        tracing::info!(
            total = stats.total,
            added = stats.added,
            replaced = stats.replaced,
            evicted = stats.evicted,
            previous = before,
            "news store merged"
        );
        stats
    }

    /// All records newest first. `limit == 0` means unlimited.
    pub fn snapshot(&self, limit: usize) -> Vec<NewsRecord> {
        let mut out: Vec<NewsRecord> = {
            let inner = self.read();
            inner.by_id.values().cloned().collect()
        };
        out.sort_by(newest_first);
        if limit > 0 && out.len() > limit {
            out.truncate(limit);
        }
        out
    }

    pub fn get(&self, id: &str) -> Option<NewsRecord> {
        self.read().by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.read().last_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn rec(id: &str, title: &str, secs: i64) -> NewsRecord {
        NewsRecord {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            brief: String::new(),
            publish_time: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            source: "test".into(),
            tags: vec![],
            url: String::new(),
        }
    }

    #[test]
    fn merge_replaces_by_id_and_orders_newest_first() {
        let store = NewsStore::new();
        store.merge(&[rec("1", "A", 0)]);
        let stats = store.merge(&[rec("1", "A-updated", 0), rec("2", "B", 10)]);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.replaced, 1);

        let snap = store.snapshot(0);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].id, "2");
        assert_eq!(snap[1].id, "1");
        assert_eq!(snap[1].title, "A-updated");
    }

    #[test]
    fn records_without_id_are_not_stored() {
        let store = NewsStore::new();
        let stats = store.merge(&[rec("", "orphan", 0)]);
        assert_eq!(stats.skipped_no_id, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn eviction_keeps_newest() {
        let store = NewsStore::with_capacity(3);
        let batch: Vec<_> = (0..5).map(|i| rec(&i.to_string(), "t", i)).collect();
        let stats = store.merge(&batch);
        assert_eq!(stats.evicted, 2);
        let ids: Vec<_> = store.snapshot(0).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["4", "3", "2"]);
    }

    #[test]
    fn ties_break_on_id() {
        let store = NewsStore::new();
        store.merge(&[rec("b", "t", 5), rec("a", "t", 5), rec("c", "t", 5)]);
        let ids: Vec<_> = store.snapshot(0).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn snapshot_limit_truncates() {
        let store = NewsStore::new();
        let batch: Vec<_> = (0..10).map(|i| rec(&i.to_string(), "t", i)).collect();
        store.merge(&batch);
        assert_eq!(store.snapshot(4).len(), 4);
        assert_eq!(store.snapshot(0).len(), 10);
        assert_eq!(store.snapshot(50).len(), 10);
    }

    #[test]
    fn last_update_set_after_merge() {
        let store = NewsStore::new();
        assert!(store.last_update().is_none());
        store.merge(&[rec("1", "t", 0)]);
        let ts = store.last_update().unwrap();
        assert!(Utc::now() - ts < Duration::seconds(5));
    }
}

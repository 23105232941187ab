// src/cache.rs
//! Latest-batch cache: the most recent cycle's records (optionally annotated)
//! and when they were stored. Many readers, one writer.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::types::NewsWithAnalysis;

#[derive(Debug, Default)]
pub struct BatchCache {
    inner: RwLock<CacheState>,
}

#[derive(Debug, Default, Clone)]
struct CacheState {
    items: Vec<NewsWithAnalysis>,
    last_update: Option<DateTime<Utc>>,
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached batch and stamp the update time.
    pub fn set(&self, items: Vec<NewsWithAnalysis>) {
        let mut g = self.inner.write().unwrap_or_else(|p| p.into_inner());
        g.items = items;
        g.last_update = Some(Utc::now());
    }

    pub fn get(&self) -> (Vec<NewsWithAnalysis>, Option<DateTime<Utc>>) {
        let g = self.inner.read().unwrap_or_else(|p| p.into_inner());
        (g.items.clone(), g.last_update)
    }

    /// First `n` items in batch order; `n == 0` returns everything.
    pub fn latest(&self, n: usize) -> Vec<NewsWithAnalysis> {
        let g = self.inner.read().unwrap_or_else(|p| p.into_inner());
        if n == 0 || n >= g.items.len() {
            return g.items.clone();
        }
        g.items[..n].to_vec()
    }

    pub fn info(&self) -> (usize, Option<DateTime<Utc>>) {
        let g = self.inner.read().unwrap_or_else(|p| p.into_inner());
        (g.items.len(), g.last_update)
    }
}

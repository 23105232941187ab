// src/extract/strategy.rs
//! Ordered extraction strategies. Each one is tried in turn; the first that
//! returns a non-empty batch wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::driver::PageDriver;
use crate::error::ExtractResult;
use crate::extract::dom::DomListStrategy;
use crate::extract::payload::{InitialStateStrategy, NextDataStrategy};
use crate::extract::ExtractorConfig;
use crate::types::NewsRecord;

/// Values shared by every strategy during one batch extraction.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    pub source_label: String,
    pub detail_base_url: String,
    /// Ingestion time; fallback for missing or unparsable publish times.
    pub now: DateTime<Utc>,
}

impl StrategyContext {
    pub fn new(cfg: &ExtractorConfig) -> Self {
        Self {
            source_label: cfg.source_label.clone(),
            detail_base_url: cfg.detail_base_url.clone(),
            now: Utc::now(),
        }
    }

    /// Locally synthesized id: wall-clock millis plus position in the batch.
    pub fn synth_id(&self, index: usize) -> String {
        format!("cls_{}_{}", self.now.timestamp_millis(), index)
    }
}

#[async_trait]
pub trait ExtractStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(vec![])` means "nothing here"; errors also fall through to the
    /// next strategy.
    async fn try_extract(
        &self,
        driver: &dyn PageDriver,
        ctx: &StrategyContext,
    ) -> ExtractResult<Vec<NewsRecord>>;
}

/// Embedded state blob, then the global state object, then DOM selection.
pub fn default_strategies() -> Vec<Box<dyn ExtractStrategy>> {
    vec![
        Box::new(NextDataStrategy),
        Box::new(InitialStateStrategy),
        Box::new(DomListStrategy),
    ]
}

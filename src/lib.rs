// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyzer;
pub mod api;
pub mod cache;
pub mod config;
pub mod content_cache;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::error::{DriverError, ExtractError, ExtractResult};
pub use crate::extract::{Extractor, ExtractorConfig};
pub use crate::scheduler::NewsScheduler;
pub use crate::service::TelegraphService;
pub use crate::store::NewsStore;
pub use crate::types::{Analysis, NewsRecord, NewsWithAnalysis, Sentiment};

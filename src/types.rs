// src/types.rs
//! Core records shared by the extractor, store, scheduler and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telegraph bulletin.
///
/// `id` may be empty when the source gave no identity; such records are never
/// treated as duplicates and are never merged into the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub brief: String,
    pub publish_time: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub url: String,
}

impl NewsRecord {
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// Heuristic annotation for one record. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub news_id: String,
    pub summary: String,
    pub sentiment: Sentiment,
    pub keywords: Vec<String>,
    pub industries: Vec<String>,
    pub stocks: Vec<String>,
    pub impact: String,
    pub prediction: String,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    pub analyzed_at: DateTime<Utc>,
}

/// A record as held by the latest-batch cache, optionally annotated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsWithAnalysis {
    pub news: NewsRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

impl From<NewsRecord> for NewsWithAnalysis {
    fn from(news: NewsRecord) -> Self {
        Self {
            news,
            analysis: None,
        }
    }
}

/// First `n` chars of `s` (char-aware, never splits a code point).
pub fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_multibyte_chars() {
        assert_eq!(truncate_chars("央行宣布降息", 2), "央行");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn sentiment_serializes_lowercase() {
        let s = serde_json::to_string(&Sentiment::Negative).unwrap();
        assert_eq!(s, "\"negative\"");
    }
}

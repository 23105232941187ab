// src/content_cache.rs
//! Per-session map from article URL to its fetched body text.
//!
//! Owned by one `Extractor`; detail fetches run serially through `&mut`
//! access, so no locking. No eviction: a session only visits a few URLs.

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct ContentCache {
    by_url: HashMap<String, String>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<&str> {
        self.by_url.get(url).map(String::as_str)
    }

    pub fn put(&mut self, url: impl Into<String>, content: impl Into<String>) {
        self.by_url.insert(url.into(), content.into());
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let mut c = ContentCache::new();
        assert!(c.get("u").is_none());
        c.put("u", "body");
        assert_eq!(c.get("u"), Some("body"));
        c.put("u", "newer");
        assert_eq!(c.get("u"), Some("newer"));
        assert_eq!(c.len(), 1);
    }
}

// src/dedup.rs
use std::collections::HashSet;

use crate::types::NewsRecord;

/// Drop repeated identities from a batch. First occurrence wins, order is
/// kept, and records without an id always pass through.
pub fn dedup_by_id(records: Vec<NewsRecord>) -> Vec<NewsRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut keep = Vec::with_capacity(records.len());

    for rec in records {
        if !rec.has_id() {
            keep.push(rec);
            continue;
        }
        if seen.insert(rec.id.clone()) {
            keep.push(rec);
        } else {
            tracing::debug!(id = %rec.id, title = %rec.title, "duplicate record dropped");
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rec(id: &str, title: &str) -> NewsRecord {
        NewsRecord {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            brief: String::new(),
            publish_time: Utc::now(),
            source: "test".into(),
            tags: vec![],
            url: String::new(),
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let out = dedup_by_id(vec![rec("1", "a"), rec("2", "b"), rec("1", "c")]);
        let titles: Vec<_> = out.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn empty_ids_always_kept() {
        let out = dedup_by_id(vec![rec("", "x"), rec("", "y"), rec("1", "z")]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn empty_batch_is_empty() {
        assert!(dedup_by_id(Vec::new()).is_empty());
    }
}

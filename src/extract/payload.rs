// src/extract/payload.rs
//! Strategies 1 and 2: structured state payloads injected by the site.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::driver::PageDriver;
use crate::error::{ExtractError, ExtractResult};
use crate::extract::strategy::{ExtractStrategy, StrategyContext};
use crate::extract::{normalize_text, parse_publish_time};
use crate::types::{truncate_chars, NewsRecord};

/// Pointer to the telegraph list inside the `__NEXT_DATA__` blob.
const NEXT_DATA_LIST: &str = "/props/initialState/telegraph/telegraphList";

/// Candidate list locations inside `window.__INITIAL_STATE__`, in order.
const INITIAL_STATE_PATHS: &[&str] = &[
    "/telegraph/telegraphList",
    "/telegraph/list",
    "/telegraph/data/list",
    "/data/telegraph/list",
    "/list",
    "/data/list",
];

pub const INITIAL_STATE_SCRIPT: &str = "JSON.stringify(window.__INITIAL_STATE__ || null)";

static NEXT_DATA_SEL: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("script#__NEXT_DATA__").ok());

const BRIEF_CHARS: usize = 200;

pub struct NextDataStrategy;

#[async_trait]
impl ExtractStrategy for NextDataStrategy {
    fn name(&self) -> &'static str {
        "next_data"
    }

    async fn try_extract(
        &self,
        driver: &dyn PageDriver,
        ctx: &StrategyContext,
    ) -> ExtractResult<Vec<NewsRecord>> {
        let html = driver.html().await?;
        parse_next_data(&html, ctx)
    }
}

pub struct InitialStateStrategy;

#[async_trait]
impl ExtractStrategy for InitialStateStrategy {
    fn name(&self) -> &'static str {
        "initial_state"
    }

    async fn try_extract(
        &self,
        driver: &dyn PageDriver,
        ctx: &StrategyContext,
    ) -> ExtractResult<Vec<NewsRecord>> {
        let raw = driver.evaluate(INITIAL_STATE_SCRIPT).await?;
        parse_initial_state(&raw, ctx)
    }
}

/// Read `<script id="__NEXT_DATA__">` and map its telegraph list.
pub fn parse_next_data(html: &str, ctx: &StrategyContext) -> ExtractResult<Vec<NewsRecord>> {
    let Some(sel) = NEXT_DATA_SEL.as_ref() else {
        return Ok(Vec::new());
    };
    let blob = {
        let doc = Html::parse_document(html);
        match doc.select(sel).next() {
            Some(el) => el.text().collect::<String>(),
            None => return Ok(Vec::new()),
        }
    };

    let root: Value = serde_json::from_str(blob.trim())
        .map_err(|e| ExtractError::Parse(format!("__NEXT_DATA__: {e}")))?;
    match root.pointer(NEXT_DATA_LIST).and_then(Value::as_array) {
        Some(items) => Ok(map_items(items, ctx)),
        None => Ok(Vec::new()),
    }
}

/// Probe the known list paths of the global state object.
pub fn parse_initial_state(raw: &str, ctx: &StrategyContext) -> ExtractResult<Vec<NewsRecord>> {
    let root: Value = serde_json::from_str(raw.trim())
        .map_err(|e| ExtractError::Parse(format!("__INITIAL_STATE__: {e}")))?;
    if root.is_null() {
        return Ok(Vec::new());
    }

    for path in INITIAL_STATE_PATHS {
        if let Some(items) = root.pointer(path).and_then(Value::as_array) {
            if !items.is_empty() {
                tracing::debug!(path, count = items.len(), "initial state list found");
                return Ok(map_items(items, ctx));
            }
        }
    }
    Ok(Vec::new())
}

fn map_items(items: &[Value], ctx: &StrategyContext) -> Vec<NewsRecord> {
    items
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_object())
        .map(|(i, v)| map_item(v, i, ctx))
        .collect()
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Numbers and strings both count as ids.
fn id_field(v: &Value) -> Option<String> {
    match v.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn ctime_field(v: &Value) -> Option<i64> {
    match v.get("ctime")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Map one telegraph item. Accepts both the site's raw shape
/// (`ctime`, `shareurl`, `subjects`) and an already-normalized shape
/// (`publish_time`, `url`, `tags`).
fn map_item(v: &Value, index: usize, ctx: &StrategyContext) -> NewsRecord {
    let raw_id = id_field(v);
    let id = raw_id.clone().unwrap_or_else(|| ctx.synth_id(index));

    let title = str_field(v, "title").map(normalize_text).unwrap_or_default();
    let content = str_field(v, "content")
        .or_else(|| str_field(v, "brief"))
        .map(normalize_text)
        .unwrap_or_default();
    let brief = str_field(v, "brief")
        .map(normalize_text)
        .unwrap_or_else(|| truncate_chars(&content, BRIEF_CHARS));

    let publish_time = ctime_field(v)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .or_else(|| str_field(v, "publish_time").and_then(|s| parse_publish_time(s, ctx.now)))
        .unwrap_or(ctx.now);

    let mut tags: Vec<String> = v
        .get("subjects")
        .and_then(Value::as_array)
        .map(|subs| {
            subs.iter()
                .filter_map(|s| str_field(s, "subject_name"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if tags.is_empty() {
        if let Some(arr) = v.get("tags").and_then(Value::as_array) {
            tags = arr
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
    }

    let url = str_field(v, "shareurl")
        .or_else(|| str_field(v, "url"))
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "{}{}",
                ctx.detail_base_url,
                raw_id.as_deref().unwrap_or_default()
            )
        });

    let source = str_field(v, "source")
        .map(str::to_string)
        .unwrap_or_else(|| ctx.source_label.clone());

    NewsRecord {
        id,
        title,
        content,
        brief,
        publish_time,
        source,
        tags,
        url,
    }
}

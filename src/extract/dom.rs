// src/extract/dom.rs
//! DOM fallbacks: list-item selection with per-field heuristics (strategies
//! 3 and 4), article body selection, and single-record pages.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::driver::PageDriver;
use crate::error::ExtractResult;
use crate::extract::strategy::{ExtractStrategy, StrategyContext};
use crate::extract::{normalize_text, parse_publish_time};
use crate::types::{truncate_chars, NewsRecord};

/// Titles shorter than this (in chars) are treated as noise.
pub const MIN_TITLE_CHARS: usize = 5;
/// Plausible article body window (exclusive bounds, chars).
pub const MIN_DETAIL_CHARS: usize = 50;
pub const MAX_DETAIL_CHARS: usize = 50_000;

const BRIEF_CHARS: usize = 200;

type NamedSelectors = Vec<(&'static str, Selector)>;

fn compile(list: &[&'static str]) -> NamedSelectors {
    list.iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(sel) => Some((*s, sel)),
            Err(e) => {
                tracing::warn!(selector = s, error = ?e, "invalid selector skipped");
                None
            }
        })
        .collect()
}

static ITEM_SELECTORS: Lazy<NamedSelectors> = Lazy::new(|| {
    compile(&[
        r#"li[class*="telegraph"]"#,
        r#"div[class*="telegraph"]"#,
        r#"li[class*="item"]"#,
        r#"div[class*="item"]"#,
        r#"li[class*="list"]"#,
        r#"div[class*="list"]"#,
        ".list-item",
        ".item",
        "article",
        r#"[class*="news"]"#,
    ])
});

static TITLE_SELECTORS: Lazy<NamedSelectors> = Lazy::new(|| {
    compile(&[
        ".title",
        r#"[class*="title"]"#,
        "h1",
        "h2",
        "h3",
        "h4",
        "a",
        r#"span[class*="title"]"#,
        r#"div[class*="title"]"#,
    ])
});

static CONTENT_SELECTORS: Lazy<NamedSelectors> = Lazy::new(|| {
    compile(&[
        ".content",
        r#"[class*="content"]"#,
        ".brief",
        r#"[class*="brief"]"#,
        "p",
        ".desc",
        r#"[class*="desc"]"#,
    ])
});

static TIME_SELECTORS: Lazy<NamedSelectors> = Lazy::new(|| {
    compile(&[
        ".time",
        r#"[class*="time"]"#,
        "time",
        r#"[class*="date"]"#,
        ".date",
    ])
});

static LINK_SELECTOR: Lazy<NamedSelectors> = Lazy::new(|| compile(&["a"]));

/// Containers accepted as soon as they hold any text.
static DETAIL_PRIMARY: Lazy<NamedSelectors> = Lazy::new(|| {
    compile(&[
        ".telegraph-content",
        ".content-box .content",
        "section.content-box .content",
        r#"[class*="telegraph-content"]"#,
    ])
});

/// Generic containers; every match is checked against the length window.
static DETAIL_FALLBACK: Lazy<NamedSelectors> = Lazy::new(|| {
    compile(&[
        "div.telegraph-content",
        "div.content",
        r#"[class*="article-content"]"#,
        r#"[class*="detail-content"]"#,
        "article",
        "main",
        r#"[class*="content"]"#,
    ])
});

static RECORD_TITLE: Lazy<NamedSelectors> =
    Lazy::new(|| compile(&[r#".detail-title, h1, [class*="title"]"#]));
static RECORD_CONTENT: Lazy<NamedSelectors> =
    Lazy::new(|| compile(&[r#".detail-content, .content, [class*="content"]"#]));
static RECORD_TIME: Lazy<NamedSelectors> =
    Lazy::new(|| compile(&[r#".detail-time, time, [class*="time"]"#]));

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// First selector whose *first* match has non-blank text.
fn first_text(item: ElementRef<'_>, selectors: &NamedSelectors) -> Option<String> {
    selectors.iter().find_map(|(_, sel)| {
        item.select(sel)
            .next()
            .map(element_text)
            .filter(|t| !t.trim().is_empty())
    })
}

/// Outcome of a DOM list pass, kept for logging and tests.
#[derive(Debug, Default)]
pub struct DomExtraction {
    pub selector: Option<&'static str>,
    pub matched: usize,
    pub rejected: usize,
    pub records: Vec<NewsRecord>,
}

pub struct DomListStrategy;

#[async_trait]
impl ExtractStrategy for DomListStrategy {
    fn name(&self) -> &'static str {
        "dom_selectors"
    }

    async fn try_extract(
        &self,
        driver: &dyn PageDriver,
        ctx: &StrategyContext,
    ) -> ExtractResult<Vec<NewsRecord>> {
        let html = driver.html().await?;
        let page_url = driver.current_url().unwrap_or_default();
        let out = extract_list(&html, &page_url, ctx);
        match out.selector {
            Some(selector) => tracing::info!(
                selector,
                matched = out.matched,
                rejected = out.rejected,
                kept = out.records.len(),
                "dom list extraction"
            ),
            None => tracing::info!("no list elements matched any selector"),
        }
        Ok(out.records)
    }
}

/// Pick the first item selector that matches anything, then pull fields
/// out of each element. Elements with missing or too-short titles are skipped.
pub fn extract_list(html: &str, page_url: &str, ctx: &StrategyContext) -> DomExtraction {
    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let mut out = DomExtraction::default();
    let Some((name, items)) = ITEM_SELECTORS.iter().find_map(|(name, sel)| {
        let found: Vec<ElementRef<'_>> = doc.select(sel).collect();
        (!found.is_empty()).then_some((*name, found))
    }) else {
        return out;
    };
    out.selector = Some(name);
    out.matched = items.len();

    for (index, item) in items.into_iter().enumerate() {
        match extract_item(item, index, base.as_ref(), page_url, ctx) {
            Some(rec) => out.records.push(rec),
            None => out.rejected += 1,
        }
    }
    out
}

fn extract_item(
    item: ElementRef<'_>,
    index: usize,
    base: Option<&Url>,
    page_url: &str,
    ctx: &StrategyContext,
) -> Option<NewsRecord> {
    let all_text = element_text(item);

    let title = first_text(item, &TITLE_SELECTORS)
        .map(|t| normalize_text(&t))
        .or_else(|| {
            all_text
                .trim()
                .lines()
                .next()
                .map(normalize_text)
        })
        .unwrap_or_default();
    if title.chars().count() < MIN_TITLE_CHARS {
        return None;
    }

    let content = first_text(item, &CONTENT_SELECTORS)
        .map(|t| normalize_text(&t))
        .unwrap_or_else(|| normalize_text(&all_text));

    let publish_time = first_text(item, &TIME_SELECTORS)
        .and_then(|t| parse_publish_time(&t, ctx.now))
        .unwrap_or(ctx.now);

    let url = LINK_SELECTOR
        .first()
        .and_then(|(_, sel)| item.select(sel).next())
        .and_then(|a| a.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(|href| match base.and_then(|b| b.join(href.trim()).ok()) {
            Some(abs) => abs.to_string(),
            None => href.trim().to_string(),
        })
        .unwrap_or_else(|| page_url.to_string());

    Some(NewsRecord {
        id: ctx.synth_id(index),
        brief: truncate_chars(&content, BRIEF_CHARS),
        title,
        content,
        publish_time,
        source: ctx.source_label.clone(),
        tags: Vec::new(),
        url,
    })
}

/// Article body: primary containers first, then generic ones that pass the
/// length window. `None` when nothing plausible is found.
pub fn extract_detail_text(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    if let Some(text) = first_text(root, &DETAIL_PRIMARY) {
        return Some(normalize_text(&text));
    }

    for (name, sel) in DETAIL_FALLBACK.iter() {
        for el in doc.select(sel) {
            let text = normalize_text(&element_text(el));
            let n = text.chars().count();
            if n > MIN_DETAIL_CHARS && n < MAX_DETAIL_CHARS {
                tracing::debug!(selector = name, chars = n, "detail container accepted");
                return Some(text);
            }
        }
    }
    None
}

/// Fields of a single-record page: (title, content, time text).
pub fn extract_record_fields(html: &str) -> (String, String, Option<String>) {
    let doc = Html::parse_document(html);
    let root = doc.root_element();
    let pick = |sels: &NamedSelectors| {
        sels.first()
            .and_then(|(_, sel)| root.select(sel).next())
            .map(|el| normalize_text(&element_text(el)))
            .unwrap_or_default()
    };
    let title = pick(&RECORD_TITLE);
    let content = pick(&RECORD_CONTENT);
    let time = Some(pick(&RECORD_TIME)).filter(|t| !t.is_empty());
    (title, content, time)
}

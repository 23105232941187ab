// src/analyzer.rs
//! Deterministic keyword/sentiment tagging of telegraph records.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::types::{truncate_chars, Analysis, NewsRecord, NewsWithAnalysis, Sentiment};

const SUMMARY_PREVIEW_CHARS: usize = 200;
const LOW_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Default, Deserialize)]
struct Lexicon {
    #[serde(default)]
    keywords: Vec<String>,
    /// industry label -> trigger words
    #[serde(default)]
    industries: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    positive: Vec<String>,
    #[serde(default)]
    negative: Vec<String>,
    #[serde(default)]
    policy_terms: Vec<String>,
    #[serde(default)]
    earnings_terms: Vec<String>,
    #[serde(default)]
    macro_terms: Vec<String>,
}

static LEXICON: Lazy<Lexicon> = Lazy::new(|| {
    let raw = include_str!("../analyzer_lexicon.json");
    serde_json::from_str::<Lexicon>(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "analyzer lexicon unreadable, tagging disabled");
        Lexicon::default()
    })
});

/// Optional exchange prefix plus a maximal run of ASCII digits.
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(SH|SZ|HK)?([0-9]+)").unwrap());

/// Pure, non-blocking annotation of one record.
pub trait Analyze: Send + Sync {
    fn analyze(&self, news: &NewsRecord) -> Analysis;
}

pub type DynAnalyzer = Arc<dyn Analyze>;

/// Annotate a batch, preserving order.
pub fn annotate(analyzer: &dyn Analyze, records: Vec<NewsRecord>) -> Vec<NewsWithAnalysis> {
    records
        .into_iter()
        .map(|news| {
            let analysis = analyzer.analyze(&news);
            NewsWithAnalysis {
                news,
                analysis: Some(analysis),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Analyze for KeywordAnalyzer {
    fn analyze(&self, news: &NewsRecord) -> Analysis {
        let text = format!("{} {}", news.title, news.content).to_lowercase();
        let lex = &*LEXICON;

        let keywords = matched_keywords(&text, lex);
        let industries = matched_industries(&text, lex);
        let stocks = stock_codes(&format!("{} {}", news.title, news.content));
        let sentiment = sentiment_of(&text, lex);
        let confidence = confidence_of(&keywords, &industries, &stocks, sentiment);

        let analysis = Analysis {
            news_id: news.id.clone(),
            summary: summary_of(news),
            impact: impact_of(&text, lex, sentiment, &industries, &stocks),
            prediction: prediction_of(sentiment, &industries, confidence),
            sentiment,
            keywords,
            industries,
            stocks,
            confidence,
            analyzed_at: Utc::now(),
        };
        tracing::debug!(
            id = %news.id,
            sentiment = analysis.sentiment.as_str(),
            confidence = analysis.confidence,
            "record analyzed"
        );
        analysis
    }
}

fn contains_any(text: &str, words: &[String]) -> bool {
    words.iter().any(|w| text.contains(&w.to_lowercase()))
}

fn matched_keywords(text: &str, lex: &Lexicon) -> Vec<String> {
    lex.keywords
        .iter()
        .filter(|k| text.contains(&k.to_lowercase()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn matched_industries(text: &str, lex: &Lexicon) -> Vec<String> {
    lex.industries
        .iter()
        .filter(|(_, words)| contains_any(text, words))
        .map(|(label, _)| label.clone())
        .collect()
}

/// A-share codes are six digits starting with 0, 3 or 6; HK codes are five
/// digits. Runs embedded in longer numbers don't count.
pub fn stock_codes(text: &str) -> Vec<String> {
    let mut out = BTreeSet::new();
    for caps in RE_CODE.captures_iter(text) {
        let digits = &caps[2];
        let a_share = digits.len() == 6 && matches!(digits.as_bytes()[0], b'0' | b'3' | b'6');
        let hk = digits.len() == 5;
        if !(a_share || hk) {
            continue;
        }
        out.insert(digits.to_string());
        if let (true, Some(prefix)) = (a_share, caps.get(1)) {
            out.insert(format!("{}{}", prefix.as_str(), digits));
        }
    }
    out.into_iter().collect()
}

fn sentiment_of(text: &str, lex: &Lexicon) -> Sentiment {
    let count = |words: &[String]| -> usize {
        words
            .iter()
            .map(|w| w.to_lowercase())
            .filter(|w| !w.is_empty())
            .map(|w| text.matches(w.as_str()).count())
            .sum()
    };
    let pos = count(lex.positive.as_slice());
    let neg = count(lex.negative.as_slice());
    match pos.cmp(&neg) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

fn summary_of(news: &NewsRecord) -> String {
    if news.content.is_empty() {
        return news.title.clone();
    }
    let mut preview = truncate_chars(&news.content, SUMMARY_PREVIEW_CHARS);
    if news.content.chars().count() > SUMMARY_PREVIEW_CHARS {
        preview.push_str("...");
    }
    format!("{} - {}", news.title, preview)
}

fn confidence_of(
    keywords: &[String],
    industries: &[String],
    stocks: &[String],
    sentiment: Sentiment,
) -> f64 {
    let mut c = 0.3;
    if !keywords.is_empty() {
        c += 0.2;
    }
    if !industries.is_empty() {
        c += 0.2;
    }
    if !stocks.is_empty() {
        c += 0.15;
    }
    if sentiment != Sentiment::Neutral {
        c += 0.15;
    }
    f64::min(c, 1.0)
}

fn impact_of(
    text: &str,
    lex: &Lexicon,
    sentiment: Sentiment,
    industries: &[String],
    stocks: &[String],
) -> String {
    let mut parts = Vec::new();
    if !industries.is_empty() {
        let tone = match sentiment {
            Sentiment::Positive => "bullish",
            Sentiment::Negative => "bearish",
            Sentiment::Neutral => "neutral",
        };
        parts.push(format!("{tone} for {}", industries.join(", ")));
    }
    if !stocks.is_empty() {
        parts.push(format!("may move {}", stocks.join(", ")));
    }
    if contains_any(text, &lex.policy_terms) {
        parts.push("policy-driven; watch for implementation details".to_string());
    }
    if contains_any(text, &lex.earnings_terms) {
        parts.push("earnings-related; may affect valuations".to_string());
    }
    if contains_any(text, &lex.macro_terms) {
        parts.push("macro policy; may affect the broad market".to_string());
    }

    if parts.is_empty() {
        return "limited impact; keep watching".to_string();
    }
    parts.join("; ")
}

fn prediction_of(sentiment: Sentiment, industries: &[String], confidence: f64) -> String {
    let mut parts = Vec::new();
    match sentiment {
        Sentiment::Positive => {
            if !industries.is_empty() {
                parts.push(format!("look for opportunities in {}", industries.join(", ")));
            }
            parts.push("short-term upside momentum possible".to_string());
        }
        Sentiment::Negative => {
            parts.push("be cautious with related sectors and manage risk".to_string());
            if !industries.is_empty() {
                parts.push(format!("{} may come under pressure", industries.join(", ")));
            }
        }
        Sentiment::Neutral => {
            parts.push("wait for more information".to_string());
            parts.push("follow further developments".to_string());
        }
    }
    if confidence < LOW_CONFIDENCE {
        parts.push("low confidence; corroborate with other sources".to_string());
    }
    parts.join("; ")
}

// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::extract::{
    ExtractorConfig, DEFAULT_DETAIL_BASE_URL, DEFAULT_SOURCE_LABEL, DEFAULT_SOURCE_URL,
};
use crate::scheduler::{SchedulerConfig, MAX_INTERVAL};

pub const ENV_PATH: &str = "TELEGRAPH_CONFIG_PATH";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}
fn default_detail_base_url() -> String {
    DEFAULT_DETAIL_BASE_URL.to_string()
}
fn default_source_label() -> String {
    DEFAULT_SOURCE_LABEL.to_string()
}
fn default_interval_minutes() -> u64 {
    5
}
fn default_fetch_limit() -> usize {
    20
}
fn default_cycle_timeout_secs() -> u64 {
    120
}
fn default_page_timeout_secs() -> u64 {
    60
}
fn default_list_settle_ms() -> u64 {
    5_000
}
fn default_detail_settle_ms() -> u64 {
    2_000
}
fn default_true() -> bool {
    true
}
fn default_store_capacity() -> usize {
    crate::store::DEFAULT_CAPACITY
}
fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_detail_base_url")]
    pub detail_base_url: String,
    #[serde(default = "default_source_label")]
    pub source_label: String,
    /// Scheduler period used when a start request gives none.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Records per scheduler cycle.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    #[serde(default = "default_list_settle_ms")]
    pub list_settle_ms: u64,
    #[serde(default = "default_detail_settle_ms")]
    pub detail_settle_ms: u64,
    /// Random 1-2 s pause before each article fetch.
    #[serde(default = "default_true")]
    pub detail_jitter: bool,
    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            detail_base_url: default_detail_base_url(),
            source_label: default_source_label(),
            interval_minutes: default_interval_minutes(),
            fetch_limit: default_fetch_limit(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            page_timeout_secs: default_page_timeout_secs(),
            list_settle_ms: default_list_settle_ms(),
            detail_settle_ms: default_detail_settle_ms(),
            detail_jitter: default_true(),
            store_capacity: default_store_capacity(),
            bind_addr: default_bind_addr(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    /// Scheduler settings for a run every `interval_minutes` (0 = configured
    /// default). Periods beyond `MAX_INTERVAL` are clamped to it.
    pub fn scheduler(&self, interval_minutes: u64) -> SchedulerConfig {
        let minutes = match interval_minutes {
            0 => self.interval_minutes.max(1),
            m => m,
        };
        let max_minutes = MAX_INTERVAL.as_secs() / 60;
        SchedulerConfig {
            interval: Duration::from_secs(minutes.min(max_minutes) * 60),
            cycle_timeout: Duration::from_secs(self.cycle_timeout_secs),
            fetch_limit: self.fetch_limit,
        }
    }
}

impl From<&AppConfig> for ExtractorConfig {
    fn from(c: &AppConfig) -> Self {
        ExtractorConfig {
            source_url: c.source_url.clone(),
            detail_base_url: c.detail_base_url.clone(),
            source_label: c.source_label.clone(),
            page_timeout: c.page_timeout(),
            list_settle: Duration::from_millis(c.list_settle_ms),
            detail_settle: Duration::from_millis(c.detail_settle_ms),
            detail_jitter_ms: c.detail_jitter.then_some((1_000, 2_000)),
        }
    }
}

/// Load config from an explicit path. TOML or JSON by extension.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $TELEGRAPH_CONFIG_PATH
/// 2) config/telegraph.toml
/// 3) config/telegraph.json
/// 4) built-in defaults
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_PATH} points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/telegraph.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/telegraph.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(AppConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => serde_json::from_str(s)
            .or_else(|_| toml::from_str(s))
            .map_err(|_| anyhow!("unsupported config format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site() {
        let c = AppConfig::default();
        assert_eq!(c.source_url, "https://www.cls.cn/telegraph");
        assert_eq!(c.interval_minutes, 5);
        assert_eq!(c.fetch_limit, 20);
        assert_eq!(c.store_capacity, 100);
        assert!(c.detail_jitter);
    }

    #[test]
    fn partial_toml_and_json_fill_defaults() {
        let t = parse_config("fetch_limit = 7\ndetail_jitter = false", "toml").unwrap();
        assert_eq!(t.fetch_limit, 7);
        assert!(!t.detail_jitter);
        assert_eq!(t.bind_addr, "0.0.0.0:8000");

        let j = parse_config(r#"{"source_label":"X"}"#, "").unwrap();
        assert_eq!(j.source_label, "X");
        assert_eq!(j.page_timeout_secs, 60);
    }

    #[test]
    fn extractor_config_follows_jitter_flag() {
        let mut c = AppConfig::default();
        assert_eq!(ExtractorConfig::from(&c).detail_jitter_ms, Some((1_000, 2_000)));
        c.detail_jitter = false;
        c.list_settle_ms = 0;
        let e = ExtractorConfig::from(&c);
        assert_eq!(e.detail_jitter_ms, None);
        assert!(e.list_settle.is_zero());
    }

    #[test]
    fn scheduler_interval_falls_back_to_configured() {
        let c = AppConfig::default();
        assert_eq!(c.scheduler(0).interval, Duration::from_secs(300));
        assert_eq!(c.scheduler(2).interval, Duration::from_secs(120));
        assert_eq!(c.scheduler(0).fetch_limit, 20);
    }

    #[test]
    fn oversized_interval_is_clamped() {
        let mut c = AppConfig::default();
        assert_eq!(c.scheduler(u64::MAX).interval, MAX_INTERVAL);
        assert_eq!(c.scheduler(i64::MAX as u64).interval, MAX_INTERVAL);
        c.interval_minutes = u64::MAX;
        assert_eq!(c.scheduler(0).interval, MAX_INTERVAL);
    }
}

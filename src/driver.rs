// src/driver.rs
//! Page driver capability: the only way the extractor touches a rendered page.
//!
//! `HttpPageDriver` loads pages with a plain GET (no script engine), and
//! `StaticPageDriver` serves canned pages for tests and offline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;
    async fn wait_load(&self) -> Result<(), DriverError>;
    /// Run `script` in the page and return its string result.
    async fn evaluate(&self, script: &str) -> Result<String, DriverError>;
    async fn html(&self) -> Result<String, DriverError>;
    fn current_url(&self) -> Option<String>;
    fn name(&self) -> &'static str;
}

pub type DynPageDriver = Arc<dyn PageDriver>;

/// Opens a fresh driver per session (one per request or scheduler).
pub type DriverFactory = Arc<dyn Fn() -> DynPageDriver + Send + Sync>;

#[derive(Debug, Clone)]
struct LoadedPage {
    url: String,
    body: String,
}

fn no_page() -> DriverError {
    DriverError::Navigation {
        url: "about:blank".into(),
        reason: "no page loaded".into(),
    }
}

// ------------------------------------------------------------
// HTTP driver
// ------------------------------------------------------------

pub struct HttpPageDriver {
    client: reqwest::Client,
    page: Mutex<Option<LoadedPage>>,
}

impl HttpPageDriver {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, DriverError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .map_err(|e| DriverError::Http(e.to_string()))?;
        Ok(Self {
            client,
            page: Mutex::new(None),
        })
    }

    /// Factory for the service layer. Falls back to a default client when the
    /// configured one cannot be built.
    pub fn factory(user_agent: String, timeout: Duration) -> DriverFactory {
        Arc::new(move || {
            let driver = HttpPageDriver::new(&user_agent, timeout).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "http driver build failed, using default client");
                HttpPageDriver {
                    client: reqwest::Client::new(),
                    page: Mutex::new(None),
                }
            });
            Arc::new(driver) as DynPageDriver
        })
    }

    fn loaded(&self) -> Option<LoadedPage> {
        self.page.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let nav_err = |reason: String| DriverError::Navigation {
            url: url.to_string(),
            reason,
        };
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| nav_err(e.to_string()))?;
        let resp = resp.error_for_status().map_err(|e| nav_err(e.to_string()))?;
        let final_url = resp.url().to_string();
        let body = resp.text().await.map_err(|e| nav_err(e.to_string()))?;

        tracing::debug!(url, bytes = body.len(), "page loaded over http");
        *self.page.lock().unwrap_or_else(|p| p.into_inner()) = Some(LoadedPage {
            url: final_url,
            body,
        });
        Ok(())
    }

    async fn wait_load(&self) -> Result<(), DriverError> {
        // The body is complete once `navigate` returns.
        self.loaded().map(|_| ()).ok_or_else(no_page)
    }

    async fn evaluate(&self, _script: &str) -> Result<String, DriverError> {
        Err(DriverError::Unsupported("script evaluation"))
    }

    async fn html(&self) -> Result<String, DriverError> {
        self.loaded().map(|p| p.body).ok_or_else(no_page)
    }

    fn current_url(&self) -> Option<String> {
        self.loaded().map(|p| p.url)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

// ------------------------------------------------------------
// Static driver (fixtures)
// ------------------------------------------------------------

/// In-memory driver: pages keyed by URL plus one canned script result.
#[derive(Default)]
pub struct StaticPageDriver {
    pages: Mutex<HashMap<String, String>>,
    script_result: Mutex<Option<String>>,
    current: Mutex<Option<String>>,
    navigations: AtomicUsize,
}

impl StaticPageDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.set_page(url, html);
        self
    }

    pub fn with_script_result(self, result: &str) -> Self {
        self.set_script_result(Some(result.to_string()));
        self
    }

    pub fn set_page(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(url.to_string(), html.to_string());
    }

    /// `None` makes `evaluate` report the capability as unsupported.
    pub fn set_script_result(&self, result: Option<String>) {
        *self.script_result.lock().unwrap_or_else(|p| p.into_inner()) = result;
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageDriver for StaticPageDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        let known = self
            .pages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(url);
        if !known {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "no fixture for url".into(),
            });
        }
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = Some(url.to_string());
        Ok(())
    }

    async fn wait_load(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<String, DriverError> {
        self.script_result
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(DriverError::Unsupported("script evaluation"))
    }

    async fn html(&self) -> Result<String, DriverError> {
        let url = self.current_url().ok_or_else(no_page)?;
        self.pages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&url)
            .cloned()
            .ok_or_else(no_page)
    }

    fn current_url(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_driver_serves_known_pages_only() {
        let d = StaticPageDriver::new().with_page("https://x/a", "<p>a</p>");
        assert!(d.navigate("https://x/b").await.is_err());
        d.navigate("https://x/a").await.unwrap();
        assert_eq!(d.html().await.unwrap(), "<p>a</p>");
        assert_eq!(d.current_url().as_deref(), Some("https://x/a"));
        assert_eq!(d.navigations(), 2);
    }

    #[tokio::test]
    async fn static_driver_script_unsupported_by_default() {
        let d = StaticPageDriver::new();
        assert!(matches!(
            d.evaluate("1+1").await,
            Err(DriverError::Unsupported(_))
        ));
        d.set_script_result(Some("null".into()));
        assert_eq!(d.evaluate("x").await.unwrap(), "null");
    }
}

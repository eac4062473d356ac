//! Static-document implementation of the page capability.
//!
//! Navigation is a plain GET that follows redirects; the loaded markup is
//! queried with `scraper`. No script runs, so a document never changes after
//! load and a selector missing right after navigation is final.

use super::{Browser, BrowserError, Page};
use crate::config::HttpConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};
use url::Url;

/// Shared client builder; the downloader uses the same settings.
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        // Accept cookies so session-based pages work
        .cookie_store(true)
        .build()
        .context("Failed to build HTTP client")
}

pub struct HttpBrowser {
    client: reqwest::Client,
    config: Arc<HttpConfig>,
}

impl HttpBrowser {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            config: Arc::new(config.clone()),
        })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    type Page = HttpPage;

    async fn new_page(&self) -> Result<HttpPage, BrowserError> {
        Ok(HttpPage {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            url: None,
            body: None,
        })
    }
}

pub struct HttpPage {
    client: reqwest::Client,
    config: Arc<HttpConfig>,
    url: Option<Url>,
    body: Option<String>,
}

impl HttpPage {
    fn body(&self) -> Result<&str, BrowserError> {
        self.body.as_deref().ok_or(BrowserError::NotLoaded)
    }

    /// Absolute target of the first `selector` match's `href`.
    fn link_target(&self, selector: &str) -> Result<Url, BrowserError> {
        let href = first_href(self.body()?, selector)?
            .ok_or_else(|| BrowserError::MissingElement(selector.to_string()))?;
        let base = self.url.as_ref().ok_or(BrowserError::NotLoaded)?;
        base.join(&href).map_err(|e| BrowserError::Navigation {
            url: href,
            reason: e.to_string(),
        })
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter_ms = if self.config.jitter_ms > 0 {
            rand::random_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        let total = self.config.request_delay_ms + jitter_ms;
        if total > 0 {
            sleep(Duration::from_millis(total)).await;
        }
    }
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.polite_delay().await;

        // 2·d, 4·d, 8·d … ms with full jitter, d = request_delay_ms
        let backoff = ExponentialBackoff::from_millis(2)
            .factor(self.config.request_delay_ms.max(1))
            .map(jitter)
            .take(self.config.max_retries as usize);

        let client = &self.client;
        let (final_url, body) = RetryIf::spawn(
            backoff,
            || fetch(client, url),
            |e: &BrowserError| {
                let retry = e.is_transient();
                if retry {
                    warn!("{}; retrying", e);
                }
                retry
            },
        )
        .await?;

        if final_url.as_str() != url {
            debug!("{} redirected to {}", url, final_url);
        }

        self.url = Some(final_url);
        self.body = Some(body);
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        if matches_any(self.body()?, selector)? {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            })
        }
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.body().map(str::to_string)
    }

    fn current_url(&self) -> Option<String> {
        self.url.as_ref().map(Url::to_string)
    }

    async fn exists(&self, selector: &str) -> Result<bool, BrowserError> {
        matches_any(self.body()?, selector)
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let target = self.link_target(selector)?;
        self.goto(target.as_str()).await
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.url = None;
        self.body = None;
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn fetch(client: &reqwest::Client, url: &str) -> Result<(Url, String), BrowserError> {
    debug!("GET {}", url);

    let navigation = |e: reqwest::Error| BrowserError::Navigation {
        url: url.to_string(),
        reason: e.to_string(),
    };

    let resp = client.get(url).send().await.map_err(navigation)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(BrowserError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = resp.url().clone();
    let body = resp.text().await.map_err(navigation)?;
    Ok((final_url, body))
}

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector).map_err(|_| BrowserError::InvalidSelector(selector.to_string()))
}

fn matches_any(body: &str, selector: &str) -> Result<bool, BrowserError> {
    let sel = parse_selector(selector)?;
    let doc = Html::parse_document(body);
    let found = doc.select(&sel).next().is_some();
    Ok(found)
}

fn first_href(body: &str, selector: &str) -> Result<Option<String>, BrowserError> {
    let sel = parse_selector(selector)?;
    let doc = Html::parse_document(body);
    let href = doc
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string);
    Ok(href)
}

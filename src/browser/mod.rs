//! Page-automation capability the crawler drives.
//!
//! The crawler only needs a handful of operations: open a page, navigate it,
//! wait for an element, read the rendered markup, follow a control. Anything
//! that can do that (a headless browser, a plain HTTP client, an in-memory
//! fake in tests) implements [`Browser`] and [`Page`].

pub mod http;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use self::http::HttpBrowser;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("timed out after {waited:?} waiting for `{selector}`")]
    Timeout { selector: String, waited: Duration },

    #[error("no element matches `{0}`")]
    MissingElement(String),

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("page has not been navigated yet")]
    NotLoaded,

    #[error("could not open page: {0}")]
    Open(String),
}

impl BrowserError {
    /// Worth retrying: connection trouble or the server asking us to back off.
    pub fn is_transient(&self) -> bool {
        match self {
            BrowserError::Navigation { .. } => true,
            BrowserError::Status { status, .. } => *status == 429 || *status == 503,
            _ => false,
        }
    }
}

// ── Capability traits ─────────────────────────────────────────────────────────

#[async_trait]
pub trait Browser: Send + Sync + 'static {
    type Page: Page + 'static;

    /// Open a fresh page with its own document.
    async fn new_page(&self) -> Result<Self::Page, BrowserError>;
}

#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Resolve once `selector` matches, or fail with [`BrowserError::Timeout`].
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Rendered markup of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// URL of the loaded document after any redirects.
    fn current_url(&self) -> Option<String>;

    async fn exists(&self, selector: &str) -> Result<bool, BrowserError>;

    /// Activate the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    async fn close(&mut self) -> Result<(), BrowserError>;
}

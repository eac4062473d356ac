pub mod classify;
pub mod cleaner;
pub mod parsers;

use crate::browser::{Browser, BrowserError, Page};
use crate::config::CrawlConfig;
use crate::models::{ArticleRecord, PreviewItem, Schema};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use self::classify::is_terminal_file;
use self::parsers::{Selectors, parse_detail_page, parse_listing_page};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("listing page {url} is unavailable")]
    ListingUnavailable {
        url: String,
        #[source]
        source: BrowserError,
    },
}

// ── Crawl state ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Fetching(u32),
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages: u32,
    pub items: usize,
    pub detail_fetches: usize,
    pub detail_failures: usize,
    pub terminal_files: usize,
}

#[derive(Debug)]
pub struct CrawlState {
    pub phase: CrawlPhase,
    pub records: Vec<ArticleRecord>,
    pub schema: Schema,
    pub stats: CrawlStats,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self {
            phase: CrawlPhase::Fetching(1),
            records: Vec::new(),
            schema: Schema::new(),
            stats: CrawlStats::default(),
        }
    }
}

impl CrawlState {
    /// Fold one page's records in, keeping their order.
    pub fn absorb(&mut self, records: Vec<ArticleRecord>) {
        for record in &records {
            self.schema.merge(record.field_names());
        }
        self.records.extend(records);
    }
}

/// What a finished crawl hands to the output stage.
#[derive(Debug)]
pub struct CrawlOutput {
    pub records: Vec<ArticleRecord>,
    pub schema: Schema,
    pub stats: CrawlStats,
}

// ── Crawler ───────────────────────────────────────────────────────────────────

pub struct Crawler<B: Browser> {
    browser: Arc<B>,
    selectors: Arc<Selectors>,
    config: CrawlConfig,
}

enum Pending {
    Ready(ArticleRecord),
    Spawned {
        preview: PreviewItem,
        handle: JoinHandle<Result<ArticleRecord, BrowserError>>,
    },
}

impl<B: Browser> Crawler<B> {
    pub fn new(browser: Arc<B>, selectors: Selectors, config: &CrawlConfig) -> Self {
        Self {
            browser,
            selectors: Arc::new(selectors),
            config: config.clone(),
        }
    }

    /// Walk every listing page from `start_url` until no next-page control
    /// remains (or `max_pages` is hit), expanding each item on the way.
    pub async fn crawl(&self, start_url: &str) -> Result<CrawlOutput, CrawlError> {
        let unavailable = |source| CrawlError::ListingUnavailable {
            url: start_url.to_string(),
            source,
        };

        let mut list_page = self.browser.new_page().await.map_err(unavailable)?;
        let result = self.paginate(&mut list_page, start_url).await;
        if let Err(e) = list_page.close().await {
            debug!("closing listing page: {}", e);
        }

        let state = result?;
        info!(
            "Scraped {} articles from {} pages ({} detail failures)",
            state.records.len(),
            state.stats.pages,
            state.stats.detail_failures
        );

        Ok(CrawlOutput {
            records: state.records,
            schema: state.schema,
            stats: state.stats,
        })
    }

    async fn paginate(&self, list_page: &mut B::Page, start_url: &str) -> Result<CrawlState, CrawlError> {
        list_page
            .goto(start_url)
            .await
            .map_err(|source| CrawlError::ListingUnavailable {
                url: start_url.to_string(),
                source,
            })?;

        let mut state = CrawlState::default();
        while let CrawlPhase::Fetching(page) = state.phase {
            state.phase = self.fetch_page(list_page, page, &mut state).await?;
        }
        Ok(state)
    }

    /// Process listing page `page` and decide the next phase.
    async fn fetch_page(
        &self,
        list_page: &mut B::Page,
        page: u32,
        state: &mut CrawlState,
    ) -> Result<CrawlPhase, CrawlError> {
        let (html, page_url) = match self.read_listing(list_page).await {
            Ok(loaded) => loaded,
            Err(source) if page == 1 => {
                return Err(CrawlError::ListingUnavailable {
                    url: list_page.current_url().unwrap_or_default(),
                    source,
                });
            }
            Err(e) => {
                warn!("Page {} never became ready ({}); treating it as the end", page, e);
                return Ok(CrawlPhase::Done);
            }
        };

        let previews = parse_listing_page(&html, page_url.as_deref(), &self.selectors);
        info!("Scraping page {} ({} items)", page, previews.len());

        let failures_before = state.stats.detail_failures;
        let records = self.expand_all(previews, &mut state.stats).await;
        state.stats.pages += 1;
        state.absorb(records);

        debug!(
            "Page {}: {} detail failures, {} records so far, {} columns",
            page,
            state.stats.detail_failures - failures_before,
            state.records.len(),
            state.schema.len()
        );

        self.advance(list_page, page).await
    }

    async fn read_listing(&self, list_page: &B::Page) -> Result<(String, Option<String>), BrowserError> {
        let wait = Duration::from_millis(self.config.listing_timeout_ms);
        list_page
            .wait_for_selector(&self.selectors.raw.listing_ready, wait)
            .await?;
        let html = list_page.content().await?;
        Ok((html, list_page.current_url()))
    }

    async fn advance(&self, list_page: &mut B::Page, page: u32) -> Result<CrawlPhase, CrawlError> {
        let next = &self.selectors.raw.next_page;

        match list_page.exists(next).await {
            Ok(false) => Ok(CrawlPhase::Done),
            Ok(true) if page >= self.config.max_pages => {
                warn!("Reached page limit ({}), stopping", self.config.max_pages);
                Ok(CrawlPhase::Done)
            }
            Ok(true) => match list_page.click(next).await {
                Ok(()) => Ok(CrawlPhase::Fetching(page + 1)),
                Err(e) => {
                    warn!("Could not open page {}: {}; stopping", page + 1, e);
                    Ok(CrawlPhase::Done)
                }
            },
            Err(e) => {
                warn!("Next-page lookup failed on page {}: {}; stopping", page, e);
                Ok(CrawlPhase::Done)
            }
        }
    }

    /// Expand every preview of one page concurrently; output keeps preview order.
    async fn expand_all(&self, previews: Vec<PreviewItem>, stats: &mut CrawlStats) -> Vec<ArticleRecord> {
        let sem = Arc::new(Semaphore::new(self.config.detail_concurrency.max(1)));
        let timeout = Duration::from_millis(self.config.detail_timeout_ms);
        let mut pending = Vec::with_capacity(previews.len());

        stats.items += previews.len();

        for preview in previews {
            let url = match preview.reference_url.clone() {
                Some(url) if !is_terminal_file(Some(&url)) => url,
                Some(_) => {
                    stats.terminal_files += 1;
                    pending.push(Pending::Ready(preview.into()));
                    continue;
                }
                None => {
                    pending.push(Pending::Ready(preview.into()));
                    continue;
                }
            };

            stats.detail_fetches += 1;
            let browser = Arc::clone(&self.browser);
            let selectors = Arc::clone(&self.selectors);
            let sem = Arc::clone(&sem);
            let task_preview = preview.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|e| BrowserError::Open(e.to_string()))?;
                fetch_detail(&*browser, &selectors, task_preview, &url, timeout).await
            });

            pending.push(Pending::Spawned { preview, handle });
        }

        let mut records = Vec::with_capacity(pending.len());
        for slot in pending {
            let record = match slot {
                Pending::Ready(record) => record,
                Pending::Spawned { preview, handle } => match handle.await {
                    Ok(Ok(record)) => record,
                    Ok(Err(e)) => {
                        warn!("{}: {}; keeping preview", preview.reference_url.as_deref().unwrap_or("?"), e);
                        stats.detail_failures += 1;
                        preview.into()
                    }
                    Err(e) => {
                        error!("Task panic for {:?}: {}", preview.reference_url, e);
                        stats.detail_failures += 1;
                        preview.into()
                    }
                },
            };
            records.push(record);
        }
        records
    }
}

/// Load one detail page in its own tab and merge it over the preview.
/// The tab is closed on every path.
async fn fetch_detail<B: Browser>(
    browser: &B,
    selectors: &Selectors,
    preview: PreviewItem,
    url: &str,
    timeout: Duration,
) -> Result<ArticleRecord, BrowserError> {
    let mut page = browser.new_page().await?;
    let loaded = load_detail(&mut page, selectors, url, timeout).await;
    if let Err(e) = page.close().await {
        debug!("closing {}: {}", url, e);
    }
    let (html, final_url) = loaded?;

    let mut record = ArticleRecord::from(preview).with_detail(parse_detail_page(&html, selectors));
    record.redirected_url = final_url.filter(|u| u != url);
    Ok(record)
}

async fn load_detail<P: Page>(
    page: &mut P,
    selectors: &Selectors,
    url: &str,
    timeout: Duration,
) -> Result<(String, Option<String>), BrowserError> {
    page.goto(url).await?;
    page.wait_for_selector(&selectors.raw.detail_ready, timeout).await?;
    let html = page.content().await?;
    Ok((html, page.current_url()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, authors: &[&str]) -> ArticleRecord {
        ArticleRecord {
            reference_url: Some(url.into()),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_state_starts_on_first_page() {
        let state = CrawlState::default();
        assert_eq!(state.phase, CrawlPhase::Fetching(1));
        assert!(state.records.is_empty());
        assert!(state.schema.is_empty());
    }

    #[test]
    fn test_absorb_grows_schema_to_widest_record() {
        let mut state = CrawlState::default();
        state.absorb(vec![record("a", &["X"]), record("b", &[])]);
        state.absorb(vec![record("c", &["X", "Y", "Z"])]);

        assert_eq!(state.records.len(), 3);
        assert_eq!(state.records[2].reference_url.as_deref(), Some("c"));
        assert_eq!(
            state.schema.names(),
            ["referenceUrl", "author1", "author2", "author3"]
        );
    }
}

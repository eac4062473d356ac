//! Pipeline orchestrator: ties crawler → table output → file downloads together.
//!
//! `run()` is the normal entry point:
//!   1. Crawl the listing from `SOURCE_START_URL`, expanding each article
//!   2. Write every record to `{TARGET_DIR}/{SOURCE_NAME}.csv`, columns in
//!      first-seen order
//!   3. Download entries that link straight to files into
//!      `{TARGET_DIR}/{SOURCE_NAME}/files/`
//!
//! `run_with()` does the same against any [`Browser`], which is how the
//! integration tests drive it.

use crate::browser::http::build_client;
use crate::browser::{Browser, HttpBrowser};
use crate::config::AppConfig;
use crate::downloader::{DownloadReport, download_files, file_urls};
use crate::scraper::Crawler;
use crate::scraper::parsers::Selectors;
use crate::storage::{assemble, write_table};
use crate::utils::Timer;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub skip_downloads: bool,
}

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, options: &RunOptions) -> Result<PipelineStats> {
        let browser = Arc::new(
            HttpBrowser::new(&self.config.http).context("Failed to build page loader")?,
        );

        let client = if options.skip_downloads {
            None
        } else {
            Some(build_client(&self.config.http)?)
        };

        self.run_with(browser, client.as_ref()).await
    }

    /// Crawl with `browser`, write the CSV, then download files when a
    /// `download_client` is given.
    pub async fn run_with<B: Browser>(
        &self,
        browser: Arc<B>,
        download_client: Option<&reqwest::Client>,
    ) -> Result<PipelineStats> {
        let source = &self.config.source;

        std::fs::create_dir_all(&source.target_dir)
            .with_context(|| format!("Could not create dir {:?}", source.target_dir))?;

        let selectors = Selectors::compile(&self.config.selectors)
            .context("Invalid selector configuration")?;

        // ── 1. Crawl ──────────────────────────────────────────────────────────
        info!("=== Step 1: Crawling {} ({}) ===", source.name, source.start_url);
        let output = {
            let _t = Timer::start(format!("Crawl of {}", source.start_url));
            Crawler::new(browser, selectors, &self.config.crawl)
                .crawl(&source.start_url)
                .await
                .context("Crawl failed")?
        };
        let crawl = output.stats;

        // ── 2. Table ──────────────────────────────────────────────────────────
        info!("=== Step 2: Writing table ===");
        let table = assemble(output.records, output.schema);
        let csv_path = source.output_csv();
        write_table(&csv_path, &table)?;

        // ── 3. Files ──────────────────────────────────────────────────────────
        let downloads = match download_client {
            Some(client) => {
                let urls = file_urls(&table.records);
                info!("=== Step 3: Downloading {} files ===", urls.len());
                download_files(client, &urls, &source.files_dir()).await
            }
            None => {
                info!("Skipping file downloads");
                DownloadReport::default()
            }
        };

        let stats = PipelineStats {
            pages: crawl.pages,
            articles: table.records.len(),
            columns: table.columns.len(),
            detail_failures: crawl.detail_failures,
            terminal_files: crawl.terminal_files,
            downloads,
            output: csv_path,
        };

        info!(
            "=== Done: {} pages | {} articles | {} columns | {} detail failures | {}/{} files ===",
            stats.pages,
            stats.articles,
            stats.columns,
            stats.detail_failures,
            stats.downloads.succeeded,
            stats.downloads.succeeded + stats.downloads.failed,
        );

        Ok(stats)
    }
}

#[derive(Debug)]
pub struct PipelineStats {
    pub pages: u32,
    pub articles: usize,
    pub columns: usize,
    pub detail_failures: usize,
    pub terminal_files: usize,
    pub downloads: DownloadReport,
    pub output: PathBuf,
}

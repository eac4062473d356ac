//! Fetches the files that listing entries link to directly.

use crate::models::ArticleRecord;
use crate::scraper::classify::is_terminal_file;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Reference URLs of every record that points straight at a file.
pub fn file_urls(records: &[ArticleRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.reference_url.as_deref())
        .filter(|url| is_terminal_file(Some(*url)))
        .map(str::to_string)
        .collect()
}

/// File name for a download: last path segment, or `file`.
pub fn destination_name(url: &str) -> String {
    let from_path = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.next_back().map(str::to_string))
        })
        .unwrap_or_else(|| url.rsplit('/').next().unwrap_or_default().to_string());

    if from_path.is_empty() { "file".to_string() } else { from_path }
}

/// Download every URL into `dest_dir` one after another.
/// A failed file is counted and skipped; nothing here aborts the batch.
pub async fn download_files(client: &reqwest::Client, urls: &[String], dest_dir: &Path) -> DownloadReport {
    let mut report = DownloadReport::default();
    if urls.is_empty() {
        return report;
    }

    info!("Downloading {} files into {:?}", urls.len(), dest_dir);

    for url in urls {
        match download_file(client, url, dest_dir).await {
            Ok(path) => {
                debug!("{} -> {:?}", url, path);
                report.succeeded += 1;
            }
            Err(e) => {
                warn!("{}: {:#}", url, e);
                report.failed += 1;
            }
        }
    }

    if report.failed == 0 {
        info!("Downloaded {} files.", report.succeeded);
    } else {
        warn!(
            "Downloaded {} files. Failed to download {} files.",
            report.succeeded, report.failed
        );
    }
    report
}

pub async fn download_file(client: &reqwest::Client, url: &str, dest_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("Could not create dir {:?}", dest_dir))?;

    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {}", url))?;

    if resp.status() != reqwest::StatusCode::OK {
        bail!("HTTP {}", resp.status());
    }

    let bytes = resp.bytes().await.context("Failed to read response body")?;
    let path = dest_dir.join(destination_name(url));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Could not write {:?}", path))?;
    Ok(path)
}

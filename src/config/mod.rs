use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SOURCE_NAME_VAR: &str = "SOURCE_NAME";
pub const SOURCE_START_URL_VAR: &str = "SOURCE_START_URL";
pub const TARGET_DIR_VAR: &str = "TARGET_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not defined in the environment or .env file")]
    Missing(&'static str),

    #[error("crawl.{field} must be at least 1")]
    ZeroLimit { field: &'static str },

    #[error(transparent)]
    Load(#[from] ::config::ConfigError),
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub crawl: CrawlConfig,
    pub http: HttpConfig,
    pub selectors: SelectorConfig,
}

/// The site being crawled and where results go. All three are required.
#[derive(Debug, Clone, Serialize)]
pub struct SourceConfig {
    pub name: String,
    pub start_url: String,
    pub target_dir: PathBuf,
}

impl SourceConfig {
    pub fn output_csv(&self) -> PathBuf {
        self.target_dir.join(format!("{}.csv", self.name))
    }

    pub fn files_dir(&self) -> PathBuf {
        self.target_dir.join(&self.name).join("files")
    }
}

/// Crawl behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    #[serde(default = "default_detail_timeout_ms")]
    pub detail_timeout_ms: u64,

    #[serde(default = "default_listing_timeout_ms")]
    pub listing_timeout_ms: u64,

    #[serde(default = "default_detail_concurrency")]
    pub detail_concurrency: usize,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

/// HTTP client settings for page loads and file downloads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// CSS selectors describing the site's markup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectorConfig {
    #[serde(default = "default_listing_ready")]
    pub listing_ready: String,
    #[serde(default = "default_listing_item")]
    pub listing_item: String,
    #[serde(default = "default_item_summary")]
    pub item_summary: String,
    #[serde(default = "default_item_summary_fallback")]
    pub item_summary_fallback: String,
    #[serde(default = "default_item_link")]
    pub item_link: String,
    #[serde(default = "default_item_date")]
    pub item_date: String,
    #[serde(default = "default_next_page")]
    pub next_page: String,

    #[serde(default = "default_detail_ready")]
    pub detail_ready: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_title_meta")]
    pub title_meta: String,
    #[serde(default = "default_date")]
    pub date: String,
    #[serde(default = "default_byline_date")]
    pub byline_date: String,
    #[serde(default = "default_byline")]
    pub byline: String,
    #[serde(default = "default_related_attorney")]
    pub related_attorney: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_detail_timeout_ms() -> u64 {
    5_000
}
fn default_listing_timeout_ms() -> u64 {
    30_000
}
fn default_detail_concurrency() -> usize {
    8
}
fn default_max_pages() -> u32 {
    500
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    250
}
fn default_jitter_ms() -> u64 {
    250
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "article-crawler/0.1 (archival crawl)".to_string()
}
fn default_listing_ready() -> String {
    ".pagination-fld".into()
}
fn default_listing_item() -> String {
    ".news-block".into()
}
fn default_item_summary() -> String {
    "p".into()
}
fn default_item_summary_fallback() -> String {
    "h3".into()
}
fn default_item_link() -> String {
    ".read-more".into()
}
fn default_item_date() -> String {
    "time".into()
}
fn default_next_page() -> String {
    ".nextpostslink".into()
}
fn default_detail_ready() -> String {
    ".article-details".into()
}
fn default_title() -> String {
    ".news-block header h1".into()
}
fn default_title_meta() -> String {
    r#"head > meta[name="og:title"]"#.into()
}
fn default_date() -> String {
    ".news-block header time".into()
}
fn default_byline_date() -> String {
    ".news-block .about-post".into()
}
fn default_byline() -> String {
    ".news-block header .about-post".into()
}
fn default_related_attorney() -> String {
    ".news-block .related-attorneys .att-info strong".into()
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            detail_timeout_ms: default_detail_timeout_ms(),
            listing_timeout_ms: default_listing_timeout_ms(),
            detail_concurrency: default_detail_concurrency(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_ready: default_listing_ready(),
            listing_item: default_listing_item(),
            item_summary: default_item_summary(),
            item_summary_fallback: default_item_summary_fallback(),
            item_link: default_item_link(),
            item_date: default_item_date(),
            next_page: default_next_page(),
            detail_ready: default_detail_ready(),
            title: default_title(),
            title_meta: default_title_meta(),
            date: default_date(),
            byline_date: default_byline_date(),
            byline: default_byline(),
            related_attorney: default_related_attorney(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

/// Tuning sections; every field has a default.
#[derive(Debug, Default, Deserialize)]
struct Tuning {
    #[serde(default)]
    crawl: CrawlConfig,
    #[serde(default)]
    http: HttpConfig,
    #[serde(default)]
    selectors: SelectorConfig,
}

impl AppConfig {
    /// Load `.env`, optional TOML files and `CRAWLER__*` overrides, then the
    /// required source variables from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::build(Path::new("config"), |key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] with an explicit config directory and
    /// variable lookup, minus the `.env` step.
    pub fn build<F>(config_dir: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = ::config::Config::builder()
            .add_source(
                ::config::File::from(config_dir.join("default"))
                    .required(false)
                    .format(::config::FileFormat::Toml),
            )
            .add_source(
                ::config::File::from(config_dir.join("local"))
                    .required(false)
                    .format(::config::FileFormat::Toml),
            )
            .add_source(
                ::config::Environment::with_prefix("CRAWLER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let tuning: Tuning = cfg.try_deserialize()?;
        if tuning.crawl.max_pages == 0 {
            return Err(ConfigError::ZeroLimit { field: "max_pages" });
        }

        let required = |var: &'static str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        Ok(Self {
            source: SourceConfig {
                name: required(SOURCE_NAME_VAR)?,
                start_url: required(SOURCE_START_URL_VAR)?,
                target_dir: PathBuf::from(required(TARGET_DIR_VAR)?),
            },
            crawl: tuning.crawl,
            http: tuning.http,
            selectors: tuning.selectors,
        })
    }
}

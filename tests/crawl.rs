use anyhow::Result;
use article_crawler::browser::{Browser, BrowserError, Page};
use article_crawler::config::{
    AppConfig, CrawlConfig, SOURCE_NAME_VAR, SOURCE_START_URL_VAR, SelectorConfig, TARGET_DIR_VAR,
};
use article_crawler::models::{ArticleRecord, PreviewItem};
use article_crawler::pipeline::Pipeline;
use article_crawler::scraper::parsers::Selectors;
use article_crawler::scraper::{CrawlError, Crawler};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

const START: &str = "https://site.test/news/";

// ── Fake site ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Doc {
    html: String,
    final_url: Option<String>,
    delay: Duration,
}

/// Pages the fake browser can load, plus what happened during the crawl.
#[derive(Default)]
struct Site {
    docs: HashMap<String, Doc>,
    visits: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    open_pages: AtomicUsize,
}

impl Site {
    fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.docs.insert(
            url.to_string(),
            Doc {
                html: html.into(),
                final_url: None,
                delay: Duration::ZERO,
            },
        );
        self
    }

    fn slow_page(mut self, url: &str, html: impl Into<String>, delay_ms: u64) -> Self {
        self = self.page(url, html);
        if let Some(doc) = self.docs.get_mut(url) {
            doc.delay = Duration::from_millis(delay_ms);
        }
        self
    }

    fn redirect(mut self, from: &str, to: &str, html: impl Into<String>) -> Self {
        self = self.page(from, html);
        if let Some(doc) = self.docs.get_mut(from) {
            doc.final_url = Some(to.to_string());
        }
        self
    }

    fn visited(&self, url: &str) -> bool {
        self.visits.lock().unwrap().iter().any(|v| v == url)
    }

    fn open_pages(&self) -> usize {
        self.open_pages.load(Ordering::SeqCst)
    }
}

struct FakeBrowser {
    site: Arc<Site>,
}

struct FakePage {
    site: Arc<Site>,
    url: Option<String>,
    html: Option<String>,
}

#[async_trait]
impl Browser for FakeBrowser {
    type Page = FakePage;

    async fn new_page(&self) -> Result<FakePage, BrowserError> {
        self.site.open_pages.fetch_add(1, Ordering::SeqCst);
        Ok(FakePage {
            site: Arc::clone(&self.site),
            url: None,
            html: None,
        })
    }
}

fn select_first<'a>(html: &'a Html, selector: &str) -> Result<Option<scraper::ElementRef<'a>>, BrowserError> {
    let sel = Selector::parse(selector).map_err(|_| BrowserError::InvalidSelector(selector.into()))?;
    Ok(html.select(&sel).next())
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.site.visits.lock().unwrap().push(url.to_string());
        let doc = self
            .site
            .docs
            .get(url)
            .cloned()
            .ok_or_else(|| BrowserError::Navigation {
                url: url.to_string(),
                reason: "connection refused".into(),
            })?;

        tokio::time::sleep(doc.delay).await;
        self.site.completed.lock().unwrap().push(url.to_string());

        self.url = Some(doc.final_url.unwrap_or_else(|| url.to_string()));
        self.html = Some(doc.html);
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        if self.exists(selector).await? {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            })
        }
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.html.clone().ok_or(BrowserError::NotLoaded)
    }

    fn current_url(&self) -> Option<String> {
        self.url.clone()
    }

    async fn exists(&self, selector: &str) -> Result<bool, BrowserError> {
        let html = Html::parse_document(self.html.as_deref().ok_or(BrowserError::NotLoaded)?);
        Ok(select_first(&html, selector)?.is_some())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let target = {
            let html = Html::parse_document(self.html.as_deref().ok_or(BrowserError::NotLoaded)?);
            let href = select_first(&html, selector)?
                .and_then(|el| el.value().attr("href"))
                .ok_or_else(|| BrowserError::MissingElement(selector.to_string()))?
                .to_string();
            let base = Url::parse(self.url.as_deref().ok_or(BrowserError::NotLoaded)?)
                .map_err(|e| BrowserError::Open(e.to_string()))?;
            base.join(&href)
                .map_err(|e| BrowserError::Open(e.to_string()))?
                .to_string()
        };
        self.goto(&target).await
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.site.open_pages.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Markup builders ───────────────────────────────────────────────────────────

/// A listing page with `(summary, href)` items and an optional next link.
fn listing(items: &[(&str, &str)], next: Option<&str>) -> String {
    let blocks: String = items
        .iter()
        .map(|(summary, href)| {
            format!(
                r#"<div class="news-block"><p>{summary}</p><a class="read-more" href="{href}">Read more</a></div>"#
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a class="nextpostslink" href="{href}">»</a>"#))
        .unwrap_or_default();
    format!(r#"<html><body>{blocks}<div class="pagination-fld">{next}</div></body></html>"#)
}

fn article(title: &str, byline: &str, body: &str) -> String {
    format!(
        r#"<html><body><div class="news-block"><header><h1>{title}</h1>
        <div class="about-post">{byline}</div></header>
        <div class="article-details">{body}</div></div></body></html>"#
    )
}

fn crawler(site: Site, config: CrawlConfig) -> (Arc<Site>, Crawler<FakeBrowser>) {
    let site = Arc::new(site);
    let browser = FakeBrowser {
        site: Arc::clone(&site),
    };
    let selectors = Selectors::compile(&SelectorConfig::default()).unwrap();
    (site, Crawler::new(Arc::new(browser), selectors, &config))
}

fn fast_config() -> CrawlConfig {
    CrawlConfig {
        detail_timeout_ms: 50,
        listing_timeout_ms: 50,
        ..CrawlConfig::default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn records_keep_listing_order_despite_completion_order() -> Result<()> {
    let site = Site::default()
        .page(
            START,
            listing(
                &[("A", "/news/a/"), ("B", "/news/b/"), ("C", "/news/c/")],
                None,
            ),
        )
        .slow_page("https://site.test/news/a/", article("Alpha", "", "a"), 80)
        .slow_page("https://site.test/news/b/", article("Beta", "", "b"), 40)
        .page("https://site.test/news/c/", article("Gamma", "", "c"));

    let (site, crawler) = crawler(site, fast_config());
    let output = crawler.crawl(START).await?;

    let titles: Vec<_> = output.records.iter().map(|r| r.title.as_deref()).collect();
    assert_eq!(titles, vec![Some("Alpha"), Some("Beta"), Some("Gamma")]);

    let completed = site.completed.lock().unwrap().clone();
    let pos = |u: &str| completed.iter().position(|c| c == u).unwrap();
    assert!(pos("https://site.test/news/c/") < pos("https://site.test/news/a/"));

    assert_eq!(site.open_pages(), 0);
    Ok(())
}

#[tokio::test]
async fn timed_out_detail_keeps_preview_only() -> Result<()> {
    let site = Site::default()
        .page(START, listing(&[("S1", "https://x/art1")], None))
        // Loads, but the article container never appears.
        .page("https://x/art1", "<html><body><p>loading…</p></body></html>");

    let (site, crawler) = crawler(site, fast_config());
    let output = crawler.crawl(START).await?;

    let expected = ArticleRecord::from(PreviewItem {
        reference_url: Some("https://x/art1".into()),
        summary: Some("S1".into()),
        published_date: None,
    });
    assert_eq!(output.records, vec![expected]);
    assert_eq!(output.schema.names(), ["referenceUrl", "summary"]);
    assert_eq!(output.stats.detail_failures, 1);
    assert_eq!(site.open_pages(), 0);
    Ok(())
}

#[tokio::test]
async fn navigation_failure_keeps_preview_and_continues() -> Result<()> {
    let site = Site::default()
        .page(START, listing(&[("Gone", "/news/gone/"), ("Here", "/news/here/")], None))
        .page("https://site.test/news/here/", article("Here", "", "body"));

    let (_, crawler) = crawler(site, fast_config());
    let output = crawler.crawl(START).await?;

    assert_eq!(output.records.len(), 2);
    assert_eq!(output.records[0].title, None);
    assert_eq!(output.records[0].summary.as_deref(), Some("Gone"));
    assert_eq!(output.records[1].title.as_deref(), Some("Here"));
    assert_eq!(output.stats.detail_failures, 1);
    Ok(())
}

#[tokio::test]
async fn file_links_are_never_fetched() -> Result<()> {
    let site = Site::default().page(
        START,
        listing(&[("Brief", "https://cdn.site.test/files/Brief.PDF")], None),
    );

    let (site, crawler) = crawler(site, fast_config());
    let output = crawler.crawl(START).await?;

    assert!(!site.visited("https://cdn.site.test/files/Brief.PDF"));
    assert_eq!(
        output.records,
        vec![ArticleRecord {
            reference_url: Some("https://cdn.site.test/files/Brief.PDF".into()),
            summary: Some("Brief".into()),
            ..Default::default()
        }]
    );
    assert_eq!(output.stats.terminal_files, 1);
    assert_eq!(output.stats.detail_fetches, 0);
    Ok(())
}

#[tokio::test]
async fn follows_next_links_until_none_remain() -> Result<()> {
    let site = Site::default()
        .page(START, listing(&[("One", "/news/1/")], Some("/news/page/2/")))
        .page(
            "https://site.test/news/page/2/",
            listing(&[("Two", "/news/2/")], None),
        )
        .page("https://site.test/news/1/", article("One", "", "1"))
        .page("https://site.test/news/2/", article("Two", "", "2"));

    let (_, crawler) = crawler(site, fast_config());
    let output = crawler.crawl(START).await?;

    assert_eq!(output.stats.pages, 2);
    let titles: Vec<_> = output.records.iter().map(|r| r.title.as_deref()).collect();
    assert_eq!(titles, vec![Some("One"), Some("Two")]);
    Ok(())
}

#[tokio::test]
async fn unreachable_next_page_ends_crawl_with_records_kept() -> Result<()> {
    let site = Site::default()
        .page(START, listing(&[("One", "/news/1/")], Some("/news/page/gone/")))
        .page("https://site.test/news/1/", article("One", "", "1"));

    let (site, crawler) = crawler(site, fast_config());
    let output = crawler.crawl(START).await?;

    assert!(site.visited("https://site.test/news/page/gone/"));
    assert_eq!(output.stats.pages, 1);
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].title.as_deref(), Some("One"));
    assert_eq!(site.open_pages(), 0);
    Ok(())
}

#[tokio::test]
async fn page_ceiling_stops_a_looping_next_link() -> Result<()> {
    let site = Site::default().page(START, listing(&[], Some(START)));

    let config = CrawlConfig {
        max_pages: 3,
        ..fast_config()
    };
    let (_, crawler) = crawler(site, config);
    let output = crawler.crawl(START).await?;

    assert_eq!(output.stats.pages, 3);
    assert!(output.records.is_empty());
    Ok(())
}

#[tokio::test]
async fn unready_listing_is_fatal_only_on_the_first_page() -> Result<()> {
    let no_marker = "<html><body><div class=\"news-block\"></div></body></html>";

    let site = Site::default().page(START, no_marker);
    let (site, first) = crawler(site, fast_config());
    let err = first.crawl(START).await.unwrap_err();
    assert!(matches!(
        err,
        CrawlError::ListingUnavailable {
            source: BrowserError::Timeout { .. },
            ..
        }
    ));
    assert_eq!(site.open_pages(), 0);

    let site = Site::default()
        .page(START, listing(&[("Kept", "/files/kept.zip")], Some("/news/page/2/")))
        .page("https://site.test/news/page/2/", no_marker);
    let (_, later) = crawler(site, fast_config());
    let output = later.crawl(START).await?;
    assert_eq!(output.stats.pages, 1);
    assert_eq!(output.records.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unreachable_start_url_is_fatal() {
    let (_, crawler) = crawler(Site::default(), fast_config());
    let err = crawler.crawl(START).await.unwrap_err();
    assert!(matches!(
        err,
        CrawlError::ListingUnavailable {
            source: BrowserError::Navigation { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn redirected_detail_records_final_url() -> Result<()> {
    let site = Site::default()
        .page(START, listing(&[("Moved", "/news/old/")], None))
        .redirect(
            "https://site.test/news/old/",
            "https://site.test/news/new/",
            article("Moved", "", "body"),
        );

    let (_, crawler) = crawler(site, fast_config());
    let output = crawler.crawl(START).await?;

    assert_eq!(
        output.records[0].redirected_url.as_deref(),
        Some("https://site.test/news/new/")
    );
    assert!(output.schema.contains("redirectedUrl"));
    Ok(())
}

// ── End to end through the pipeline ───────────────────────────────────────────

fn app_config(target_dir: &Path) -> AppConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        (SOURCE_NAME_VAR, "firm-news".to_string()),
        (SOURCE_START_URL_VAR, START.to_string()),
        (TARGET_DIR_VAR, target_dir.display().to_string()),
    ]);
    let mut cfg = AppConfig::build(&target_dir.join("config"), |k| vars.get(k).cloned()).unwrap();
    cfg.crawl = fast_config();
    cfg
}

#[tokio::test]
async fn pipeline_writes_widest_schema_with_empty_cells() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let site = Site::default()
        .page(
            START,
            listing(&[("Two authors", "/news/pair/"), ("Anonymous", "/news/anon/")], None),
        )
        .page(
            "https://site.test/news/pair/",
            article("Pair", "Posted By Ann Lee and Bob Ray on May 2, 2023", "x"),
        )
        .page("https://site.test/news/anon/", article("Anon", "", "y"));

    let stats = Pipeline::new(app_config(dir.path()))
        .run_with(
            Arc::new(FakeBrowser {
                site: Arc::new(site),
            }),
            None,
        )
        .await?;

    assert_eq!(stats.articles, 2);
    assert_eq!(stats.output, dir.path().join("firm-news.csv"));

    let mut reader = csv::Reader::from_path(&stats.output)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    assert_eq!(
        headers,
        vec![
            "referenceUrl",
            "summary",
            "publishedDate",
            "title",
            "content",
            "author1",
            "author2"
        ]
    );

    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    assert_eq!(&rows[0][5], "Ann Lee");
    assert_eq!(&rows[0][6], "Bob Ray");
    assert_eq!(&rows[1][3], "Anon");
    assert_eq!(&rows[1][5], "");
    assert_eq!(&rows[1][6], "");

    let raw = std::fs::read_to_string(&stats.output)?;
    assert!(raw.lines().all(|line| line.starts_with('"')));
    Ok(())
}

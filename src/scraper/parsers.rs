use crate::config::SelectorConfig;
use crate::models::{DetailFields, PreviewItem};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use super::cleaner::{byline_date, byline_names, format_paragraphs, normalize, normalize_opt, split_authors};

#[derive(Debug, Error)]
#[error("invalid `{field}` selector `{selector}`")]
pub struct SelectorError {
    pub field: &'static str,
    pub selector: String,
}

/// [`SelectorConfig`] parsed once up front.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub raw: SelectorConfig,
    listing_item: Selector,
    item_summary: Selector,
    item_summary_fallback: Selector,
    item_link: Selector,
    item_date: Selector,
    detail_body: Selector,
    title: Selector,
    title_meta: Selector,
    date: Selector,
    byline_date: Selector,
    byline: Selector,
    related_attorney: Selector,
}

fn compile(field: &'static str, selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|_| SelectorError {
        field,
        selector: selector.to_string(),
    })
}

impl Selectors {
    pub fn compile(cfg: &SelectorConfig) -> Result<Self, SelectorError> {
        // Page-level selectors go straight to the browser; check them here too.
        compile("listing_ready", &cfg.listing_ready)?;
        compile("next_page", &cfg.next_page)?;

        Ok(Self {
            listing_item: compile("listing_item", &cfg.listing_item)?,
            item_summary: compile("item_summary", &cfg.item_summary)?,
            item_summary_fallback: compile("item_summary_fallback", &cfg.item_summary_fallback)?,
            item_link: compile("item_link", &cfg.item_link)?,
            item_date: compile("item_date", &cfg.item_date)?,
            detail_body: compile("detail_ready", &cfg.detail_ready)?,
            title: compile("title", &cfg.title)?,
            title_meta: compile("title_meta", &cfg.title_meta)?,
            date: compile("date", &cfg.date)?,
            byline_date: compile("byline_date", &cfg.byline_date)?,
            byline: compile("byline", &cfg.byline)?,
            related_attorney: compile("related_attorney", &cfg.related_attorney)?,
            raw: cfg.clone(),
        })
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

// ── Listing page ──────────────────────────────────────────────────────────────

/// One preview per listing item, in document order.
/// Relative links are resolved against `page_url`.
pub fn parse_listing_page(html: &str, page_url: Option<&str>, sel: &Selectors) -> Vec<PreviewItem> {
    let doc = Html::parse_document(html);
    let base = page_url.and_then(|u| Url::parse(u).ok());

    doc.select(&sel.listing_item)
        .map(|block| {
            let first_text = |s: &Selector| block.select(s).next().map(|el| normalize(&text_of(el)));
            // A blank `p` defers to the `h3`.
            let summary = match first_text(&sel.item_summary) {
                Some(text) if !text.is_empty() => Some(text),
                blank => first_text(&sel.item_summary_fallback).or(blank),
            };

            let reference_url = block
                .select(&sel.item_link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| resolve(base.as_ref(), href));

            let published_date = block
                .select(&sel.item_date)
                .next()
                .and_then(|el| normalize_opt(&text_of(el)));

            PreviewItem {
                reference_url,
                summary,
                published_date,
            }
        })
        .collect()
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    let href = href.trim();
    match base.and_then(|b| b.join(href).ok()) {
        Some(abs) => abs.to_string(),
        None => href.to_string(),
    }
}

// ── Detail page ───────────────────────────────────────────────────────────────

pub fn parse_detail_page(html: &str, sel: &Selectors) -> DetailFields {
    let doc = Html::parse_document(html);

    let content = doc
        .select(&sel.detail_body)
        .next()
        .map(|el| format_paragraphs(&el.inner_html()));

    let title = doc
        .select(&sel.title)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            doc.select(&sel.title_meta)
                .next()
                .and_then(|m| m.value().attr("content"))
                .map(str::to_string)
        })
        .map(|t| normalize(&t))
        .unwrap_or_default();

    let published_date = doc
        .select(&sel.date)
        .next()
        .and_then(|el| normalize_opt(&text_of(el)))
        .or_else(|| {
            doc.select(&sel.byline_date)
                .next()
                .and_then(|el| byline_date(&text_of(el)))
        });

    let authors = doc
        .select(&sel.byline)
        .next()
        .map(text_of)
        .and_then(|line| byline_names(&line).map(split_authors))
        .unwrap_or_default();

    let related_attorneys = doc
        .select(&sel.related_attorney)
        .map(|el| normalize(&text_of(el)))
        .collect();

    DetailFields {
        title,
        content,
        published_date,
        authors,
        related_attorneys,
    }
}

use std::collections::HashSet;

// ── Column names ──────────────────────────────────────────────────────────────

pub const REFERENCE_URL: &str = "referenceUrl";
pub const SUMMARY: &str = "summary";
pub const PUBLISHED_DATE: &str = "publishedDate";
pub const TITLE: &str = "title";
pub const CONTENT: &str = "content";
pub const REDIRECTED_URL: &str = "redirectedUrl";
pub const AUTHOR_PREFIX: &str = "author";
pub const RELATED_ATTORNEY_PREFIX: &str = "relatedAttorney";

// ── Preview (listing page) ────────────────────────────────────────────────────

/// One entry as shown on a listing page, before its detail page is visited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewItem {
    pub reference_url: Option<String>,
    pub summary: Option<String>,
    pub published_date: Option<String>,
}

// ── Detail page fields ────────────────────────────────────────────────────────

/// Everything pulled from a loaded detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub title: String,
    pub content: Option<String>,
    pub published_date: Option<String>,
    pub authors: Vec<String>,
    pub related_attorneys: Vec<String>,
}

// ── Article record ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleRecord {
    pub reference_url: Option<String>,
    pub summary: Option<String>,
    pub published_date: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub redirected_url: Option<String>,
    pub authors: Vec<String>,
    pub related_attorneys: Vec<String>,
}

impl From<PreviewItem> for ArticleRecord {
    fn from(preview: PreviewItem) -> Self {
        Self {
            reference_url: preview.reference_url,
            summary: preview.summary,
            published_date: preview.published_date,
            ..Default::default()
        }
    }
}

impl ArticleRecord {
    /// Layer detail-page fields over the preview-derived record.
    /// A date found on the detail page wins over the listing date.
    pub fn with_detail(mut self, detail: DetailFields) -> Self {
        self.title = Some(detail.title);
        self.content = detail.content;
        if detail.published_date.is_some() {
            self.published_date = detail.published_date;
        }
        self.authors = detail.authors;
        self.related_attorneys = detail.related_attorneys;
        self
    }

    /// Flat `(column, value)` view used for tabular output.
    /// Authors and related attorneys become numbered columns starting at 1.
    pub fn fields(&self) -> Vec<(String, &str)> {
        let scalars = [
            (REFERENCE_URL, &self.reference_url),
            (SUMMARY, &self.summary),
            (PUBLISHED_DATE, &self.published_date),
            (TITLE, &self.title),
            (CONTENT, &self.content),
            (REDIRECTED_URL, &self.redirected_url),
        ];

        let mut out: Vec<(String, &str)> = scalars
            .into_iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (name.to_string(), v)))
            .collect();

        out.extend(numbered(AUTHOR_PREFIX, &self.authors));
        out.extend(numbered(RELATED_ATTORNEY_PREFIX, &self.related_attorneys));
        out
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields().into_iter().map(|(name, _)| name).collect()
    }
}

fn numbered<'a>(prefix: &'a str, values: &'a [String]) -> impl Iterator<Item = (String, &'a str)> {
    values
        .iter()
        .enumerate()
        .map(move |(i, v)| (format!("{}{}", prefix, i + 1), v.as_str()))
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Insertion-ordered set of column names seen across all records.
/// Grows only; a name keeps the position it was first given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    names: Vec<String>,
    seen: HashSet<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every unseen name, in the order given.
    pub fn merge<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if self.seen.insert(name.clone()) {
                self.names.push(name);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn preview(url: &str, summary: &str) -> PreviewItem {
        PreviewItem {
            reference_url: Some(url.into()),
            summary: Some(summary.into()),
            published_date: None,
        }
    }

    #[test]
    fn test_preview_only_record_has_preview_fields() {
        let record = ArticleRecord::from(preview("https://x/art1", "S1"));
        assert_eq!(record.field_names(), vec![REFERENCE_URL, SUMMARY]);
    }

    #[test]
    fn test_fields_number_authors_and_attorneys() {
        let record = ArticleRecord::from(preview("https://x/a", "S")).with_detail(DetailFields {
            title: "T".into(),
            content: None,
            published_date: Some("May 1, 2023".into()),
            authors: vec!["Ann Lee".into(), "Bo Park".into()],
            related_attorneys: vec!["Cy Young".into()],
        });

        assert_eq!(
            record.field_names(),
            vec![
                "referenceUrl",
                "summary",
                "publishedDate",
                "title",
                "author1",
                "author2",
                "relatedAttorney1"
            ]
        );
        let fields = record.fields();
        assert_eq!(fields[4], ("author1".to_string(), "Ann Lee"));
        assert_eq!(fields[6], ("relatedAttorney1".to_string(), "Cy Young"));
    }

    #[test]
    fn test_detail_date_only_overrides_when_present() {
        let mut p = preview("https://x/a", "S");
        p.published_date = Some("Jan 2".into());
        let record = ArticleRecord::from(p).with_detail(DetailFields::default());
        assert_eq!(record.published_date.as_deref(), Some("Jan 2"));
        // Empty title still counts as a present field.
        assert_eq!(record.title.as_deref(), Some(""));
    }

    #[test]
    fn test_schema_merge_is_ordered_and_monotonic() {
        let mut schema = Schema::new();
        schema.merge(["referenceUrl", "summary"]);
        schema.merge(["summary", "title", "author1"]);
        let before = schema.names().to_vec();

        schema.merge(["author2", "referenceUrl"]);
        assert_eq!(schema.names()[..before.len()], before[..]);
        assert_eq!(
            schema.names(),
            ["referenceUrl", "summary", "title", "author1", "author2"]
        );

        schema.merge(Vec::<String>::new());
        assert_eq!(schema.len(), 5);
        assert!(schema.contains("author2"));
        assert!(!schema.contains("author3"));
    }
}

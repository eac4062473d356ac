use regex::Regex;
use std::sync::LazyLock;

// ── Text normalisation ────────────────────────────────────────────────────────

/// Clean scraped text. Total: never fails, whitespace-only input gives "".
///
/// Steps run in a fixed order: `&nbsp;` → space, drop newlines, collapse
/// whitespace runs, curly single quotes → `'`, curly double quotes → `"`, trim.
pub fn normalize(raw: &str) -> String {
    // Dropping newlines can join a split entity back together, so replace twice.
    let s = raw.replace("&nbsp;", " ").replace('\n', "").replace("&nbsp;", " ");
    let s = collapse_whitespace(&s);
    let s = s.replace(['\u{2018}', '\u{2019}'], "'");
    let s = s.replace(['\u{201C}', '\u{201D}'], "\"");
    s.trim().to_string()
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out
}

/// Normalise, mapping "" to `None`.
pub fn normalize_opt(raw: &str) -> Option<String> {
    let s = normalize(raw);
    if s.is_empty() { None } else { Some(s) }
}

// ── Article body ──────────────────────────────────────────────────────────────

static BR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid <br> pattern"));

/// Turn a `<br>`-separated body into paragraphs.
/// Bare text (and parts that open with an anchor) get wrapped in `<p>`,
/// parts that already open with a tag are kept as-is.
pub fn format_paragraphs(inner_html: &str) -> String {
    BR_TAG
        .split(inner_html)
        .map(normalize)
        .filter(|part| !part.is_empty())
        .map(|part| {
            if !part.starts_with('<') || part.starts_with("<a ") {
                format!("<p>{}</p>", part)
            } else {
                part
            }
        })
        .collect()
}

// ── Byline ────────────────────────────────────────────────────────────────────

// Leftmost "By ", greedy up to the last " on ".
static BYLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"By (.*) on ").expect("valid byline pattern"));

/// The names span of a "Posted By A, B and C on <date>" byline.
pub fn byline_names(byline: &str) -> Option<&str> {
    BYLINE
        .captures(byline)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// The date part of a byline: whatever follows the first " on ".
pub fn byline_date(byline: &str) -> Option<String> {
    byline.split(" on ").nth(1).and_then(normalize_opt)
}

/// Split "A, B and C" (or "A, B, and C") into names.
///
/// A `", "` does not split when it is followed by a name suffix
/// (see [`is_name_suffix`]), so "John Roe, Jr., Ann Lee" stays two names.
/// `", and "` is a single separator.
pub fn split_authors(names: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < names.len() {
        let rest = &names[i..];
        if rest.starts_with(", and ") {
            out.push(&names[start..i]);
            i += 6;
            start = i;
        } else if rest.starts_with(", ") && !is_name_suffix(&rest[2..]) {
            out.push(&names[start..i]);
            i += 2;
            start = i;
        } else if rest.starts_with(" and ") {
            out.push(&names[start..i]);
            i += 5;
            start = i;
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    out.push(&names[start..]);

    out.into_iter().filter_map(normalize_opt).collect()
}

/// True when `rest` opens with a two-character suffix token such as
/// "Jr.", "Sr." or "II": two word characters followed by `.`, `,` or the end.
pub fn is_name_suffix(rest: &str) -> bool {
    let mut chars = rest.chars();
    let (Some(a), Some(b)) = (chars.next(), chars.next()) else {
        return false;
    };
    if !(is_word_char(a) && is_word_char(b)) {
        return false;
    }
    matches!(chars.next(), None | Some('.') | Some(','))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// ── Tests ─────────────────────────────────────────────────────────────────────

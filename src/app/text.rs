use std::sync::LazyLock;

use regex::Regex;

static FOOTNOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]|\[.*?\]").expect("footnote pattern"));
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}\b").expect("year pattern"));
static FILM_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(фильм[^)]*\)").expect("film suffix pattern"));

/// Drops `[12]` / `[note]` footnote markers and collapses whitespace.
pub fn clean(input: &str) -> String {
    let stripped = FOOTNOTE_RE.replace_all(input, "");
    normalize_text(&stripped)
}

pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_footnote_ref(item: &str) -> bool {
    item.starts_with('[') && item.ends_with(']')
}

pub fn remove_refs(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .filter(|item| !is_footnote_ref(item))
        .collect()
}

pub fn extract_year(raw: &str) -> Option<String> {
    YEAR_RE.find(raw).map(|m| m.as_str().to_string())
}

/// Removes the `(фильм, 2001)` style disambiguation suffix from a page title.
pub fn strip_film_suffix(title: &str) -> String {
    FILM_SUFFIX_RE.replace_all(title, "").into_owned()
}

pub fn has_film_suffix(title: &str) -> bool {
    title.contains("(фильм")
}

pub fn with_year(query: &str, year: Option<&str>) -> String {
    match year {
        Some(year) => format!("{query} ({year})"),
        None => query.to_string(),
    }
}

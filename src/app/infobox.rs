use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::text::{
    clean, extract_year, has_film_suffix, normalize_text, remove_refs, strip_film_suffix,
};

pub const IMDB_LABEL: &str = "IMDb";
pub const GENRE_LABEL: &str = "Жанр";
pub const COUNTRY_LABEL: &str = "Стран";
pub const DIRECTOR_LABEL: &str = "Режиссёр";
/// Tried in order; the first label with a non-empty value decides the year.
pub const YEAR_LABELS: [&str; 4] = ["Год", "Дата выхода", "Первый показ", "Дата премьеры"];

static PANEL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.infobox").expect("panel selector"));
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("row selector"));
static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").expect("th selector"));
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("a selector"));
static SPAN_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("span selector"));
static IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("img selector"));
static MERGED_CELL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td[colspan=\"2\"]").expect("merged cell selector"));

// Most specific first: "ID 0211915" before "ID0211915".
static ID_SPACED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ID\s(\d+)").expect("spaced id pattern"));
static ID_JOINED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ID(\d+)").expect("joined id pattern"));

/// Row-oriented view over a movie page's info table.
///
/// Every lookup degrades to `None`/empty when the markup is missing, so callers
/// never have to distinguish "absent row" from "absent cell".
#[derive(Clone, Copy)]
pub struct InfoPanel<'a> {
    table: ElementRef<'a>,
}

impl<'a> InfoPanel<'a> {
    pub fn find(doc: &'a Html) -> Option<Self> {
        doc.select(&PANEL_SEL).next().map(|table| Self { table })
    }

    pub fn rows(&self) -> Vec<ElementRef<'a>> {
        self.table.select(&ROW_SEL).collect()
    }

    /// First header cell whose text contains `label`.
    pub fn label_cell(&self, label: &str) -> Option<ElementRef<'a>> {
        self.table
            .select(&TH_SEL)
            .find(|th| th.text().collect::<String>().contains(label))
    }

    /// The `td` following the matching header cell.
    pub fn value_cell(&self, label: &str) -> Option<ElementRef<'a>> {
        let header = self.label_cell(label)?;
        header
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "td")
    }

    pub fn links(cell: ElementRef<'_>) -> Vec<String> {
        cell.select(&LINK_SEL)
            .map(|a| normalize_text(&a.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// One entry per non-blank `span`, its text fragments joined with ", ".
    pub fn span_groups(cell: ElementRef<'_>) -> Vec<String> {
        cell.select(&SPAN_SEL)
            .filter_map(|span| {
                let parts = span
                    .text()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>();
                (!parts.is_empty()).then(|| parts.join(", "))
            })
            .collect()
    }

    pub fn first_link_target(cell: ElementRef<'_>) -> Option<String> {
        cell.select(&LINK_SEL)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.trim().to_string())
    }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<Vec<_>>().join(" ")
}

pub fn scalar(label: &str, panel: Option<&InfoPanel<'_>>) -> Option<String> {
    let cell = panel?.value_cell(label)?;
    Some(clean(&cell_text(cell)))
}

pub fn list_values(label: &str, panel: Option<&InfoPanel<'_>>) -> Vec<String> {
    let Some(cell) = panel.and_then(|p| p.value_cell(label)) else {
        return Vec::new();
    };

    let mut items = InfoPanel::links(cell);
    if items.is_empty() {
        items = InfoPanel::span_groups(cell);
    }
    remove_refs(items)
}

pub fn year(panel: Option<&InfoPanel<'_>>) -> Option<String> {
    let raw = YEAR_LABELS
        .iter()
        .filter_map(|label| scalar(label, panel))
        .find(|value| !value.is_empty())?;
    extract_year(&raw)
}

/// Link to the rating site's title page, recovered from the panel's `IMDb` row.
pub fn rating_site_link(panel: Option<&InfoPanel<'_>>, ratings_host: &str) -> Option<String> {
    let cell = panel?.value_cell(IMDB_LABEL)?;
    let href = InfoPanel::first_link_target(cell)?;

    let title_prefix = format!("{ratings_host}/title/");
    if href.starts_with(&title_prefix) {
        return Some(href);
    }

    let text = cell_text(cell);
    let id = [&*ID_SPACED_RE, &*ID_JOINED_RE].iter().find_map(|re| {
        re.captures_iter(&text)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })?;
    Some(format!("{title_prefix}tt{id}/"))
}

/// Original-language title: the last span of a merged second row, or the
/// display title without its disambiguation suffix.
pub fn original_title(display_title: &str, panel: Option<&InfoPanel<'_>>) -> String {
    if let Some(title) = panel.and_then(second_row_title) {
        return title;
    }

    if has_film_suffix(display_title) {
        let stripped = strip_film_suffix(display_title);
        if !stripped.is_empty() {
            return stripped;
        }
    }
    display_title.to_string()
}

fn second_row_title(panel: &InfoPanel<'_>) -> Option<String> {
    let rows = panel.rows();
    let row = rows.get(1)?;
    let cell = row.select(&MERGED_CELL_SEL).next()?;

    // A header means a labelled row; an image means the poster cell.
    if row.select(&TH_SEL).next().is_some() || cell.select(&IMG_SEL).next().is_some() {
        return None;
    }

    let span = cell.select(&SPAN_SEL).last()?;
    let text = span
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<String>();
    (!text.is_empty()).then_some(text)
}

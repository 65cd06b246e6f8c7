use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::error::FetchError;
use super::fetch::HtmlSource;

/// A failed verification is retried this many times, each time with a fresh search.
const MAX_VERIFY_RETRIES: usize = 1;

static SEARCH_RESULT_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.ipc-metadata-list-summary-item__t").expect("search result selector")
});
static HOME_LOGO_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a#home_img_holder").expect("home logo selector"));
static SCORE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[data-testid=\"hero-rating-bar__aggregate-rating__score\"]")
        .expect("score selector")
});
static TITLE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/title/(tt\d+)").expect("title path pattern"));

/// Resolves a rating for a title query. `Ok(None)` means "no rating", not a failure.
#[async_trait]
pub trait RatingLookup: Send + Sync {
    async fn rating(
        &self,
        query: &str,
        known_link: Option<&str>,
    ) -> Result<Option<String>, FetchError>;
}

#[derive(Debug, PartialEq, Eq)]
enum DetailPage {
    /// The identity marker is missing: an error page, captcha or redirect.
    Unverified,
    Verified { score: Option<String> },
}

pub struct RatingResolver {
    source: Arc<dyn HtmlSource>,
    host: String,
}

impl RatingResolver {
    pub fn new(source: Arc<dyn HtmlSource>, host: &str) -> Self {
        Self {
            source,
            host: host.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str) -> Result<String, FetchError> {
        let raw = format!("{}/find/", self.host);
        let mut url = Url::parse(&raw).map_err(|source| FetchError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("s", "tt");
        Ok(url.to_string())
    }

    async fn search(&self, query: &str) -> Result<Option<String>, FetchError> {
        let url = self.search_url(query)?;
        let html = self.source.fetch_html(&url).await?;
        let link = first_search_result(&html, &self.host);
        debug!(query, link = ?link, "rating search");
        Ok(link)
    }
}

#[async_trait]
impl RatingLookup for RatingResolver {
    async fn rating(
        &self,
        query: &str,
        known_link: Option<&str>,
    ) -> Result<Option<String>, FetchError> {
        let mut hint = known_link.map(str::to_string);

        for attempt in 0..=MAX_VERIFY_RETRIES {
            // The hint is consumed on the first attempt; retries always search.
            let link = match hint.take() {
                Some(link) => Some(link),
                None => self.search(query).await?,
            };
            let Some(link) = link else {
                return Ok(None);
            };

            let html = self.source.fetch_html(&link).await?;
            match parse_detail_page(&html) {
                DetailPage::Verified { score } => return Ok(score),
                DetailPage::Unverified => {
                    warn!(
                        link = %link,
                        query,
                        attempt = attempt + 1,
                        "rating page failed verification"
                    );
                }
            }
        }

        Ok(None)
    }
}

/// Canonical `{host}/title/tt…/` link of the first search hit.
fn first_search_result(html: &str, host: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let href = doc
        .select(&SEARCH_RESULT_SEL)
        .next()?
        .value()
        .attr("href")?
        .trim();

    let path = if let Some(rest) = href.strip_prefix(host) {
        rest
    } else if href.starts_with('/') {
        href
    } else {
        return None;
    };

    let id = TITLE_PATH_RE.captures(path)?.get(1)?.as_str();
    Some(format!("{host}/title/{id}/"))
}

fn parse_detail_page(html: &str) -> DetailPage {
    let doc = Html::parse_document(html);
    if doc.select(&HOME_LOGO_SEL).next().is_none() {
        return DetailPage::Unverified;
    }

    let score = doc.select(&SCORE_SEL).next().and_then(|el| {
        let text = el.text().collect::<String>();
        let score = text.trim().split('/').next().unwrap_or("").trim();
        (!score.is_empty()).then(|| score.to_string())
    });
    DetailPage::Verified { score }
}

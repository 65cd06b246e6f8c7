use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use scraper::{Html, Selector};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use url::Url;

use super::config::Settings;
use super::error::FetchError;
use super::fetch::HtmlSource;
use super::movie::{build_record, extract_movie};
use super::rating::RatingLookup;
use super::text::normalize_text;
use super::types::CrawlEvent;

const NEXT_PAGE_TEXT: &str = "Следующая страница";
const LISTING_MARKER: &str = "div#mw-pages";
const MOVIE_MARKER: &str = "h1.firstHeading";
const RETRY_DELAY_MS: u64 = 150;

static PAGES_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#mw-pages").expect("pages selector"));
static PAGES_LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#mw-pages a[href]").expect("pages link selector"));
static COLUMN_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.mw-category-columns a[href]").expect("column link selector")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Listing {
    pub has_pages: bool,
    pub movies: Vec<MovieLink>,
    pub next: Option<String>,
}

/// Shared, read-only inputs of a crawl.
pub struct CrawlContext {
    pub settings: Settings,
    pub pages: Arc<dyn HtmlSource>,
    pub ratings: Option<Arc<dyn RatingLookup>>,
}

fn resolve_href(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let base = Url::parse(page_url).ok()?;
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

pub fn parse_listing(html: &str, page_url: &str) -> Listing {
    let doc = Html::parse_document(html);
    let has_pages = doc.select(&PAGES_SEL).next().is_some();

    let movies = doc
        .select(&COLUMN_LINK_SEL)
        .filter_map(|a| {
            let title = normalize_text(&a.text().collect::<String>());
            let url = resolve_href(page_url, a.value().attr("href")?)?;
            (!title.is_empty()).then_some(MovieLink { title, url })
        })
        .collect();

    let next = doc
        .select(&PAGES_LINK_SEL)
        .find(|a| a.text().collect::<String>().contains(NEXT_PAGE_TEXT))
        .and_then(|a| resolve_href(page_url, a.value().attr("href")?));

    Listing {
        has_pages,
        movies,
        next,
    }
}

/// Fetches `url` until `parse` accepts the body. Both transport errors and
/// bodies missing `marker` count as a bad load and are refetched.
async fn fetch_with_retry<T, F>(
    source: &dyn HtmlSource,
    url: &str,
    retries: usize,
    marker: &'static str,
    parse: F,
) -> Result<T, FetchError>
where
    F: Fn(&str) -> Option<T>,
{
    let mut attempt = 0;
    loop {
        let err = match source.fetch_html(url).await {
            Ok(html) => match parse(&html) {
                Some(parsed) => return Ok(parsed),
                None => FetchError::Incomplete {
                    url: url.to_string(),
                    marker,
                },
            },
            Err(err) => err,
        };

        if attempt >= retries {
            return Err(err);
        }
        attempt += 1;
        warn!(url, attempt, retries, error = %err, "bad page load, refetching");
        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
    }
}

async fn process_movie(link: MovieLink, ctx: Arc<CrawlContext>) -> CrawlEvent {
    let host = ctx.settings.ratings_host.as_str();
    let draft = match fetch_with_retry(
        ctx.pages.as_ref(),
        &link.url,
        ctx.settings.page_retries,
        MOVIE_MARKER,
        |html| extract_movie(html, host),
    )
    .await
    {
        Ok(draft) => draft,
        Err(err) => {
            return CrawlEvent::Skipped {
                url: link.url,
                reason: err.to_string(),
            };
        }
    };

    CrawlEvent::Movie(build_record(draft, ctx.ratings.as_deref()).await)
}

async fn forward_next(set: &mut JoinSet<CrawlEvent>, tx: &UnboundedSender<CrawlEvent>) {
    if let Some(joined) = set.join_next().await {
        match joined {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(err) => error!("movie worker failed: {err}"),
        }
    }
}

/// Walks the listing pages from the start URL, dispatching every unseen movie
/// link to a worker. Returns the number of listing pages processed.
///
/// Only a failure to load the very first listing page is an error; later
/// listing failures end the traversal early.
pub async fn run_crawler(
    ctx: Arc<CrawlContext>,
    known_titles: HashSet<String>,
    tx: UnboundedSender<CrawlEvent>,
) -> Result<usize, FetchError> {
    let mut dispatched = known_titles;
    let mut visited_pages = HashSet::new();
    let mut next = Some(ctx.settings.start_url.clone());
    let mut pages = 0usize;
    let mut set = JoinSet::new();

    while let Some(url) = next.take() {
        if ctx.settings.max_pages.is_some_and(|max| pages >= max) {
            info!(pages, "listing page limit reached");
            break;
        }
        if !visited_pages.insert(url.clone()) {
            warn!(url = %url, "pagination loops back to a visited page");
            break;
        }

        let listing = match fetch_with_retry(
            ctx.pages.as_ref(),
            &url,
            ctx.settings.page_retries,
            LISTING_MARKER,
            |html| {
                let listing = parse_listing(html, &url);
                listing.has_pages.then_some(listing)
            },
        )
        .await
        {
            Ok(listing) => listing,
            Err(err) if pages == 0 => return Err(err),
            Err(err) => {
                warn!(url = %url, error = %err, "listing page unavailable, stopping traversal");
                break;
            }
        };
        pages += 1;

        let fresh = listing
            .movies
            .into_iter()
            .filter(|link| dispatched.insert(link.title.clone()))
            .collect::<Vec<_>>();
        if fresh.is_empty() {
            info!(url = %url, "no new movies found on page");
        }
        let _ = tx.send(CrawlEvent::Listing {
            url: url.clone(),
            new_links: fresh.len(),
        });

        for link in fresh {
            while set.len() >= ctx.settings.concurrency {
                forward_next(&mut set, &tx).await;
            }
            set.spawn(process_movie(link, ctx.clone()));
        }

        next = listing.next;
    }

    while !set.is_empty() {
        forward_next(&mut set, &tx).await;
    }
    Ok(pages)
}

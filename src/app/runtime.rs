use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::Settings;
use super::crawl::{CrawlContext, run_crawler};
use super::data_io::{MovieStore, OfferOutcome};
use super::error::StoreError;
use super::fetch::{HtmlSource, HttpSource, SpiderSource};
use super::rating::{RatingLookup, RatingResolver};
use super::types::{Cli, CrawlEvent};

struct AbortTaskOnDrop(tokio::task::AbortHandle);

impl Drop for AbortTaskOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub listings: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

fn handle_crawl_event(
    store: &mut MovieStore,
    stats: &mut RunStats,
    event: CrawlEvent,
) -> Result<(), StoreError> {
    match event {
        CrawlEvent::Movie(record) => match store.offer(record) {
            Ok(OfferOutcome::Accepted(record)) => {
                stats.accepted += 1;
                info!(
                    title = %record.title,
                    rating = record.imdb_rating.as_deref().unwrap_or("-"),
                    "movie saved"
                );
            }
            Ok(OfferOutcome::Duplicate(title)) => {
                stats.duplicates += 1;
                debug!(title = %title, "movie already stored");
            }
            Err(StoreError::EmptyTitle) => {
                stats.skipped += 1;
                warn!("dropping record with empty title");
            }
            Err(err) => return Err(err),
        },
        CrawlEvent::Listing { url, new_links } => {
            stats.listings += 1;
            info!(url = %url, new_links, "listing page processed");
        }
        CrawlEvent::Skipped { url, reason } => {
            stats.skipped += 1;
            warn!(url = %url, reason = %reason, "movie page skipped");
        }
    }

    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    let settings = Settings::from_cli(Cli::parse())?;
    let mut store = MovieStore::open(&settings.output)
        .with_context(|| format!("failed to open store {}", settings.output.display()))?;

    let pages: Arc<dyn HtmlSource> = Arc::new(
        SpiderSource::new(&settings.user_agent, settings.page_timeout)
            .context("failed to build page client")?,
    );
    let ratings: Option<Arc<dyn RatingLookup>> = if settings.ratings_enabled {
        let source = HttpSource::new(&settings.user_agent, settings.rating_timeout)
            .context("failed to build ratings client")?;
        Some(Arc::new(RatingResolver::new(
            Arc::new(source),
            &settings.ratings_host,
        )))
    } else {
        None
    };

    info!(
        start = %settings.start_url,
        output = %settings.output.display(),
        known = store.len(),
        concurrency = settings.concurrency,
        ratings = settings.ratings_enabled,
        "starting crawl"
    );
    let ctx = Arc::new(CrawlContext {
        settings,
        pages,
        ratings,
    });
    run_with_store(ctx, &mut store).await?;
    Ok(())
}

/// Runs one crawl against `store`. The store is only touched from this task;
/// workers hand their records over the event channel.
pub async fn run_with_store(
    ctx: Arc<CrawlContext>,
    store: &mut MovieStore,
) -> anyhow::Result<RunStats> {
    let (tx, mut rx) = mpsc::unbounded_channel::<CrawlEvent>();
    let crawl_handle = tokio::spawn(run_crawler(ctx, store.titles(), tx));
    let _crawl_guard = AbortTaskOnDrop(crawl_handle.abort_handle());

    let mut stats = RunStats::default();
    while let Some(event) = rx.recv().await {
        handle_crawl_event(store, &mut stats, event)?;
    }
    store.flush()?;

    let pages = crawl_handle.await.context("crawler task join error")??;
    info!(
        pages,
        accepted = stats.accepted,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        total = store.len(),
        output = %store.path().display(),
        "finished crawl"
    );
    Ok(stats)
}

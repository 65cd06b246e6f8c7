use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use super::types::Cli;

const MAX_CONCURRENCY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {what} url {value}: {source}")]
    Url {
        what: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Immutable run settings derived from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub start_url: String,
    pub output: PathBuf,
    pub ratings_host: String,
    pub concurrency: usize,
    pub page_retries: usize,
    pub rating_timeout: Duration,
    pub page_timeout: Duration,
    pub max_pages: Option<usize>,
    pub user_agent: String,
    pub ratings_enabled: bool,
}

fn sanitize_concurrency(value: usize) -> usize {
    value.clamp(1, MAX_CONCURRENCY)
}

fn parse_url(what: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|source| ConfigError::Url {
        what,
        value: value.to_string(),
        source,
    })
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let start_url = parse_url("start", &cli.url)?.to_string();
        parse_url("ratings host", &cli.ratings_host)?;

        Ok(Self {
            start_url,
            output: PathBuf::from(cli.output),
            ratings_host: cli.ratings_host.trim().trim_end_matches('/').to_string(),
            concurrency: sanitize_concurrency(cli.concurrency),
            page_retries: cli.page_retries,
            rating_timeout: Duration::from_secs(cli.rating_timeout_secs.max(1)),
            page_timeout: Duration::from_secs(cli.page_timeout_secs.max(1)),
            max_pages: cli.max_pages.filter(|n| *n > 0),
            user_agent: cli.user_agent,
            ratings_enabled: !cli.no_ratings,
        })
    }
}

use std::io;

use thiserror::Error;

/// Failure to obtain a page body. Distinct from "page loaded but wrong content",
/// which callers detect by inspecting the body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("http {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("{url} loaded without {marker}")]
    Incomplete { url: String, marker: &'static str },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("fetch client setup failed: {0}")]
    Client(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),

    #[error("store csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("store is missing the `title` column")]
    MissingTitleColumn,

    #[error("record has an empty title")]
    EmptyTitle,
}

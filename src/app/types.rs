use clap::Parser;
use serde::Serialize;

pub const DEFAULT_START_URL: &str =
    "https://ru.wikipedia.org/wiki/Категория:Фильмы_по_алфавиту";
pub const DEFAULT_RATINGS_HOST: &str = "https://www.imdb.com";

#[derive(Debug, Parser, Clone)]
#[command(
    name = "filmcrawl",
    version,
    about = "Crawl a film category, look up ratings and append new films to CSV"
)]
pub struct Cli {
    #[arg(value_name = "URL", default_value = DEFAULT_START_URL)]
    pub url: String,

    #[arg(short, long, value_name = "FILE", default_value = "movies.csv")]
    pub output: String,

    #[arg(long, value_name = "URL", default_value = DEFAULT_RATINGS_HOST)]
    pub ratings_host: String,

    #[arg(long, value_name = "N", default_value_t = 8)]
    pub concurrency: usize,

    #[arg(long, value_name = "N", default_value_t = 3)]
    pub page_retries: usize,

    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub rating_timeout_secs: u64,

    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub page_timeout_secs: u64,

    #[arg(long, value_name = "N")]
    pub max_pages: Option<usize>,

    #[arg(long, value_name = "UA", default_value = "Mozilla/5.0")]
    pub user_agent: String,

    #[arg(long, default_value_t = false)]
    pub no_ratings: bool,
}

/// One film as extracted from its page. `title` is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRecord {
    pub title: String,
    pub original_title: String,
    pub genre: Vec<String>,
    pub director: Vec<String>,
    pub country: Vec<String>,
    pub year: Option<String>,
    pub imdb_rating: Option<String>,
}

pub const STORE_HEADERS: [&str; 7] = [
    "title",
    "original_title",
    "genre",
    "director",
    "country",
    "year",
    "imdb_rating",
];

/// Flat CSV shape of a [`MovieRecord`]; list fields are joined with ", ".
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredMovie {
    pub title: String,
    pub original_title: String,
    pub genre: String,
    pub director: String,
    pub country: String,
    pub year: Option<String>,
    pub imdb_rating: Option<String>,
}

impl From<&MovieRecord> for StoredMovie {
    fn from(record: &MovieRecord) -> Self {
        Self {
            title: record.title.clone(),
            original_title: record.original_title.clone(),
            genre: record.genre.join(", "),
            director: record.director.join(", "),
            country: record.country.join(", "),
            year: record.year.clone(),
            imdb_rating: record.imdb_rating.clone(),
        }
    }
}

#[derive(Debug)]
pub enum CrawlEvent {
    Movie(MovieRecord),
    Listing { url: String, new_links: usize },
    Skipped { url: String, reason: String },
}

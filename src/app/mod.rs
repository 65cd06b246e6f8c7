mod config;
mod crawl;
mod data_io;
mod error;
mod fetch;
mod infobox;
mod movie;
mod rating;
mod runtime;
mod text;
mod types;

pub use runtime::run;

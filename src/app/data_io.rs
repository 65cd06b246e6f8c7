use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::StoreError;
use super::types::{MovieRecord, STORE_HEADERS, StoredMovie};

#[derive(Debug, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted(MovieRecord),
    Duplicate(String),
}

/// Append-only CSV store plus the set of titles it already holds.
///
/// `offer` is the only write path; the seen-set and the file are mutated
/// together under `&mut self`, so whoever owns the store serializes offers.
pub struct MovieStore {
    path: PathBuf,
    seen: HashSet<String>,
    writer: csv::Writer<File>,
}

impl MovieStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let seen = load_titles(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let needs_header = file.metadata()?.len() == 0;
        if !needs_header {
            terminate_last_row(&mut file)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(STORE_HEADERS)?;
            writer.flush()?;
        }

        debug!(path = %path.display(), titles = seen.len(), "store opened");
        Ok(Self { path, seen, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn titles(&self) -> HashSet<String> {
        self.seen.clone()
    }

    pub fn offer(&mut self, record: MovieRecord) -> Result<OfferOutcome, StoreError> {
        if record.title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        if self.seen.contains(&record.title) {
            return Ok(OfferOutcome::Duplicate(record.title));
        }

        self.writer.serialize(StoredMovie::from(&record))?;
        self.writer.flush()?;
        self.seen.insert(record.title.clone());
        Ok(OfferOutcome::Accepted(record))
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// A run killed mid-write leaves the last row without its newline; appending
/// straight after it would merge the next row into the partial one.
fn terminate_last_row(file: &mut File) -> Result<(), StoreError> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.write_all(b"\n")?;
        debug!("terminated partial trailing row");
    }
    Ok(())
}

/// Titles already in the store; a missing or empty file yields an empty set.
pub fn load_titles(path: &Path) -> Result<HashSet<String>, StoreError> {
    if !path.exists() || path.metadata()?.len() == 0 {
        return Ok(HashSet::new());
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let title_idx = headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case("title"))
        .ok_or(StoreError::MissingTitleColumn)?;

    let mut titles = HashSet::new();
    for record in reader.records() {
        let record = record?;
        if let Some(title) = record.get(title_idx)
            && !title.trim().is_empty()
        {
            titles.insert(title.to_string());
        }
    }
    Ok(titles)
}

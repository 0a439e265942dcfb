//! Storage Sinks
//!
//! Destinations for delivered pages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ReportsError, StorageError};
use crate::pagination::Page;

/// Receives each page once, in fetch order. `Ok(())` acknowledges the page.
#[async_trait]
pub trait StorageSink: Send {
    async fn deliver(&mut self, page: &Page) -> Result<(), ReportsError>;
}

/// Keeps delivered pages in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
    pages: Vec<Page>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }
}

#[async_trait]
impl StorageSink for InMemorySink {
    async fn deliver(&mut self, page: &Page) -> Result<(), ReportsError> {
        self.pages.push(page.clone());
        Ok(())
    }
}

/// JSON document written for each page.
#[derive(Debug, Serialize)]
struct PageEnvelope<'a> {
    sequence: usize,
    url: &'a str,
    status: u16,
    fetched_at: DateTime<Utc>,
    body: &'a Value,
}

/// Writes one JSON file per page into a directory.
///
/// Files are named `response_{sequence:05}_{unix_seconds}.json`. The
/// directory is created on first delivery.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    /// Sink writing into `base/overdrive_{YYYYmmdd_HHMMSS}`.
    pub fn timestamped(base: impl AsRef<Path>, now: DateTime<Utc>) -> Self {
        let name = format!("overdrive_{}", now.format("%Y%m%d_%H%M%S"));
        Self::new(base.as_ref().join(name))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

fn write_failed(path: &Path, error: impl std::fmt::Display) -> ReportsError {
    StorageError::WriteFailed {
        path: path.display().to_string(),
        message: error.to_string(),
    }
    .into()
}

#[async_trait]
impl StorageSink for FileSink {
    async fn deliver(&mut self, page: &Page) -> Result<(), ReportsError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_failed(&self.dir, e))?;

        let fetched_at = Utc::now();
        let envelope = PageEnvelope {
            sequence: page.sequence,
            url: page.url(),
            status: page.status(),
            fetched_at,
            body: &page.body,
        };
        let contents = serde_json::to_vec_pretty(&envelope).map_err(|e| {
            StorageError::SerializationFailed {
                message: e.to_string(),
            }
        })?;

        let path = self.dir.join(format!(
            "response_{:05}_{}.json",
            page.sequence,
            fetched_at.timestamp()
        ));
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| write_failed(&path, e))?;

        debug!(path = %path.display(), "Saved page");
        self.written.push(path);
        Ok(())
    }
}

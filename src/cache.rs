use crate::error::{PnlError, Result};
use crate::ingestion::{load_dataset, DEFAULT_SHEET};
use crate::schema::Dataset;
use chrono::{DateTime, Utc};
use log::debug;
use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

/// Memo table of normalized datasets keyed by source path and modification time.
///
/// Entries never expire on their own. A changed timestamp is a miss, and the
/// stale entry for that path is invalidated when the fresh one is stored.
#[derive(Debug)]
pub struct DatasetCache {
    preferred_sheet: String,
    entries: Cache<CacheKey, Arc<Dataset>>,
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new(DEFAULT_SHEET)
    }
}

impl DatasetCache {
    pub fn new(preferred_sheet: impl Into<String>) -> Self {
        Self {
            preferred_sheet: preferred_sheet.into(),
            entries: Cache::builder().build(),
        }
    }

    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<Dataset>> {
        let modified = modification_time(path)?;
        self.get_or_load_at(path, modified)
    }

    pub fn get_or_load_at(&mut self, path: &Path, modified: DateTime<Utc>) -> Result<Arc<Dataset>> {
        let key = CacheKey {
            path: path.to_path_buf(),
            modified,
        };

        if let Some(dataset) = self.entries.get(&key) {
            debug!("Dataset cache hit for {} @ {}", path.display(), modified);
            return Ok(dataset);
        }

        debug!("Dataset cache miss for {} @ {}", path.display(), modified);
        let dataset = Arc::new(load_dataset(path, &self.preferred_sheet)?);

        self.invalidate(path);
        self.entries.insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn contains(&self, path: &Path, modified: DateTime<Utc>) -> bool {
        self.entries.contains_key(&CacheKey {
            path: path.to_path_buf(),
            modified,
        })
    }

    /// Drops every entry for `path`, returning how many were removed.
    pub fn invalidate(&mut self, path: &Path) -> usize {
        let stale: Vec<Arc<CacheKey>> = self
            .entries
            .iter()
            .filter(|(key, _)| key.path == path)
            .map(|(key, _)| key)
            .collect();
        for key in &stale {
            self.entries.invalidate(key.as_ref());
        }
        stale.len()
    }

    pub fn clear(&mut self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn modification_time(path: &Path) -> Result<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .map_err(|e| PnlError::data_unavailable(path, e))
}

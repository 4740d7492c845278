//! Compute-or-load store for the final dataset.
//!
//! Presence of the cache file is the only check: once a dataset is stored it
//! is returned as-is, even if rasters were added to the input folder since.
//! Use [`DatasetCache::invalidate`] to force a recomputation.
//! Results the caller declines (see [`DatasetCache::get_or_compute_if`]) are
//! returned without being stored.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::dataset::Dataset;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Loaded from disk; nothing was computed.
    Hit,
    /// Computed and written to disk.
    Computed,
    /// Computed but not written; the next run computes again.
    Uncached,
}

#[derive(Debug, Clone)]
pub struct DatasetCache {
    path: PathBuf,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Return the stored dataset, or run `compute`, store its result and return it.
    pub fn get_or_compute<F>(&self, compute: F) -> Result<(Dataset, CacheStatus)>
    where
        F: FnOnce() -> Result<Dataset>,
    {
        self.get_or_compute_if(|| compute().map(|dataset| (dataset, true)))
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but `compute` also says
    /// whether its result may be stored. A declined result is returned with
    /// [`CacheStatus::Uncached`] and leaves no file behind.
    pub fn get_or_compute_if<F>(&self, compute: F) -> Result<(Dataset, CacheStatus)>
    where
        F: FnOnce() -> Result<(Dataset, bool)>,
    {
        if self.exists() {
            let dataset = self.load()?;
            info!(path = %self.path.display(), rows = dataset.len(), "dataset loaded from cache");
            return Ok((dataset, CacheStatus::Hit));
        }
        let (dataset, cacheable) = compute()?;
        if !cacheable {
            warn!(path = %self.path.display(), rows = dataset.len(), "dataset not cached");
            return Ok((dataset, CacheStatus::Uncached));
        }
        self.store(&dataset)?;
        info!(path = %self.path.display(), rows = dataset.len(), "dataset cached");
        Ok((dataset, CacheStatus::Computed))
    }

    pub fn load(&self) -> Result<Dataset> {
        let text = fs::read_to_string(&self.path).map_err(|e| Error::cache(&self.path, e))?;
        serde_json::from_str(&text).map_err(|e| Error::cache(&self.path, format!("unreadable dataset: {e}")))
    }

    /// Write through a sibling temp file so a crash never leaves a partial cache.
    pub fn store(&self, dataset: &Dataset) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::cache(&self.path, e))?;
        }
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        let json = serde_json::to_string_pretty(dataset).map_err(|e| Error::cache(&self.path, e))?;
        fs::write(&tmp, json).map_err(|e| Error::cache(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::cache(&self.path, e))
    }

    /// Remove the stored dataset. Returns whether one existed.
    pub fn invalidate(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::cache(&self.path, e)),
        }
    }
}

//! End-to-end run: boundaries → raster catalog → parallel overlay → dataset,
//! behind the dataset cache.
//!
//! Fatal: unreadable boundaries or raster folder, worker pool creation,
//! schema violations, cache I/O. Everything per-raster is collected in
//! `RunOutcome::failures`.

use tracing::{info, warn};

use crate::age::AgeClasses;
use crate::aggregate::{Aggregator, CancelFlag};
use crate::cache::{CacheStatus, DatasetCache};
use crate::catalog::{Failure, RasterCatalog};
use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::raster::GeoTiffSource;
use crate::regions::RegionStore;

#[derive(Debug)]
pub struct RunOutcome {
    pub dataset: Dataset,
    /// Rasters rejected at enumeration or failed during aggregation.
    /// Always empty on a cache hit.
    pub failures: Vec<Failure>,
    pub cache: CacheStatus,
}

pub struct Pipeline {
    config: PipelineConfig,
    cancel: Option<CancelFlag>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, cancel: None })
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> DatasetCache {
        DatasetCache::new(&self.config.cache)
    }

    /// Return the cached dataset, or compute and cache it.
    ///
    /// A run where rasters failed and none succeeded is returned with its
    /// failures but not cached, so the next run retries.
    pub fn run(&self) -> Result<RunOutcome> {
        let mut failures = Vec::new();
        let (dataset, cache) = self.cache().get_or_compute_if(|| {
            let dataset = self.compute(&mut failures)?;
            let all_failed = dataset.is_empty() && !failures.is_empty();
            if all_failed {
                warn!(failed = failures.len(), "no raster could be aggregated");
            }
            Ok((dataset, !all_failed))
        })?;
        Ok(RunOutcome { dataset, failures, cache })
    }

    /// Compute the dataset without touching the cache. Per-raster failures are
    /// appended to `failures`.
    pub fn compute(&self, failures: &mut Vec<Failure>) -> Result<Dataset> {
        let cfg = &self.config;
        let classes = AgeClasses::new(&cfg.age_breakpoints);

        let store = RegionStore::load(&cfg.boundaries, &cfg.boundary_options())?;
        let listing = RasterCatalog::enumerate(&cfg.rasters, &cfg.catalog_filter())?;
        failures.extend(listing.rejected);

        let mut aggregator = Aggregator::new(cfg.workers.unwrap_or_else(Aggregator::default_workers));
        if let Some(flag) = &self.cancel {
            aggregator = aggregator.with_cancel(flag.clone());
        }
        let source = GeoTiffSource::new(store.frame());
        let aggregation = aggregator.aggregate(&listing.descriptors, store.regions(), &source)?;
        failures.extend(aggregation.failures);

        let dataset = Dataset::assemble(aggregation.records, &classes)?;
        info!(rows = dataset.len(), failed = failures.len(), "dataset assembled");
        Ok(dataset)
    }
}

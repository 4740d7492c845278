//! Parallel zonal aggregation.
//!
//! One task per raster: the grid is loaded once and overlaid on every region
//! in canonical order. Tasks run on a dedicated rayon pool and their outputs
//! are collected through an indexed parallel iterator, which writes each
//! result into the slot of its descriptor. Record order is therefore
//! descriptor order × region order, whatever the pool size or finishing order.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::catalog::{Failure, RasterDescriptor, StratumKey};
use crate::error::{Error, Result};
use crate::overlay::overlay_stats;
use crate::raster::GridSource;
use crate::regions::Region;

/// Population of one region in one stratum.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub region: String,
    pub key: StratumKey,
    pub count: f64,
}

/// Shared abort switch. Tasks that have not started when it is raised are
/// reported as cancelled and contribute no records.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Output of one aggregation run.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub records: Vec<PopulationRecord>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    workers: usize,
    cancel: Option<CancelFlag>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Self::default_workers())
    }
}

impl Aggregator {
    /// Pool of `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        Self { workers: workers.max(1), cancel: None }
    }

    /// Available parallelism minus one reserved for the caller, never below one.
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Overlay every descriptor's grid on every region.
    ///
    /// Failing descriptors yield no records and one entry in
    /// `Aggregation::failures`; only a pool that cannot be built is fatal.
    pub fn aggregate<S>(&self, descriptors: &[RasterDescriptor], regions: &[Region], source: &S) -> Result<Aggregation>
    where
        S: GridSource + ?Sized,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("popgrid-worker-{i}"))
            .build()?;

        info!(
            rasters = descriptors.len(),
            regions = regions.len(),
            workers = self.workers,
            "aggregating"
        );
        let started = Instant::now();
        let done = AtomicUsize::new(0);
        let total = descriptors.len();

        let outcomes: Vec<Result<Vec<PopulationRecord>>> = pool.install(|| {
            descriptors
                .par_iter()
                .map(|d| {
                    let out = self.run_task(d, regions, source);
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(done = n, total, key = %d.key, ok = out.is_ok(), "task finished");
                    out
                })
                .collect()
        });

        let mut aggregation = Aggregation {
            records: Vec::with_capacity(total * regions.len()),
            failures: Vec::new(),
        };
        for (descriptor, outcome) in descriptors.iter().zip(outcomes) {
            match outcome {
                Ok(records) => aggregation.records.extend(records),
                Err(error) => {
                    warn!(path = %descriptor.path.display(), key = %descriptor.key, %error, "raster failed");
                    aggregation.failures.push(Failure {
                        path: descriptor.path.clone(),
                        key: Some(descriptor.key),
                        error,
                    });
                }
            }
        }

        info!(
            records = aggregation.records.len(),
            failed = aggregation.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregation complete"
        );
        Ok(aggregation)
    }

    fn run_task<S>(&self, descriptor: &RasterDescriptor, regions: &[Region], source: &S) -> Result<Vec<PopulationRecord>>
    where
        S: GridSource + ?Sized,
    {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Err(Error::Cancelled);
        }
        let grid = source.load(descriptor)?;
        let records = regions
            .iter()
            .map(|region| {
                let stats = overlay_stats(&grid, region);
                debug!(
                    region = region.name(),
                    key = %descriptor.key,
                    n = stats.sum,
                    cells = stats.valid_cells,
                    nodata = stats.nodata_cells,
                    "overlay"
                );
                PopulationRecord {
                    region: region.name().to_string(),
                    key: descriptor.key,
                    count: stats.sum,
                }
            })
            .collect();
        // `grid` is dropped here; no task keeps pixel data.
        Ok(records)
    }
}

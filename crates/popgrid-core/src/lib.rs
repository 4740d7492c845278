//! Zonal aggregation of gridded population estimates into per-region,
//! per-stratum (year × sex × age band) tables.

pub mod age;
pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod coords;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod overlay;
pub mod pipeline;
pub mod raster;
pub mod regions;

pub use age::{AgeBreakpoints, AgeClasses};
pub use aggregate::{Aggregation, Aggregator, CancelFlag, PopulationRecord};
pub use cache::{CacheStatus, DatasetCache};
pub use catalog::{CatalogFilter, Enumeration, Failure, RasterCatalog, RasterDescriptor, Sex, StratumKey};
pub use config::PipelineConfig;
pub use coords::ReferenceFrame;
pub use dataset::{Dataset, DatasetRow, PyramidBar};
pub use error::{Error, Result};
pub use grid::{GeoTransform, RasterGrid};
pub use overlay::{overlay, overlay_stats, OverlayStats};
pub use pipeline::{Pipeline, RunOutcome};
pub use raster::{read_geotiff, GeoTiffSource, GridSource};
pub use regions::{BoundaryOptions, Region, RegionStore};

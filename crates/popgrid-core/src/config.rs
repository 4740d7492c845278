use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::age::AgeBreakpoints;
use crate::catalog::CatalogFilter;
use crate::coords::ReferenceFrame;
use crate::error::{Error, Result};
use crate::regions::BoundaryOptions;

/// Everything a pipeline run needs. Every field has a default, so a config
/// file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// GeoJSON FeatureCollection of administrative regions.
    pub boundaries: PathBuf,
    /// Flat folder of `{sex}_{age}_{year}` GeoTIFFs.
    pub rasters: PathBuf,
    /// Where the assembled dataset is stored and looked up.
    pub cache: PathBuf,
    /// Feature property holding the region name.
    pub name_field: String,
    /// Frame assumed for boundaries without a `crs` member; null demands one.
    pub assume_frame: Option<ReferenceFrame>,
    pub age_breakpoints: AgeBreakpoints,
    /// Worker threads; None = available parallelism minus one.
    pub workers: Option<usize>,
    /// Inclusive (first, last) year window.
    pub years: Option<(i32, i32)>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            boundaries: PathBuf::from("data/boundaries.geojson"),
            rasters: PathBuf::from("data/rasters"),
            cache: PathBuf::from("data/population.json"),
            name_field: BoundaryOptions::default().name_field,
            assume_frame: BoundaryOptions::default().assume_frame,
            age_breakpoints: AgeBreakpoints::default(),
            workers: None,
            years: None,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if let Some((first, last)) = self.years {
            if first > last {
                return Err(Error::Config(format!("year window {first}..={last} is empty")));
            }
        }
        if self.name_field.is_empty() {
            return Err(Error::Config("name_field must not be empty".into()));
        }
        Ok(())
    }

    pub fn boundary_options(&self) -> BoundaryOptions {
        BoundaryOptions {
            name_field: self.name_field.clone(),
            assume_frame: self.assume_frame,
        }
    }

    pub fn catalog_filter(&self) -> CatalogFilter {
        CatalogFilter { years: self.years }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("popgrid.json");
        fs::write(
            &path,
            r#"{ "rasters": "/data/ita", "name_field": "PROV", "assume_frame": "EPSG:3857", "years": [2000, 2005] }"#,
        )
        .unwrap();
        let cfg = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(cfg.rasters, PathBuf::from("/data/ita"));
        assert_eq!(cfg.boundary_options().name_field, "PROV");
        assert_eq!(cfg.assume_frame, Some(ReferenceFrame::WEB_MERCATOR));
        assert_eq!(cfg.catalog_filter().years, Some((2000, 2005)));
        assert_eq!(cfg.age_breakpoints, AgeBreakpoints::default());
        assert_eq!(cfg.cache, PipelineConfig::default().cache);
    }

    #[test]
    fn null_frame_disables_assumption() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{ "assume_frame": null }"#).unwrap();
        assert_eq!(cfg.assume_frame, None);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        for body in [
            r#"{ "workers": 0 }"#,
            r#"{ "years": [2010, 2000] }"#,
            r#"{ "age_breakpoints": [5, 1] }"#,
            r#"{ "name_field": "" }"#,
            r#"{ "assume_frame": "EPSG:abc" }"#,
            r#"{ "wrokers": 3 }"#,
        ] {
            let path = dir.path().join("bad.json");
            fs::write(&path, body).unwrap();
            let err = PipelineConfig::from_file(&path).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{body}: {err}");
        }
    }
}

//! Administrative boundaries.
//!
//! Boundaries are a GeoJSON FeatureCollection; each feature carries its region
//! name in a configurable property and a Polygon or MultiPolygon geometry.
//! Regions are always returned in WGS 84 lon/lat; feature order is the
//! canonical region order for the rest of the pipeline.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use geo::{BoundingRect, Coord, Geometry, MapCoords, MultiPolygon, Rect};
use geojson::{FeatureCollection, GeoJson};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::coords::ReferenceFrame;
use crate::error::{Error, Result};

/// A named administrative polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    name: String,
    geometry: MultiPolygon<f64>,
    bbox: Rect<f64>,
}

impl Region {
    /// Returns None for an empty geometry.
    pub fn new(name: impl Into<String>, geometry: MultiPolygon<f64>) -> Option<Self> {
        let bbox = geometry.bounding_rect()?;
        Some(Self { name: name.into(), geometry, bbox })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn bbox(&self) -> Rect<f64> {
        self.bbox
    }
}

/// How to read a boundary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryOptions {
    /// Feature property holding the region name.
    pub name_field: String,
    /// Frame used when the file carries no `crs` member.
    pub assume_frame: Option<ReferenceFrame>,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            name_field: "NAME_1".to_string(),
            // RFC 7946: GeoJSON coordinates are WGS 84 unless stated otherwise.
            assume_frame: Some(ReferenceFrame::WGS84),
        }
    }
}

/// Ordered, uniquely named region collection.
#[derive(Debug, Clone)]
pub struct RegionStore {
    regions: Vec<Region>,
    source_frame: ReferenceFrame,
}

impl RegionStore {
    /// Build a store from regions already in WGS 84. Rejects duplicate names.
    pub fn from_regions(regions: Vec<Region>) -> Result<Self> {
        let mut seen = HashSet::new();
        for r in &regions {
            if !seen.insert(r.name()) {
                return Err(Error::Config(format!("duplicate region name `{}`", r.name())));
            }
        }
        Ok(Self { regions, source_frame: ReferenceFrame::WGS84 })
    }

    /// Load and normalize a GeoJSON boundary file.
    pub fn load(path: &Path, options: &BoundaryOptions) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::load(path, e))?;
        let geojson: GeoJson = text.parse().map_err(|e| Error::load(path, e))?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(Error::load(path, "expected a GeoJSON FeatureCollection"));
        };

        let source_frame = match declared_frame(&collection) {
            Some(declared) => declared.map_err(|reason| Error::frame(path, reason))?,
            None => options
                .assume_frame
                .ok_or_else(|| Error::frame(path, "no `crs` member and no frame to assume"))?,
        };
        let to_wgs84 = source_frame
            .to_wgs84()
            .ok_or_else(|| Error::frame(path, format!("cannot normalize {source_frame} to {}", ReferenceFrame::WGS84)))?;

        let mut regions = Vec::with_capacity(collection.features.len());
        let mut seen = HashSet::new();
        for (idx, feature) in collection.features.into_iter().enumerate() {
            let name = match feature.property(&options.name_field) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => {
                    return Err(Error::load(
                        path,
                        format!("feature {idx} has no `{}` name property", options.name_field),
                    ))
                }
            };
            if !seen.insert(name.clone()) {
                return Err(Error::load(path, format!("duplicate region name `{name}`")));
            }

            let value = feature
                .geometry
                .ok_or_else(|| Error::load(path, format!("region `{name}` has no geometry")))?
                .value;
            let geometry = match Geometry::<f64>::try_from(value) {
                Ok(Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
                Ok(Geometry::MultiPolygon(mp)) => mp,
                Ok(_) => return Err(Error::load(path, format!("region `{name}` is not polygonal"))),
                Err(e) => return Err(Error::load(path, format!("region `{name}`: {e}"))),
            };
            let geometry = geometry.map_coords(|c| {
                let (x, y) = to_wgs84(c.x, c.y);
                Coord { x, y }
            });

            let region = Region::new(name, geometry)
                .ok_or_else(|| Error::load(path, format!("feature {idx} has an empty geometry")))?;
            regions.push(region);
        }
        if regions.is_empty() {
            return Err(Error::load(path, "no features"));
        }

        info!(
            path = %path.display(),
            regions = regions.len(),
            source_frame = %source_frame,
            "loaded boundaries"
        );
        Ok(Self { regions, source_frame })
    }

    /// Regions in canonical order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Frame the regions are expressed in after normalization.
    pub fn frame(&self) -> ReferenceFrame {
        ReferenceFrame::WGS84
    }

    /// Frame the boundary file was written in.
    pub fn source_frame(&self) -> ReferenceFrame {
        self.source_frame
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name() == name)
    }
}

/// Legacy GeoJSON `"crs": {"type": "name", "properties": {"name": ...}}`.
fn declared_frame(collection: &FeatureCollection) -> Option<std::result::Result<ReferenceFrame, String>> {
    let crs = collection.foreign_members.as_ref()?.get("crs")?;
    if crs.is_null() {
        return None;
    }
    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str());
    Some(match name {
        Some(name) => name.parse(),
        None => Err("`crs` member has no properties.name".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::lonlat_to_mercator;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn square(name: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"NAME_1":"{name}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}}}"#
        )
    }

    fn collection(features: &[String], crs: Option<&str>) -> String {
        let crs = crs
            .map(|c| format!(r#","crs":{{"type":"name","properties":{{"name":"{c}"}}}}"#))
            .unwrap_or_default();
        format!(r#"{{"type":"FeatureCollection","features":[{}]{crs}}}"#, features.join(","))
    }

    #[test]
    fn load_keeps_feature_order() {
        let dir = tempfile::tempdir().unwrap();
        let body = collection(&[square("Zeta", 0.0, 0.0, 1.0, 1.0), square("Alpha", 1.0, 0.0, 2.0, 1.0)], None);
        let store = RegionStore::load(&write(&dir, "b.geojson", &body), &BoundaryOptions::default()).unwrap();
        let names: Vec<&str> = store.regions().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
        assert_eq!(store.get("Alpha").unwrap().bbox(), Rect::new((1.0, 0.0), (2.0, 1.0)));
        assert_eq!(store.frame(), ReferenceFrame::WGS84);
    }

    #[test]
    fn load_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let body = collection(&[square("A", 0.0, 0.0, 1.0, 1.0), square("A", 1.0, 0.0, 2.0, 1.0)], None);
        let err = RegionStore::load(&write(&dir, "b.geojson", &body), &BoundaryOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Load { .. }), "{err}");
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn load_requires_frame_when_none_assumed() {
        let dir = tempfile::tempdir().unwrap();
        let body = collection(&[square("A", 0.0, 0.0, 1.0, 1.0)], None);
        let opts = BoundaryOptions { assume_frame: None, ..BoundaryOptions::default() };
        let err = RegionStore::load(&write(&dir, "b.geojson", &body), &opts).unwrap_err();
        assert!(matches!(err, Error::ReferenceFrame { .. }), "{err}");
    }

    #[test]
    fn load_rejects_unsupported_frame() {
        let dir = tempfile::tempdir().unwrap();
        let body = collection(&[square("A", 0.0, 0.0, 1.0, 1.0)], Some("urn:ogc:def:crs:EPSG::32633"));
        let err = RegionStore::load(&write(&dir, "b.geojson", &body), &BoundaryOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ReferenceFrame { .. }), "{err}");
    }

    #[test]
    fn load_normalizes_web_mercator() {
        let dir = tempfile::tempdir().unwrap();
        let (x0, y0) = lonlat_to_mercator(10.0, 40.0);
        let (x1, y1) = lonlat_to_mercator(12.0, 42.0);
        let body = collection(&[square("A", x0, y0, x1, y1)], Some("EPSG:3857"));
        let store = RegionStore::load(&write(&dir, "b.geojson", &body), &BoundaryOptions::default()).unwrap();
        assert_eq!(store.source_frame(), ReferenceFrame::WEB_MERCATOR);
        let bbox = store.regions()[0].bbox();
        assert!((bbox.min().x - 10.0).abs() < 1e-9);
        assert!((bbox.min().y - 40.0).abs() < 1e-9);
        assert!((bbox.max().x - 12.0).abs() < 1e-9);
        assert!((bbox.max().y - 42.0).abs() < 1e-9);
    }

    #[test]
    fn load_reports_missing_and_malformed_sources() {
        let dir = tempfile::tempdir().unwrap();
        let missing = RegionStore::load(&dir.path().join("nope.geojson"), &BoundaryOptions::default());
        assert!(matches!(missing, Err(Error::Load { .. })));

        let garbage = write(&dir, "bad.geojson", "{ not json");
        assert!(matches!(RegionStore::load(&garbage, &BoundaryOptions::default()), Err(Error::Load { .. })));

        let no_name = collection(&[square("A", 0.0, 0.0, 1.0, 1.0)], None);
        let opts = BoundaryOptions { name_field: "PROVINCE".into(), ..BoundaryOptions::default() };
        let err = RegionStore::load(&write(&dir, "b.geojson", &no_name), &opts).unwrap_err();
        assert!(err.to_string().contains("PROVINCE"));
    }

    #[test]
    fn from_regions_rejects_duplicates() {
        let mp = MultiPolygon::new(vec![Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon()]);
        let regions = vec![Region::new("A", mp.clone()).unwrap(), Region::new("A", mp).unwrap()];
        assert!(RegionStore::from_regions(regions).is_err());
    }
}

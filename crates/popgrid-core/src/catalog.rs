//! Raster folder enumeration.
//!
//! File stems end in `{sex}_{age}_{year}` with an optional prefix, e.g.
//!   "ita_f_25_2015.tif"  → (2015, 25, female)
//!   "m_0_2000.tiff"      → (2000, 0, male)
//! Anything else in the folder that looks like a GeoTIFF but does not parse is
//! rejected individually; the rest of the folder is still enumerated.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    /// Normalize a raw sex code (`f`, `m`, `female`, `male`; any case).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "f" | "female" => Some(Sex::Female),
            "m" | "male" => Some(Sex::Male),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Female => "female",
            Sex::Male => "male",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Demographic slice a raster covers. Ordering is (year, sex, age).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StratumKey {
    pub year: i32,
    pub sex: Sex,
    /// Lower bound of the age band.
    pub age: u32,
}

impl StratumKey {
    pub fn new(year: i32, age: u32, sex: Sex) -> Self {
        Self { year, sex, age }
    }
}

impl fmt::Display for StratumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.year, self.sex, self.age)
    }
}

/// A raster on disk together with the stratum parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterDescriptor {
    pub key: StratumKey,
    pub path: PathBuf,
}

/// A raster entry that could not be used, and why.
#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub key: Option<StratumKey>,
    pub error: Error,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(key) => write!(f, "{} [{}]: {}", self.path.display(), key, self.error),
            None => write!(f, "{}: {}", self.path.display(), self.error),
        }
    }
}

/// Restricts which strata are enumerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    /// Inclusive (first, last) year window.
    pub years: Option<(i32, i32)>,
}

impl CatalogFilter {
    pub fn admits(&self, key: &StratumKey) -> bool {
        match self.years {
            Some((first, last)) => (first..=last).contains(&key.year),
            None => true,
        }
    }
}

/// Result of listing a raster folder.
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Usable rasters in submission order (sorted by stratum).
    pub descriptors: Vec<RasterDescriptor>,
    /// Entries rejected with a parse error.
    pub rejected: Vec<Failure>,
}

/// Parse the stratum encoded in a raster file stem.
pub fn parse_stratum(stem: &str) -> Result<StratumKey> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return Err(Error::parse(stem, "expected `{sex}_{age}_{year}`"));
    }
    let n = parts.len();
    let (sex, age, year) = (parts[n - 3], parts[n - 2], parts[n - 1]);

    let sex = Sex::from_code(sex)
        .ok_or_else(|| Error::parse(stem, format!("unknown sex code `{sex}`")))?;

    if age.is_empty() || !age.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::parse(stem, format!("age `{age}` is not a non-negative integer")));
    }
    let age: u32 = age
        .parse()
        .map_err(|e| Error::parse(stem, format!("age `{age}`: {e}")))?;

    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::parse(stem, format!("year `{year}` is not a 4-digit year")));
    }
    let year: i32 = year
        .parse()
        .map_err(|e| Error::parse(stem, format!("year `{year}`: {e}")))?;

    Ok(StratumKey::new(year, age, sex))
}

fn is_geotiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

pub struct RasterCatalog;

impl RasterCatalog {
    /// List `folder` (non-recursive) and parse every GeoTIFF name into a descriptor.
    ///
    /// Only an unreadable folder is fatal; bad names and duplicate strata end
    /// up in `Enumeration::rejected`.
    pub fn enumerate(folder: &Path, filter: &CatalogFilter) -> Result<Enumeration> {
        let listing = fs::read_dir(folder).map_err(|e| Error::load(folder, e))?;

        let mut paths = Vec::new();
        for entry in listing {
            let entry = entry.map_err(|e| Error::load(folder, e))?;
            let path = entry.path();
            if path.is_file() && is_geotiff(&path) {
                paths.push(path);
            } else {
                debug!(path = %path.display(), "ignoring non-raster entry");
            }
        }
        // File-name order decides which of two same-stratum files wins.
        paths.sort();

        let mut out = Enumeration::default();
        let mut seen = HashSet::new();
        for path in paths {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            match parse_stratum(stem) {
                Ok(key) if !filter.admits(&key) => {
                    debug!(path = %path.display(), %key, "outside year window");
                }
                Ok(key) if !seen.insert(key) => {
                    let error = Error::parse(stem, format!("duplicate stratum {key}"));
                    warn!(path = %path.display(), %error, "rejected raster");
                    out.rejected.push(Failure { path, key: Some(key), error });
                }
                Ok(key) => out.descriptors.push(RasterDescriptor { key, path }),
                Err(error) => {
                    warn!(path = %path.display(), %error, "rejected raster");
                    out.rejected.push(Failure { path, key: None, error });
                }
            }
        }
        out.descriptors.sort_by(|a, b| a.key.cmp(&b.key));

        info!(
            folder = %folder.display(),
            rasters = out.descriptors.len(),
            rejected = out.rejected.len(),
            "enumerated raster folder"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefixed_name() {
        assert_eq!(parse_stratum("ita_f_25_2015").unwrap(), StratumKey::new(2015, 25, Sex::Female));
    }

    #[test]
    fn parse_bare_name_upper_case_sex() {
        assert_eq!(parse_stratum("M_0_2000").unwrap(), StratumKey::new(2000, 0, Sex::Male));
    }

    #[test]
    fn parse_rejects_bad_patterns() {
        for stem in ["f_25", "x_25_2015", "f_-5_2015", "f_25_15", "f_twenty_2015", "f__2015", "population"] {
            let err = parse_stratum(stem).unwrap_err();
            assert!(matches!(err, Error::Parse { .. }), "{stem}: {err}");
        }
    }

    #[test]
    fn strata_order_by_year_then_sex_then_age() {
        let mut keys = vec![
            StratumKey::new(2001, 0, Sex::Female),
            StratumKey::new(2000, 5, Sex::Male),
            StratumKey::new(2000, 10, Sex::Female),
            StratumKey::new(2000, 1, Sex::Female),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                StratumKey::new(2000, 1, Sex::Female),
                StratumKey::new(2000, 10, Sex::Female),
                StratumKey::new(2000, 5, Sex::Male),
                StratumKey::new(2001, 0, Sex::Female),
            ]
        );
    }

    #[test]
    fn enumerate_sorts_rejects_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "ita_m_5_2001.tif",
            "ita_f_0_2000.tif",
            "ita_f_0_2000_copy.tif", // stem ends in `2000_copy` → rejected
            "ita_x_0_2000.tif",
            "ita_f_0_1999.tif",
            "readme.txt",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::write(dir.path().join("zzz_f_0_2000.tiff"), b"").unwrap();

        let filter = CatalogFilter { years: Some((2000, 2001)) };
        let listing = RasterCatalog::enumerate(dir.path(), &filter).unwrap();

        let keys: Vec<StratumKey> = listing.descriptors.iter().map(|d| d.key).collect();
        assert_eq!(keys, vec![StratumKey::new(2000, 0, Sex::Female), StratumKey::new(2001, 5, Sex::Male)]);
        assert!(listing.descriptors[0].path.ends_with("ita_f_0_2000.tif"));

        // bad sex code, bad year token, and the later duplicate of f/0/2000
        assert_eq!(listing.rejected.len(), 3);
        assert!(listing.rejected.iter().all(|f| matches!(f.error, Error::Parse { .. })));
        assert!(listing
            .rejected
            .iter()
            .any(|f| f.path.ends_with("zzz_f_0_2000.tiff") && f.key.is_some()));
    }

    #[test]
    fn enumerate_missing_folder_is_load_error() {
        let err = RasterCatalog::enumerate(Path::new("/definitely/not/here"), &CatalogFilter::default())
            .unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }
}

/// Reference frames and the coordinate conversions the pipeline supports.
/// All coordinate math uses f64 for precision.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sphere radius used by EPSG:3857 (metres).
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// A coordinate reference frame identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferenceFrame(u32);

impl ReferenceFrame {
    /// Geographic WGS 84 (lon/lat degrees). The frame regions are normalized to.
    pub const WGS84: ReferenceFrame = ReferenceFrame(4326);
    /// Spherical ("web") Mercator in metres.
    pub const WEB_MERCATOR: ReferenceFrame = ReferenceFrame(3857);

    pub fn from_epsg(code: u32) -> Self {
        match code {
            900913 | 3785 | 102100 | 102113 => Self::WEB_MERCATOR,
            other => ReferenceFrame(other),
        }
    }

    pub fn epsg(self) -> u32 {
        self.0
    }

    /// Map a coordinate in this frame to WGS 84 lon/lat.
    /// Returns None when no closed-form transform to WGS 84 is known.
    pub fn to_wgs84(self) -> Option<fn(f64, f64) -> (f64, f64)> {
        let transform: fn(f64, f64) -> (f64, f64) = match self {
            Self::WGS84 => identity,
            Self::WEB_MERCATOR => mercator_to_lonlat,
            _ => return None,
        };
        Some(transform)
    }
}

impl fmt::Display for ReferenceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for ReferenceFrame {
    type Err = String;

    /// Accepts `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`, `OGC:CRS84`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84` and bare codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Ok(Self::WGS84);
        }
        let code = upper.rsplit(':').next().unwrap_or_default();
        code.parse::<u32>()
            .map(Self::from_epsg)
            .map_err(|_| format!("unrecognised reference frame `{trimmed}`"))
    }
}

impl TryFrom<String> for ReferenceFrame {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ReferenceFrame> for String {
    fn from(frame: ReferenceFrame) -> Self {
        frame.to_string()
    }
}

fn identity(x: f64, y: f64) -> (f64, f64) {
    (x, y)
}

/// EPSG:3857 metres → (lon, lat) degrees.
pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (y / WEB_MERCATOR_RADIUS).sinh().atan().to_degrees();
    (lon, lat)
}

/// (lon, lat) degrees → EPSG:3857 metres.
pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon.to_radians() * WEB_MERCATOR_RADIUS;
    let y = lat.to_radians().tan().asinh() * WEB_MERCATOR_RADIUS;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_spellings() {
        assert_eq!("EPSG:4326".parse::<ReferenceFrame>().unwrap(), ReferenceFrame::WGS84);
        assert_eq!("urn:ogc:def:crs:EPSG::4326".parse::<ReferenceFrame>().unwrap(), ReferenceFrame::WGS84);
        assert_eq!("urn:ogc:def:crs:OGC:1.3:CRS84".parse::<ReferenceFrame>().unwrap(), ReferenceFrame::WGS84);
        assert_eq!("4326".parse::<ReferenceFrame>().unwrap(), ReferenceFrame::WGS84);
        assert_eq!("EPSG:900913".parse::<ReferenceFrame>().unwrap(), ReferenceFrame::WEB_MERCATOR);
        assert_eq!("epsg:32633".parse::<ReferenceFrame>().unwrap().epsg(), 32633);
        assert!("not a frame".parse::<ReferenceFrame>().is_err());
    }

    #[test]
    fn serde_uses_epsg_string() {
        let json = serde_json::to_string(&ReferenceFrame::WEB_MERCATOR).unwrap();
        assert_eq!(json, "\"EPSG:3857\"");
        let back: ReferenceFrame = serde_json::from_str("\"OGC:CRS84\"").unwrap();
        assert_eq!(back, ReferenceFrame::WGS84);
    }

    #[test]
    fn only_known_frames_convert() {
        assert!(ReferenceFrame::WGS84.to_wgs84().is_some());
        assert!(ReferenceFrame::WEB_MERCATOR.to_wgs84().is_some());
        assert!(ReferenceFrame::from_epsg(32633).to_wgs84().is_none());
    }

    #[test]
    fn mercator_roundtrip_within_tolerance() {
        let mut rng_state: u64 = 42;
        for _ in 0..1000 {
            // LCG for deterministic pseudo-random
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let lat = (rng_state as f64 / u64::MAX as f64) * 170.0 - 85.0;
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let lon = (rng_state as f64 / u64::MAX as f64) * 360.0 - 180.0;

            let (x, y) = lonlat_to_mercator(lon, lat);
            let (lon2, lat2) = mercator_to_lonlat(x, y);
            assert!((lon - lon2).abs() < 1e-9, "lon {lon} -> {lon2}");
            assert!((lat - lat2).abs() < 1e-9, "lat {lat} -> {lat2}");
        }
    }

    #[test]
    fn mercator_origin_maps_to_null_island() {
        let (lon, lat) = mercator_to_lonlat(0.0, 0.0);
        assert_eq!((lon, lat), (0.0, 0.0));
    }
}

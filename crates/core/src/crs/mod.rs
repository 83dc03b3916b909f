//! Coordinate Reference System handling

mod transform;

pub use transform::{is_wgs84, parse_utm_epsg, Projection, Reprojector};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system of a raster or AOI.
///
/// Everything the pipeline reprojects between is identified by an EPSG
/// code. Definitions that could not be reduced to one are carried verbatim
/// and only compare equal to the identical text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CRS {
    Epsg(u32),
    Wkt(String),
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        CRS::Epsg(code)
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        CRS::Wkt(wkt.into())
    }

    /// EPSG:4326, the CRS of GeoJSON and of STAC footprints
    pub fn wgs84() -> Self {
        CRS::Epsg(4326)
    }

    /// Parse a CRS identifier as found in GeoJSON `crs` members, STAC
    /// properties and config files.
    ///
    /// Accepts `EPSG:32630`, `epsg:32630`, `urn:ogc:def:crs:EPSG::32630`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`, `OGC:CRS84` and bare codes.
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Some(Self::wgs84());
        }

        let code = upper
            .rsplit(|c| c == ':' || c == '/')
            .next()
            .filter(|_| upper.contains("EPSG") || upper.chars().all(|c| c.is_ascii_digit()))?;

        code.parse::<u32>().ok().map(CRS::Epsg)
    }

    pub fn epsg(&self) -> Option<u32> {
        match self {
            CRS::Epsg(code) => Some(*code),
            CRS::Wkt(_) => None,
        }
    }

    /// Same system, judged by EPSG code or identical WKT text.
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        self == other
    }

    /// Short identifier for logs and error messages
    pub fn identifier(&self) -> String {
        match self {
            CRS::Epsg(code) => format!("EPSG:{code}"),
            CRS::Wkt(wkt) => {
                let end = wkt.char_indices().nth(50).map_or(wkt.len(), |(i, _)| i);
                format!("WKT:{}", &wkt[..end])
            }
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

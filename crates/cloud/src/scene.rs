//! Scene selection: turn catalog items into scene descriptors.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use vegtrend_core::{AreaOfInterest, BBox, CRS};

use crate::error::{CloudError, Result};
use crate::stac_models::{StacItem, StacSearchParams};
use crate::sync_api::StacClientBlocking;

/// Alternative asset keys for the same logical band. Earth Search uses
/// common names, Planetary Computer uses Sentinel-2 band ids.
const BAND_ALIASES: &[(&str, &[&str])] = &[
    ("blue", &["B02"]),
    ("green", &["B03"]),
    ("red", &["B04"]),
    ("nir", &["B08"]),
    ("nir08", &["B8A"]),
    ("swir16", &["B11"]),
    ("swir22", &["B12"]),
];

/// Where a band lives and how to turn its digital numbers into reflectance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandRef {
    /// Asset key in the catalog item
    pub key: String,
    /// URL or local path of the GeoTIFF
    pub href: String,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub nodata: Option<f64>,
}

impl BandRef {
    pub fn new(key: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            href: href.into(),
            scale: None,
            offset: None,
            nodata: None,
        }
    }
}

/// One candidate scene returned by a [`SceneSelector`].
#[derive(Debug, Clone, Serialize)]
pub struct SceneDescriptor {
    pub id: String,
    pub datetime: DateTime<Utc>,
    /// Cloud cover as a 0–1 fraction
    pub cloud_cover: Option<f64>,
    pub epsg: Option<u32>,
    /// Footprint bounding box in WGS84
    pub footprint: Option<BBox>,
    pub bands: BTreeMap<String, BandRef>,
}

impl SceneDescriptor {
    /// Look up a band by common name, falling back to its aliases.
    pub fn band(&self, name: &str) -> Option<&BandRef> {
        self.bands.get(name).or_else(|| {
            BAND_ALIASES
                .iter()
                .find(|(common, _)| *common == name)
                .and_then(|(_, aliases)| aliases.iter().find_map(|a| self.bands.get(*a)))
        })
    }

    /// Like [`SceneDescriptor::band`] but reports absence as an error.
    pub fn require_band(&self, name: &str) -> Result<&BandRef> {
        self.band(name).ok_or_else(|| CloudError::MissingBand {
            scene: self.id.clone(),
            band: name.to_string(),
        })
    }

    pub fn acquisition_date(&self) -> NaiveDate {
        self.datetime.date_naive()
    }

    /// Build a descriptor from a STAC item. Only GeoTIFF data assets become
    /// bands.
    pub fn from_stac_item(item: &StacItem) -> Result<Self> {
        let datetime = item.datetime().ok_or_else(|| CloudError::InvalidItem {
            id: item.id.clone(),
            reason: "missing or invalid datetime".into(),
        })?;

        let footprint = item
            .bbox
            .as_deref()
            .filter(|b| b.len() >= 4)
            .map(|b| match b.len() {
                // 3D bbox: [w, s, zmin, e, n, zmax]
                6 => BBox::new(b[0], b[1], b[3], b[4]),
                _ => BBox::new(b[0], b[1], b[2], b[3]),
            });

        let bands = item
            .assets
            .iter()
            .filter(|(_, asset)| asset.is_geotiff_data())
            .map(|(key, asset)| {
                let raster = asset.raster_band().cloned().unwrap_or_default();
                let band = BandRef {
                    key: key.clone(),
                    href: asset.href.clone(),
                    scale: raster.scale,
                    offset: raster.offset,
                    nodata: raster.nodata,
                };
                (key.clone(), band)
            })
            .collect();

        Ok(Self {
            id: item.id.clone(),
            datetime,
            cloud_cover: item.cloud_fraction(),
            epsg: item.epsg(),
            footprint,
            bands,
        })
    }
}

/// Search constraints for a [`SceneSelector`].
#[derive(Debug, Clone)]
pub struct SceneQuery {
    pub collection: String,
    /// First acquisition day, inclusive
    pub start: NaiveDate,
    /// Last acquisition day, inclusive
    pub end: NaiveDate,
    /// Cloud-cover ceiling as a 0–1 fraction; scenes must be strictly below it
    pub max_cloud_cover: f64,
}

impl SceneQuery {
    /// STAC datetime interval covering both end days in full.
    pub fn datetime_interval(&self) -> String {
        format!(
            "{}T00:00:00Z/{}T23:59:59Z",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }

    /// Client-side check of the search contract. Catalogs disagree on
    /// interval inclusivity and the cloud filter is a percentage upstream.
    pub fn accepts(&self, scene: &SceneDescriptor, aoi_wgs84: &BBox) -> bool {
        let date = scene.acquisition_date();
        if date < self.start || date > self.end {
            return false;
        }

        match scene.cloud_cover {
            Some(fraction) if fraction < self.max_cloud_cover => {}
            _ => return false,
        }

        scene
            .footprint
            .map_or(true, |footprint| footprint.intersects(aoi_wgs84))
    }
}

/// Source of candidate scenes.
///
/// Any error returned here is fatal to the run: no partial scene list is
/// ever produced.
pub trait SceneSelector {
    fn select(&self, aoi: &AreaOfInterest, query: &SceneQuery) -> Result<Vec<SceneDescriptor>>;
}

/// [`SceneSelector`] backed by a STAC API.
pub struct StacSceneSelector {
    client: StacClientBlocking,
    page_size: u32,
}

impl StacSceneSelector {
    pub fn new(client: StacClientBlocking) -> Self {
        Self {
            client,
            page_size: 100,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl SceneSelector for StacSceneSelector {
    fn select(&self, aoi: &AreaOfInterest, query: &SceneQuery) -> Result<Vec<SceneDescriptor>> {
        let aoi_wgs84 = aoi.reproject(&CRS::wgs84())?;
        let aoi_bbox = aoi_wgs84.bbox();

        let params = StacSearchParams::new()
            .collections(&[query.collection.as_str()])
            .intersects(aoi_wgs84.to_geojson_geometry())
            .datetime(&query.datetime_interval())
            .max_cloud_cover(query.max_cloud_cover * 100.0)
            .limit(self.page_size);

        info!(
            catalog = ?self.client.catalog(),
            collection = %query.collection,
            datetime = %query.datetime_interval(),
            max_cloud_cover = query.max_cloud_cover,
            "searching catalog"
        );

        let items = self.client.search_all(&params)?;
        let returned = items.len();

        let mut scenes = Vec::with_capacity(returned);
        for item in &items {
            match SceneDescriptor::from_stac_item(item) {
                Ok(scene) if query.accepts(&scene, &aoi_bbox) => scenes.push(scene),
                Ok(scene) => debug!(scene = %scene.id, "dropped by client-side filter"),
                Err(e) => warn!(item = %item.id, error = %e, "skipping unusable catalog item"),
            }
        }

        info!(returned, selected = scenes.len(), "catalog search complete");
        Ok(scenes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stac_models::StacItemCollection;

    fn fixture_scene() -> SceneDescriptor {
        let col: StacItemCollection =
            serde_json::from_str(crate::stac_models::tests::FIXTURE).unwrap();
        SceneDescriptor::from_stac_item(&col.features[0]).unwrap()
    }

    fn query() -> SceneQuery {
        SceneQuery {
            collection: "sentinel-2-l2a".into(),
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            max_cloud_cover: 0.2,
        }
    }

    #[test]
    fn test_descriptor_from_item() {
        let scene = fixture_scene();
        assert_eq!(scene.id, "S2B_30STF_20250314_0_L2A");
        assert_eq!(scene.epsg, Some(32630));
        assert_eq!(scene.bands.len(), 2);

        let nir = scene.band("nir").unwrap();
        assert_eq!(nir.href, "https://example.com/B08.tif");
        assert_eq!(nir.scale, Some(0.0001));
        assert!(scene.band("swir22").is_none());
        assert!(matches!(
            scene.require_band("green"),
            Err(CloudError::MissingBand { .. })
        ));
    }

    #[test]
    fn test_band_aliases() {
        let mut scene = fixture_scene();
        scene.bands.clear();
        scene.bands.insert("B08".into(), BandRef::new("B08", "/data/B08.tif"));
        assert_eq!(scene.band("nir").map(|b| b.key.as_str()), Some("B08"));
        assert!(scene.band("red").is_none());
    }

    #[test]
    fn test_datetime_interval_is_inclusive() {
        assert_eq!(
            query().datetime_interval(),
            "2025-01-01T00:00:00Z/2025-03-14T23:59:59Z"
        );
    }

    #[test]
    fn test_client_side_filter() {
        let aoi = BBox::new(-6.0, 36.2, -5.8, 36.4);
        let scene = fixture_scene();
        assert!(query().accepts(&scene, &aoi));

        let cloudy = SceneDescriptor {
            cloud_cover: Some(0.2),
            ..scene.clone()
        };
        assert!(!query().accepts(&cloudy, &aoi), "ceiling is exclusive");

        let late = SceneQuery {
            end: NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(),
            ..query()
        };
        assert!(!late.accepts(&scene, &aoi));

        let elsewhere = BBox::new(10.0, 50.0, 11.0, 51.0);
        assert!(!query().accepts(&scene, &elsewhere));
    }
}

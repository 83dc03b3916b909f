//! Band loading: read the part of a band GeoTIFF that covers the AOI.
//!
//! Remote hrefs are read through [`RangeReader`], so only the header and the
//! tiles intersecting the AOI window are transferred. Local paths (plain or
//! `file://`) are read from disk.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tracing::{debug, warn};

use vegtrend_core::io::GeoTiffReader;
use vegtrend_core::{AreaOfInterest, PixelWindow, Raster, CRS};

use crate::error::{CloudError, Result};
use crate::http::HttpClient;
use crate::range_reader::{RangeReader, RangeReaderOptions};
use crate::scene::{BandRef, SceneDescriptor};
use crate::stac_client::{StacCatalog, StacClientOptions};
use crate::sync_api::{build_runtime, StacClientBlocking};

/// Loads one band of one scene as reflectance.
///
/// Returned rasters are `f64`; cells that were the band's nodata or
/// non-finite are NaN, and the raster carries no sentinel of its own. Two
/// bands of the same scene at the same resolution come back on the same
/// grid.
pub trait BandLoader: Send + Sync {
    fn load_band(
        &self,
        scene: &SceneDescriptor,
        band: &BandRef,
        aoi: &AreaOfInterest,
    ) -> Result<Raster<f64>>;
}

/// Options for [`GeoTiffBandLoader`].
#[derive(Debug, Clone)]
pub struct BandLoaderOptions {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub range: RangeReaderOptions,
    /// Apply `raster:bands` scale and offset when present
    pub apply_scale_offset: bool,
}

impl Default for BandLoaderOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            range: RangeReaderOptions::default(),
            apply_scale_offset: true,
        }
    }
}

/// [`BandLoader`] for GeoTIFF/COG assets over HTTP or on disk.
pub struct GeoTiffBandLoader {
    rt: Arc<Runtime>,
    http: HttpClient,
    signer: Option<StacClientBlocking>,
    options: BandLoaderOptions,
}

impl GeoTiffBandLoader {
    pub fn new(options: BandLoaderOptions) -> Result<Self> {
        let rt = build_runtime()?;
        let http = HttpClient::new(options.request_timeout, options.max_retries)?;
        Ok(Self {
            rt,
            http,
            signer: None,
            options,
        })
    }

    /// Sign hrefs before reading when the catalog requires it.
    pub fn with_catalog(mut self, catalog: &StacCatalog) -> Result<Self> {
        self.signer = if catalog.needs_signing() {
            let options = StacClientOptions {
                request_timeout: self.options.request_timeout,
                max_retries: self.options.max_retries,
                ..StacClientOptions::default()
            };
            Some(StacClientBlocking::with_runtime(self.rt.clone(), catalog.clone(), options)?)
        } else {
            None
        };
        Ok(self)
    }

    fn read_remote(&self, url: &str) -> Result<RangeReader> {
        let url = match &self.signer {
            Some(signer) => signer.sign_asset_href(url)?,
            None => url.to_string(),
        };
        RangeReader::open(self.rt.clone(), self.http.clone(), &url, self.options.range)
    }
}

impl BandLoader for GeoTiffBandLoader {
    fn load_band(
        &self,
        scene: &SceneDescriptor,
        band: &BandRef,
        aoi: &AreaOfInterest,
    ) -> Result<Raster<f64>> {
        debug!(scene = %scene.id, band = %band.key, href = %band.href, "loading band");

        let raster = if is_remote(&band.href) {
            let reader = self.read_remote(&band.href)?;
            read_aoi_window(reader, scene, band, aoi)?
        } else {
            let path = band.href.strip_prefix("file://").unwrap_or(&band.href);
            read_aoi_window(BufReader::new(File::open(path)?), scene, band, aoi)?
        };

        let (scale, offset) = if self.options.apply_scale_offset {
            (band.scale.unwrap_or(1.0), band.offset.unwrap_or(0.0))
        } else {
            (1.0, 0.0)
        };
        Ok(to_reflectance(raster, band.nodata, scale, offset))
    }
}

fn is_remote(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

/// Decode the window of the band covering the AOI's bounding box.
fn read_aoi_window<R: Read + Seek>(
    reader: R,
    scene: &SceneDescriptor,
    band: &BandRef,
    aoi: &AreaOfInterest,
) -> Result<Raster<f64>> {
    let mut reader = GeoTiffReader::new(reader)?;
    let meta = reader.metadata().clone();

    let crs = meta.crs.clone().or_else(|| scene.epsg.map(CRS::from_epsg));
    let aoi_bbox = match &crs {
        Some(crs) => aoi.reproject(crs)?.bbox(),
        None => {
            warn!(scene = %scene.id, band = %band.key, "band has no CRS, assuming the AOI's");
            aoi.bbox()
        }
    };

    let window = PixelWindow::from_bbox(&aoi_bbox, &meta.transform, meta.width, meta.height)
        .ok_or(CloudError::BBoxOutside)?;

    let mut raster: Raster<f64> = reader.read_window(window)?;
    if raster.crs().is_none() {
        raster.set_crs(crs);
    }

    debug!(
        scene = %scene.id,
        band = %band.key,
        rows = raster.rows(),
        cols = raster.cols(),
        "decoded band window"
    );
    Ok(raster)
}

/// Scale digital numbers to reflectance; nodata and non-finite cells
/// become NaN.
fn to_reflectance(raster: Raster<f64>, band_nodata: Option<f64>, scale: f64, offset: f64) -> Raster<f64> {
    let nodata = band_nodata.or(raster.nodata());
    let transform = *raster.transform();
    let crs = raster.crs().cloned();

    let data = raster.into_array().mapv(|v| {
        let is_nodata = nodata.map_or(false, |nd| v == nd);
        if is_nodata || !v.is_finite() {
            f64::NAN
        } else {
            v * scale + offset
        }
    });

    Raster::from_array(data).with_georef(transform, crs, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geo_types::{LineString, Polygon};
    use std::collections::BTreeMap;
    use vegtrend_core::io::{write_geotiff, GeoTiffOptions};
    use vegtrend_core::GeoTransform;

    fn scene_with(band: BandRef) -> SceneDescriptor {
        let mut bands = BTreeMap::new();
        bands.insert(band.key.clone(), band);
        SceneDescriptor {
            id: "S2A_30STF_20250310_0_L2A".into(),
            datetime: Utc.with_ymd_and_hms(2025, 3, 10, 11, 0, 0).unwrap(),
            cloud_cover: Some(0.01),
            epsg: Some(32630),
            footprint: None,
            bands,
        }
    }

    fn utm_aoi(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> AreaOfInterest {
        let ring = LineString::from(vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
            (min_x, min_y),
        ]);
        AreaOfInterest::new(vec![Polygon::new(ring, vec![])], CRS::from_epsg(32630)).unwrap()
    }

    #[test]
    fn test_local_band_window_and_scaling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("B08.tif");

        // 10 x 10 grid of 10 m pixels, DN = 1000 + row * 10 + col, DN 0 is nodata
        let mut data: Vec<f64> = (0..100).map(|i| 1000.0 + i as f64).collect();
        data[22] = 0.0;
        let raster = Raster::from_vec(data, 10, 10).unwrap().with_georef(
            GeoTransform::new(440_000.0, 4_460_100.0, 10.0, -10.0),
            Some(CRS::from_epsg(32630)),
            Some(0.0),
        );
        write_geotiff(&raster, &path, &GeoTiffOptions::default()).unwrap();

        let mut band = BandRef::new("nir", path.to_string_lossy());
        band.scale = Some(0.0001);
        band.offset = Some(-0.1);
        let scene = scene_with(band.clone());

        let loader = GeoTiffBandLoader::new(BandLoaderOptions::default()).unwrap();
        let aoi = utm_aoi(440_015.0, 4_460_045.0, 440_045.0, 4_460_085.0);
        let out = loader.load_band(&scene, &band, &aoi).unwrap();

        // cols 1..5, rows 1..6
        assert_eq!(out.shape(), (5, 4));
        assert_eq!(out.transform().origin_x, 440_010.0);
        assert_eq!(out.transform().origin_y, 4_460_090.0);
        assert!(out.get(1, 1).unwrap().is_nan());
        assert!((out.get(0, 0).unwrap() - (1011.0 * 0.0001 - 0.1)).abs() < 1e-9);
        assert_eq!(out.nodata(), None);
    }

    #[test]
    fn test_aoi_outside_band() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("B04.tif");
        let raster = Raster::filled(4, 4, 500.0_f64).with_georef(
            GeoTransform::new(440_000.0, 4_460_040.0, 10.0, -10.0),
            Some(CRS::from_epsg(32630)),
            None,
        );
        write_geotiff(&raster, &path, &GeoTiffOptions::default()).unwrap();

        let band = BandRef::new("red", path.to_string_lossy());
        let scene = scene_with(band.clone());
        let loader = GeoTiffBandLoader::new(BandLoaderOptions::default()).unwrap();

        let far = utm_aoi(500_000.0, 4_000_000.0, 500_100.0, 4_000_100.0);
        assert!(matches!(
            loader.load_band(&scene, &band, &far),
            Err(CloudError::BBoxOutside)
        ));
    }
}

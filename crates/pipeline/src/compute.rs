//! Per-scene index computation with store-backed idempotency

use tracing::{debug, info};

use vegtrend_algorithms::imagery::SpectralIndex;
use vegtrend_cloud::{BandLoader, BandRef, CloudError, SceneDescriptor};
use vegtrend_core::{AreaOfInterest, Raster};

use crate::error::SceneFailure;
use crate::store::IndexStore;

/// What happened to one scene in the compute stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeOutcome {
    Computed,
    /// An artifact already existed; nothing was loaded or written
    Cached,
}

/// Turns a scene's two bands into a persisted index raster.
pub struct IndexComputer<'a> {
    loader: &'a dyn BandLoader,
    store: &'a dyn IndexStore,
    index: SpectralIndex,
    nodata: f64,
}

impl<'a> IndexComputer<'a> {
    pub fn new(
        loader: &'a dyn BandLoader,
        store: &'a dyn IndexStore,
        index: SpectralIndex,
        nodata: f64,
    ) -> Self {
        Self {
            loader,
            store,
            index,
            nodata,
        }
    }

    /// Compute and persist the index for `scene` unless it is already stored.
    ///
    /// Both bands must be listed on the scene before anything is loaded.
    pub fn compute(
        &self,
        scene: &SceneDescriptor,
        aoi: &AreaOfInterest,
    ) -> Result<ComputeOutcome, SceneFailure> {
        if self.store.exists(&scene.id) {
            debug!(scene = %scene.id, "index raster already stored, skipping");
            return Ok(ComputeOutcome::Cached);
        }

        let (positive, negative) = self.index.bands();
        let positive_ref = scene.band(positive).ok_or_else(|| SceneFailure::MissingBand {
            band: positive.to_string(),
        })?;
        let negative_ref = scene.band(negative).ok_or_else(|| SceneFailure::MissingBand {
            band: negative.to_string(),
        })?;

        let load = |band: &str, band_ref: &BandRef| -> Result<Raster<f64>, SceneFailure> {
            self.loader
                .load_band(scene, band_ref, aoi)
                .map_err(|e| match e {
                    CloudError::BBoxOutside => SceneFailure::ClipEmpty,
                    e => SceneFailure::BandLoad {
                        band: band.to_string(),
                        reason: e.to_string(),
                    },
                })
        };
        let a = load(positive, positive_ref)?;
        let b = load(negative, negative_ref)?;

        let raster = self
            .index
            .compute(&a, &b, self.nodata)
            .map_err(|e| SceneFailure::Compute(e.to_string()))?;

        self.store
            .write(&scene.id, &raster)
            .map_err(|e| SceneFailure::Persist(e.to_string()))?;

        info!(
            scene = %scene.id,
            index = %self.index,
            rows = raster.rows(),
            cols = raster.cols(),
            "index raster computed"
        );
        Ok(ComputeOutcome::Computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use geo::polygon;
    use vegtrend_core::{GeoTransform, CRS};

    struct ConstLoader {
        calls: AtomicUsize,
    }

    impl BandLoader for ConstLoader {
        fn load_band(
            &self,
            _scene: &SceneDescriptor,
            band: &BandRef,
            _aoi: &AreaOfInterest,
        ) -> vegtrend_cloud::Result<Raster<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let value = match band.key.as_str() {
                "nir" | "nir08" => 0.6,
                "red" => 0.2,
                // band footprint away from the AOI
                "swir22" => return Err(CloudError::BBoxOutside),
                other => {
                    return Err(CloudError::MissingBand {
                        scene: "test".into(),
                        band: other.into(),
                    })
                }
            };
            Ok(Raster::filled(2, 2, value)
                .with_georef(GeoTransform::new(0.0, 20.0, 10.0, -10.0), Some(CRS::from_epsg(32630)), None))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rasters: Mutex<HashMap<String, Raster<f64>>>,
    }

    impl IndexStore for MemoryStore {
        fn exists(&self, scene_id: &str) -> bool {
            self.rasters.lock().unwrap().contains_key(scene_id)
        }
        fn read(&self, scene_id: &str) -> vegtrend_core::Result<Raster<f64>> {
            self.rasters
                .lock()
                .unwrap()
                .get(scene_id)
                .cloned()
                .ok_or_else(|| vegtrend_core::Error::Other(format!("no raster for {scene_id}")))
        }
        fn write(&self, scene_id: &str, raster: &Raster<f64>) -> vegtrend_core::Result<()> {
            self.rasters.lock().unwrap().insert(scene_id.into(), raster.clone());
            Ok(())
        }
        fn list(&self) -> vegtrend_core::Result<Vec<String>> {
            let mut ids: Vec<_> = self.rasters.lock().unwrap().keys().cloned().collect();
            ids.sort();
            Ok(ids)
        }
    }

    fn scene(bands: &[&str]) -> SceneDescriptor {
        SceneDescriptor {
            id: "S2A_30STF_20250404_0_L2A".into(),
            datetime: Utc.with_ymd_and_hms(2025, 4, 4, 11, 0, 0).unwrap(),
            cloud_cover: Some(0.05),
            epsg: Some(32630),
            footprint: None,
            bands: bands
                .iter()
                .map(|b| (b.to_string(), BandRef::new(*b, format!("file:///{b}.tif"))))
                .collect(),
        }
    }

    fn aoi() -> AreaOfInterest {
        let square = polygon![(x: 0.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 20.0), (x: 0.0, y: 20.0)];
        AreaOfInterest::new(vec![square], CRS::from_epsg(32630)).unwrap()
    }

    #[test]
    fn test_compute_then_cached() {
        let loader = ConstLoader { calls: AtomicUsize::new(0) };
        let store = MemoryStore::default();
        let computer = IndexComputer::new(&loader, &store, SpectralIndex::Ndvi, -9999.0);
        let scene = scene(&["nir", "red"]);

        assert_eq!(computer.compute(&scene, &aoi()).unwrap(), ComputeOutcome::Computed);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);

        let stored = store.read(&scene.id).unwrap();
        assert!((stored.data()[[0, 0]] - 0.5).abs() < 1e-12);
        assert_eq!(stored.nodata(), Some(-9999.0));

        assert_eq!(computer.compute(&scene, &aoi()).unwrap(), ComputeOutcome::Cached);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_band_fails_before_loading() {
        let loader = ConstLoader { calls: AtomicUsize::new(0) };
        let store = MemoryStore::default();
        let computer = IndexComputer::new(&loader, &store, SpectralIndex::Ndvi, -9999.0);

        let failure = computer.compute(&scene(&["nir"]), &aoi()).unwrap_err();
        assert!(matches!(failure, SceneFailure::MissingBand { ref band } if band == "red"));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_load_error_is_scene_failure() {
        let loader = ConstLoader { calls: AtomicUsize::new(0) };
        let store = MemoryStore::default();
        let computer = IndexComputer::new(&loader, &store, SpectralIndex::Gndvi, -9999.0);

        let failure = computer.compute(&scene(&["nir", "green"]), &aoi()).unwrap_err();
        assert_eq!(failure.kind(), "band_load");
        assert!(!store.exists("S2A_30STF_20250404_0_L2A"));
    }

    #[test]
    fn test_band_outside_aoi_is_clip_empty() {
        let loader = ConstLoader { calls: AtomicUsize::new(0) };
        let store = MemoryStore::default();
        let computer = IndexComputer::new(&loader, &store, SpectralIndex::Nbr, -9999.0);

        let failure = computer.compute(&scene(&["nir08", "swir22"]), &aoi()).unwrap_err();
        assert!(matches!(failure, SceneFailure::ClipEmpty));
        assert_eq!(failure.kind(), "clip_empty");
        assert!(!store.exists("S2A_30STF_20250404_0_L2A"));
    }
}

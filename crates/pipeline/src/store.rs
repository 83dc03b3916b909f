//! Persisted index rasters, one GeoTIFF per scene.
//!
//! The store is keyed by scene identity. An artifact exists only once it is
//! complete: [`FsIndexStore`] writes to a temporary file in the same
//! directory and renames it into place.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use vegtrend_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use vegtrend_core::{Raster, Result};

/// Distinguishes concurrent writes within one process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Storage of computed index rasters keyed by scene identity.
pub trait IndexStore: Send + Sync {
    /// Whether a complete artifact exists for `scene_id`
    fn exists(&self, scene_id: &str) -> bool;

    fn read(&self, scene_id: &str) -> Result<Raster<f64>>;

    /// Persist `raster`, replacing any previous artifact atomically.
    fn write(&self, scene_id: &str, raster: &Raster<f64>) -> Result<()>;

    /// Scene identities with a stored artifact, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// [`IndexStore`] over a directory of `<prefix>_<scene id>.tif` files.
#[derive(Debug, Clone)]
pub struct FsIndexStore {
    dir: PathBuf,
    prefix: String,
    options: GeoTiffOptions,
}

impl FsIndexStore {
    /// Open (creating if needed) the directory `dir`.
    pub fn open(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
            options: GeoTiffOptions::default(),
        })
    }

    pub fn with_options(mut self, options: GeoTiffOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for a scene
    pub fn path_for(&self, scene_id: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.tif", self.prefix, scene_id))
    }

    /// Unique per call, so concurrent writers of one scene never share a file.
    fn temp_path_for(&self, scene_id: &str) -> PathBuf {
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            ".{}_{}.tif.{}.{}.tmp",
            self.prefix,
            scene_id,
            std::process::id(),
            seq
        ))
    }

    fn scene_id_of(&self, file_name: &str) -> Option<String> {
        let stem = file_name
            .strip_suffix(".tif")
            .or_else(|| file_name.strip_suffix(".tiff"))?;
        let id = stem.strip_prefix(&self.prefix)?.strip_prefix('_')?;
        (!id.is_empty()).then(|| id.to_string())
    }
}

impl IndexStore for FsIndexStore {
    fn exists(&self, scene_id: &str) -> bool {
        self.path_for(scene_id).is_file()
    }

    fn read(&self, scene_id: &str) -> Result<Raster<f64>> {
        read_geotiff(self.path_for(scene_id))
    }

    fn write(&self, scene_id: &str, raster: &Raster<f64>) -> Result<()> {
        let target = self.path_for(scene_id);
        let temp = self.temp_path_for(scene_id);

        if let Err(e) = write_geotiff(raster, &temp, &self.options) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!(scene = scene_id, path = %target.display(), "index raster written");
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(id) = self.scene_id_of(name) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vegtrend_core::{GeoTransform, CRS};

    fn sample() -> Raster<f64> {
        let mut r = Raster::from_vec(vec![0.1, 0.2, -9999.0, 0.4], 2, 2).unwrap();
        r.set_transform(GeoTransform::new(500_000.0, 4_000_020.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32630)));
        r.set_nodata(Some(-9999.0));
        r
    }

    #[test]
    fn test_write_read_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::open(dir.path().join("ndvi"), "ndvi").unwrap();
        let id = "S2B_30STF_20250314_0_L2A";

        assert!(!store.exists(id));
        store.write(id, &sample()).unwrap();
        assert!(store.exists(id));
        assert!(store.path_for(id).ends_with("ndvi_S2B_30STF_20250314_0_L2A.tif"));

        let back = store.read(id).unwrap();
        assert_eq!(back.shape(), (2, 2));
        assert_eq!(back.nodata(), Some(-9999.0));
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32630));
        assert!((back.data()[[0, 1]] - 0.2).abs() < 1e-6);

        assert_eq!(store.list().unwrap(), vec![id.to_string()]);
    }

    #[test]
    fn test_list_ignores_foreign_and_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::open(dir.path(), "ndvi").unwrap();
        store.write("B", &sample()).unwrap();
        store.write("A", &sample()).unwrap();
        fs::write(dir.path().join("gndvi_C.tif"), b"").unwrap();
        fs::write(dir.path().join(".ndvi_D.tif.1.tmp"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        assert_eq!(store.list().unwrap(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_rewrite_replaces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::open(dir.path(), "ndvi").unwrap();
        store.write("X", &sample()).unwrap();

        let mut other = sample();
        other.set_nodata(Some(-1.0e6));
        store.write("X", &other).unwrap();

        assert_eq!(store.read("X").unwrap().nodata(), Some(-1.0e6));
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_concurrent_writes_of_one_scene() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::open(dir.path(), "ndvi").unwrap();
        let raster = sample();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| store.write("S2B_30STF_20250321_0_L2A", &raster)))
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap();
            }
        });

        assert_eq!(store.list().unwrap(), vec!["S2B_30STF_20250321_0_L2A".to_string()]);
        assert_eq!(store.read("S2B_30STF_20250321_0_L2A").unwrap().shape(), (2, 2));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

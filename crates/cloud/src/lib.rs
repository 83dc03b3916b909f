//! # vegtrend Cloud
//!
//! Scene selection against STAC catalogs and band loading from remote
//! Cloud Optimized GeoTIFFs.
//!
//! - [`StacClient`] searches a catalog (POST `/search`, pagination, retry);
//!   [`StacClientBlocking`] drives it from synchronous code.
//! - [`StacSceneSelector`] turns catalog items into [`SceneDescriptor`]s and
//!   re-checks the search constraints client-side.
//! - [`GeoTiffBandLoader`] reads only the AOI window of a band through HTTP
//!   Range requests with an LRU block cache.

pub mod band_loader;
pub mod cache;
pub mod error;
pub mod http;
pub mod range_reader;
pub mod scene;
pub mod stac_client;
pub mod stac_models;
pub mod sync_api;

pub use band_loader::{BandLoader, BandLoaderOptions, GeoTiffBandLoader};
pub use error::{CloudError, Result};
pub use scene::{BandRef, SceneDescriptor, SceneQuery, SceneSelector, StacSceneSelector};
pub use stac_client::{StacCatalog, StacClient, StacClientOptions};
pub use stac_models::{StacItem, StacItemCollection, StacSearchParams};
pub use sync_api::StacClientBlocking;

//! Blocking (synchronous) wrappers.
//!
//! The pipeline is synchronous; these types own a Tokio runtime and drive
//! the async clients with `block_on` so callers never manage one.

use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::error::{CloudError, Result};
use crate::stac_client::{StacCatalog, StacClient, StacClientOptions};
use crate::stac_models::{StacItem, StacItemCollection, StacSearchParams};

/// Multi-threaded runtime shared by blocking wrappers. `block_on` may be
/// called from several worker threads at once.
pub fn build_runtime() -> Result<Arc<Runtime>> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map(Arc::new)
        .map_err(|e| CloudError::Network(format!("failed to start async runtime: {e}")))
}

/// Blocking wrapper around [`StacClient`].
pub struct StacClientBlocking {
    rt: Arc<Runtime>,
    inner: StacClient,
}

impl StacClientBlocking {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        Self::with_runtime(build_runtime()?, catalog, options)
    }

    /// Reuse an existing runtime.
    pub fn with_runtime(rt: Arc<Runtime>, catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let inner = StacClient::new(catalog, options)?;
        Ok(Self { rt, inner })
    }

    pub fn catalog(&self) -> &StacCatalog {
        self.inner.catalog()
    }

    /// Execute a single search request (blocking).
    pub fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        self.rt.block_on(self.inner.search(params))
    }

    /// Search with automatic pagination (blocking).
    pub fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        self.rt.block_on(self.inner.search_all(params))
    }

    /// Sign an asset href for Planetary Computer (blocking).
    pub fn sign_asset_href(&self, href: &str) -> Result<String> {
        self.rt.block_on(self.inner.sign_asset_href(href))
    }
}

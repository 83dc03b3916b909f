//! Async STAC client for searching spatio-temporal asset catalogs.
//!
//! Supports Earth Search and Planetary Computer out of the box, plus
//! arbitrary STAC API endpoints via [`StacCatalog::Custom`].

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CloudError, Result};
use crate::stac_models::{StacItem, StacItemCollection, StacLink, StacSearchParams};

// ---------------------------------------------------------------------------
// Catalog enum
// ---------------------------------------------------------------------------

/// Well-known STAC catalogs plus custom endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum StacCatalog {
    /// AWS Earth Search (Element 84).
    EarthSearch,
    /// Microsoft Planetary Computer STAC API.
    PlanetaryComputer,
    /// Any STAC API endpoint (root URL, e.g. `"https://my-stac.example.com/api/v1"`).
    Custom(String),
}

impl StacCatalog {
    /// Return the full POST `/search` URL for this catalog.
    pub fn search_url(&self) -> String {
        match self {
            Self::EarthSearch => "https://earth-search.aws.element84.com/v1/search".to_string(),
            Self::PlanetaryComputer => {
                "https://planetarycomputer.microsoft.com/api/stac/v1/search".to_string()
            }
            Self::Custom(base) => {
                let base = base.trim_end_matches('/');
                if base.ends_with("/search") {
                    base.to_string()
                } else {
                    format!("{}/search", base)
                }
            }
        }
    }

    /// Parse a shorthand string into a catalog.
    ///
    /// Recognized shorthands: `"es"`, `"earth-search"`, `"pc"`,
    /// `"planetary-computer"`. Anything else is treated as a custom URL.
    pub fn from_str_or_url(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            "pc" | "planetary-computer" | "planetarycomputer" => Self::PlanetaryComputer,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Whether asset hrefs need a SAS token before they can be read.
    pub fn needs_signing(&self) -> bool {
        matches!(self, Self::PlanetaryComputer)
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`StacClient`].
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    /// Per-request timeout (default 30 s).
    pub request_timeout: Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
    /// Maximum total items to fetch across pages (default 500).
    pub max_items: usize,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            max_items: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Async client for STAC Item Search.
pub struct StacClient {
    catalog: StacCatalog,
    client: reqwest::Client,
    options: StacClientOptions,
}

impl StacClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            catalog,
            client,
            options,
        })
    }

    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    // ── Single-page search ──────────────────────────────────────────

    /// Execute a single search request and return one page of results.
    pub async fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        let body = serde_json::to_value(params)
            .map_err(|e| CloudError::Catalog(format!("serializing search params: {e}")))?;
        self.post_search(&self.catalog.search_url(), &body).await
    }

    // ── Paginated search ────────────────────────────────────────────

    /// Search with automatic pagination, collecting every matching item.
    ///
    /// Fails with [`CloudError::TooManyItems`] rather than returning a
    /// partial result when the catalog holds more than `max_items` matches.
    pub async fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        let mut body = serde_json::to_value(params)
            .map_err(|e| CloudError::Catalog(format!("serializing search params: {e}")))?;

        let mut pages = PageCollector::new(self.options.max_items);
        let first = self.post_search(&self.catalog.search_url(), &body).await?;
        let mut next = pages.push(first)?;

        while let Some(link) = next {
            let page = self.follow_next(&link, &mut body).await?;
            next = pages.push(page)?;
        }

        debug!(items = pages.items.len(), pages = pages.pages, "STAC search finished");
        Ok(pages.items)
    }

    // ── Planetary Computer SAS token signing ────────────────────────

    /// Sign an asset href for Planetary Computer via the `/sign` endpoint.
    ///
    /// For catalogs that need no signing the href is returned unchanged.
    pub async fn sign_asset_href(&self, href: &str) -> Result<String> {
        if !self.catalog.needs_signing() {
            return Ok(href.to_string());
        }

        let url = format!(
            "https://planetarycomputer.microsoft.com/api/sas/v1/sign?href={}",
            href
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CloudError::Auth(format!("PC sign request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CloudError::Auth(format!(
                "PC sign returned HTTP {}: {}",
                status,
                body.chars().take(300).collect::<String>()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| CloudError::Auth(format!("parsing PC sign response: {e}")))?;

        body["href"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CloudError::Auth("PC sign response missing 'href' field".into()))
    }

    // ── Private helpers ─────────────────────────────────────────────

    /// POST a search body, retrying transport failures and 5xx responses
    /// with exponential backoff (500ms, 1s, 2s, ...). 4xx is not retried.
    async fn post_search(&self, url: &str, body: &Value) -> Result<StacItemCollection> {
        self.send_with_retry(|| self.client.post(url).json(body)).await
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<StacItemCollection>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying STAC request");
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(r) if r.status().is_success() => {
                    let text = r
                        .text()
                        .await
                        .map_err(|e| CloudError::Catalog(format!("reading response body: {e}")))?;
                    return serde_json::from_str(&text)
                        .map_err(|e| CloudError::Catalog(format!("parsing STAC response: {e}")));
                }
                Ok(r) => {
                    let status = r.status();
                    let text = r.text().await.unwrap_or_default();
                    last_err = Some(CloudError::Catalog(format!(
                        "STAC search returned HTTP {}: {}",
                        status,
                        text.chars().take(500).collect::<String>()
                    )));
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_err = Some(CloudError::Catalog(format!("STAC request failed: {e}")));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Catalog("STAC search failed".into())))
    }

    /// Follow a pagination link. POST links replace or merge into the
    /// running request body; GET links are fetched as-is.
    async fn follow_next(&self, link: &StacLink, body: &mut Value) -> Result<StacItemCollection> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();

        if method != "POST" {
            return self.send_with_retry(|| self.client.get(&link.href)).await;
        }

        *body = next_body(body, link);
        let body = &*body;
        self.post_search(&link.href, body).await
    }
}

/// Accumulates search pages up to an item limit.
#[derive(Debug)]
struct PageCollector {
    items: Vec<StacItem>,
    max: usize,
    pages: usize,
}

impl PageCollector {
    fn new(max: usize) -> Self {
        Self {
            items: Vec::new(),
            max,
            pages: 0,
        }
    }

    /// Take one page and return the link to follow, if any. An empty page
    /// ends the search. At exactly `max` items the next page is still
    /// fetched so that an exact fit is told apart from an overflow.
    fn push(&mut self, mut page: StacItemCollection) -> Result<Option<StacLink>> {
        if page.is_empty() {
            return Ok(None);
        }
        self.pages += 1;
        let next = page.next_link().cloned();
        self.items.append(&mut page.features);

        if self.items.len() > self.max {
            warn!(limit = self.max, pages = self.pages, "STAC search exceeded the item limit");
            return Err(CloudError::TooManyItems { limit: self.max });
        }
        Ok(next)
    }
}

/// Request body for a POST `next` link.
fn next_body(previous: &Value, link: &StacLink) -> Value {
    match (&link.body, link.merge.unwrap_or(false)) {
        (Some(link_body), true) => {
            let mut merged = previous.clone();
            if let (Some(base), Some(overlay)) = (merged.as_object_mut(), link_body.as_object()) {
                for (k, v) in overlay {
                    base.insert(k.clone(), v.clone());
                }
            }
            merged
        }
        (Some(link_body), false) => link_body.clone(),
        (None, _) => previous.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_search_urls() {
        assert_eq!(
            StacCatalog::EarthSearch.search_url(),
            "https://earth-search.aws.element84.com/v1/search"
        );
        assert_eq!(
            StacCatalog::Custom("https://example.com/stac".into()).search_url(),
            "https://example.com/stac/search"
        );
        assert_eq!(
            StacCatalog::Custom("https://example.com/stac/search/".into()).search_url(),
            "https://example.com/stac/search"
        );
    }

    #[test]
    fn catalog_from_str_or_url() {
        assert_eq!(StacCatalog::from_str_or_url("earth-search"), StacCatalog::EarthSearch);
        assert_eq!(StacCatalog::from_str_or_url("PC"), StacCatalog::PlanetaryComputer);
        assert_eq!(
            StacCatalog::from_str_or_url("https://Example.com/v1"),
            StacCatalog::Custom("https://Example.com/v1".into())
        );
        assert!(StacCatalog::PlanetaryComputer.needs_signing());
        assert!(!StacCatalog::EarthSearch.needs_signing());
    }

    fn page(items: usize, next: bool) -> StacItemCollection {
        let mut page: StacItemCollection =
            serde_json::from_str(crate::stac_models::tests::FIXTURE).unwrap();
        let item = page.features[0].clone();
        page.features = vec![item; items];
        page.links = if next {
            vec![StacLink {
                rel: "next".into(),
                href: "https://example.com/search?page=2".into(),
                method: None,
                body: None,
                merge: None,
            }]
        } else {
            Vec::new()
        };
        page
    }

    #[test]
    fn pages_followed_until_no_next_link() {
        let mut pages = PageCollector::new(500);
        assert!(pages.push(page(100, true)).unwrap().is_some());
        assert!(pages.push(page(40, false)).unwrap().is_none());
        assert_eq!(pages.items.len(), 140);
        assert_eq!(pages.pages, 2);
    }

    #[test]
    fn exact_fit_at_limit_is_accepted() {
        let mut pages = PageCollector::new(100);
        assert!(pages.push(page(100, true)).unwrap().is_some());
        assert!(pages.push(page(0, false)).unwrap().is_none());
        assert_eq!(pages.items.len(), 100);
    }

    #[test]
    fn second_page_past_limit_fails() {
        let mut pages = PageCollector::new(100);
        assert!(pages.push(page(100, true)).unwrap().is_some());
        let err = pages.push(page(100, true)).unwrap_err();
        assert!(matches!(err, CloudError::TooManyItems { limit: 100 }));
    }

    #[test]
    fn merge_link_body_keeps_filters() {
        let previous = json!({"collections": ["sentinel-2-l2a"], "limit": 100});
        let link = StacLink {
            rel: "next".into(),
            href: "https://example.com/search".into(),
            method: Some("POST".into()),
            body: Some(json!({"next": "token-2"})),
            merge: Some(true),
        };

        let body = next_body(&previous, &link);
        assert_eq!(body["collections"], json!(["sentinel-2-l2a"]));
        assert_eq!(body["next"], "token-2");

        let replace = StacLink { merge: Some(false), ..link };
        assert_eq!(next_body(&previous, &replace), json!({"next": "token-2"}));
    }
}

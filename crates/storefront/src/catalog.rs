//! Product detail lookups with an in-memory cache.
//!
//! Adding an item needs a unit price snapshot. Product details change rarely,
//! so lookups are cached with `moka` (5-minute TTL by default).

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{ProductId, ProductSnapshot};
use moka::future::Cache;
use tracing::{debug, instrument};

use crate::remote::{ApiError, RemoteCatalog};

const MAX_CACHED_PRODUCTS: u64 = 1000;

/// Cached product catalog.
pub struct Catalog<S> {
    source: Arc<S>,
    cache: Cache<ProductId, ProductSnapshot>,
}

impl<S> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
        }
    }
}

impl<S: RemoteCatalog> Catalog<S> {
    /// Create a catalog over `source`, caching entries for `ttl`.
    #[must_use]
    pub fn new(source: Arc<S>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHED_PRODUCTS)
            .time_to_live(ttl)
            .build();

        Self { source, cache }
    }

    /// Get a product snapshot, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn product(&self, product_id: &ProductId) -> Result<ProductSnapshot, ApiError> {
        if let Some(product) = self.cache.get(product_id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let product = self.source.product(product_id).await?;

        self.cache
            .insert(product_id.clone(), product.clone())
            .await;

        Ok(product)
    }

    /// Drop a cached product so the next lookup refetches it.
    pub async fn invalidate(&self, product_id: &ProductId) {
        self.cache.invalidate(product_id).await;
    }
}

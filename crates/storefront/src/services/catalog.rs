//! Read-through cache for the category list.
//!
//! Categories change rarely and are read on every page, so the list is cached
//! with `moka` for a configurable TTL. Categories are written by
//! `shopline-cli seed` in another process; every committed write notifies
//! [`CATEGORY_CHANNEL`], and [`listen_for_category_changes`] drops the entry
//! so the next read goes back to the store. The TTL bounds staleness if a
//! notification is missed.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tracing::{debug, info, instrument, warn};

use shopline_core::catalog::Category;

use crate::db::catalog::CATEGORY_CHANNEL;
use crate::db::{CatalogStore, RepositoryError};

const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
}

/// Category list cache. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, Arc<Vec<Category>>>,
}

impl CatalogCache {
    /// Create a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// All categories ordered by name, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the cache is cold and the store fails.
    #[instrument(skip(self, store))]
    pub async fn categories<S: CatalogStore>(
        &self,
        store: &S,
    ) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(categories) = self.cache.get(&CacheKey::Categories).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(store.list_categories().await?);
        self.cache
            .insert(CacheKey::Categories, Arc::clone(&categories))
            .await;

        Ok(categories)
    }

    /// Drop the cached list.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&CacheKey::Categories).await;
    }
}

/// Invalidate `cache` on every category change notification.
///
/// Runs until the task is aborted. The listener reconnects on its own after
/// a dropped connection; the cache is cleared on any receive error because
/// notifications may have been lost.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the listener cannot connect or
/// subscribe.
pub async fn listen_for_category_changes(
    pool: &PgPool,
    cache: CatalogCache,
) -> Result<(), RepositoryError> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CATEGORY_CHANNEL).await?;
    info!(channel = CATEGORY_CHANNEL, "Listening for category changes");

    loop {
        match listener.recv().await {
            Ok(_) => {
                debug!("Category change notified");
                cache.invalidate().await;
            }
            Err(e) => {
                warn!(error = %e, "Category listener failed, retrying");
                cache.invalidate().await;
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
            }
        }
    }
}

impl std::fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

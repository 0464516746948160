//! The client cart cache.
//!
//! [`CartCache`] keeps a local mirror of the server cart so reads are instant
//! and mutations show up before the server answers. The server stays
//! authoritative: every successful call replaces the mirror with the cart the
//! server returned, and every failed mutation is compensated.

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use shopline_core::cart::CartView;
use shopline_core::{CartLineId, Quantity};

use crate::api::CartApi;
use crate::error::{ApiError, CartClientError};
use crate::mirror::{CartMirror, Compensation, LocalLine, Mutation, ProductRef};
use crate::persist::{PersistedCart, SnapshotStore};
use crate::retry::RetryPolicy;

/// Cache tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartCacheConfig {
    /// How long a successful sync satisfies `fetch` without a network call.
    pub ttl: Duration,
    /// Retry policy for reads. Mutations are sent once.
    pub retry: RetryPolicy,
}

impl Default for CartCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

/// How a `fetch` was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The last sync is within the TTL; no request was made.
    Cached,
    /// The server cart replaced the mirror.
    Refreshed,
    /// The server could not be reached; the mirror is shown as is.
    Fallback { warning: String },
}

/// Local cart mirror backed by the storefront API.
///
/// Mutating methods take `&mut self`, so no other change can land between an
/// optimistic update and its confirmation or compensation.
pub struct CartCache<A, P> {
    api: A,
    snapshots: P,
    config: CartCacheConfig,
    mirror: CartMirror,
    last_synced: Option<Instant>,
}

impl<A, P> std::fmt::Debug for CartCache<A, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartCache")
            .field("config", &self.config)
            .field("lines", &self.mirror.lines().len())
            .field("last_synced", &self.last_synced)
            .finish_non_exhaustive()
    }
}

impl<A: CartApi, P: SnapshotStore> CartCache<A, P> {
    /// Open the cache, showing the persisted snapshot until the first fetch.
    ///
    /// An unreadable snapshot is logged and ignored.
    pub async fn open(api: A, snapshots: P, config: CartCacheConfig) -> Self {
        let lines = match snapshots.load().await {
            Ok(Some(persisted)) => {
                debug!(
                    lines = persisted.lines.len(),
                    saved_at = %persisted.saved_at,
                    "Loaded provisional cart snapshot"
                );
                persisted.lines
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cart snapshot");
                Vec::new()
            }
        };

        Self {
            api,
            snapshots,
            config,
            mirror: CartMirror::from_lines(lines),
            last_synced: None,
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[LocalLine] {
        self.mirror.lines()
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.mirror.subtotal()
    }

    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.mirror.item_count()
    }

    /// Whether any line is above the stock seen at the last server read.
    #[must_use]
    pub fn has_stock_warnings(&self) -> bool {
        self.mirror.lines().iter().any(LocalLine::exceeds_stock)
    }

    /// True until the mirror has been reconciled with the server.
    #[must_use]
    pub const fn is_provisional(&self) -> bool {
        self.last_synced.is_none()
    }

    /// Force the next `fetch` to go to the server.
    pub fn invalidate(&mut self) {
        self.last_synced = None;
    }

    /// Read the cart from the server unless the last sync is fresh.
    ///
    /// Transient failures are retried per the configured policy. If they
    /// persist, the mirror is kept and a soft warning is returned.
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::Api` if the server rejects the read (for
    /// example an expired session).
    #[instrument(skip(self))]
    pub async fn fetch(&mut self) -> Result<FetchOutcome, CartClientError> {
        if let Some(synced) = self.last_synced
            && synced.elapsed() < self.config.ttl
        {
            debug!("Cart cache fresh, skipping fetch");
            return Ok(FetchOutcome::Cached);
        }

        let api = &self.api;
        match self.config.retry.run(|| api.get_cart()).await {
            Ok(view) => {
                self.reconcile(&view).await;
                Ok(FetchOutcome::Refreshed)
            }
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Cart fetch failed, showing cached cart");
                Ok(FetchOutcome::Fallback {
                    warning: format!("Showing your last saved cart: {e}"),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Add `quantity` of `product`.
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::InvalidQuantity` without touching the mirror
    /// if `quantity` is below 1. Returns `CartClientError::Api` if the server
    /// call fails, after reverting the mirror.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&mut self, product: ProductRef, quantity: i32) -> Result<(), CartClientError> {
        let quantity = Quantity::new(quantity)?;
        let product_id = product.id;
        let compensation = self.mirror.apply(&Mutation::Add { product, quantity });

        let result = self.api.add_line(product_id, quantity.get()).await;
        self.resolve(compensation, result).await
    }

    /// Set a line's quantity; below 1 removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::Api` if the server call fails, after
    /// reverting the mirror.
    #[instrument(skip(self))]
    pub async fn update(&mut self, line_id: CartLineId, quantity: i32) -> Result<(), CartClientError> {
        let compensation = self
            .mirror
            .apply(&Mutation::SetQuantity { line_id, quantity });

        let result = self.api.set_quantity(line_id, quantity).await;
        self.resolve(compensation, result).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::Api` if the server call fails, after
    /// reverting the mirror.
    #[instrument(skip(self))]
    pub async fn remove(&mut self, line_id: CartLineId) -> Result<(), CartClientError> {
        let compensation = self.mirror.apply(&Mutation::Remove { line_id });

        let result = self.api.remove_line(line_id).await;
        self.resolve(compensation, result).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::Api` if the server call fails, after
    /// restoring the lines.
    #[instrument(skip(self))]
    pub async fn clear(&mut self) -> Result<(), CartClientError> {
        let compensation = self.mirror.apply(&Mutation::Clear);

        let result = self.api.clear().await;
        self.resolve(compensation, result).await
    }

    async fn resolve(
        &mut self,
        compensation: Compensation,
        result: Result<CartView, ApiError>,
    ) -> Result<(), CartClientError> {
        match result {
            Ok(view) => {
                self.reconcile(&view).await;
                Ok(())
            }
            Err(e) => {
                self.mirror.compensate(compensation);
                // The server may have applied the write before the failure.
                self.last_synced = None;
                info!(error = %e, "Cart mutation failed, reverted local cart");
                Err(e.into())
            }
        }
    }

    async fn reconcile(&mut self, view: &CartView) {
        self.mirror.confirm(view);
        self.last_synced = Some(Instant::now());

        let snapshot = PersistedCart {
            lines: self.mirror.lines().to_vec(),
            saved_at: Utc::now(),
        };
        if let Err(e) = self.snapshots.save(&snapshot).await {
            warn!(error = %e, "Failed to persist cart snapshot");
        }
    }
}

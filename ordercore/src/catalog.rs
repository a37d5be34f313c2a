//! Ports for the external catalog collaborators.
//!
//! The checkout engine consumes two narrow read interfaces: [`CatalogLookup`]
//! for product price/availability and provider identity, and
//! [`StatusCatalog`] for the open list of recognized ledger statuses.
//! Their CRUD management lives outside this crate.
//!
//! [`CachedCatalog`] is an explicit, bounded-TTL read-through cache with
//! per-key invalidation. It is an ordinary value passed by reference, never
//! ambient global state.

use crate::errors::{CatalogError, CatalogResult};
use crate::types::{Money, ProductId, ProviderId, StatusId};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

/// Current catalog data for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// The product's identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub price: Money,
    /// Units currently available. May be zero.
    pub available: u32,
    /// The provider who fulfills orders for this product.
    pub provider_id: ProviderId,
}

/// Identity of a fulfilling provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// The provider's identifier.
    pub id: ProviderId,
    /// Display name.
    pub name: String,
}

/// Read access to the product catalog.
///
/// Implementations should answer from current data; staleness is handled by
/// the authoritative revision check at checkout commit, so a cached answer
/// here costs at most one retry.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Looks up one product's current price, availability, and provider.
    async fn product(&self, id: &ProductId) -> CatalogResult<ProductInfo>;

    /// Looks up a provider's identity.
    async fn provider(&self, id: &ProviderId) -> CatalogResult<ProviderInfo>;
}

/// One recognized status in the open status catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// The status identifier recorded in ledger entries.
    pub id: StatusId,
    /// Human-readable name, used for display only.
    pub display_name: String,
}

impl StatusEntry {
    /// Creates a new status entry.
    pub fn new(id: StatusId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    /// An entry for a status id that is no longer in the catalog. The raw id
    /// doubles as the display name so old ledger rows still render.
    pub fn unresolved(id: StatusId) -> Self {
        let display_name = id.to_string();
        Self { id, display_name }
    }
}

/// The open catalog of recognized order/item statuses.
///
/// New lifecycle stages are added by inserting rows, not by editing an enum.
/// The catalog is consulted for recognition and display only; the ledger
/// performs no transition validation.
#[async_trait]
pub trait StatusCatalog: Send + Sync {
    /// All recognized statuses.
    async fn statuses(&self) -> Vec<StatusEntry>;

    /// Resolves one status id, if recognized.
    async fn resolve(&self, id: &StatusId) -> Option<StatusEntry>;

    /// The implicit initial status for parents with no ledger entries yet.
    async fn initial(&self) -> StatusEntry;
}

/// An in-memory, runtime-configured [`StatusCatalog`].
#[derive(Debug, Clone)]
pub struct StaticStatusCatalog {
    initial: StatusEntry,
    entries: Vec<StatusEntry>,
}

impl StaticStatusCatalog {
    /// Creates a catalog from an initial entry and any further entries.
    pub fn new(initial: StatusEntry, mut entries: Vec<StatusEntry>) -> Self {
        if !entries.iter().any(|e| e.id == initial.id) {
            entries.insert(0, initial.clone());
        }
        Self { initial, entries }
    }

    /// A catalog with the common order lifecycle stages, starting at
    /// "pending".
    pub fn standard() -> Self {
        let entry = |id: &str, name: &str| {
            StatusEntry::new(
                StatusId::try_new(id).expect("static status ids are valid"),
                name,
            )
        };
        let initial = entry("pending", "Pending");
        Self::new(
            initial,
            vec![
                entry("paid", "Paid"),
                entry("shipped", "Shipped"),
                entry("delivered", "Delivered"),
                entry("cancelled", "Cancelled"),
            ],
        )
    }
}

#[async_trait]
impl StatusCatalog for StaticStatusCatalog {
    async fn statuses(&self) -> Vec<StatusEntry> {
        self.entries.clone()
    }

    async fn resolve(&self, id: &StatusId) -> Option<StatusEntry> {
        self.entries.iter().find(|e| &e.id == id).cloned()
    }

    async fn initial(&self) -> StatusEntry {
        self.initial.clone()
    }
}

/// A bounded-TTL read-through cache over any [`CatalogLookup`].
///
/// Entries expire after the TTL; individual keys can be invalidated eagerly
/// when the owning service knows the catalog changed. An optional per-call
/// deadline turns slow lookups into [`CatalogError::Timeout`], which callers
/// treat as retryable.
pub struct CachedCatalog<C> {
    inner: C,
    ttl: Duration,
    deadline: Option<Duration>,
    products: RwLock<HashMap<ProductId, (Instant, ProductInfo)>>,
    providers: RwLock<HashMap<ProviderId, (Instant, ProviderInfo)>>,
}

impl<C> CachedCatalog<C> {
    /// Wraps a catalog with the given TTL.
    pub fn new(inner: C, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            deadline: None,
            products: RwLock::new(HashMap::new()),
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Sets a per-call deadline for lookups that miss the cache.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Drops the cached entry for one product.
    pub fn invalidate_product(&self, id: &ProductId) {
        self.products.write().remove(id);
    }

    /// Drops the cached entry for one provider.
    pub fn invalidate_provider(&self, id: &ProviderId) {
        self.providers.write().remove(id);
    }

    /// Drops every cached entry.
    pub fn purge(&self) {
        self.products.write().clear();
        self.providers.write().clear();
    }

    async fn with_deadline_applied<T, F>(&self, fut: F) -> CatalogResult<T>
    where
        F: Future<Output = CatalogResult<T>> + Send,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, fut)
                .await
                .map_err(|_| CatalogError::Timeout(deadline))?,
            None => fut.await,
        }
    }
}

#[async_trait]
impl<C> CatalogLookup for CachedCatalog<C>
where
    C: CatalogLookup,
{
    async fn product(&self, id: &ProductId) -> CatalogResult<ProductInfo> {
        if let Some((at, info)) = self.products.read().get(id) {
            if at.elapsed() < self.ttl {
                return Ok(info.clone());
            }
        }
        let info = self.with_deadline_applied(self.inner.product(id)).await?;
        self.products
            .write()
            .insert(*id, (Instant::now(), info.clone()));
        Ok(info)
    }

    async fn provider(&self, id: &ProviderId) -> CatalogResult<ProviderInfo> {
        if let Some((at, info)) = self.providers.read().get(id) {
            if at.elapsed() < self.ttl {
                return Ok(info.clone());
            }
        }
        let info = self.with_deadline_applied(self.inner.provider(id)).await?;
        self.providers
            .write()
            .insert(*id, (Instant::now(), info.clone()));
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingCatalog {
        info: ProductInfo,
        provider: ProviderInfo,
        calls: Arc<AtomicU32>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl CatalogLookup for CountingCatalog {
        async fn product(&self, id: &ProductId) -> CatalogResult<ProductInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if id == &self.info.id {
                Ok(self.info.clone())
            } else {
                Err(CatalogError::ProductNotFound(*id))
            }
        }

        async fn provider(&self, id: &ProviderId) -> CatalogResult<ProviderInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if id == &self.provider.id {
                Ok(self.provider.clone())
            } else {
                Err(CatalogError::ProviderNotFound(*id))
            }
        }
    }

    fn counting_catalog(delay: Option<Duration>) -> (CountingCatalog, Arc<AtomicU32>, ProductId) {
        let calls = Arc::new(AtomicU32::new(0));
        let product_id = ProductId::generate();
        let provider_id = ProviderId::generate();
        let catalog = CountingCatalog {
            info: ProductInfo {
                id: product_id,
                name: "Widget".to_string(),
                price: Money::from_cents(1000).unwrap(),
                available: 5,
                provider_id,
            },
            provider: ProviderInfo {
                id: provider_id,
                name: "Acme".to_string(),
            },
            calls: Arc::clone(&calls),
            delay,
        };
        (catalog, calls, product_id)
    }

    #[tokio::test]
    async fn fresh_entries_are_served_from_cache() {
        let (catalog, calls, product_id) = counting_catalog(None);
        let cached = CachedCatalog::new(catalog, Duration::from_secs(60));

        cached.product(&product_id).await.unwrap();
        cached.product(&product_id).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let (catalog, calls, product_id) = counting_catalog(None);
        let cached = CachedCatalog::new(catalog, Duration::ZERO);

        cached.product(&product_id).await.unwrap();
        cached.product(&product_id).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidation_forces_a_refetch() {
        let (catalog, calls, product_id) = counting_catalog(None);
        let cached = CachedCatalog::new(catalog, Duration::from_secs(60));

        cached.product(&product_id).await.unwrap();
        cached.invalidate_product(&product_id);
        cached.product(&product_id).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookups_surface_as_timeouts() {
        let (catalog, _calls, product_id) = counting_catalog(Some(Duration::from_secs(10)));
        let cached = CachedCatalog::new(catalog, Duration::from_secs(60))
            .with_deadline(Duration::from_secs(1));

        let err = cached.product(&product_id).await.unwrap_err();
        assert!(matches!(err, CatalogError::Timeout(_)));
    }

    #[tokio::test]
    async fn misses_propagate_not_found() {
        let (catalog, _calls, _product_id) = counting_catalog(None);
        let cached = CachedCatalog::new(catalog, Duration::from_secs(60));

        let err = cached.product(&ProductId::generate()).await.unwrap_err();
        assert!(matches!(err, CatalogError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn static_status_catalog_resolves_and_lists() {
        let catalog = StaticStatusCatalog::standard();
        let initial = catalog.initial().await;
        assert_eq!(initial.id.as_ref(), "pending");

        let shipped = StatusId::try_new("shipped").unwrap();
        assert_eq!(catalog.resolve(&shipped).await.unwrap().display_name, "Shipped");

        let unknown = StatusId::try_new("melted").unwrap();
        assert!(catalog.resolve(&unknown).await.is_none());

        // The initial entry is part of the recognized list.
        assert!(catalog
            .statuses()
            .await
            .iter()
            .any(|e| e.id == initial.id));
    }
}

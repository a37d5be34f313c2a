//! In-memory adapter for the ordercore checkout engine.
//!
//! [`InMemoryCommerceStore`] implements both the [`CommerceStore`] and
//! [`CatalogLookup`] ports over one shared state table, which makes it the
//! natural backend for tests and local development: one seeded instance can
//! serve the cart service, the orchestrator, and the reader at once, and
//! cloning it shares storage rather than copying it.
//!
//! The whole store sits behind a single lock, so `commit_checkout` is
//! trivially atomic: revision verification and application happen under one
//! write guard, and a refused commit leaves every table untouched. Failure
//! injection via [`InMemoryCommerceStore::inject_commit_failures`] lets tests
//! exercise the orchestrator's retry paths deterministically.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use ordercore::errors::{CatalogError, CatalogResult, StoreError, StoreResult};
use ordercore::model::{
    Cart, Order, OrderActivity, OrderItem, OrderItemActivity, OrderPage, ProductRecord,
};
use ordercore::store::{CheckoutCommit, CommerceStore};
use ordercore::types::{
    CustomerId, Money, OrderId, OrderItemId, PageNumber, PageSize, ProductId, ProviderId, Revision,
};
use ordercore::{CatalogLookup, ProductInfo, ProviderInfo};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Inner {
    carts: HashMap<CustomerId, Cart>,
    products: HashMap<ProductId, ProductRecord>,
    providers: HashMap<ProviderId, ProviderInfo>,
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    order_activities: Vec<OrderActivity>,
    item_activities: Vec<OrderItemActivity>,
    commit_failures: VecDeque<StoreError>,
}

/// An in-memory commerce store and catalog for testing and development.
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCommerceStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCommerceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one product row at revision 0.
    pub fn insert_product(
        &self,
        id: ProductId,
        name: impl Into<String>,
        price: Money,
        provider_id: ProviderId,
        available: u32,
    ) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.products.insert(
            id,
            ProductRecord {
                id,
                name: name.into(),
                price,
                provider_id,
                available,
                revision: Revision::initial(),
            },
        );
    }

    /// Seeds one provider.
    pub fn insert_provider(&self, id: ProviderId, name: impl Into<String>) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.providers.insert(
            id,
            ProviderInfo {
                id,
                name: name.into(),
            },
        );
    }

    /// Renames a product. Bumps the revision like any other row change.
    /// Returns `false` if the product is unknown.
    pub fn rename_product(&self, id: &ProductId, name: impl Into<String>) -> bool {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        match inner.products.get_mut(id) {
            Some(record) => {
                record.name = name.into();
                record.revision = record.revision.next();
                true
            }
            None => false,
        }
    }

    /// Reprices a product. Bumps the revision.
    /// Returns `false` if the product is unknown.
    pub fn reprice_product(&self, id: &ProductId, price: Money) -> bool {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        match inner.products.get_mut(id) {
            Some(record) => {
                record.price = price;
                record.revision = record.revision.next();
                true
            }
            None => false,
        }
    }

    /// Restocks a product to the given quantity. Bumps the revision, so any
    /// in-flight checkout planned against the old row will conflict.
    /// Returns `false` if the product is unknown.
    pub fn restock_product(&self, id: &ProductId, available: u32) -> bool {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        match inner.products.get_mut(id) {
            Some(record) => {
                record.available = available;
                record.revision = record.revision.next();
                true
            }
            None => false,
        }
    }

    /// Current available quantity of a product, if it exists.
    pub fn available_quantity(&self, id: &ProductId) -> Option<u32> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.products.get(id).map(|record| record.available)
    }

    /// Queues errors to be returned by the next `count` calls to
    /// `commit_checkout` before anything is applied. Used to test the
    /// orchestrator's retry behavior.
    pub fn inject_commit_failures(&self, count: usize, error: &StoreError) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        for _ in 0..count {
            inner.commit_failures.push_back(error.clone());
        }
    }

    /// How many orders have been committed.
    pub fn order_count(&self) -> usize {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.orders.len()
    }
}

#[async_trait]
impl CommerceStore for InMemoryCommerceStore {
    async fn fetch_cart(&self, customer_id: &CustomerId) -> StoreResult<Option<Cart>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.carts.get(customer_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.carts.insert(cart.customer_id, cart.clone());
        Ok(())
    }

    async fn product_record(&self, product_id: &ProductId) -> StoreResult<Option<ProductRecord>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.products.get(product_id).cloned())
    }

    async fn commit_checkout(&self, commit: CheckoutCommit) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");

        if let Some(error) = inner.commit_failures.pop_front() {
            return Err(error);
        }

        // Verify every revision before touching anything.
        for decrement in &commit.decrements {
            let record = inner.products.get(&decrement.product_id).ok_or_else(|| {
                StoreError::Internal(format!("unknown product: {}", decrement.product_id))
            })?;
            if record.revision != decrement.expected_revision {
                return Err(StoreError::RevisionConflict {
                    product_id: decrement.product_id,
                    expected: decrement.expected_revision,
                    current: record.revision,
                });
            }
            if record.available < decrement.quantity.value() {
                // Revisions make this unreachable for a well-planned commit,
                // but a malformed one must not drive availability negative.
                return Err(StoreError::Internal(format!(
                    "decrement exceeds availability for product: {}",
                    decrement.product_id
                )));
            }
        }

        for decrement in &commit.decrements {
            if let Some(record) = inner.products.get_mut(&decrement.product_id) {
                record.available -= decrement.quantity.value();
                record.revision = record.revision.next();
            }
        }
        inner.orders.push(commit.order);
        inner.items.extend(commit.items);
        inner.order_activities.push(commit.order_activity);
        inner.item_activities.extend(commit.item_activities);
        inner
            .carts
            .insert(commit.cleared_cart.customer_id, commit.cleared_cart);
        Ok(())
    }

    async fn order(&self, order_id: &OrderId) -> StoreResult<Option<Order>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.orders.iter().find(|o| &o.id == order_id).cloned())
    }

    async fn order_items(&self, order_id: &OrderId) -> StoreResult<Vec<OrderItem>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner
            .items
            .iter()
            .filter(|item| &item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn order_item(&self, item_id: &OrderItemId) -> StoreResult<Option<OrderItem>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.items.iter().find(|item| &item.id == item_id).cloned())
    }

    async fn orders_for_customer(&self, customer_id: &CustomerId) -> StoreResult<Vec<Order>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut orders: Vec<Order> = inner
            .orders
            .iter()
            .filter(|order| &order.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }

    async fn orders_page(&self, page: PageNumber, page_size: PageSize) -> StoreResult<OrderPage> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut orders: Vec<Order> = inner.orders.clone();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = orders.len() as u64;
        let size = usize::try_from(u32::from(page_size))
            .map_err(|_| StoreError::Internal("page size out of range".to_string()))?;
        let number = usize::try_from(u32::from(page))
            .map_err(|_| StoreError::Internal("page number out of range".to_string()))?;
        let orders = orders
            .into_iter()
            .skip((number - 1) * size)
            .take(size)
            .collect();
        Ok(OrderPage {
            orders,
            page,
            page_size,
            total,
        })
    }

    async fn append_order_activity(&self, activity: OrderActivity) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.order_activities.push(activity);
        Ok(())
    }

    async fn append_item_activity(&self, activity: OrderItemActivity) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.item_activities.push(activity);
        Ok(())
    }

    async fn order_activities(&self, order_id: &OrderId) -> StoreResult<Vec<OrderActivity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner
            .order_activities
            .iter()
            .filter(|activity| &activity.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn item_activities(&self, item_id: &OrderItemId) -> StoreResult<Vec<OrderItemActivity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner
            .item_activities
            .iter()
            .filter(|activity| &activity.order_item_id == item_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCommerceStore {
    async fn product(&self, id: &ProductId) -> CatalogResult<ProductInfo> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner
            .products
            .get(id)
            .map(|record| ProductInfo {
                id: record.id,
                name: record.name.clone(),
                price: record.price,
                available: record.available,
                provider_id: record.provider_id,
            })
            .ok_or(CatalogError::ProductNotFound(*id))
    }

    async fn provider(&self, id: &ProviderId) -> CatalogResult<ProviderInfo> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner
            .providers
            .get(id)
            .cloned()
            .ok_or(CatalogError::ProviderNotFound(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordercore::model::CartItem;
    use ordercore::store::InventoryDecrement;
    use ordercore::types::{DestinationId, Quantity, StatusId, Timestamp};

    fn money(cents: u64) -> Money {
        Money::from_cents(cents).unwrap()
    }

    fn qty(n: u32) -> Quantity {
        Quantity::try_new(n).unwrap()
    }

    fn seeded_product(store: &InMemoryCommerceStore, available: u32) -> ProductId {
        let product_id = ProductId::generate();
        let provider_id = ProviderId::generate();
        store.insert_provider(provider_id, "Acme");
        store.insert_product(product_id, "Widget", money(1000), provider_id, available);
        product_id
    }

    fn commit_for(
        store: &InMemoryCommerceStore,
        product_id: ProductId,
        quantity: u32,
        expected_revision: Revision,
    ) -> CheckoutCommit {
        let customer = CustomerId::generate();
        let record = {
            let inner = store.inner.read().unwrap();
            inner.products[&product_id].clone()
        };
        let order = Order {
            id: OrderId::generate(),
            customer_id: customer,
            destination_id: DestinationId::generate(),
            total_amount: money(1000),
            created_at: Timestamp::now(),
        };
        let item = OrderItem {
            id: OrderItemId::generate(),
            order_id: order.id,
            product_id,
            provider_id: record.provider_id,
            quantity: qty(quantity),
            unit_price: money(1000),
        };
        let status = StatusId::try_new("pending").unwrap();
        let mut cart = Cart::new(customer);
        cart.items
            .push(CartItem::new(product_id, None, qty(quantity), money(1000)));
        cart.clear(Timestamp::now());
        CheckoutCommit {
            order: order.clone(),
            order_activity: OrderActivity::new(order.id, status.clone()),
            item_activities: vec![OrderItemActivity::new(item.id, status)],
            items: vec![item],
            decrements: vec![InventoryDecrement {
                product_id,
                quantity: qty(quantity),
                expected_revision,
            }],
            cleared_cart: cart,
        }
    }

    #[tokio::test]
    async fn commit_decrements_stock_and_bumps_the_revision() {
        let store = InMemoryCommerceStore::new();
        let product_id = seeded_product(&store, 5);

        let commit = commit_for(&store, product_id, 3, Revision::initial());
        let order_id = commit.order.id;
        store.commit_checkout(commit).await.unwrap();

        assert_eq!(store.available_quantity(&product_id), Some(2));
        let record = store.product_record(&product_id).await.unwrap().unwrap();
        assert_eq!(record.revision, Revision::initial().next());
        assert!(store.order(&order_id).await.unwrap().is_some());
        assert_eq!(store.order_items(&order_id).await.unwrap().len(), 1);
        assert_eq!(store.order_activities(&order_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_revision_refuses_the_whole_commit() {
        let store = InMemoryCommerceStore::new();
        let product_id = seeded_product(&store, 5);
        store.restock_product(&product_id, 5);

        let commit = commit_for(&store, product_id, 3, Revision::initial());
        let order_id = commit.order.id;
        let err = store.commit_checkout(commit).await.unwrap_err();

        assert!(matches!(err, StoreError::RevisionConflict { .. }));
        assert_eq!(store.available_quantity(&product_id), Some(5));
        assert!(store.order(&order_id).await.unwrap().is_none());
        assert!(store.order_activities(&order_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_before_applying() {
        let store = InMemoryCommerceStore::new();
        let product_id = seeded_product(&store, 5);
        store.inject_commit_failures(1, &StoreError::Unavailable("blip".to_string()));

        let commit = commit_for(&store, product_id, 1, Revision::initial());
        let err = store.commit_checkout(commit.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.available_quantity(&product_id), Some(5));

        store.commit_checkout(commit).await.unwrap();
        assert_eq!(store.available_quantity(&product_id), Some(4));
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = InMemoryCommerceStore::new();
        let clone = store.clone();
        let product_id = seeded_product(&store, 5);

        assert_eq!(clone.available_quantity(&product_id), Some(5));
    }

    #[tokio::test]
    async fn pagination_windows_are_newest_first() {
        let store = InMemoryCommerceStore::new();
        for _ in 0..5 {
            let order = Order {
                id: OrderId::generate(),
                customer_id: CustomerId::generate(),
                destination_id: DestinationId::generate(),
                total_amount: money(100),
                created_at: Timestamp::now(),
            };
            store.inner.write().unwrap().orders.push(order);
        }

        let page = store
            .orders_page(
                PageNumber::try_new(1).unwrap(),
                PageSize::try_new(2).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.orders.len(), 2);
        assert!((page.orders[0].created_at, page.orders[0].id)
            >= (page.orders[1].created_at, page.orders[1].id));

        let last = store
            .orders_page(
                PageNumber::try_new(3).unwrap(),
                PageSize::try_new(2).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(last.orders.len(), 1);

        let beyond = store
            .orders_page(
                PageNumber::try_new(4).unwrap(),
                PageSize::try_new(2).unwrap(),
            )
            .await
            .unwrap();
        assert!(beyond.orders.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[tokio::test]
    async fn catalog_reflects_renames_immediately() {
        let store = InMemoryCommerceStore::new();
        let product_id = seeded_product(&store, 5);

        assert!(store.rename_product(&product_id, "Widget Pro"));
        let info = store.product(&product_id).await.unwrap();
        assert_eq!(info.name, "Widget Pro");
    }
}

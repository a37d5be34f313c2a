//! Cart operations: lazy creation, merging adds, quantity updates, soft
//! removal, and clearing.
//!
//! Every mutation re-reads the product's catalog price, so a line's price
//! snapshot is as fresh as the customer's last touch of that line. Removal
//! never deletes a row; it tombstones the line and recomputes the total.

use crate::catalog::CatalogLookup;
use crate::errors::{CommerceError, CommerceResult, ResourceKind};
use crate::model::{Cart, CartItem};
use crate::store::CommerceStore;
use crate::types::{CartItemId, CustomerId, PostId, ProductId, Quantity, Timestamp};
use tracing::{debug, instrument};

/// Cart reads and mutations for one storefront.
///
/// Mutations follow read-modify-write on the customer's single cart row.
/// Carts are only ever touched by their owning customer, so no revision
/// guard is needed here; contested state lives in inventory, not carts.
#[derive(Debug, Clone)]
pub struct CartService<S, C> {
    store: S,
    catalog: C,
}

impl<S, C> CartService<S, C>
where
    S: CommerceStore,
    C: CatalogLookup,
{
    /// Creates a cart service over the given store and catalog.
    pub const fn new(store: S, catalog: C) -> Self {
        Self { store, catalog }
    }

    /// The customer's cart. Customers without one get a fresh empty cart,
    /// which is not persisted until a mutation touches it.
    pub async fn cart(&self, customer_id: &CustomerId) -> CommerceResult<Cart> {
        Ok(self
            .store
            .fetch_cart(customer_id)
            .await?
            .unwrap_or_else(|| Cart::new(*customer_id)))
    }

    /// Adds units of a product to the customer's cart.
    ///
    /// If an active line already holds the same product from the same
    /// listing, the quantities merge into it instead of creating a second
    /// line. Either way the line's price snapshot is refreshed from the
    /// catalog, and the merged quantity must stay within bounds.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn add_item(
        &self,
        customer_id: &CustomerId,
        product_id: ProductId,
        post_id: Option<PostId>,
        quantity: Quantity,
    ) -> CommerceResult<Cart> {
        let info = self.catalog.product(&product_id).await?;
        let mut cart = self.cart(customer_id).await?;

        if let Some(line) = cart.find_merge_target_mut(product_id, post_id) {
            line.quantity = line.quantity.checked_add(quantity)?;
            line.price = info.price;
            debug!(item_id = %line.id, quantity = %line.quantity, "merged into existing cart line");
        } else {
            let line = CartItem::new(product_id, post_id, quantity, info.price);
            debug!(item_id = %line.id, %quantity, "added new cart line");
            cart.items.push(line);
        }

        cart.recompute_total()?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Replaces an active line's quantity and refreshes its price snapshot.
    #[instrument(skip(self), fields(customer_id = %customer_id, item_id = %item_id))]
    pub async fn set_item_quantity(
        &self,
        customer_id: &CustomerId,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> CommerceResult<Cart> {
        let mut cart = self
            .store
            .fetch_cart(customer_id)
            .await?
            .ok_or(CommerceError::NotFound {
                kind: ResourceKind::CartItem,
                id: item_id.to_string(),
            })?;

        let product_id = {
            let line = cart
                .find_active_mut(item_id)
                .ok_or(CommerceError::NotFound {
                    kind: ResourceKind::CartItem,
                    id: item_id.to_string(),
                })?;
            line.quantity = quantity;
            line.product_id
        };
        let info = self.catalog.product(&product_id).await?;
        if let Some(line) = cart.find_active_mut(item_id) {
            line.price = info.price;
        }

        cart.recompute_total()?;
        self.store.save_cart(&cart).await?;
        debug!(%quantity, "updated cart line quantity");
        Ok(cart)
    }

    /// Tombstones one active line. Lines already removed are not found.
    #[instrument(skip(self), fields(customer_id = %customer_id, item_id = %item_id))]
    pub async fn remove_item(
        &self,
        customer_id: &CustomerId,
        item_id: CartItemId,
    ) -> CommerceResult<Cart> {
        let mut cart = self
            .store
            .fetch_cart(customer_id)
            .await?
            .ok_or(CommerceError::NotFound {
                kind: ResourceKind::CartItem,
                id: item_id.to_string(),
            })?;

        let line = cart
            .find_active_mut(item_id)
            .ok_or(CommerceError::NotFound {
                kind: ResourceKind::CartItem,
                id: item_id.to_string(),
            })?;
        line.removed_at = Some(Timestamp::now());

        cart.recompute_total()?;
        self.store.save_cart(&cart).await?;
        debug!("removed cart line");
        Ok(cart)
    }

    /// Tombstones every active line. Clearing a cart that is already empty,
    /// or that does not exist, succeeds and reports the empty cart.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn clear(&self, customer_id: &CustomerId) -> CommerceResult<Cart> {
        let Some(mut cart) = self.store.fetch_cart(customer_id).await? else {
            return Ok(Cart::new(*customer_id));
        };
        if cart.is_empty() {
            return Ok(cart);
        }
        cart.clear(Timestamp::now());
        self.store.save_cart(&cart).await?;
        debug!("cleared cart");
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProductInfo, ProviderInfo};
    use crate::errors::{CatalogError, CatalogResult, StoreResult};
    use crate::model::{
        Order, OrderActivity, OrderItem, OrderItemActivity, OrderPage, ProductRecord,
    };
    use crate::store::CheckoutCommit;
    use crate::types::{Money, OrderId, OrderItemId, PageNumber, PageSize, ProviderId};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct CartOnlyStore {
        carts: Arc<Mutex<HashMap<CustomerId, Cart>>>,
    }

    #[async_trait]
    impl CommerceStore for CartOnlyStore {
        async fn fetch_cart(&self, customer_id: &CustomerId) -> StoreResult<Option<Cart>> {
            Ok(self.carts.lock().unwrap().get(customer_id).cloned())
        }

        async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
            self.carts
                .lock()
                .unwrap()
                .insert(cart.customer_id, cart.clone());
            Ok(())
        }

        async fn product_record(&self, _: &ProductId) -> StoreResult<Option<ProductRecord>> {
            unimplemented!("not exercised by cart tests")
        }

        async fn commit_checkout(&self, _: CheckoutCommit) -> StoreResult<()> {
            unimplemented!("not exercised by cart tests")
        }

        async fn order(&self, _: &OrderId) -> StoreResult<Option<Order>> {
            unimplemented!("not exercised by cart tests")
        }

        async fn order_items(&self, _: &OrderId) -> StoreResult<Vec<OrderItem>> {
            unimplemented!("not exercised by cart tests")
        }

        async fn order_item(&self, _: &OrderItemId) -> StoreResult<Option<OrderItem>> {
            unimplemented!("not exercised by cart tests")
        }

        async fn orders_for_customer(&self, _: &CustomerId) -> StoreResult<Vec<Order>> {
            unimplemented!("not exercised by cart tests")
        }

        async fn orders_page(&self, _: PageNumber, _: PageSize) -> StoreResult<OrderPage> {
            unimplemented!("not exercised by cart tests")
        }

        async fn append_order_activity(&self, _: OrderActivity) -> StoreResult<()> {
            unimplemented!("not exercised by cart tests")
        }

        async fn append_item_activity(&self, _: OrderItemActivity) -> StoreResult<()> {
            unimplemented!("not exercised by cart tests")
        }

        async fn order_activities(&self, _: &OrderId) -> StoreResult<Vec<OrderActivity>> {
            unimplemented!("not exercised by cart tests")
        }

        async fn item_activities(&self, _: &OrderItemId) -> StoreResult<Vec<OrderItemActivity>> {
            unimplemented!("not exercised by cart tests")
        }
    }

    #[derive(Clone)]
    struct FixedCatalog {
        products: Arc<Mutex<HashMap<ProductId, ProductInfo>>>,
    }

    impl FixedCatalog {
        fn with(products: Vec<ProductInfo>) -> Self {
            Self {
                products: Arc::new(Mutex::new(
                    products.into_iter().map(|p| (p.id, p)).collect(),
                )),
            }
        }

        fn set_price(&self, id: ProductId, price: Money) {
            if let Some(p) = self.products.lock().unwrap().get_mut(&id) {
                p.price = price;
            }
        }
    }

    #[async_trait]
    impl CatalogLookup for FixedCatalog {
        async fn product(&self, id: &ProductId) -> CatalogResult<ProductInfo> {
            self.products
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or(CatalogError::ProductNotFound(*id))
        }

        async fn provider(&self, id: &ProviderId) -> CatalogResult<ProviderInfo> {
            Err(CatalogError::ProviderNotFound(*id))
        }
    }

    fn cents(n: u64) -> Money {
        Money::from_cents(n).unwrap()
    }

    fn qty(n: u32) -> Quantity {
        Quantity::try_new(n).unwrap()
    }

    fn widget(price: Money) -> ProductInfo {
        ProductInfo {
            id: ProductId::generate(),
            name: "Widget".to_string(),
            price,
            available: 100,
            provider_id: ProviderId::generate(),
        }
    }

    fn service(
        products: Vec<ProductInfo>,
    ) -> (CartService<CartOnlyStore, FixedCatalog>, FixedCatalog) {
        let catalog = FixedCatalog::with(products);
        (
            CartService::new(CartOnlyStore::default(), catalog.clone()),
            catalog,
        )
    }

    #[tokio::test]
    async fn adding_to_a_fresh_customer_creates_the_cart() {
        let info = widget(cents(250));
        let product_id = info.id;
        let customer = CustomerId::generate();
        let (service, _) = service(vec![info]);

        let cart = service
            .add_item(&customer, product_id, None, qty(2))
            .await
            .unwrap();

        assert_eq!(cart.customer_id, customer);
        assert_eq!(cart.active_items().count(), 1);
        assert_eq!(cart.total_amount, cents(500));
    }

    #[tokio::test]
    async fn same_product_same_listing_merges_into_one_line() {
        let info = widget(cents(100));
        let product_id = info.id;
        let customer = CustomerId::generate();
        let post = PostId::generate();
        let (service, _) = service(vec![info]);

        service
            .add_item(&customer, product_id, Some(post), qty(2))
            .await
            .unwrap();
        let cart = service
            .add_item(&customer, product_id, Some(post), qty(3))
            .await
            .unwrap();

        assert_eq!(cart.active_items().count(), 1);
        assert_eq!(cart.active_items().next().unwrap().quantity, qty(5));
        assert_eq!(cart.total_amount, cents(500));
    }

    #[tokio::test]
    async fn same_product_different_listing_stays_separate() {
        let info = widget(cents(100));
        let product_id = info.id;
        let customer = CustomerId::generate();
        let (service, _) = service(vec![info]);

        service
            .add_item(&customer, product_id, Some(PostId::generate()), qty(1))
            .await
            .unwrap();
        let cart = service
            .add_item(&customer, product_id, None, qty(1))
            .await
            .unwrap();

        assert_eq!(cart.active_items().count(), 2);
    }

    #[tokio::test]
    async fn merge_refreshes_the_price_snapshot() {
        let info = widget(cents(100));
        let product_id = info.id;
        let customer = CustomerId::generate();
        let (service, catalog) = service(vec![info]);

        service
            .add_item(&customer, product_id, None, qty(1))
            .await
            .unwrap();
        catalog.set_price(product_id, cents(150));
        let cart = service
            .add_item(&customer, product_id, None, qty(1))
            .await
            .unwrap();

        let line = cart.active_items().next().unwrap();
        assert_eq!(line.price, cents(150));
        assert_eq!(cart.total_amount, cents(300));
    }

    #[tokio::test]
    async fn set_quantity_refreshes_price_and_recomputes_total() {
        let info = widget(cents(100));
        let product_id = info.id;
        let customer = CustomerId::generate();
        let (service, catalog) = service(vec![info]);

        let cart = service
            .add_item(&customer, product_id, None, qty(1))
            .await
            .unwrap();
        let item_id = cart.active_items().next().unwrap().id;

        catalog.set_price(product_id, cents(200));
        let cart = service
            .set_item_quantity(&customer, item_id, qty(4))
            .await
            .unwrap();

        let line = cart.active_items().next().unwrap();
        assert_eq!(line.quantity, qty(4));
        assert_eq!(line.price, cents(200));
        assert_eq!(cart.total_amount, cents(800));
    }

    #[tokio::test]
    async fn removal_tombstones_without_dropping_the_row() {
        let info = widget(cents(100));
        let product_id = info.id;
        let customer = CustomerId::generate();
        let (service, _) = service(vec![info]);

        let cart = service
            .add_item(&customer, product_id, None, qty(2))
            .await
            .unwrap();
        let item_id = cart.active_items().next().unwrap().id;

        let cart = service.remove_item(&customer, item_id).await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(cart.items.len(), 1);
        assert!(cart.items[0].removed_at.is_some());
        assert_eq!(cart.total_amount, Money::zero());
    }

    #[tokio::test]
    async fn removed_lines_cannot_be_mutated_again() {
        let info = widget(cents(100));
        let product_id = info.id;
        let customer = CustomerId::generate();
        let (service, _) = service(vec![info]);

        let cart = service
            .add_item(&customer, product_id, None, qty(2))
            .await
            .unwrap();
        let item_id = cart.active_items().next().unwrap().id;
        service.remove_item(&customer, item_id).await.unwrap();

        let err = service
            .set_item_quantity(&customer, item_id, qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound { .. }));

        let err = service.remove_item(&customer, item_id).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn clearing_a_missing_cart_is_idempotent() {
        let (service, _) = service(vec![]);
        let customer = CustomerId::generate();

        let cart = service.clear(&customer).await.unwrap();
        assert!(cart.is_empty());

        let again = service.clear(&customer).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn clearing_tombstones_all_active_lines() {
        let a = widget(cents(100));
        let b = widget(cents(300));
        let (a_id, b_id) = (a.id, b.id);
        let customer = CustomerId::generate();
        let (service, _) = service(vec![a, b]);

        service.add_item(&customer, a_id, None, qty(1)).await.unwrap();
        service.add_item(&customer, b_id, None, qty(2)).await.unwrap();

        let cart = service.clear(&customer).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.items.len(), 2);
        assert!(cart.items.iter().all(|i| i.removed_at.is_some()));
        assert_eq!(cart.total_amount, Money::zero());
    }

    #[tokio::test]
    async fn adding_an_unknown_product_is_not_found() {
        let (service, _) = service(vec![]);
        let err = service
            .add_item(&CustomerId::generate(), ProductId::generate(), None, qty(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::NotFound {
                kind: ResourceKind::Product,
                ..
            }
        ));
    }
}

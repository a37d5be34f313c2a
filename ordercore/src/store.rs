//! Storage port for the checkout engine.
//!
//! [`CommerceStore`] is the backend-independent persistence interface. Its
//! central operation is [`CommerceStore::commit_checkout`]: one atomic unit
//! of work that either applies a whole [`CheckoutCommit`] or nothing at all,
//! guarded by the optimistic revision named in every
//! [`InventoryDecrement`]. Everything else on the trait is plain reads and
//! single-entity writes.

use crate::errors::StoreResult;
use crate::model::{
    Cart, Order, OrderActivity, OrderItem, OrderItemActivity, OrderPage, ProductRecord,
};
use crate::types::{
    CustomerId, OrderId, OrderItemId, PageNumber, PageSize, ProductId, Quantity, Revision,
};
use async_trait::async_trait;

/// A planned decrement of one product's available quantity.
///
/// `expected_revision` is the revision the checkout observed when it
/// re-validated stock. The store must refuse the whole commit if the live
/// row no longer carries this revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryDecrement {
    /// The product to decrement.
    pub product_id: ProductId,
    /// How many units the order claims.
    pub quantity: Quantity,
    /// The inventory revision the claim was validated against.
    pub expected_revision: Revision,
}

/// Everything a successful checkout writes, bundled for one atomic apply.
///
/// Either all of it becomes visible or none of it does; a failed commit is
/// indistinguishable, from the data's perspective, from never having been
/// attempted.
#[derive(Debug, Clone)]
pub struct CheckoutCommit {
    /// The new order row.
    pub order: Order,
    /// Its line items.
    pub items: Vec<OrderItem>,
    /// Inventory claims, one per distinct product.
    pub decrements: Vec<InventoryDecrement>,
    /// The order's initial ledger entry.
    pub order_activity: OrderActivity,
    /// Each item's initial ledger entry, written in the same transaction.
    pub item_activities: Vec<OrderItemActivity>,
    /// The drained cart: every line tombstoned, total zero.
    pub cleared_cart: Cart,
}

/// The persistence interface all storage backends implement.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Loads a customer's cart, tombstoned lines included. `None` if the
    /// customer has never had a cart.
    async fn fetch_cart(&self, customer_id: &CustomerId) -> StoreResult<Option<Cart>>;

    /// Upserts a cart. Carts are scoped to one customer, so no
    /// cross-customer coordination is required here.
    async fn save_cart(&self, cart: &Cart) -> StoreResult<()>;

    /// Reads one product row, including its current revision.
    async fn product_record(&self, product_id: &ProductId) -> StoreResult<Option<ProductRecord>>;

    /// Applies a whole checkout atomically.
    ///
    /// Before writing anything, the store verifies that every decrement's
    /// `expected_revision` still matches the live row. On any mismatch it
    /// fails with [`StoreError::RevisionConflict`] and applies nothing.
    ///
    /// [`StoreError::RevisionConflict`]: crate::errors::StoreError::RevisionConflict
    async fn commit_checkout(&self, commit: CheckoutCommit) -> StoreResult<()>;

    /// Reads one order.
    async fn order(&self, order_id: &OrderId) -> StoreResult<Option<Order>>;

    /// Reads an order's line items.
    async fn order_items(&self, order_id: &OrderId) -> StoreResult<Vec<OrderItem>>;

    /// Reads one order item.
    async fn order_item(&self, item_id: &OrderItemId) -> StoreResult<Option<OrderItem>>;

    /// All of a customer's orders, newest first.
    async fn orders_for_customer(&self, customer_id: &CustomerId) -> StoreResult<Vec<Order>>;

    /// One page of all orders, newest first.
    async fn orders_page(&self, page: PageNumber, page_size: PageSize) -> StoreResult<OrderPage>;

    /// Appends one order ledger entry. Entries are never updated or deleted.
    async fn append_order_activity(&self, activity: OrderActivity) -> StoreResult<()>;

    /// Appends one order-item ledger entry. Entries are never updated or
    /// deleted.
    async fn append_item_activity(&self, activity: OrderItemActivity) -> StoreResult<()>;

    /// An order's ledger entries in insertion order.
    async fn order_activities(&self, order_id: &OrderId) -> StoreResult<Vec<OrderActivity>>;

    /// An order item's ledger entries in insertion order.
    async fn item_activities(&self, item_id: &OrderItemId) -> StoreResult<Vec<OrderItemActivity>>;
}

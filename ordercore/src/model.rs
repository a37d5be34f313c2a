//! The persistent data model: carts, orders, their line items, and the
//! append-only activity ledgers.
//!
//! Carts are mutable and soft-deleting: removed lines are tombstoned, never
//! physically dropped, so the audit trail survives. Orders are immutable
//! after creation; the only thing that ever changes about an order is that
//! new ledger rows are appended to it.

use crate::types::{
    ActivityId, CartId, CartItemId, CustomerId, DestinationId, Money, MoneyError, OrderId,
    OrderItemId, PageNumber, PageSize, PostId, ProductId, ProviderId, Quantity, Revision, StatusId,
    Timestamp,
};
use serde::{Deserialize, Serialize};

/// One line of a cart.
///
/// `price` is a snapshot captured when the line was added or last updated,
/// not re-read from the catalog on every view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// This line's identifier.
    pub id: CartItemId,
    /// The product in the line.
    pub product_id: ProductId,
    /// The listing that surfaced the product, when known.
    pub post_id: Option<PostId>,
    /// How many units the customer wants.
    pub quantity: Quantity,
    /// Unit price snapshot.
    pub price: Money,
    /// When the line was added.
    pub added_at: Timestamp,
    /// Tombstone. A removed line is logically absent but physically retained.
    pub removed_at: Option<Timestamp>,
}

impl CartItem {
    /// Creates a new active cart line.
    pub fn new(
        product_id: ProductId,
        post_id: Option<PostId>,
        quantity: Quantity,
        price: Money,
    ) -> Self {
        Self {
            id: CartItemId::generate(),
            product_id,
            post_id,
            quantity,
            price,
            added_at: Timestamp::now(),
            removed_at: None,
        }
    }

    /// Whether the line is still in the cart.
    pub const fn is_active(&self) -> bool {
        self.removed_at.is_none()
    }

    /// This line's contribution to the cart total.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.price.multiply_by_quantity(self.quantity)
    }
}

/// A customer's mutable pre-order basket.
///
/// At most one active cart exists per customer; it is created lazily on the
/// first mutation. `total_amount` is a materialized view of the active
/// lines, recomputed after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// The cart's identifier.
    pub id: CartId,
    /// The owning customer.
    pub customer_id: CustomerId,
    /// Σ `price × quantity` over active lines.
    pub total_amount: Money,
    /// All lines, including tombstoned ones.
    pub items: Vec<CartItem>,
    /// When the cart was created.
    pub created_at: Timestamp,
}

impl Cart {
    /// Creates an empty cart for a customer.
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            id: CartId::generate(),
            customer_id,
            total_amount: Money::zero(),
            items: Vec::new(),
            created_at: Timestamp::now(),
        }
    }

    /// The lines that are still in the cart.
    pub fn active_items(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter().filter(|item| item.is_active())
    }

    /// Whether the cart has no active lines.
    pub fn is_empty(&self) -> bool {
        self.active_items().next().is_none()
    }

    /// Finds an active line by id. Tombstoned lines are invisible here.
    pub fn find_active_mut(&mut self, item_id: CartItemId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id && item.is_active())
    }

    /// Finds an active line holding the same product from the same listing.
    pub fn find_merge_target_mut(
        &mut self,
        product_id: ProductId,
        post_id: Option<PostId>,
    ) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| {
            item.is_active() && item.product_id == product_id && item.post_id == post_id
        })
    }

    /// Recomputes `total_amount` from the live line set.
    pub fn recompute_total(&mut self) -> Result<(), MoneyError> {
        let mut total = Money::zero();
        for item in self.items.iter().filter(|item| item.is_active()) {
            total = total.checked_add(item.line_total()?)?;
        }
        self.total_amount = total;
        Ok(())
    }

    /// Tombstones every active line and zeroes the total.
    pub fn clear(&mut self, now: Timestamp) {
        for item in &mut self.items {
            if item.is_active() {
                item.removed_at = Some(now);
            }
        }
        self.total_amount = Money::zero();
    }
}

/// An immutable order, created once from a cart's contents.
///
/// `total_amount` is fixed at creation. The order's current status is not a
/// field here; it is derived from the most recent [`OrderActivity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// The order's identifier.
    pub id: OrderId,
    /// The ordering customer.
    pub customer_id: CustomerId,
    /// The resolved shipping destination.
    pub destination_id: DestinationId,
    /// Total fixed at creation; never recomputed.
    pub total_amount: Money,
    /// When the order was created.
    pub created_at: Timestamp,
}

/// One line of an order. Product, quantity, unit price, and fulfilling
/// provider are all fixed at order creation; later catalog changes never
/// rewrite them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// This line's identifier.
    pub id: OrderItemId,
    /// The owning order.
    pub order_id: OrderId,
    /// The ordered product.
    pub product_id: ProductId,
    /// The provider fulfilling this line.
    pub provider_id: ProviderId,
    /// Units ordered.
    pub quantity: Quantity,
    /// Unit price at order time (the cart's snapshot).
    pub unit_price: Money,
}

/// One append-only ledger entry for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderActivity {
    /// Entry id; `UUIDv7`, the tie-breaker for same-timestamp entries.
    pub id: ActivityId,
    /// The order this entry belongs to.
    pub order_id: OrderId,
    /// The recognized status recorded by this entry.
    pub status: StatusId,
    /// When the entry was recorded.
    pub recorded_at: Timestamp,
}

impl OrderActivity {
    /// Records a status for an order at the current moment.
    pub fn new(order_id: OrderId, status: StatusId) -> Self {
        Self {
            id: ActivityId::new(),
            order_id,
            status,
            recorded_at: Timestamp::now(),
        }
    }
}

/// One append-only ledger entry for an order item. Items progress
/// independently of their parent order's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemActivity {
    /// Entry id; `UUIDv7`, the tie-breaker for same-timestamp entries.
    pub id: ActivityId,
    /// The order item this entry belongs to.
    pub order_item_id: OrderItemId,
    /// The recognized status recorded by this entry.
    pub status: StatusId,
    /// When the entry was recorded.
    pub recorded_at: Timestamp,
}

impl OrderItemActivity {
    /// Records a status for an order item at the current moment.
    pub fn new(order_item_id: OrderItemId, status: StatusId) -> Self {
        Self {
            id: ActivityId::new(),
            order_item_id,
            status,
            recorded_at: Timestamp::now(),
        }
    }
}

/// The store-side product row consulted and decremented by checkout.
///
/// `available` is the one piece of cross-customer shared mutable state in
/// the system; `revision` guards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// The product's identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub price: Money,
    /// The fulfilling provider.
    pub provider_id: ProviderId,
    /// Units available. May be zero.
    pub available: u32,
    /// Optimistic-concurrency revision of this row.
    pub revision: Revision,
}

/// One page of the admin order listing, newest orders first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPage {
    /// The orders on this page.
    pub orders: Vec<Order>,
    /// The requested page number.
    pub page: PageNumber,
    /// The requested page size.
    pub page_size: PageSize,
    /// Total orders across all pages.
    pub total: u64,
}

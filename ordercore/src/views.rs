//! Read-time order views.
//!
//! Stored order rows are deliberately sparse: ids, quantities, price
//! snapshots. The reader enriches them at query time with catalog display
//! names and ledger-derived statuses, so a renamed product shows its new
//! name in every view while the stored rows never change.

use crate::catalog::{CatalogLookup, StatusCatalog, StatusEntry};
use crate::errors::{CommerceError, CommerceResult, ResourceKind};
use crate::model::{Order, OrderPage};
use crate::store::CommerceStore;
use crate::types::{
    CustomerId, DestinationId, Money, OrderId, OrderItemId, PageNumber, PageSize, ProductId,
    ProviderId, Quantity, StatusId, Timestamp,
};
use serde::Serialize;

/// One order line, enriched for display.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    /// The line's identifier.
    pub id: OrderItemId,
    /// The ordered product.
    pub product_id: ProductId,
    /// The product's *current* catalog name.
    pub product_name: String,
    /// The fulfilling provider.
    pub provider_id: ProviderId,
    /// The provider's *current* catalog name.
    pub provider_name: String,
    /// Units ordered.
    pub quantity: Quantity,
    /// Unit price at order time.
    pub unit_price: Money,
    /// `unit_price × quantity`.
    pub line_total: Money,
    /// The line's ledger-derived current status.
    pub status: StatusEntry,
}

/// A full order, enriched for display.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    /// The order's identifier.
    pub id: OrderId,
    /// The ordering customer.
    pub customer_id: CustomerId,
    /// The shipping destination.
    pub destination_id: DestinationId,
    /// Total fixed at creation.
    pub total_amount: Money,
    /// When the order was created.
    pub created_at: Timestamp,
    /// The order's ledger-derived current status.
    pub status: StatusEntry,
    /// The enriched line items.
    pub items: Vec<OrderItemView>,
}

/// Query-side access to orders.
#[derive(Debug, Clone)]
pub struct OrderReader<S, C, T> {
    store: S,
    catalog: C,
    statuses: T,
}

impl<S, C, T> OrderReader<S, C, T>
where
    S: CommerceStore,
    C: CatalogLookup,
    T: StatusCatalog,
{
    /// Creates a reader over the given store, catalog, and status catalog.
    pub const fn new(store: S, catalog: C, statuses: T) -> Self {
        Self {
            store,
            catalog,
            statuses,
        }
    }

    /// One order with items, display names, and derived statuses.
    ///
    /// A product or provider missing from the catalog fails the view with
    /// `NotFound`; stale reads get repaired, not papered over.
    pub async fn order_view(&self, order_id: &OrderId) -> CommerceResult<OrderView> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(CommerceError::NotFound {
                kind: ResourceKind::Order,
                id: order_id.to_string(),
            })?;

        let status = {
            let entries = self.store.order_activities(order_id).await?;
            let latest = entries
                .into_iter()
                .max_by(|a, b| (a.recorded_at, a.id).cmp(&(b.recorded_at, b.id)))
                .map(|a| a.status);
            self.display(latest).await
        };

        let mut items = Vec::new();
        for item in self.store.order_items(order_id).await? {
            let product = self.catalog.product(&item.product_id).await?;
            let provider = self.catalog.provider(&item.provider_id).await?;
            let item_status = {
                let entries = self.store.item_activities(&item.id).await?;
                let latest = entries
                    .into_iter()
                    .max_by(|a, b| (a.recorded_at, a.id).cmp(&(b.recorded_at, b.id)))
                    .map(|a| a.status);
                self.display(latest).await
            };
            let line_total = item.unit_price.multiply_by_quantity(item.quantity)?;
            items.push(OrderItemView {
                id: item.id,
                product_id: item.product_id,
                product_name: product.name,
                provider_id: item.provider_id,
                provider_name: provider.name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total,
                status: item_status,
            });
        }

        Ok(OrderView {
            id: order.id,
            customer_id: order.customer_id,
            destination_id: order.destination_id,
            total_amount: order.total_amount,
            created_at: order.created_at,
            status,
            items,
        })
    }

    /// All of a customer's orders, newest first. Customers with no orders
    /// get an empty list, not an error.
    pub async fn orders_for_customer(&self, customer_id: &CustomerId) -> CommerceResult<Vec<Order>> {
        Ok(self.store.orders_for_customer(customer_id).await?)
    }

    /// One page of the admin order listing, newest first. Page bounds are
    /// enforced by the parameter types at construction, so every call that
    /// reaches here is in range.
    pub async fn orders_page(
        &self,
        page: PageNumber,
        page_size: PageSize,
    ) -> CommerceResult<OrderPage> {
        Ok(self.store.orders_page(page, page_size).await?)
    }

    async fn display(&self, latest: Option<StatusId>) -> StatusEntry {
        match latest {
            Some(status) => self
                .statuses
                .resolve(&status)
                .await
                .unwrap_or_else(|| StatusEntry::unresolved(status)),
            None => self.statuses.initial().await,
        }
    }
}

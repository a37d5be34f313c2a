//! The append-only order activity ledger.
//!
//! An order (or order item) has no mutable status column. Its lifecycle is a
//! log of activity entries, and "current status" is derived: the entry with
//! the latest `recorded_at`, ties broken by the time-ordered entry id. The
//! log only ever grows; correcting a mistake means appending the correction.

use crate::catalog::{StatusCatalog, StatusEntry};
use crate::errors::{CommerceError, CommerceResult, ResourceKind};
use crate::model::{OrderActivity, OrderItemActivity};
use crate::store::CommerceStore;
use crate::types::{OrderId, OrderItemId, StatusId};
use tracing::{debug, instrument};

/// Appends to and derives status from the order/item activity ledgers.
#[derive(Debug, Clone)]
pub struct OrderLedger<S, T> {
    store: S,
    statuses: T,
}

impl<S, T> OrderLedger<S, T>
where
    S: CommerceStore,
    T: StatusCatalog,
{
    /// Creates a ledger over the given store and status catalog.
    pub const fn new(store: S, statuses: T) -> Self {
        Self { store, statuses }
    }

    /// Appends a recognized status to an existing order's ledger.
    #[instrument(skip(self), fields(order_id = %order_id, status = %status))]
    pub async fn append_order_status(
        &self,
        order_id: OrderId,
        status: StatusId,
    ) -> CommerceResult<OrderActivity> {
        let status = self.recognize(status).await?;
        if self.store.order(&order_id).await?.is_none() {
            return Err(CommerceError::NotFound {
                kind: ResourceKind::Order,
                id: order_id.to_string(),
            });
        }
        let activity = OrderActivity::new(order_id, status);
        self.store.append_order_activity(activity.clone()).await?;
        debug!(activity_id = %activity.id, "appended order activity");
        Ok(activity)
    }

    /// Appends a recognized status to an existing order item's ledger.
    #[instrument(skip(self), fields(item_id = %item_id, status = %status))]
    pub async fn append_item_status(
        &self,
        item_id: OrderItemId,
        status: StatusId,
    ) -> CommerceResult<OrderItemActivity> {
        let status = self.recognize(status).await?;
        if self.store.order_item(&item_id).await?.is_none() {
            return Err(CommerceError::NotFound {
                kind: ResourceKind::OrderItem,
                id: item_id.to_string(),
            });
        }
        let activity = OrderItemActivity::new(item_id, status);
        self.store.append_item_activity(activity.clone()).await?;
        debug!(activity_id = %activity.id, "appended order item activity");
        Ok(activity)
    }

    /// Derives an order's current status from its ledger.
    ///
    /// Orders with an empty ledger report the catalog's initial status.
    /// Entries whose status id has since left the catalog still resolve,
    /// to an [`StatusEntry::unresolved`] placeholder.
    pub async fn current_order_status(&self, order_id: &OrderId) -> CommerceResult<StatusEntry> {
        if self.store.order(order_id).await?.is_none() {
            return Err(CommerceError::NotFound {
                kind: ResourceKind::Order,
                id: order_id.to_string(),
            });
        }
        let latest = self
            .store
            .order_activities(order_id)
            .await?
            .into_iter()
            .max_by(|a, b| (a.recorded_at, a.id).cmp(&(b.recorded_at, b.id)));
        self.display(latest.map(|a| a.status)).await
    }

    /// Derives an order item's current status from its ledger.
    pub async fn current_item_status(&self, item_id: &OrderItemId) -> CommerceResult<StatusEntry> {
        if self.store.order_item(item_id).await?.is_none() {
            return Err(CommerceError::NotFound {
                kind: ResourceKind::OrderItem,
                id: item_id.to_string(),
            });
        }
        let latest = self
            .store
            .item_activities(item_id)
            .await?
            .into_iter()
            .max_by(|a, b| (a.recorded_at, a.id).cmp(&(b.recorded_at, b.id)));
        self.display(latest.map(|a| a.status)).await
    }

    /// An order's full ledger, oldest first.
    pub async fn order_history(&self, order_id: &OrderId) -> CommerceResult<Vec<OrderActivity>> {
        if self.store.order(order_id).await?.is_none() {
            return Err(CommerceError::NotFound {
                kind: ResourceKind::Order,
                id: order_id.to_string(),
            });
        }
        Ok(self.store.order_activities(order_id).await?)
    }

    /// An order item's full ledger, oldest first.
    pub async fn item_history(
        &self,
        item_id: &OrderItemId,
    ) -> CommerceResult<Vec<OrderItemActivity>> {
        if self.store.order_item(item_id).await?.is_none() {
            return Err(CommerceError::NotFound {
                kind: ResourceKind::OrderItem,
                id: item_id.to_string(),
            });
        }
        Ok(self.store.item_activities(item_id).await?)
    }

    async fn recognize(&self, status: StatusId) -> CommerceResult<StatusId> {
        match self.statuses.resolve(&status).await {
            Some(entry) => Ok(entry.id),
            None => Err(CommerceError::NotFound {
                kind: ResourceKind::Status,
                id: status.to_string(),
            }),
        }
    }

    async fn display(&self, latest: Option<StatusId>) -> CommerceResult<StatusEntry> {
        match latest {
            Some(status) => Ok(self
                .statuses
                .resolve(&status)
                .await
                .unwrap_or_else(|| StatusEntry::unresolved(status))),
            None => Ok(self.statuses.initial().await),
        }
    }
}

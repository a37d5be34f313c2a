//! The checkout orchestrator: cart to order, atomically.
//!
//! Checkout is the one place where cross-customer shared state (inventory)
//! is claimed. The race between validating stock and decrementing it is
//! closed with optimistic revisions: the orchestrator re-reads each product
//! row, plans decrements against the revisions it saw, and the store refuses
//! the whole commit if any row moved in between. A refused commit wrote
//! nothing, so the orchestrator just re-plans and tries again.
//!
//! Two retry budgets apply, with different shapes:
//!
//! - revision conflicts re-run planning from fresh reads, with exponential
//!   backoff and jitter, up to [`RetryConfig::max_conflict_retries`] times;
//! - transient persistence failures replay the *same* commit exactly once
//!   before surfacing, since the failed attempt wrote nothing.

use crate::catalog::{CatalogLookup, StatusCatalog};
use crate::errors::{CommerceError, CommerceResult, ResourceKind, StoreError};
use crate::model::{Cart, Order, OrderActivity, OrderItem, OrderItemActivity, ProductRecord};
use crate::stock::{Demand, StockShortfall, StockValidator};
use crate::store::{CheckoutCommit, CommerceStore, InventoryDecrement};
use crate::types::{CustomerId, DestinationId, OrderId, OrderItemId, ProductId, Timestamp};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Retry tuning for checkout commits.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// How many times a revision-conflicted checkout is re-planned before
    /// surfacing [`CommerceError::ConcurrencyConflict`].
    pub max_conflict_retries: u32,
    /// Delay before the first conflict re-plan; doubles per attempt.
    pub base_delay: Duration,
    /// Cap on the conflict backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Backoff delay for the given conflict attempt, with jitter in
    /// `[0.5, 1.5)` of the exponential value to spread out contending
    /// checkouts.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)));
        let capped = exponential.min(self.max_delay);
        let jitter = 0.5 + rand::rng().random::<f64>();
        capped.mul_f64(jitter)
    }
}

/// A successfully placed order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    /// The new order.
    pub order: Order,
    /// Its line items, one per active cart line.
    pub items: Vec<OrderItem>,
}

/// The two terminal states of a checkout attempt.
///
/// Rejection is a normal outcome, not an error: the cart is intact, nothing
/// was written, and the shortfalls say exactly which products fell short.
/// Infrastructure failures surface as [`CommerceError`] instead.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// The order was placed and the cart cleared.
    Completed(PlacedOrder),
    /// Stock could not cover the cart. Nothing was written.
    Rejected(Vec<StockShortfall>),
}

impl CheckoutOutcome {
    /// Whether the checkout placed an order.
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Orchestrates the full cart-to-order transition.
#[derive(Debug, Clone)]
pub struct CheckoutOrchestrator<S, C, T> {
    store: S,
    validator: StockValidator<C>,
    statuses: T,
    retry: RetryConfig,
}

impl<S, C, T> CheckoutOrchestrator<S, C, T>
where
    S: CommerceStore,
    C: CatalogLookup,
    T: StatusCatalog,
{
    /// Creates an orchestrator with default retry tuning.
    pub const fn new(store: S, catalog: C, statuses: T) -> Self {
        Self {
            store,
            validator: StockValidator::new(catalog),
            statuses,
            retry: RetryConfig {
                max_conflict_retries: 3,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_secs(1),
            },
        }
    }

    /// Overrides the retry tuning.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Converts the customer's cart into an order shipped to the given
    /// destination.
    ///
    /// On success the order, its items, their initial ledger entries, the
    /// inventory decrements, and the cleared cart all become visible in one
    /// atomic commit. On stock shortfall nothing is written and the cart is
    /// untouched. An empty (or absent) cart is rejected up front with
    /// [`CommerceError::EmptyCart`]; repeating the call repeats the same
    /// answer with no side effects.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn checkout(
        &self,
        customer_id: &CustomerId,
        destination_id: DestinationId,
    ) -> CommerceResult<CheckoutOutcome> {
        let cart = self
            .store
            .fetch_cart(customer_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(CommerceError::EmptyCart)?;
        let demands = Demand::from_cart(&cart)?;

        // Fast speculative pass against the (possibly cached) catalog; the
        // commit below never trusts it.
        let speculative = self.validator.validate(&demands).await?;
        if !speculative.is_empty() {
            debug!(shortfalls = speculative.len(), "speculative validation rejected checkout");
            return Ok(CheckoutOutcome::Rejected(speculative));
        }

        let mut attempt = 0;
        loop {
            let (records, shortfalls) = self.authoritative_check(&demands).await?;
            if !shortfalls.is_empty() {
                debug!(shortfalls = shortfalls.len(), "authoritative validation rejected checkout");
                return Ok(CheckoutOutcome::Rejected(shortfalls));
            }

            let (commit, placed) = self
                .plan_commit(&cart, destination_id, &demands, &records)
                .await?;
            match self.commit_once_retried(commit).await {
                Ok(()) => {
                    info!(order_id = %placed.order.id, items = placed.items.len(), "checkout completed");
                    return Ok(CheckoutOutcome::Completed(placed));
                }
                Err(StoreError::RevisionConflict {
                    product_id,
                    expected,
                    current,
                }) => {
                    if attempt >= self.retry.max_conflict_retries {
                        warn!(%product_id, "checkout conflict retries exhausted");
                        return Err(CommerceError::ConcurrencyConflict {
                            product_ids: vec![product_id],
                        });
                    }
                    debug!(%product_id, %expected, %current, attempt, "revision conflict, re-planning checkout");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Re-validates every demand against live store rows, capturing the
    /// revision of each.
    async fn authoritative_check(
        &self,
        demands: &[Demand],
    ) -> CommerceResult<(HashMap<ProductId, ProductRecord>, Vec<StockShortfall>)> {
        let mut records = HashMap::new();
        let mut shortfalls = Vec::new();
        for demand in demands {
            let record = self
                .store
                .product_record(&demand.product_id)
                .await?
                .ok_or(CommerceError::NotFound {
                    kind: ResourceKind::Product,
                    id: demand.product_id.to_string(),
                })?;
            if record.available < demand.quantity.value() {
                shortfalls.push(StockShortfall {
                    product_id: demand.product_id,
                    product_name: record.name.clone(),
                    requested: demand.quantity,
                    available: record.available,
                });
            }
            records.insert(demand.product_id, record);
        }
        Ok((records, shortfalls))
    }

    /// Builds the atomic unit of work for one checkout attempt.
    async fn plan_commit(
        &self,
        cart: &Cart,
        destination_id: DestinationId,
        demands: &[Demand],
        records: &HashMap<ProductId, ProductRecord>,
    ) -> CommerceResult<(CheckoutCommit, PlacedOrder)> {
        let initial = self.statuses.initial().await;

        let order = Order {
            id: OrderId::generate(),
            customer_id: cart.customer_id,
            destination_id,
            total_amount: cart.total_amount,
            created_at: Timestamp::now(),
        };

        let mut items = Vec::new();
        for line in cart.active_items() {
            let record =
                records
                    .get(&line.product_id)
                    .ok_or_else(|| CommerceError::NotFound {
                        kind: ResourceKind::Product,
                        id: line.product_id.to_string(),
                    })?;
            items.push(OrderItem {
                id: OrderItemId::generate(),
                order_id: order.id,
                product_id: line.product_id,
                provider_id: record.provider_id,
                quantity: line.quantity,
                unit_price: line.price,
            });
        }

        let decrements = demands
            .iter()
            .map(|demand| {
                let record =
                    records
                        .get(&demand.product_id)
                        .ok_or_else(|| CommerceError::NotFound {
                            kind: ResourceKind::Product,
                            id: demand.product_id.to_string(),
                        })?;
                Ok(InventoryDecrement {
                    product_id: demand.product_id,
                    quantity: demand.quantity,
                    expected_revision: record.revision,
                })
            })
            .collect::<CommerceResult<Vec<_>>>()?;

        let order_activity = OrderActivity::new(order.id, initial.id.clone());
        let item_activities = items
            .iter()
            .map(|item| OrderItemActivity::new(item.id, initial.id.clone()))
            .collect();

        let mut cleared_cart = cart.clone();
        cleared_cart.clear(Timestamp::now());

        let commit = CheckoutCommit {
            order: order.clone(),
            items: items.clone(),
            decrements,
            order_activity,
            item_activities,
            cleared_cart,
        };
        Ok((commit, PlacedOrder { order, items }))
    }

    /// Applies a commit, replaying it once on transient persistence failure.
    /// A revision conflict is not transient; it goes straight back to the
    /// planning loop.
    async fn commit_once_retried(&self, commit: CheckoutCommit) -> Result<(), StoreError> {
        match self.store.commit_checkout(commit.clone()).await {
            Err(err @ (StoreError::Unavailable(_) | StoreError::Internal(_))) => {
                warn!(error = %err, "checkout commit failed, replaying once");
                tokio::time::sleep(self.retry.base_delay).await;
                self.store.commit_checkout(commit).await
            }
            other => other,
        }
    }
}

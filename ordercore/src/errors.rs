//! Error types for the checkout engine.
//!
//! Errors are layered the way the storage and catalog ports are layered:
//!
//! - [`StoreError`]: persistence failures from the [`CommerceStore`] port
//! - [`CatalogError`]: failures of the external catalog collaborator
//! - [`CommerceError`]: the service-level taxonomy surfaced to callers
//!
//! A revision conflict at the storage layer becomes a
//! [`CommerceError::ConcurrencyConflict`] at the service layer, so callers
//! see "retry the whole checkout" rather than a storage detail. A stock
//! shortfall is deliberately *not* an error: it is the expected rejection
//! outcome of checkout (see [`crate::checkout::CheckoutOutcome`]) and must be
//! distinguishable from infrastructure failure.
//!
//! [`CommerceStore`]: crate::store::CommerceStore

use crate::types::{
    MoneyError, PageNumberError, PageSizeError, ProductId, ProviderId, QuantityError, Revision,
};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the storage port.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// An inventory row moved on between read and commit. The whole checkout
    /// should be retried with fresh state.
    #[error(
        "revision conflict on product '{product_id}': expected {expected}, but current is {current}"
    )]
    RevisionConflict {
        /// The contested product.
        product_id: ProductId,
        /// The revision the commit was built against.
        expected: Revision,
        /// The revision actually found.
        current: Revision,
    },

    /// The store is temporarily unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal storage error occurred.
    #[error("internal store error: {0}")]
    Internal(String),
}

/// Errors raised by the external catalog collaborator.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The requested product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// The requested provider does not exist.
    #[error("provider not found: {0}")]
    ProviderNotFound(ProviderId),

    /// The catalog did not answer within the configured deadline.
    #[error("catalog lookup timed out after {0:?}")]
    Timeout(Duration),

    /// The catalog is temporarily unavailable.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// The kind of entity a [`CommerceError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A cart line.
    CartItem,
    /// An order.
    Order,
    /// An order line.
    OrderItem,
    /// A catalog product.
    Product,
    /// A fulfilling provider.
    Provider,
    /// A status-catalog entry.
    Status,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CartItem => "cart item",
            Self::Order => "order",
            Self::OrderItem => "order item",
            Self::Product => "product",
            Self::Provider => "provider",
            Self::Status => "status",
        };
        f.write_str(name)
    }
}

/// Service-level errors surfaced by the cart, ledger, checkout, and read
/// model services.
#[derive(Debug, Clone, Error)]
pub enum CommerceError {
    /// A quantity was zero, negative, or out of bounds.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Input failed validation (amounts, pagination parameters).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Checkout was invoked on a cart with no active items. The call has no
    /// side effects and may be repeated freely.
    #[error("cart is empty")]
    EmptyCart,

    /// The referenced entity does not exist, or is not owned by the caller.
    /// Ownership failures are reported identically to absence so that one
    /// customer's item ids never leak through another customer's errors.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of entity was looked up.
        kind: ResourceKind,
        /// Its identifier, rendered for diagnostics.
        id: String,
    },

    /// An inventory decrement lost a race with a concurrent checkout and the
    /// retry budget is exhausted. The caller may retry the whole checkout.
    #[error("concurrency conflict on products: {product_ids:?}")]
    ConcurrencyConflict {
        /// The products whose inventory rows were contested.
        product_ids: Vec<ProductId>,
    },

    /// The external catalog failed.
    #[error("catalog error: {0}")]
    Catalog(CatalogError),

    /// The storage layer failed (already retried once transparently).
    #[error("storage error: {0}")]
    Storage(StoreError),
}

/// Type alias for service-level results.
pub type CommerceResult<T> = Result<T, CommerceError>;

/// Type alias for storage-port results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for catalog-port results.
pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<StoreError> for CommerceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RevisionConflict { product_id, .. } => Self::ConcurrencyConflict {
                product_ids: vec![product_id],
            },
            other => Self::Storage(other),
        }
    }
}

impl From<CatalogError> for CommerceError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ProductNotFound(id) => Self::NotFound {
                kind: ResourceKind::Product,
                id: id.to_string(),
            },
            CatalogError::ProviderNotFound(id) => Self::NotFound {
                kind: ResourceKind::Provider,
                id: id.to_string(),
            },
            other => Self::Catalog(other),
        }
    }
}

impl From<QuantityError> for CommerceError {
    fn from(err: QuantityError) -> Self {
        Self::InvalidQuantity(err.to_string())
    }
}

impl From<MoneyError> for CommerceError {
    fn from(err: MoneyError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<PageNumberError> for CommerceError {
    fn from(err: PageNumberError) -> Self {
        Self::Validation(format!("page: {err}"))
    }
}

impl From<PageSizeError> for CommerceError {
    fn from(err: PageSizeError) -> Self {
        Self::Validation(format!("page size: {err}"))
    }
}

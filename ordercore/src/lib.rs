//! `Ordercore` - cart-to-order checkout engine
//!
//! This library turns a customer's cart into an immutable order through one
//! atomic commit, guarded by optimistic inventory revisions so that
//! concurrent checkouts can never oversell a product. Order lifecycle is an
//! append-only activity ledger; "current status" is always derived, never
//! stored.
//!
//! The pieces:
//!
//! - [`cart::CartService`] - cart mutations with soft-deleting lines
//! - [`stock::StockValidator`] - speculative stock validation
//! - [`checkout::CheckoutOrchestrator`] - the atomic cart-to-order commit
//! - [`ledger::OrderLedger`] - append-only status ledgers
//! - [`views::OrderReader`] - read-time enrichment of stored orders
//! - [`store::CommerceStore`] / [`catalog::CatalogLookup`] - the ports
//!   storage and catalog backends implement

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod errors;
pub mod ledger;
pub mod model;
pub mod stock;
pub mod store;
pub mod types;
pub mod views;

pub use cart::CartService;
pub use catalog::{
    CachedCatalog, CatalogLookup, ProductInfo, ProviderInfo, StaticStatusCatalog, StatusCatalog,
    StatusEntry,
};
pub use checkout::{CheckoutOrchestrator, CheckoutOutcome, PlacedOrder, RetryConfig};
pub use errors::{
    CatalogError, CatalogResult, CommerceError, CommerceResult, ResourceKind, StoreError,
    StoreResult,
};
pub use ledger::OrderLedger;
pub use model::{
    Cart, CartItem, Order, OrderActivity, OrderItem, OrderItemActivity, OrderPage, ProductRecord,
};
pub use stock::{Demand, StockShortfall, StockValidator};
pub use store::{CheckoutCommit, CommerceStore, InventoryDecrement};
pub use views::{OrderItemView, OrderReader, OrderView};

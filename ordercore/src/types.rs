//! Core domain types for the `ordercore` checkout engine.
//!
//! All types use smart constructors to ensure validity at construction time,
//! following the "parse, don't validate" principle: once a value exists it is
//! guaranteed to be in range, so the services never re-check it.

use chrono::{DateTime, Utc};
use nutype::nutype;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[nutype(derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            AsRef,
            Deref,
            Display,
            Serialize,
            Deserialize
        ))]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh identifier (`UUIDv7`, so ids sort by creation time).
            pub fn generate() -> Self {
                Self::new(Uuid::now_v7())
            }
        }
    };
}

entity_id!(
    /// Identifies one customer. Carts and orders are scoped to a customer.
    CustomerId
);
entity_id!(
    /// Identifies a product in the catalog.
    ProductId
);
entity_id!(
    /// Identifies the provider (seller) fulfilling an order item.
    ProviderId
);
entity_id!(
    /// Identifies an order. Orders are created once and never deleted.
    OrderId
);
entity_id!(
    /// Identifies one line of an order.
    OrderItemId
);
entity_id!(
    /// Identifies a customer's cart.
    CartId
);
entity_id!(
    /// Identifies one line of a cart.
    CartItemId
);
entity_id!(
    /// Identifies the listing (post) that surfaced a product to the customer.
    PostId
);
entity_id!(
    /// Identifies a resolved shipping destination.
    DestinationId
);

/// A globally unique ledger-entry identifier using `UUIDv7` format.
///
/// `ActivityId` values are guaranteed to be `UUIDv7`, which makes them
/// monotonic for entries created in sequence. The ledger uses them as the
/// tie-breaker when two activities carry the same timestamp.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct ActivityId(Uuid);

impl ActivityId {
    /// Creates a new `ActivityId` with the current timestamp.
    pub fn new() -> Self {
        // This will always succeed as Uuid::now_v7() always returns a valid v7 UUID
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

/// A recognized status identifier from the open status catalog.
///
/// Statuses are data, not a hardcoded enum, so new lifecycle stages can be
/// added without a code change. Identifiers are trimmed, non-empty and at
/// most 64 characters.
#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct StatusId(String);

/// An ordered quantity. Strictly positive and bounded.
#[nutype(
    validate(greater = 0, less_or_equal = 1_000_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct Quantity(u32);

impl Quantity {
    /// Returns the underlying count.
    pub fn value(self) -> u32 {
        self.into()
    }

    /// Adds two quantities, rejecting overflow past the bound.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        let sum = u64::from(self.value()) + u64::from(other.value());
        let sum = u32::try_from(sum).map_err(|_| QuantityError::LessOrEqualViolated)?;
        Self::try_new(sum)
    }
}

/// The optimistic-concurrency revision of a product's inventory row.
///
/// Revisions start at 0 and increment on every inventory change. A checkout
/// commit names the revision it observed; the store rejects the commit if the
/// row has moved on, which is what prevents two concurrent checkouts from
/// both claiming the same scarce unit.
#[nutype(
    validate(greater_or_equal = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct Revision(u64);

impl Revision {
    /// Creates the initial revision (0) for a new inventory row.
    pub fn initial() -> Self {
        Self::try_new(0).expect("0 is always a valid revision")
    }

    /// Returns the next revision after this one.
    #[must_use]
    pub fn next(self) -> Self {
        let current: u64 = self.into();
        Self::try_new(current + 1).expect("next revision should always be valid")
    }
}

/// A 1-based page number for the admin order listing.
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Into, Serialize,
        Deserialize
    )
)]
pub struct PageNumber(u32);

/// A page size between 1 and 100. Out-of-range values are rejected at
/// construction rather than silently clamped.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 100),
    derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Into, Serialize,
        Deserialize
    )
)]
pub struct PageSize(u32);

/// A timestamp for when an entity was created or a ledger entry recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a new timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Errors raised when constructing or combining [`Money`] values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The amount was negative.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount carried more than 2 decimal places.
    #[error("amount cannot have more than 2 decimal places: {0}")]
    Precision(Decimal),
    /// The amount exceeded the supported maximum.
    #[error("amount {0} exceeds the supported maximum")]
    TooLarge(Decimal),
}

/// A monetary amount with exact decimal arithmetic.
///
/// Non-negative, at most 2 decimal places. Uses [`Decimal`] so cart totals
/// never accumulate floating-point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// Maximum supported amount (100 million).
    pub const MAX_AMOUNT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

    /// Creates money from a decimal amount.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() {
            return Err(MoneyError::Negative(amount));
        }
        if amount.scale() > 2 {
            return Err(MoneyError::Precision(amount));
        }
        if amount > Self::MAX_AMOUNT {
            return Err(MoneyError::TooLarge(amount));
        }
        Ok(Self(amount))
    }

    /// Creates money from a whole number of cents.
    pub fn from_cents(cents: u64) -> Result<Self, MoneyError> {
        let cents = i64::try_from(cents).map_err(|_| MoneyError::TooLarge(Decimal::from(cents)))?;
        Self::new(Decimal::new(cents, 2))
    }

    /// Zero.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal value.
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Converts to cents.
    pub fn to_cents(&self) -> u64 {
        (self.0 * Decimal::from(100)).to_u64().unwrap_or(0)
    }

    /// Adds two amounts, rejecting results past the maximum.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        Self::new(self.0 + other.0)
    }

    /// Multiplies a unit price by an ordered quantity.
    pub fn multiply_by_quantity(self, quantity: Quantity) -> Result<Self, MoneyError> {
        Self::new(self.0 * Decimal::from(quantity.value()))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

//! Speculative stock validation.
//!
//! [`StockValidator`] answers one question: which of these demands cannot be
//! satisfied against the catalog's current quantities? It performs no
//! mutation, so checkout calls it freely before committing to anything; the
//! authoritative check happens again inside the commit, guarded by inventory
//! revisions.

use crate::catalog::CatalogLookup;
use crate::errors::CommerceResult;
use crate::model::Cart;
use crate::types::{ProductId, Quantity, QuantityError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A demanded `(product, quantity)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demand {
    /// The demanded product.
    pub product_id: ProductId,
    /// Total units demanded.
    pub quantity: Quantity,
}

impl Demand {
    /// Aggregates a cart's active lines into per-product demands, preserving
    /// first-seen order. Two lines of the same product from different
    /// listings fold into one demand.
    pub fn from_cart(cart: &Cart) -> Result<Vec<Self>, QuantityError> {
        let mut order: Vec<ProductId> = Vec::new();
        let mut by_product: HashMap<ProductId, Quantity> = HashMap::new();
        for item in cart.active_items() {
            match by_product.get(&item.product_id) {
                Some(existing) => {
                    let merged = existing.checked_add(item.quantity)?;
                    by_product.insert(item.product_id, merged);
                }
                None => {
                    order.push(item.product_id);
                    by_product.insert(item.product_id, item.quantity);
                }
            }
        }
        Ok(order
            .into_iter()
            .map(|product_id| Self {
                product_id,
                quantity: by_product[&product_id],
            })
            .collect())
    }
}

/// A structured report that one product cannot satisfy its demand.
///
/// Carries everything the caller needs to render "only 3 left in stock"
/// without another lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    /// The under-stocked product.
    pub product_id: ProductId,
    /// Its display name at validation time.
    pub product_name: String,
    /// Units requested.
    pub requested: Quantity,
    /// Units actually available.
    pub available: u32,
}

/// Read-only validator of stock demands against the catalog.
#[derive(Debug, Clone)]
pub struct StockValidator<C> {
    catalog: C,
}

impl<C> StockValidator<C>
where
    C: CatalogLookup,
{
    /// Creates a validator over the given catalog.
    pub const fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Reports every demand the catalog cannot currently satisfy. An empty
    /// list means fully satisfiable.
    pub async fn validate(&self, demands: &[Demand]) -> CommerceResult<Vec<StockShortfall>> {
        let mut shortfalls = Vec::new();
        for demand in demands {
            let info = self.catalog.product(&demand.product_id).await?;
            if info.available < demand.quantity.value() {
                shortfalls.push(StockShortfall {
                    product_id: demand.product_id,
                    product_name: info.name,
                    requested: demand.quantity,
                    available: info.available,
                });
            }
        }
        Ok(shortfalls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProductInfo, ProviderInfo};
    use crate::errors::{CatalogError, CatalogResult, CommerceError};
    use crate::model::CartItem;
    use crate::types::{CustomerId, Money, PostId, ProviderId};
    use async_trait::async_trait;

    struct MapCatalog {
        products: HashMap<ProductId, ProductInfo>,
    }

    #[async_trait]
    impl CatalogLookup for MapCatalog {
        async fn product(&self, id: &ProductId) -> CatalogResult<ProductInfo> {
            self.products
                .get(id)
                .cloned()
                .ok_or(CatalogError::ProductNotFound(*id))
        }

        async fn provider(&self, id: &ProviderId) -> CatalogResult<ProviderInfo> {
            Err(CatalogError::ProviderNotFound(*id))
        }
    }

    fn product(available: u32) -> ProductInfo {
        ProductInfo {
            id: ProductId::generate(),
            name: "Widget".to_string(),
            price: Money::from_cents(1000).unwrap(),
            available,
            provider_id: ProviderId::generate(),
        }
    }

    fn qty(n: u32) -> Quantity {
        Quantity::try_new(n).unwrap()
    }

    #[tokio::test]
    async fn satisfiable_demands_yield_no_shortfalls() {
        let info = product(5);
        let id = info.id;
        let validator = StockValidator::new(MapCatalog {
            products: HashMap::from([(id, info)]),
        });

        let shortfalls = validator
            .validate(&[Demand {
                product_id: id,
                quantity: qty(5),
            }])
            .await
            .unwrap();
        assert!(shortfalls.is_empty());
    }

    #[tokio::test]
    async fn under_stocked_demands_are_reported_per_product() {
        let plenty = product(10);
        let scarce = product(2);
        let (plenty_id, scarce_id) = (plenty.id, scarce.id);
        let validator = StockValidator::new(MapCatalog {
            products: HashMap::from([(plenty_id, plenty), (scarce_id, scarce)]),
        });

        let shortfalls = validator
            .validate(&[
                Demand {
                    product_id: plenty_id,
                    quantity: qty(3),
                },
                Demand {
                    product_id: scarce_id,
                    quantity: qty(5),
                },
            ])
            .await
            .unwrap();

        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].product_id, scarce_id);
        assert_eq!(shortfalls[0].requested, qty(5));
        assert_eq!(shortfalls[0].available, 2);
        assert_eq!(shortfalls[0].product_name, "Widget");
    }

    #[tokio::test]
    async fn unknown_products_surface_as_not_found() {
        let validator = StockValidator::new(MapCatalog {
            products: HashMap::new(),
        });

        let err = validator
            .validate(&[Demand {
                product_id: ProductId::generate(),
                quantity: qty(1),
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound { .. }));
    }

    #[test]
    fn demands_aggregate_lines_of_the_same_product() {
        let mut cart = crate::model::Cart::new(CustomerId::generate());
        let shared = ProductId::generate();
        let other = ProductId::generate();
        let price = Money::from_cents(500).unwrap();
        cart.items
            .push(CartItem::new(shared, Some(PostId::generate()), qty(2), price));
        cart.items.push(CartItem::new(other, None, qty(1), price));
        cart.items.push(CartItem::new(shared, None, qty(3), price));

        let demands = Demand::from_cart(&cart).unwrap();
        assert_eq!(demands.len(), 2);
        assert_eq!(demands[0].product_id, shared);
        assert_eq!(demands[0].quantity, qty(5));
        assert_eq!(demands[1].product_id, other);
        assert_eq!(demands[1].quantity, qty(1));
    }

    #[test]
    fn demands_skip_tombstoned_lines() {
        let mut cart = crate::model::Cart::new(CustomerId::generate());
        let mut removed = CartItem::new(
            ProductId::generate(),
            None,
            qty(4),
            Money::from_cents(100).unwrap(),
        );
        removed.removed_at = Some(crate::types::Timestamp::now());
        cart.items.push(removed);

        assert!(Demand::from_cart(&cart).unwrap().is_empty());
    }
}

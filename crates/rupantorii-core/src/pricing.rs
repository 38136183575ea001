//! # Order Pricing
//!
//! Turns a validated cart into priced lines using a snapshot of the catalog
//! read inside the order-creation transaction.
//!
//! ## Per-Line Rules (checked in this order)
//! ```text
//! line ──► product exists?          no ──► InvalidProduct
//!            │
//!            ▼
//!          product active?          no ──► ProductUnavailable
//!            │
//!            ▼
//!          variant given?  ── yes ──► exists and belongs to product?  no ──► InvalidVariant
//!            │                               │
//!            ▼                               ▼
//!          product.stock              variant.stock
//!            │                               │
//!            └────────► cumulative quantity per source ≤ stock?  no ──► InsufficientStock
//!                                    │
//!                                    ▼
//!                 unit = variant.price ?? product.base_price
//!                 line = unit × quantity   (checked)
//! ```
//!
//! The first failing line aborts pricing; nothing is returned for the rest.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::lifecycle::StockKey;
use crate::money::Money;
use crate::types::{OrderLineRequest, Product, Variant};

// =============================================================================
// Catalog Snapshot
// =============================================================================

/// Products and variants referenced by a cart, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    products: HashMap<String, Product>,
    variants: HashMap<String, Variant>,
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>, variants: Vec<Variant>) -> Self {
        CatalogSnapshot {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            variants: variants.into_iter().map(|v| (v.id.clone(), v)).collect(),
        }
    }

    /// Distinct product ids and variant ids referenced by `lines`, in first-seen order.
    pub fn referenced_ids(lines: &[OrderLineRequest]) -> (Vec<String>, Vec<String>) {
        let mut product_ids: Vec<String> = Vec::new();
        let mut variant_ids: Vec<String> = Vec::new();

        for line in lines {
            if !product_ids.contains(&line.product_id) {
                product_ids.push(line.product_id.clone());
            }
            if let Some(variant_id) = &line.variant_id {
                if !variant_ids.contains(variant_id) {
                    variant_ids.push(variant_id.clone());
                }
            }
        }

        (product_ids, variant_ids)
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.get(id)
    }
}

// =============================================================================
// Priced Order
// =============================================================================

/// One cart line resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub product_name: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

/// Prices `lines` against `catalog`.
///
/// Quantities for the same stock source are summed across lines before
/// comparing with stock, so two lines of one variant cannot jointly exceed it.
///
/// ## Example
/// ```rust
/// use rupantorii_core::{price_order, CatalogSnapshot, CoreError, OrderLineRequest};
///
/// let err = price_order(&[OrderLineRequest::product("p-1", 1)], &CatalogSnapshot::default());
/// assert_eq!(err, Err(CoreError::InvalidProduct { product_id: "p-1".into() }));
/// ```
pub fn price_order(lines: &[OrderLineRequest], catalog: &CatalogSnapshot) -> CoreResult<PricedOrder> {
    let mut demand: HashMap<StockKey, i64> = HashMap::new();
    let mut priced = Vec::with_capacity(lines.len());
    let mut total = Money::zero();

    for line in lines {
        let product = catalog
            .product(&line.product_id)
            .ok_or_else(|| CoreError::InvalidProduct {
                product_id: line.product_id.clone(),
            })?;

        if !product.is_orderable() {
            return Err(CoreError::ProductUnavailable {
                product_id: product.id.clone(),
            });
        }

        let variant = match &line.variant_id {
            Some(variant_id) => Some(
                catalog
                    .variant(variant_id)
                    .filter(|v| v.product_id == product.id)
                    .ok_or_else(|| CoreError::InvalidVariant {
                        variant_id: variant_id.clone(),
                    })?,
            ),
            None => None,
        };

        let (label, available) = match variant {
            Some(v) => (v.sku.as_str(), v.stock),
            None => (product.name.as_str(), product.stock),
        };
        let key = StockKey::for_line(&product.id, variant.map(|v| v.id.as_str()));
        let requested = demand.entry(key).or_insert(0);
        *requested = requested
            .checked_add(line.quantity)
            .ok_or(CoreError::AmountOverflow)?;
        if *requested > available {
            return Err(CoreError::InsufficientStock {
                sku: label.to_string(),
                available,
                requested: *requested,
            });
        }

        let unit_price = match variant {
            Some(v) => v.effective_price(product),
            None => product.base_price(),
        };
        let line_total = unit_price
            .checked_mul_quantity(line.quantity)
            .ok_or(CoreError::AmountOverflow)?;
        total = total.checked_add(line_total).ok_or(CoreError::AmountOverflow)?;

        priced.push(PricedLine {
            product_id: product.id.clone(),
            variant_id: variant.map(|v| v.id.clone()),
            product_name: product.name.clone(),
            sku: variant.map(|v| v.sku.clone()),
            quantity: line.quantity,
            unit_price,
            line_total,
        });
    }

    Ok(PricedOrder { lines: priced, total })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductStatus;
    use chrono::Utc;

    fn product(id: &str, base_price: i64, stock: i64, status: ProductStatus) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            base_price,
            stock,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant(id: &str, product_id: &str, price: Option<i64>, stock: i64) -> Variant {
        let now = Utc::now();
        Variant {
            id: id.to_string(),
            product_id: product_id.to_string(),
            sku: format!("SKU-{id}"),
            size: None,
            color: None,
            material: None,
            price,
            stock,
            created_at: now,
            updated_at: now,
        }
    }

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(
            vec![
                product("p-1", 2800, 0, ProductStatus::Active),
                product("p-2", 1500, 4, ProductStatus::Active),
                product("p-3", 900, 9, ProductStatus::Hidden),
            ],
            vec![
                variant("v-1", "p-1", None, 5),
                variant("v-2", "p-1", Some(2600), 1),
                variant("v-3", "p-2", None, 3),
            ],
        )
    }

    #[test]
    fn test_variant_without_override_uses_base_price() {
        let priced = price_order(&[OrderLineRequest::variant("p-1", "v-1", 2)], &catalog()).unwrap();

        assert_eq!(priced.total, Money::from_minor(5600));
        assert_eq!(priced.lines[0].unit_price, Money::from_minor(2800));
        assert_eq!(priced.lines[0].sku.as_deref(), Some("SKU-v-1"));
        assert_eq!(priced.lines[0].product_name, "Product p-1");
    }

    #[test]
    fn test_total_sums_all_lines() {
        let lines = vec![
            OrderLineRequest::variant("p-1", "v-2", 1),
            OrderLineRequest::product("p-2", 2),
        ];
        let priced = price_order(&lines, &catalog()).unwrap();

        assert_eq!(priced.total.minor(), 2600 + 2 * 1500);
        assert_eq!(priced.lines[1].variant_id, None);
        assert_eq!(priced.lines[1].sku, None);
    }

    #[test]
    fn test_unknown_product() {
        let err = price_order(&[OrderLineRequest::product("nope", 1)], &catalog()).unwrap_err();
        assert_eq!(err, CoreError::InvalidProduct { product_id: "nope".to_string() });
    }

    #[test]
    fn test_hidden_product_is_unavailable() {
        let err = price_order(&[OrderLineRequest::product("p-3", 1)], &catalog()).unwrap_err();
        assert_eq!(err, CoreError::ProductUnavailable { product_id: "p-3".to_string() });
    }

    #[test]
    fn test_variant_of_another_product_is_invalid() {
        let err = price_order(&[OrderLineRequest::variant("p-1", "v-3", 1)], &catalog()).unwrap_err();
        assert_eq!(err, CoreError::InvalidVariant { variant_id: "v-3".to_string() });
    }

    #[test]
    fn test_stock_is_checked_across_lines() {
        let lines = vec![
            OrderLineRequest::variant("p-1", "v-1", 3),
            OrderLineRequest::variant("p-1", "v-1", 3),
        ];
        let err = price_order(&lines, &catalog()).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                sku: "SKU-v-1".to_string(),
                available: 5,
                requested: 6,
            }
        );
    }

    #[test]
    fn test_variantless_product_reports_name() {
        let err = price_order(&[OrderLineRequest::product("p-1", 1)], &catalog()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { ref sku, available: 0, requested: 1 } if sku == "Product p-1"
        ));
    }

    #[test]
    fn test_overflowing_line_is_rejected() {
        let catalog = CatalogSnapshot::new(
            vec![product("p-9", i64::MAX / 2, i64::MAX, ProductStatus::Active)],
            vec![],
        );
        let err = price_order(&[OrderLineRequest::product("p-9", 3)], &catalog).unwrap_err();
        assert_eq!(err, CoreError::AmountOverflow);
    }

    #[test]
    fn test_referenced_ids_are_distinct() {
        let lines = vec![
            OrderLineRequest::variant("p-1", "v-1", 1),
            OrderLineRequest::variant("p-1", "v-1", 1),
            OrderLineRequest::product("p-2", 1),
        ];
        let (products, variants) = CatalogSnapshot::referenced_ids(&lines);
        assert_eq!(products, vec!["p-1", "p-2"]);
        assert_eq!(variants, vec!["v-1"]);
    }
}

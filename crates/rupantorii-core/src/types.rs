//! # Domain Types
//!
//! Core domain types for the storefront order engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Variant      │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  product_id     │   │  id (UUID)      │       │
//! │  │  slug           │   │  sku (unique)   │   │  order_number   │       │
//! │  │  base_price     │   │  price?         │   │  status         │       │
//! │  │  stock          │   │  stock          │   │  stock_committed│       │
//! │  │  status         │   └─────────────────┘   │  total_amount   │       │
//! │  └─────────────────┘                         └────────┬────────┘       │
//! │                                                       │ 1..n           │
//! │                                              ┌────────▼────────┐       │
//! │                                              │   OrderItem     │       │
//! │                                              │  product_id     │       │
//! │                                              │  variant_id?    │       │
//! │                                              │  quantity       │       │
//! │                                              │  price (frozen) │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business ID: (slug, sku, order_number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

// =============================================================================
// Product
// =============================================================================

/// Catalog visibility of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Listed and orderable.
    #[default]
    Active,
    /// Not listed; existing orders are unaffected.
    Hidden,
    /// Listed but cannot be ordered.
    OutOfStock,
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Display name, also used to identify variantless products in stock errors.
    pub name: String,

    /// URL-safe unique identifier.
    pub slug: String,

    /// Base price in minor units. Variants without a price override use it.
    pub base_price: i64,

    /// Stock level, meaningful only when the product has no variants.
    pub stock: i64,

    pub status: ProductStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the base price as Money.
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_minor(self.base_price)
    }

    /// Only active products accept new orders.
    #[inline]
    pub fn is_orderable(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

// =============================================================================
// Variant
// =============================================================================

/// A purchasable configuration (size/color/material) of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Variant {
    pub id: String,
    pub product_id: String,
    /// Stock Keeping Unit - unique across the catalog.
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    /// Price override in minor units. `None` falls back to the product base price.
    pub price: Option<i64>,
    pub stock: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    /// The price a customer pays for this variant of `product`.
    pub fn effective_price(&self, product: &Product) -> Money {
        self.price
            .map(Money::from_minor)
            .unwrap_or_else(|| product.base_price())
    }
}

/// Fields for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductDraft {
    pub name: String,
    pub slug: String,
    pub base_price: i64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub status: ProductStatus,
}

/// Desired state of one variant, matched to existing rows by SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VariantDraft {
    pub sku: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub stock: i64,
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order.
///
/// ```text
/// pending ──► confirmed ──► shipped ──► delivered ──► returned
///    │            │            │
///    └────────────┴────────────┴──────► cancelled
/// ```
///
/// Stock is debited only on entry into `delivered`; see [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: OrderStatus::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum PaymentMethod {
    /// Cash on delivery, the only method the storefront offers.
    #[default]
    #[serde(rename = "cod")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "cod"))]
    CashOnDelivery,
}

// =============================================================================
// Order Submission
// =============================================================================

/// Contact details captured with an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerInfo {
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One cart line as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderLineRequest {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: i64,
}

impl OrderLineRequest {
    pub fn product(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderLineRequest {
            product_id: product_id.into(),
            variant_id: None,
            quantity,
        }
    }

    pub fn variant(product_id: impl Into<String>, variant_id: impl Into<String>, quantity: i64) -> Self {
        OrderLineRequest {
            product_id: product_id.into(),
            variant_id: Some(variant_id.into()),
            quantity,
        }
    }
}

/// A complete order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewOrder {
    #[serde(flatten)]
    pub customer: CustomerInfo,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    pub items: Vec<OrderLineRequest>,
}

// =============================================================================
// Order
// =============================================================================

/// An order header.
///
/// Created once at submission; afterwards only status transitions touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Human-readable number, e.g. `RUP-M2K9ZQ1A-482`.
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub city: String,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    /// True iff stock has been debited for this order and not credited back.
    pub stock_committed: bool,
    pub cancel_reason: Option<String>,
    /// Sum of item price × quantity, fixed at creation.
    pub total_amount: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_amount)
    }
}

/// A line item of an order.
/// Uses snapshot pattern to freeze catalog data at time of order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    /// Product name at time of order (frozen).
    pub product_name: String,
    /// Variant SKU at time of order (frozen).
    pub sku: Option<String>,
    pub quantity: i64,
    /// Unit price in minor units at time of order (frozen).
    pub price: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An order together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// =============================================================================
// Listing
// =============================================================================

/// Filters and paging for order listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    /// Case-insensitive substring of the order number or id.
    #[serde(default)]
    pub search: Option<String>,
}

impl Default for OrderQuery {
    fn default() -> Self {
        OrderQuery {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            status: None,
            search: None,
        }
    }
}

impl OrderQuery {
    /// Clamps paging into range and drops an empty search term.
    ///
    /// - page 0 → 1
    /// - limit 0 → default, above max → max
    pub fn normalized(self) -> Self {
        let limit = match self.limit {
            0 => DEFAULT_PAGE_LIMIT,
            n => n.min(MAX_PAGE_LIMIT),
        };
        let search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        OrderQuery {
            page: self.page.max(1),
            limit,
            status: self.status,
            search,
        }
    }

    /// Row offset of the first order on this page.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page.max(1)) - 1) * i64::from(self.limit)
    }
}

/// One page of orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderPage {
    pub data: Vec<OrderDetail>,
    pub total: i64,
    pub page: u32,
    pub total_pages: u32,
}

/// `ceil(total / limit)`, never less than 1.
pub fn total_pages(total: i64, limit: u32) -> u32 {
    if total <= 0 || limit == 0 {
        return 1;
    }
    let limit = i64::from(limit);
    let pages = (total + limit - 1) / limit;
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

// =============================================================================
// Low-Stock Report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LowStockKind {
    Variant,
    Product,
}

/// The owning product of a low-stock entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub status: ProductStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LowStockItem {
    #[serde(rename = "type")]
    pub kind: LowStockKind,
    /// Variant id or product id, depending on `kind`.
    pub id: String,
    /// Variant SKU; `None` for variantless products.
    pub sku: Option<String>,
    pub stock: i64,
    pub product: ProductSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LowStockReport {
    pub threshold: i64,
    pub items: Vec<LowStockItem>,
}

// =============================================================================
// Unit Tests
// =============================================================================

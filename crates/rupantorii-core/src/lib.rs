//! # rupantorii-core: Pure Business Logic for the Rupantorii Storefront
//!
//! This crate holds the order lifecycle rules as pure functions with zero I/O
//! dependencies. The storage crate feeds it catalog snapshots and applies the
//! plans it returns inside a single transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Rupantorii Order Flow                               │
//! │                                                                         │
//! │  Cart submission ──► validation ──► pricing ──► ledger (pending order) │
//! │                                                                         │
//! │  Operator / fulfillment job ──► lifecycle::plan_transition             │
//! │                                        │                                │
//! │  ┌─────────────────────────────────────▼───────────────────────────┐   │
//! │  │            ★ rupantorii-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐ ┌──────────────┐    │   │
//! │  │   │  types   │ │ pricing  │ │ lifecycle │ │ order_number │    │   │
//! │  │   │ Product  │ │ Priced-  │ │ Transition│ │  RUP-...-123 │    │   │
//! │  │   │  Order   │ │ Line     │ │ Plan      │ │              │    │   │
//! │  │   └──────────┘ └──────────┘ └───────────┘ └──────────────┘    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                        │                                │
//! │  ┌─────────────────────────────────────▼───────────────────────────┐   │
//! │  │                  rupantorii-db (Database Layer)                 │   │
//! │  │      SQLite transactions, catalog snapshot, order ledger        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Variant, Order, OrderItem, ...)
//! - [`money`] - Fixed-point money in minor currency units
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Input validation for order submission
//! - [`pricing`] - Line pricing and advisory availability checks
//! - [`lifecycle`] - Stock commitment state machine
//! - [`order_number`] - Human-readable order numbers
//!
//! ## Example Usage
//!
//! ```rust
//! use rupantorii_core::money::Money;
//!
//! let base_price = Money::from_minor(2800);
//! let line_total = base_price.checked_mul_quantity(2).unwrap();
//! assert_eq!(line_total.minor(), 5600);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lifecycle;
pub mod money;
pub mod order_number;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::{plan_transition, StockEffect, StockKey, StockLevel, StockMovement, TransitionPlan};
pub use money::Money;
pub use order_number::generate_order_number;
pub use pricing::{price_order, CatalogSnapshot, PricedLine, PricedOrder};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Stock level below which a variant or variantless product is reported as
/// low on stock.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Default prefix for human-readable order numbers.
pub const DEFAULT_ORDER_PREFIX: &str = "RUP";

/// Default page size for order listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Upper bound on the page size for order listings.
pub const MAX_PAGE_LIMIT: u32 = 100;

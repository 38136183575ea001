//! # Error Types
//!
//! Domain-specific error types for rupantorii-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  rupantorii-core errors (this file)                                    │
//! │  ├── CoreError        - Order/stock rule violations                    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  rupantorii-db errors (separate crate)                                 │
//! │  └── DbError          - Storage failures + wrapped CoreError           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → API layer              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant names the entity it is about so the caller can build an
//! actionable message without re-querying.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Order lifecycle errors.
///
/// None of these are retried by the core. A client can usually fix the
/// request (drop a line, lower a quantity, pick another variant) and resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A line references a product that does not exist.
    #[error("Invalid product selected: {product_id}")]
    InvalidProduct { product_id: String },

    /// A line references a variant that does not exist or belongs to a
    /// different product.
    #[error("Invalid variant selected: {variant_id}")]
    InvalidVariant { variant_id: String },

    /// The product exists but is hidden or out of stock.
    #[error("Product is not available for ordering: {product_id}")]
    ProductUnavailable { product_id: String },

    /// Not enough stock to cover the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Mark order delivered (2 × RUP-NEC-010-18)
    ///      │
    ///      ▼
    /// Check stock: available=1
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "RUP-NEC-010-18", available: 1, requested: 2 }
    ///      │
    ///      ▼
    /// Admin sees: "Insufficient stock for RUP-NEC-010-18"
    /// ```
    ///
    /// `sku` is the variant SKU, or the product name for variantless products.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Cancellation was requested without a reason.
    #[error("Cancellation reason is required")]
    InvalidReason,

    /// The order has no line items.
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// A line or order total does not fit in the money representation.
    #[error("Order amount is too large")]
    AmountOverflow,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Stable machine-readable code for API layers.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidProduct { .. } => "INVALID_PRODUCT",
            CoreError::InvalidVariant { .. } => "INVALID_VARIANT",
            CoreError::ProductUnavailable { .. } => "PRODUCT_UNAVAILABLE",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::InvalidReason => "INVALID_REASON",
            CoreError::EmptyOrder | CoreError::Validation(_) => "VALIDATION",
            CoreError::AmountOverflow => "AMOUNT_OVERFLOW",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur before any catalog lookup, when the submitted payload itself
/// is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

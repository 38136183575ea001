//! # Validation Module
//!
//! Input validation for order submissions and status changes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API layer (outside this workspace)                           │
//! │  └── Deserialization into NewOrder                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required contact fields, phone format                             │
//! │  └── Non-empty cart, positive quantities                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: pricing (catalog references, availability)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite (CHECK, UNIQUE, FOREIGN KEY, triggers)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{CustomerInfo, NewOrder, OrderLineRequest, OrderStatus};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_TEXT_LEN: usize = 500;
const PHONE_MIN_LEN: usize = 6;
const PHONE_MAX_LEN: usize = 20;

// =============================================================================
// String Validators
// =============================================================================

/// Trims `value` and rejects it when empty or longer than the text limit.
pub fn validate_required_text(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        });
    }

    Ok(value.to_string())
}

/// Validates a customer phone number.
///
/// ## Rules
/// - 6 to 20 characters after trimming
/// - Only digits, `+`, `-` and spaces
///
/// ## Example
/// ```rust
/// use rupantorii_core::validation::validate_phone;
///
/// assert!(validate_phone("+880 1711-000000").is_ok());
/// assert!(validate_phone("call me").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<String> {
    let phone = phone.trim();
    let len = phone.chars().count();

    if len < PHONE_MIN_LEN || len > PHONE_MAX_LEN {
        return Err(ValidationError::InvalidFormat {
            field: "customerPhone".to_string(),
            reason: format!("must be {PHONE_MIN_LEN}-{PHONE_MAX_LEN} characters"),
        });
    }

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ')
    {
        return Err(ValidationError::InvalidFormat {
            field: "customerPhone".to_string(),
            reason: "must contain only digits, '+', '-' and spaces".to_string(),
        });
    }

    Ok(phone.to_string())
}

/// Trims optional notes; blank notes become `None`.
pub fn normalize_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        None => Ok(None),
        Some(n) if n.chars().count() > MAX_TEXT_LEN => Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_TEXT_LEN,
        }),
        Some(n) => Ok(Some(n.to_string())),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (must be at least 1).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Returns the customer fields trimmed and checked.
pub fn validate_customer(customer: &CustomerInfo) -> ValidationResult<CustomerInfo> {
    Ok(CustomerInfo {
        customer_name: validate_required_text("customerName", &customer.customer_name)?,
        customer_phone: validate_phone(&customer.customer_phone)?,
        address: validate_required_text("address", &customer.address)?,
        city: validate_required_text("city", &customer.city)?,
        notes: normalize_notes(customer.notes.as_deref())?,
    })
}

/// Checks a cart before it is priced against the catalog.
///
/// Returns the submission with trimmed customer fields and ids.
pub fn validate_new_order(order: &NewOrder) -> CoreResult<NewOrder> {
    if order.items.is_empty() {
        return Err(CoreError::EmptyOrder);
    }

    let customer = validate_customer(&order.customer)?;

    let mut items = Vec::with_capacity(order.items.len());
    for line in &order.items {
        validate_quantity(line.quantity)?;
        let product_id = validate_required_text("productId", &line.product_id)?;
        let variant_id = line
            .variant_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        items.push(OrderLineRequest {
            product_id,
            variant_id,
            quantity: line.quantity,
        });
    }

    Ok(NewOrder {
        customer,
        payment_method: Some(order.payment_method.unwrap_or_default()),
        items,
    })
}

/// Resolves the cancellation reason for a requested status.
///
/// `cancelled` requires a non-blank reason; every other status clears it.
pub fn resolve_cancel_reason(target: OrderStatus, reason: Option<&str>) -> CoreResult<Option<String>> {
    if target != OrderStatus::Cancelled {
        return Ok(None);
    }

    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) if r.chars().count() > MAX_TEXT_LEN => Err(ValidationError::TooLong {
            field: "cancelReason".to_string(),
            max: MAX_TEXT_LEN,
        }
        .into()),
        Some(r) => Ok(Some(r.to_string())),
        None => Err(CoreError::InvalidReason),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Stock Commitment State Machine
//!
//! Decides, for a requested status change, whether stock must be debited,
//! credited or left alone, and what the order looks like afterwards.
//!
//! ## Transition Table
//! ```text
//! ┌───────────────────────┬──────────────────┬────────────────┬─────────────────┐
//! │ target                │ stock_committed  │ stock effect   │ committed after │
//! ├───────────────────────┼──────────────────┼────────────────┼─────────────────┤
//! │ delivered             │ false            │ DEBIT all      │ true            │
//! │ delivered             │ true             │ none           │ true            │
//! │ cancelled             │ true             │ CREDIT all     │ false           │
//! │ cancelled             │ false            │ none           │ false           │
//! │ returned              │ true             │ CREDIT all     │ false           │
//! │ returned              │ false            │ none           │ false           │
//! │ pending/confirmed/    │ any              │ none           │ unchanged       │
//! │ shipped               │                  │                │                 │
//! └───────────────────────┴──────────────────┴────────────────┴─────────────────┘
//! ```
//!
//! `cancel_reason` is required for `cancelled` and cleared for every other
//! target.
//!
//! ## All-or-Nothing Debit
//! Every stock source is checked before a single movement is produced. The
//! storage layer applies the returned plan inside the same write-locked
//! transaction that read the stock levels, so a rejected plan leaves nothing
//! behind.
//!
//! Stock is not reserved when an order is placed. The delivered transition is
//! the only place the stock floor is enforced.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{CoreError, CoreResult};
use crate::types::{Order, OrderItem, OrderStatus};
use crate::validation::resolve_cancel_reason;

// =============================================================================
// Stock Sources
// =============================================================================

/// The row an order line draws stock from.
///
/// Lines with a variant draw on the variant; lines without one draw on the
/// product itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum StockKey {
    Variant(String),
    Product(String),
}

impl StockKey {
    pub fn for_line(product_id: &str, variant_id: Option<&str>) -> Self {
        match variant_id {
            Some(variant_id) => StockKey::Variant(variant_id.to_string()),
            None => StockKey::Product(product_id.to_string()),
        }
    }

    pub fn for_item(item: &OrderItem) -> Self {
        StockKey::for_line(&item.product_id, item.variant_id.as_deref())
    }

    pub fn id(&self) -> &str {
        match self {
            StockKey::Variant(id) | StockKey::Product(id) => id,
        }
    }
}

/// Current stock of one source, as read inside the transition transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    /// Variant SKU, or product name for variantless products.
    pub label: String,
    pub available: i64,
}

/// Total quantity each stock source must cover for `items`.
///
/// A `BTreeMap` keeps the order deterministic, so stock rows are always
/// touched in the same order.
pub fn stock_requirements(items: &[OrderItem]) -> BTreeMap<StockKey, i64> {
    let mut required = BTreeMap::new();
    for item in items {
        let total = required.entry(StockKey::for_item(item)).or_insert(0_i64);
        *total = total.saturating_add(item.quantity);
    }
    required
}

// =============================================================================
// Transition Plan
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockEffect {
    Debit,
    Credit,
    None,
}

/// What a transition does to stock, given the target and the current flag.
pub fn stock_effect(target: OrderStatus, stock_committed: bool) -> StockEffect {
    match (target, stock_committed) {
        (OrderStatus::Delivered, false) => StockEffect::Debit,
        (OrderStatus::Cancelled, true) | (OrderStatus::Returned, true) => StockEffect::Credit,
        _ => StockEffect::None,
    }
}

/// A signed change to one stock source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub key: StockKey,
    /// Negative for a debit, positive for a credit.
    pub delta: i64,
}

/// The full outcome of a status change, ready to be written atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    pub status: OrderStatus,
    pub stock_committed: bool,
    pub cancel_reason: Option<String>,
    pub effect: StockEffect,
    pub movements: Vec<StockMovement>,
}

/// Plans a status change for `order`.
///
/// ## Arguments
/// * `order` / `items` - the order as currently persisted
/// * `target` - requested status
/// * `cancel_reason` - required when `target` is cancelled
/// * `stock` - current levels for every key in [`stock_requirements`];
///   only consulted for a debit
///
/// ## Errors
/// * `InvalidReason` - cancelling without a reason
/// * `InsufficientStock` - a debit would take a source below zero
/// * `InvalidVariant` / `InvalidProduct` - a debited source no longer exists
pub fn plan_transition(
    order: &Order,
    items: &[OrderItem],
    target: OrderStatus,
    cancel_reason: Option<&str>,
    stock: &HashMap<StockKey, StockLevel>,
) -> CoreResult<TransitionPlan> {
    let cancel_reason = resolve_cancel_reason(target, cancel_reason)?;
    let effect = stock_effect(target, order.stock_committed);
    let required = stock_requirements(items);

    let (movements, stock_committed) = match effect {
        StockEffect::Debit => {
            for (key, &requested) in &required {
                let level = stock.get(key).ok_or_else(|| missing_source(key))?;
                if level.available < requested {
                    return Err(CoreError::InsufficientStock {
                        sku: level.label.clone(),
                        available: level.available,
                        requested,
                    });
                }
            }
            let movements = required
                .into_iter()
                .map(|(key, qty)| StockMovement { key, delta: -qty })
                .collect();
            (movements, true)
        }
        StockEffect::Credit => {
            let movements = required
                .into_iter()
                .map(|(key, qty)| StockMovement { key, delta: qty })
                .collect();
            (movements, false)
        }
        StockEffect::None => (Vec::new(), order.stock_committed),
    };

    Ok(TransitionPlan {
        from: order.status,
        status: target,
        stock_committed,
        cancel_reason,
        effect,
        movements,
    })
}

fn missing_source(key: &StockKey) -> CoreError {
    match key {
        StockKey::Variant(id) => CoreError::InvalidVariant {
            variant_id: id.clone(),
        },
        StockKey::Product(id) => CoreError::InvalidProduct {
            product_id: id.clone(),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Repository Module
//!
//! Database repositories for the storefront.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Caller (API handler, orderctl, fulfillment job)                       │
//! │       │                                                                 │
//! │       │  db.orders().transition_status(id, Delivered, None)            │
//! │       ▼                                                                 │
//! │  OrderRepository ──────► rupantorii-core (pricing, plan_transition)    │
//! │       │                                                                 │
//! │       │  shares the caller's transaction                               │
//! │       ▼                                                                 │
//! │  catalog::{read_snapshot, read_stock_levels, apply_movement}           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Product/variant reads and maintenance
//! - [`OrderRepository`](order::OrderRepository) - Order ledger and status transitions
//! - [`AlertRepository`](alerts::AlertRepository) - Low-stock report

pub mod alerts;
pub mod catalog;
pub mod order;

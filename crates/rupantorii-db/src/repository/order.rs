//! # Order Repository
//!
//! The order ledger: atomic creation, lookup, listing and status transitions.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create_order() → Order { status: pending, committed: false }   │
//! │         validate → snapshot → price → header + items, one transaction  │
//! │                                                                         │
//! │  2. TRANSITION (any number of times)                                   │
//! │     └── transition_status()                                            │
//! │         read order + items + stock → plan_transition → apply movements │
//! │         → update header, one BEGIN IMMEDIATE transaction               │
//! │                                                                         │
//! │  3. READ                                                               │
//! │     └── get_order() / list_orders()                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! `BEGIN IMMEDIATE` takes SQLite's write lock before the stock read. Two
//! deliveries racing on the last unit of a variant therefore run one after
//! the other: the second reads the first one's debit and is rejected with
//! `InsufficientStock`. The busy timeout makes the second writer wait instead
//! of failing with `SQLITE_BUSY`.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rupantorii_core::lifecycle::{stock_effect, stock_requirements};
use rupantorii_core::validation::{resolve_cancel_reason, validate_new_order};
use rupantorii_core::{
    generate_order_number, plan_transition, price_order, total_pages, CatalogSnapshot, CoreError,
    NewOrder, Order, OrderDetail, OrderItem, OrderPage, OrderQuery, OrderStatus, PricedOrder,
    StockEffect,
};

use crate::error::{DbError, DbResult};
use crate::repository::catalog::{apply_movement, read_snapshot, read_stock_levels};

/// How many order numbers are tried before giving up on a collision streak.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

const ORDER_COLUMNS: &str = "id, order_number, customer_name, customer_phone, address, city, notes, \
     payment_method, status, stock_committed, cancel_reason, total_amount, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, variant_id, product_name, sku, quantity, price, created_at";

/// Repository for the order ledger.
///
/// ## Usage
/// ```rust,ignore
/// let orders = db.orders();
/// let detail = orders.create_order(submission).await?;
/// orders.transition_status(&detail.order.id, OrderStatus::Delivered, None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    order_number_prefix: String,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool, order_number_prefix: impl Into<String>) -> Self {
        OrderRepository {
            pool,
            order_number_prefix: order_number_prefix.into(),
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Validates, prices and persists a new order.
    ///
    /// ## What This Does
    /// 1. Validates the submission (contact fields, non-empty cart, quantities)
    /// 2. Reads every referenced product/variant inside the write transaction
    /// 3. Prices the lines and checks availability (no stock is reserved)
    /// 4. Inserts the header and items, then commits
    ///
    /// ## Errors
    /// * `Domain(InvalidProduct | InvalidVariant | ProductUnavailable | InsufficientStock)`
    /// * `Domain(Validation | EmptyOrder | AmountOverflow)`
    ///
    /// On any error nothing is persisted.
    pub async fn create_order(&self, submission: NewOrder) -> DbResult<OrderDetail> {
        let submission = validate_new_order(&submission)?;
        let (product_ids, variant_ids) = CatalogSnapshot::referenced_ids(&submission.items);

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let snapshot = read_snapshot(&mut tx, &product_ids, &variant_ids).await?;
        let priced = price_order(&submission.items, &snapshot).map_err(|err| {
            debug!(error = %err, "Order rejected during pricing");
            err
        })?;

        let now = Utc::now();
        let customer = submission.customer;
        let mut order = Order {
            id: Uuid::new_v4().to_string(),
            order_number: String::new(),
            customer_name: customer.customer_name,
            customer_phone: customer.customer_phone,
            address: customer.address,
            city: customer.city,
            notes: customer.notes,
            payment_method: submission.payment_method.unwrap_or_default(),
            status: OrderStatus::Pending,
            stock_committed: false,
            cancel_reason: None,
            total_amount: priced.total.minor(),
            created_at: now,
            updated_at: now,
        };

        self.insert_header(&mut tx, &mut order).await?;
        let items = insert_items(&mut tx, &order, priced).await?;

        tx.commit().await?;

        info!(
            id = %order.id,
            order_number = %order.order_number,
            total = %order.total(),
            items = items.len(),
            "Order created"
        );

        Ok(OrderDetail { order, items })
    }

    /// Inserts the order header, drawing a fresh order number on collision.
    async fn insert_header(&self, conn: &mut SqliteConnection, order: &mut Order) -> DbResult<()> {
        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            order.order_number = generate_order_number(&self.order_number_prefix, Utc::now());

            let result = sqlx::query(
                r#"
                INSERT INTO orders (
                    id, order_number, customer_name, customer_phone, address, city, notes,
                    payment_method, status, stock_committed, cancel_reason, total_amount,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
            )
            .bind(&order.id)
            .bind(&order.order_number)
            .bind(&order.customer_name)
            .bind(&order.customer_phone)
            .bind(&order.address)
            .bind(&order.city)
            .bind(&order.notes)
            .bind(order.payment_method)
            .bind(order.status)
            .bind(order.stock_committed)
            .bind(&order.cancel_reason)
            .bind(order.total_amount)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut *conn)
            .await;

            match result.map_err(DbError::from) {
                Ok(_) => return Ok(()),
                Err(err) if err.is_unique_violation_on("order_number") => {
                    warn!(
                        order_number = %order.order_number,
                        attempt,
                        "Order number collision, regenerating"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(DbError::duplicate("order_number", order.order_number.clone()))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns an order with its items.
    ///
    /// ## Errors
    /// * `NotFound` - unknown id
    pub async fn get_order(&self, id: &str) -> DbResult<OrderDetail> {
        let mut conn = self.pool.acquire().await?;
        let order = fetch_order(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;
        let items = fetch_items(&mut conn, &[order.id.as_str()]).await?;

        Ok(OrderDetail { order, items })
    }

    /// Lists orders newest first, with their items.
    ///
    /// Paging is clamped (page ≥ 1, limit 1..=100). `search` matches the
    /// order number or id case-insensitively.
    pub async fn list_orders(&self, query: OrderQuery) -> DbResult<OrderPage> {
        let query = query.normalized();
        let status = query.status.map(|s| s.as_str());
        let pattern = query.search.as_deref().map(like_pattern);

        debug!(
            page = query.page,
            limit = query.limit,
            status = ?status,
            search = ?query.search,
            "Listing orders"
        );

        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM orders
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR lower(order_number) LIKE ?2 ESCAPE '\' OR lower(id) LIKE ?2 ESCAPE '\')
            "#,
        )
        .bind(status)
        .bind(pattern.as_deref())
        .fetch_one(&mut *conn)
        .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR lower(order_number) LIKE ?2 ESCAPE '\' OR lower(id) LIKE ?2 ESCAPE '\')
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3 OFFSET ?4
            "#
        ))
        .bind(status)
        .bind(pattern.as_deref())
        .bind(i64::from(query.limit))
        .bind(query.offset())
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        let mut items_by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for item in fetch_items(&mut conn, &ids).await? {
            items_by_order.entry(item.order_id.clone()).or_default().push(item);
        }

        let data = orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                OrderDetail { order, items }
            })
            .collect();

        Ok(OrderPage {
            data,
            total,
            page: query.page,
            total_pages: total_pages(total, query.limit),
        })
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Moves an order to `target`, debiting or crediting stock as required.
    ///
    /// ## Stock Effects
    /// ```text
    /// → delivered   (not committed)  debit every item, committed = true
    /// → cancelled   (committed)      credit every item, committed = false
    /// → returned    (committed)      credit every item, committed = false
    /// anything else                  status only
    /// ```
    ///
    /// The order read, stock read, stock writes and header update share one
    /// `BEGIN IMMEDIATE` transaction. Any failure rolls all of it back.
    ///
    /// ## Errors
    /// * `NotFound` - unknown order id
    /// * `Domain(InvalidReason)` - cancelling without a reason
    /// * `Domain(InsufficientStock)` - delivery would take stock below zero
    pub async fn transition_status(
        &self,
        id: &str,
        target: OrderStatus,
        cancel_reason: Option<&str>,
    ) -> DbResult<OrderDetail> {
        // Reject a missing reason before taking the write lock
        resolve_cancel_reason(target, cancel_reason)?;

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let order = fetch_order(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;
        let items = fetch_items(&mut tx, &[order.id.as_str()]).await?;

        let levels = match stock_effect(target, order.stock_committed) {
            StockEffect::Debit => {
                let required = stock_requirements(&items);
                read_stock_levels(&mut tx, required.keys()).await?
            }
            StockEffect::Credit | StockEffect::None => HashMap::new(),
        };

        let plan = match plan_transition(&order, &items, target, cancel_reason, &levels) {
            Ok(plan) => plan,
            Err(err) => {
                if let CoreError::InsufficientStock { sku, available, requested } = &err {
                    warn!(
                        order_number = %order.order_number,
                        sku = %sku,
                        available,
                        requested,
                        "Delivery rejected: insufficient stock"
                    );
                }
                return Err(err.into());
            }
        };

        for movement in &plan.movements {
            apply_movement(&mut tx, movement).await?;
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE orders SET
                status = ?2,
                stock_committed = ?3,
                cancel_reason = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&order.id)
        .bind(plan.status)
        .bind(plan.stock_committed)
        .bind(&plan.cancel_reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            order_number = %order.order_number,
            from = %plan.from,
            to = %plan.status,
            effect = ?plan.effect,
            movements = plan.movements.len(),
            "Order status changed"
        );

        let order = Order {
            status: plan.status,
            stock_committed: plan.stock_committed,
            cancel_reason: plan.cancel_reason,
            updated_at: now,
            ..order
        };

        Ok(OrderDetail { order, items })
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn insert_items(
    conn: &mut SqliteConnection,
    order: &Order,
    priced: PricedOrder,
) -> DbResult<Vec<OrderItem>> {
    let mut items = Vec::with_capacity(priced.lines.len());

    for line in priced.lines {
        let item = OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            product_id: line.product_id,
            variant_id: line.variant_id,
            product_name: line.product_name,
            sku: line.sku,
            quantity: line.quantity,
            price: line.unit_price.minor(),
            created_at: order.created_at,
        };

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, variant_id,
                product_name, sku, quantity, price, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.variant_id)
        .bind(&item.product_name)
        .bind(&item.sku)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        items.push(item);
    }

    Ok(items)
}

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(order)
}

/// Items of the given orders, in insertion order.
async fn fetch_items(conn: &mut SqliteConnection, order_ids: &[&str]) -> DbResult<Vec<OrderItem>> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id IN ("));
    let mut ids = query.separated(", ");
    for id in order_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY rowid");

    let items = query.build_query_as::<OrderItem>().fetch_all(&mut *conn).await?;
    Ok(items)
}

/// `%term%` in lowercase with LIKE wildcards escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use rupantorii_core::{
        CustomerInfo, Money, OrderLineRequest, Product, ProductDraft, ProductStatus, Variant,
        VariantDraft,
    };
    use std::time::Duration;

    struct Fixture {
        db: Database,
        bangles: Product,
        size_m: Variant,
        necklace_16: Variant,
        ring: Product,
    }

    async fn fixture_with(config: DbConfig) -> Fixture {
        let db = Database::new(config).await.unwrap();
        let catalog = db.catalog();

        let bangles = catalog
            .insert_product(&ProductDraft {
                name: "Rose Aura Bangles".to_string(),
                slug: "rose-aura-bangles".to_string(),
                base_price: 2800,
                stock: 0,
                status: ProductStatus::Active,
            })
            .await
            .unwrap();
        let size_m = catalog
            .insert_variant(&bangles.id, &variant("RUP-BAN-001-M", None, 3))
            .await
            .unwrap();

        let necklace = catalog
            .insert_product(&ProductDraft {
                name: "Lotus Whisper Necklace".to_string(),
                slug: "lotus-whisper-necklace".to_string(),
                base_price: 4200,
                stock: 0,
                status: ProductStatus::Active,
            })
            .await
            .unwrap();
        let necklace_16 = catalog
            .insert_variant(&necklace.id, &variant("RUP-NEC-010-16", None, 1))
            .await
            .unwrap();

        let ring = catalog
            .insert_product(&ProductDraft {
                name: "Plain Band Ring".to_string(),
                slug: "plain-band-ring".to_string(),
                base_price: 1500,
                stock: 4,
                status: ProductStatus::Active,
            })
            .await
            .unwrap();

        Fixture { db, bangles, size_m, necklace_16, ring }
    }

    async fn fixture() -> Fixture {
        fixture_with(DbConfig::in_memory()).await
    }

    fn variant(sku: &str, price: Option<i64>, stock: i64) -> VariantDraft {
        VariantDraft {
            sku: sku.to_string(),
            size: None,
            color: None,
            material: None,
            price,
            stock,
        }
    }

    fn submission(items: Vec<OrderLineRequest>) -> NewOrder {
        NewOrder {
            customer: CustomerInfo {
                customer_name: "Nusrat Jahan".to_string(),
                customer_phone: "+880 1711-000000".to_string(),
                address: "House 7, Road 3, Dhanmondi".to_string(),
                city: "Dhaka".to_string(),
                notes: Some("Call before delivery".to_string()),
            },
            payment_method: None,
            items,
        }
    }

    async fn variant_stock(db: &Database, id: &str) -> i64 {
        db.catalog().get_variant(id).await.unwrap().unwrap().stock
    }

    async fn product_stock(db: &Database, id: &str) -> i64 {
        db.catalog().get_product(id).await.unwrap().unwrap().stock
    }

    async fn order_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_order_prices_from_base_price() {
        let f = fixture().await;

        let detail = f
            .db
            .orders()
            .create_order(submission(vec![OrderLineRequest::variant(&f.bangles.id, &f.size_m.id, 2)]))
            .await
            .unwrap();

        assert_eq!(detail.order.total(), Money::from_minor(5600));
        assert_eq!(detail.order.status, OrderStatus::Pending);
        assert!(!detail.order.stock_committed);
        assert!(detail.order.order_number.starts_with("RUP-"));
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].price, 2800);
        assert_eq!(detail.items[0].sku.as_deref(), Some("RUP-BAN-001-M"));
        assert_eq!(detail.items[0].product_name, "Rose Aura Bangles");

        // No stock is reserved at creation
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, 3);
    }

    #[tokio::test]
    async fn test_create_order_out_of_stock_persists_nothing() {
        let f = fixture().await;
        let empty = f
            .db
            .catalog()
            .insert_variant(&f.bangles.id, &variant("RUP-BAN-001-XS", Some(2600), 0))
            .await
            .unwrap();

        let err = f
            .db
            .orders()
            .create_order(submission(vec![
                OrderLineRequest::product(&f.ring.id, 1),
                OrderLineRequest::variant(&f.bangles.id, &empty.id, 2),
            ]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { ref sku, available: 0, requested: 2 })
                if sku == "RUP-BAN-001-XS"
        ));
        assert_eq!(order_count(&f.db).await, 0);
    }

    #[tokio::test]
    async fn test_create_order_rejects_bad_references() {
        let f = fixture().await;
        let orders = f.db.orders();

        let err = orders
            .create_order(submission(vec![OrderLineRequest::product("nope", 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PRODUCT");

        let err = orders
            .create_order(submission(vec![OrderLineRequest::variant(&f.ring.id, &f.size_m.id, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_VARIANT");

        f.db
            .catalog()
            .set_product_status(&f.ring.id, ProductStatus::Hidden)
            .await
            .unwrap();
        let err = orders
            .create_order(submission(vec![OrderLineRequest::product(&f.ring.id, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PRODUCT_UNAVAILABLE");

        let err = orders.create_order(submission(vec![])).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyOrder)));

        assert_eq!(order_count(&f.db).await, 0);
    }

    #[tokio::test]
    async fn test_delivery_debits_exactly_once() {
        let f = fixture().await;
        let orders = f.db.orders();
        let detail = orders
            .create_order(submission(vec![
                OrderLineRequest::variant(&f.bangles.id, &f.size_m.id, 2),
                OrderLineRequest::product(&f.ring.id, 3),
            ]))
            .await
            .unwrap();
        let id = detail.order.id.as_str();

        let shipped = orders.transition_status(id, OrderStatus::Shipped, None).await.unwrap();
        assert!(!shipped.order.stock_committed);
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, 3);

        let delivered = orders.transition_status(id, OrderStatus::Delivered, None).await.unwrap();
        assert!(delivered.order.stock_committed);
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, 1);
        assert_eq!(product_stock(&f.db, &f.ring.id).await, 1);

        let again = orders.transition_status(id, OrderStatus::Delivered, None).await.unwrap();
        assert!(again.order.stock_committed);
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, 1);
        assert_eq!(product_stock(&f.db, &f.ring.id).await, 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_changes_nothing() {
        let f = fixture().await;
        let orders = f.db.orders();
        let detail = orders
            .create_order(submission(vec![
                OrderLineRequest::variant(&f.bangles.id, &f.size_m.id, 1),
                OrderLineRequest::product(&f.ring.id, 4),
            ]))
            .await
            .unwrap();

        // Stock corrected by an admin after the order was placed
        sqlx::query("UPDATE products SET stock = 2 WHERE id = ?1")
            .bind(&f.ring.id)
            .execute(f.db.pool())
            .await
            .unwrap();

        let err = orders
            .transition_status(&detail.order.id, OrderStatus::Delivered, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { ref sku, available: 2, requested: 4 })
                if sku == "Plain Band Ring"
        ));

        let after = orders.get_order(&detail.order.id).await.unwrap();
        assert_eq!(after.order.status, OrderStatus::Pending);
        assert!(!after.order.stock_committed);
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, 3);
        assert_eq!(product_stock(&f.db, &f.ring.id).await, 2);
    }

    #[tokio::test]
    async fn test_cancel_after_delivery_restores_stock() {
        let f = fixture().await;
        let orders = f.db.orders();
        let detail = orders
            .create_order(submission(vec![OrderLineRequest::variant(&f.bangles.id, &f.size_m.id, 2)]))
            .await
            .unwrap();
        let id = detail.order.id.as_str();
        let before = variant_stock(&f.db, &f.size_m.id).await;

        orders.transition_status(id, OrderStatus::Delivered, None).await.unwrap();

        let err = orders
            .transition_status(id, OrderStatus::Cancelled, Some("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidReason)));
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, before - 2);

        let cancelled = orders
            .transition_status(id, OrderStatus::Cancelled, Some("Customer refused parcel"))
            .await
            .unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert!(!cancelled.order.stock_committed);
        assert_eq!(cancelled.order.cancel_reason.as_deref(), Some("Customer refused parcel"));
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, before);
    }

    #[tokio::test]
    async fn test_cancel_pending_touches_no_stock() {
        let f = fixture().await;
        let orders = f.db.orders();
        let detail = orders
            .create_order(submission(vec![OrderLineRequest::product(&f.ring.id, 1)]))
            .await
            .unwrap();

        let cancelled = orders
            .transition_status(&detail.order.id, OrderStatus::Cancelled, Some("Duplicate order"))
            .await
            .unwrap();

        assert!(!cancelled.order.stock_committed);
        assert_eq!(product_stock(&f.db, &f.ring.id).await, 4);

        // Moving back to pending clears the reason
        let reopened = orders
            .transition_status(&detail.order.id, OrderStatus::Pending, None)
            .await
            .unwrap();
        assert_eq!(reopened.order.cancel_reason, None);
    }

    #[tokio::test]
    async fn test_return_credits_back() {
        let f = fixture().await;
        let orders = f.db.orders();
        let detail = orders
            .create_order(submission(vec![OrderLineRequest::variant(&f.bangles.id, &f.size_m.id, 1)]))
            .await
            .unwrap();
        let id = detail.order.id.as_str();

        orders.transition_status(id, OrderStatus::Delivered, None).await.unwrap();
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, 2);

        let returned = orders.transition_status(id, OrderStatus::Returned, None).await.unwrap();
        assert_eq!(returned.order.status, OrderStatus::Returned);
        assert!(!returned.order.stock_committed);
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, 3);

        // A second return has nothing left to credit
        orders.transition_status(id, OrderStatus::Returned, None).await.unwrap();
        assert_eq!(variant_stock(&f.db, &f.size_m.id).await, 3);
    }

    #[tokio::test]
    async fn test_price_edits_do_not_change_existing_orders() {
        let f = fixture().await;
        let detail = f
            .db
            .orders()
            .create_order(submission(vec![OrderLineRequest::variant(&f.bangles.id, &f.size_m.id, 2)]))
            .await
            .unwrap();

        f.db.catalog()
            .set_base_price(&f.bangles.id, Money::from_minor(3100))
            .await
            .unwrap();
        f.db.catalog()
            .set_variant_price(&f.size_m.id, Some(Money::from_minor(2990)))
            .await
            .unwrap();

        let stored = f.db.orders().get_order(&detail.order.id).await.unwrap();
        assert_eq!(stored.order.total_amount, 5600);
        assert_eq!(stored.items[0].price, 2800);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let f = fixture().await;
        let err = f.db.orders().get_order("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = f
            .db
            .orders()
            .transition_status("missing", OrderStatus::Shipped, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_orders_pages_filters_and_searches() {
        let f = fixture().await;
        let orders = f.db.orders();

        let mut created = Vec::new();
        for _ in 0..3 {
            let detail = orders
                .create_order(submission(vec![OrderLineRequest::product(&f.ring.id, 1)]))
                .await
                .unwrap();
            created.push(detail.order);
        }
        orders
            .transition_status(&created[0].id, OrderStatus::Confirmed, None)
            .await
            .unwrap();

        let page = orders
            .list_orders(OrderQuery { page: 1, limit: 2, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].order.id, created[2].id);
        assert_eq!(page.data[0].items.len(), 1);

        let page = orders
            .list_orders(OrderQuery { page: 2, limit: 2, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].order.id, created[0].id);

        let confirmed = orders
            .list_orders(OrderQuery { status: Some(OrderStatus::Confirmed), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(confirmed.total, 1);

        let needle = created[1].order_number.to_lowercase();
        let found = orders
            .list_orders(OrderQuery { search: Some(needle), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.data[0].order.id, created[1].id);

        let none = orders
            .list_orders(OrderQuery { search: Some("%".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(none.total, 0);
        assert_eq!(none.total_pages, 1);
    }

    #[tokio::test]
    async fn test_ledger_rows_are_protected() {
        let f = fixture().await;
        let detail = f
            .db
            .orders()
            .create_order(submission(vec![OrderLineRequest::product(&f.ring.id, 1)]))
            .await
            .unwrap();

        let delete = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(&detail.order.id)
            .execute(f.db.pool())
            .await;
        assert!(delete.is_err());

        let edit = sqlx::query("UPDATE order_items SET quantity = 9 WHERE order_id = ?1")
            .bind(&detail.order.id)
            .execute(f.db.pool())
            .await;
        assert!(edit.is_err());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("RUP-AB"), "%rup-ab%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_race_for_last_unit() {
        let path = std::env::temp_dir().join(format!("rupantorii-race-{}.db", Uuid::new_v4()));
        let config = DbConfig::new(&path)
            .max_connections(5)
            .busy_timeout(Duration::from_secs(10));
        let f = fixture_with(config).await;
        let orders = f.db.orders();

        let mut ids = Vec::new();
        for _ in 0..2 {
            let detail = orders
                .create_order(submission(vec![OrderLineRequest::variant(
                    &f.necklace_16.product_id,
                    &f.necklace_16.id,
                    1,
                )]))
                .await
                .unwrap();
            ids.push(detail.order.id);
        }

        let first = {
            let orders = orders.clone();
            let id = ids[0].clone();
            tokio::spawn(async move { orders.transition_status(&id, OrderStatus::Delivered, None).await })
        };
        let second = {
            let orders = orders.clone();
            let id = ids[1].clone();
            tokio::spawn(async move { orders.transition_status(&id, OrderStatus::Delivered, None).await })
        };
        let (first, second) = tokio::join!(first, second);
        let results = [first.unwrap(), second.unwrap()];

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let short = results
            .iter()
            .filter(|r| matches!(r, Err(DbError::Domain(CoreError::InsufficientStock { .. }))))
            .count();
        assert_eq!(succeeded, 1);
        assert_eq!(short, 1);
        assert_eq!(variant_stock(&f.db, &f.necklace_16.id).await, 0);

        f.db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}

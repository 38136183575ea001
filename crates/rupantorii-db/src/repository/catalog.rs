//! # Catalog Repository
//!
//! Products and variants: the snapshot read used when pricing an order, the
//! stock reads and writes used by status transitions, and the small set of
//! maintenance operations the order engine relies on.
//!
//! ## Who Touches Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  read_snapshot       order creation   (read only, advisory check)       │
//! │  read_stock_levels   transition       (read, under the write lock)      │
//! │  apply_movement      transition       (guarded write, same tx)          │
//! │  reconcile_variants  catalog admin    (sets stock for restocks)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The crate-level functions take a `&mut SqliteConnection` so they run on
//! whatever transaction the caller already holds.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use rupantorii_core::validation::validate_required_text;
use rupantorii_core::{
    CatalogSnapshot, CoreError, Money, Product, ProductDraft, ProductStatus, StockKey, StockLevel,
    StockMovement, ValidationError, Variant, VariantDraft,
};

use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, name, slug, base_price, stock, status, created_at, updated_at";

const VARIANT_COLUMNS: &str =
    "id, product_id, sku, size, color, material, price, stock, created_at, updated_at";

/// Outcome of [`CatalogRepository::reconcile_variants`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantReconciliation {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads the given products and variants in one consistent snapshot.
    ///
    /// Ids that do not exist are simply absent from the result.
    pub async fn snapshot(&self, product_ids: &[String], variant_ids: &[String]) -> DbResult<CatalogSnapshot> {
        let mut tx = self.pool.begin().await?;
        let snapshot = read_snapshot(&mut tx, product_ids, variant_ids).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn get_product_by_slug(&self, slug: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = ?1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn get_variant(&self, id: &str) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Variants of a product, ordered by SKU.
    pub async fn list_variants(&self, product_id: &str) -> DbResult<Vec<Variant>> {
        let variants = sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = ?1 ORDER BY sku"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Inserts a product.
    ///
    /// ## Errors
    /// * `UniqueViolation` - the slug is taken
    /// * `Domain(Validation)` - blank name/slug, negative price or stock
    pub async fn insert_product(&self, draft: &ProductDraft) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: validate_required_text("name", &draft.name).map_err(CoreError::from)?,
            slug: validate_required_text("slug", &draft.slug).map_err(CoreError::from)?,
            base_price: non_negative("basePrice", draft.base_price)?,
            stock: non_negative("stock", draft.stock)?,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, slug = %product.slug, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, slug, base_price, stock, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(product.base_price)
        .bind(product.stock)
        .bind(product.status)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_violation_on("slug") => DbError::duplicate("slug", &product.slug),
            err => err,
        })?;

        Ok(product)
    }

    /// Inserts a single variant under `product_id`.
    pub async fn insert_variant(&self, product_id: &str, draft: &VariantDraft) -> DbResult<Variant> {
        let mut conn = self.pool.acquire().await?;
        let variant = insert_variant_row(&mut conn, product_id, draft).await?;
        Ok(variant)
    }

    /// Changes a product's base price.
    ///
    /// Existing orders keep the prices captured on their items.
    pub async fn set_base_price(&self, product_id: &str, price: Money) -> DbResult<()> {
        let price = non_negative("basePrice", price.minor())?;
        debug!(id = %product_id, price, "Updating base price");

        let result = sqlx::query("UPDATE products SET base_price = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(product_id)
            .bind(price)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        Ok(())
    }

    /// Sets or clears a variant's price override.
    pub async fn set_variant_price(&self, variant_id: &str, price: Option<Money>) -> DbResult<()> {
        let price = price
            .map(|p| non_negative("price", p.minor()))
            .transpose()?;
        debug!(id = %variant_id, ?price, "Updating variant price");

        let result = sqlx::query("UPDATE product_variants SET price = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(variant_id)
            .bind(price)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", variant_id));
        }

        Ok(())
    }

    pub async fn set_product_status(&self, product_id: &str, status: ProductStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(product_id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        Ok(())
    }

    /// Brings a product's variants in line with `desired`, matching by SKU.
    ///
    /// ## What This Does
    /// 1. SKUs present in both: size/color/material/price/stock are updated
    /// 2. SKUs only in `desired`: inserted
    /// 3. SKUs only in the database: deleted
    ///
    /// Runs as one transaction. Deleting a variant that an order item still
    /// references fails with `ForeignKeyViolation` and nothing is changed.
    pub async fn reconcile_variants(
        &self,
        product_id: &str,
        desired: &[VariantDraft],
    ) -> DbResult<VariantReconciliation> {
        let mut seen: Vec<&str> = Vec::with_capacity(desired.len());
        for draft in desired {
            let sku = draft.sku.trim();
            if seen.contains(&sku) {
                return Err(DbError::duplicate("sku", sku));
            }
            seen.push(sku);
        }

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Product", product_id));
        }

        let existing = sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = ?1"
        ))
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?;
        let mut by_sku: HashMap<String, Variant> =
            existing.into_iter().map(|v| (v.sku.clone(), v)).collect();

        let mut outcome = VariantReconciliation::default();
        let now = Utc::now();

        for draft in desired {
            match by_sku.remove(draft.sku.trim()) {
                Some(current) => {
                    let price = draft.price.map(|p| non_negative("price", p)).transpose()?;
                    let stock = non_negative("stock", draft.stock)?;
                    sqlx::query(
                        r#"
                        UPDATE product_variants SET
                            size = ?2,
                            color = ?3,
                            material = ?4,
                            price = ?5,
                            stock = ?6,
                            updated_at = ?7
                        WHERE id = ?1
                        "#,
                    )
                    .bind(&current.id)
                    .bind(&draft.size)
                    .bind(&draft.color)
                    .bind(&draft.material)
                    .bind(price)
                    .bind(stock)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                    outcome.updated += 1;
                }
                None => {
                    insert_variant_row(&mut tx, product_id, draft).await?;
                    outcome.inserted += 1;
                }
            }
        }

        for stale in by_sku.into_values() {
            debug!(sku = %stale.sku, "Removing variant");
            sqlx::query("DELETE FROM product_variants WHERE id = ?1")
                .bind(&stale.id)
                .execute(&mut *tx)
                .await?;
            outcome.removed += 1;
        }

        tx.commit().await?;

        debug!(
            product_id = %product_id,
            inserted = outcome.inserted,
            updated = outcome.updated,
            removed = outcome.removed,
            "Variants reconciled"
        );
        Ok(outcome)
    }
}

// =============================================================================
// Transaction-scoped helpers
// =============================================================================

/// Reads products and variants by id on the caller's connection.
pub(crate) async fn read_snapshot(
    conn: &mut SqliteConnection,
    product_ids: &[String],
    variant_ids: &[String],
) -> DbResult<CatalogSnapshot> {
    let products: Vec<Product> = if product_ids.is_empty() {
        Vec::new()
    } else {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("));
        let mut ids = query.separated(", ");
        for id in product_ids {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(")");
        query.build_query_as::<Product>().fetch_all(&mut *conn).await?
    };

    let variants: Vec<Variant> = if variant_ids.is_empty() {
        Vec::new()
    } else {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id IN ("));
        let mut ids = query.separated(", ");
        for id in variant_ids {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(")");
        query.build_query_as::<Variant>().fetch_all(&mut *conn).await?
    };

    debug!(
        products = products.len(),
        variants = variants.len(),
        "Catalog snapshot read"
    );
    Ok(CatalogSnapshot::new(products, variants))
}

/// Current stock of each source in `keys`.
///
/// Sources that no longer exist are absent from the map.
pub(crate) async fn read_stock_levels<'a>(
    conn: &mut SqliteConnection,
    keys: impl IntoIterator<Item = &'a StockKey>,
) -> DbResult<HashMap<StockKey, StockLevel>> {
    let mut levels = HashMap::new();

    for key in keys {
        let row: Option<(String, i64)> = match key {
            StockKey::Variant(id) => {
                sqlx::query_as("SELECT sku, stock FROM product_variants WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            StockKey::Product(id) => {
                sqlx::query_as("SELECT name, stock FROM products WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
        };

        if let Some((label, available)) = row {
            levels.insert(key.clone(), StockLevel { label, available });
        }
    }

    Ok(levels)
}

/// Applies one stock movement, refusing to take stock below zero.
pub(crate) async fn apply_movement(conn: &mut SqliteConnection, movement: &StockMovement) -> DbResult<()> {
    let (sql, entity) = match &movement.key {
        StockKey::Variant(_) => (
            "UPDATE product_variants SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1 AND stock + ?2 >= 0",
            "Variant",
        ),
        StockKey::Product(_) => (
            "UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1 AND stock + ?2 >= 0",
            "Product",
        ),
    };

    debug!(key = ?movement.key, delta = movement.delta, "Applying stock movement");

    let result = sqlx::query(sql)
        .bind(movement.key.id())
        .bind(movement.delta)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        // Planned against levels read under the same write lock, so this is
        // only reachable when the row vanished.
        return Err(DbError::not_found(entity, movement.key.id()));
    }

    Ok(())
}

async fn insert_variant_row(
    conn: &mut SqliteConnection,
    product_id: &str,
    draft: &VariantDraft,
) -> DbResult<Variant> {
    let now = Utc::now();
    let variant = Variant {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        sku: validate_required_text("sku", &draft.sku).map_err(CoreError::from)?,
        size: draft.size.clone(),
        color: draft.color.clone(),
        material: draft.material.clone(),
        price: draft.price.map(|p| non_negative("price", p)).transpose()?,
        stock: non_negative("stock", draft.stock)?,
        created_at: now,
        updated_at: now,
    };

    debug!(id = %variant.id, sku = %variant.sku, "Inserting variant");

    sqlx::query(
        r#"
        INSERT INTO product_variants (
            id, product_id, sku, size, color, material,
            price, stock, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&variant.id)
    .bind(&variant.product_id)
    .bind(&variant.sku)
    .bind(&variant.size)
    .bind(&variant.color)
    .bind(&variant.material)
    .bind(variant.price)
    .bind(variant.stock)
    .bind(variant.created_at)
    .bind(variant.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        err if err.is_unique_violation_on("sku") => DbError::duplicate("sku", &variant.sku),
        err => err,
    })?;

    Ok(variant)
}

fn non_negative(field: &str, value: i64) -> DbResult<i64> {
    if value < 0 {
        return Err(CoreError::from(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        })
        .into());
    }
    Ok(value)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use rupantorii_core::{CustomerInfo, NewOrder, OrderLineRequest};

    async fn setup() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .catalog()
            .insert_product(&ProductDraft {
                name: "Lotus Whisper Necklace".to_string(),
                slug: "lotus-whisper-necklace".to_string(),
                base_price: 4200,
                stock: 0,
                status: ProductStatus::Active,
            })
            .await
            .unwrap();
        (db, product)
    }

    fn draft(sku: &str, price: Option<i64>, stock: i64) -> VariantDraft {
        VariantDraft {
            sku: sku.to_string(),
            size: Some("16in".to_string()),
            color: None,
            material: Some("Silver".to_string()),
            price,
            stock,
        }
    }

    #[tokio::test]
    async fn test_insert_and_snapshot() {
        let (db, product) = setup().await;
        let variant = db
            .catalog()
            .insert_variant(&product.id, &draft("RUP-NEC-010-16", None, 7))
            .await
            .unwrap();

        let snapshot = db
            .catalog()
            .snapshot(&[product.id.clone(), "missing".to_string()], &[variant.id.clone()])
            .await
            .unwrap();

        assert_eq!(snapshot.product(&product.id).map(|p| p.base_price), Some(4200));
        assert!(snapshot.product("missing").is_none());
        assert_eq!(snapshot.variant(&variant.id).map(|v| v.stock), Some(7));
    }

    #[tokio::test]
    async fn test_duplicate_slug_and_sku() {
        let (db, product) = setup().await;
        let err = db
            .catalog()
            .insert_product(&ProductDraft {
                name: "Copy".to_string(),
                slug: product.slug.clone(),
                base_price: 1,
                stock: 0,
                status: ProductStatus::Active,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "slug"));

        db.catalog()
            .insert_variant(&product.id, &draft("RUP-NEC-010-16", None, 1))
            .await
            .unwrap();
        let err = db
            .catalog()
            .insert_variant(&product.id, &draft("RUP-NEC-010-16", None, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
    }

    #[tokio::test]
    async fn test_price_edits() {
        let (db, product) = setup().await;
        let variant = db
            .catalog()
            .insert_variant(&product.id, &draft("RUP-NEC-010-18", Some(4500), 2))
            .await
            .unwrap();

        db.catalog().set_base_price(&product.id, Money::from_minor(4800)).await.unwrap();
        db.catalog().set_variant_price(&variant.id, None).await.unwrap();

        let product = db.catalog().get_product(&product.id).await.unwrap().unwrap();
        let variant = db.catalog().get_variant(&variant.id).await.unwrap().unwrap();
        assert_eq!(variant.effective_price(&product), Money::from_minor(4800));

        let err = db
            .catalog()
            .set_base_price("missing", Money::from_minor(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reconcile_variants_by_sku() {
        let (db, product) = setup().await;
        let catalog = db.catalog();
        catalog
            .reconcile_variants(
                &product.id,
                &[draft("RUP-NEC-010-16", None, 7), draft("RUP-NEC-010-18", Some(4500), 2)],
            )
            .await
            .unwrap();

        let outcome = catalog
            .reconcile_variants(
                &product.id,
                &[draft("RUP-NEC-010-18", Some(4400), 5), draft("RUP-NEC-010-20", None, 1)],
            )
            .await
            .unwrap();

        assert_eq!(outcome, VariantReconciliation { inserted: 1, updated: 1, removed: 1 });
        let skus: Vec<(String, i64)> = catalog
            .list_variants(&product.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| (v.sku, v.stock))
            .collect();
        assert_eq!(
            skus,
            vec![("RUP-NEC-010-18".to_string(), 5), ("RUP-NEC-010-20".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_reconcile_refuses_to_drop_ordered_variant() {
        let (db, product) = setup().await;
        let variant = db
            .catalog()
            .insert_variant(&product.id, &draft("RUP-NEC-010-16", None, 7))
            .await
            .unwrap();

        db.orders()
            .create_order(NewOrder {
                customer: CustomerInfo {
                    customer_name: "Nusrat".to_string(),
                    customer_phone: "01711000000".to_string(),
                    address: "House 7".to_string(),
                    city: "Dhaka".to_string(),
                    notes: None,
                },
                payment_method: None,
                items: vec![OrderLineRequest::variant(&product.id, &variant.id, 1)],
            })
            .await
            .unwrap();

        let err = db.catalog().reconcile_variants(&product.id, &[]).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(db.catalog().get_variant(&variant.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deleting_ordered_variant_is_reported_as_referenced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .catalog()
            .insert_product(&ProductDraft {
                name: "Lotus Whisper Necklace".to_string(),
                slug: "lotus-whisper-necklace".to_string(),
                base_price: 4200,
                stock: 0,
                status: ProductStatus::Active,
            })
            .await
            .unwrap();
        let variant = db
            .catalog()
            .insert_variant(
                &product.id,
                &VariantDraft {
                    sku: "RUP-NEC-010-18".to_string(),
                    size: None,
                    color: None,
                    material: None,
                    price: Some(4500),
                    stock: 2,
                },
            )
            .await
            .unwrap();
        db.orders()
            .create_order(NewOrder {
                customer: CustomerInfo {
                    customer_name: "Nusrat".to_string(),
                    customer_phone: "01711000000".to_string(),
                    address: "House 7".to_string(),
                    city: "Dhaka".to_string(),
                    notes: None,
                },
                payment_method: None,
                items: vec![OrderLineRequest::variant(&product.id, &variant.id, 1)],
            })
            .await
            .unwrap();

        let err: DbError = sqlx::query("DELETE FROM product_variants WHERE id = ?1")
            .bind(&variant.id)
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert_eq!(err.code(), "REFERENCED");
    }
}

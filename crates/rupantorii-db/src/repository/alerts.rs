//! # Low-Stock Alerts
//!
//! Read-only report of stock sources below a threshold. The report is
//! informational; it never blocks ordering.
//!
//! A product with variants is represented by its variants only. Its own
//! `stock` column is ignored.

use sqlx::SqlitePool;
use tracing::debug;

use rupantorii_core::{LowStockItem, LowStockKind, LowStockReport, ProductStatus, ProductSummary};

use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct LowStockRow {
    kind: String,
    id: String,
    sku: Option<String>,
    stock: i64,
    product_id: String,
    product_name: String,
    product_slug: String,
    product_status: ProductStatus,
}

impl From<LowStockRow> for LowStockItem {
    fn from(row: LowStockRow) -> Self {
        LowStockItem {
            kind: if row.kind == "variant" {
                LowStockKind::Variant
            } else {
                LowStockKind::Product
            },
            id: row.id,
            sku: row.sku,
            stock: row.stock,
            product: ProductSummary {
                id: row.product_id,
                name: row.product_name,
                slug: row.product_slug,
                status: row.product_status,
            },
        }
    }
}

/// Repository for stock alerts.
#[derive(Debug, Clone)]
pub struct AlertRepository {
    pool: SqlitePool,
}

impl AlertRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AlertRepository { pool }
    }

    /// Variants and variantless products with `stock < threshold`, lowest
    /// stock first.
    pub async fn low_stock(&self, threshold: i64) -> DbResult<LowStockReport> {
        let rows = sqlx::query_as::<_, LowStockRow>(
            r#"
            SELECT
                'variant' AS kind,
                v.id AS id,
                v.sku AS sku,
                v.stock AS stock,
                p.id AS product_id,
                p.name AS product_name,
                p.slug AS product_slug,
                p.status AS product_status
            FROM product_variants v
            INNER JOIN products p ON p.id = v.product_id
            WHERE v.stock < ?1

            UNION ALL

            SELECT
                'product' AS kind,
                p.id AS id,
                NULL AS sku,
                p.stock AS stock,
                p.id AS product_id,
                p.name AS product_name,
                p.slug AS product_slug,
                p.status AS product_status
            FROM products p
            WHERE p.stock < ?1
              AND NOT EXISTS (SELECT 1 FROM product_variants v WHERE v.product_id = p.id)

            ORDER BY stock ASC, product_name ASC, sku ASC
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        debug!(threshold, count = rows.len(), "Low-stock report");

        Ok(LowStockReport {
            threshold,
            items: rows.into_iter().map(LowStockItem::from).collect(),
        })
    }
}

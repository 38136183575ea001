//! # Catalog Seeder
//!
//! Loads the demo jewelry catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by RUPANTORII_DB_PATH
//! cargo run -p rupantorii-db --bin seed
//!
//! # Specify database path
//! cargo run -p rupantorii-db --bin seed -- --db ./data/rupantorii.db
//! ```
//!
//! Products are matched by slug, so running the seeder twice creates no
//! duplicates. Variants of an existing product are reconciled to the
//! list below, which also resets their stock.

use std::env;
use std::path::PathBuf;

use rupantorii_core::{ProductDraft, ProductStatus, VariantDraft};
use rupantorii_db::{init_tracing, Database, StoreConfig};
use tracing::info;

struct SeedProduct {
    name: &'static str,
    slug: &'static str,
    base_price: i64,
    variants: &'static [SeedVariant],
}

struct SeedVariant {
    sku: &'static str,
    size: &'static str,
    price: Option<i64>,
    stock: i64,
}

const CATALOG: &[SeedProduct] = &[
    SeedProduct {
        name: "Rose Aura Bangles",
        slug: "rose-aura-bangles",
        base_price: 2800,
        variants: &[
            SeedVariant { sku: "RUP-BAN-001-XS", size: "XS", price: Some(2600), stock: 0 },
            SeedVariant { sku: "RUP-BAN-001-M", size: "M", price: None, stock: 0 },
        ],
    },
    SeedProduct {
        name: "Lotus Whisper Necklace",
        slug: "lotus-whisper-necklace",
        base_price: 4200,
        variants: &[
            SeedVariant { sku: "RUP-NEC-010-16", size: "16in", price: None, stock: 7 },
            SeedVariant { sku: "RUP-NEC-010-18", size: "18in", price: Some(4500), stock: 2 },
        ],
    },
    SeedProduct {
        name: "Midnight Pearl Earrings",
        slug: "midnight-pearl-earrings",
        base_price: 1900,
        variants: &[
            SeedVariant { sku: "RUP-EAR-021-STD", size: "Standard", price: None, stock: 18 },
            SeedVariant { sku: "RUP-EAR-021-PRM", size: "Premium", price: Some(2100), stock: 4 },
        ],
    },
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut config = StoreConfig::load()?;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Rupantorii Catalog Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $RUPANTORII_DB_PATH)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => {
                eprintln!("Ignoring unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let db = Database::new(config.db_config()).await?;
    let catalog = db.catalog();

    let mut created = 0;
    for seed in CATALOG {
        let product = match catalog.get_product_by_slug(seed.slug).await? {
            Some(existing) => existing,
            None => {
                created += 1;
                catalog
                    .insert_product(&ProductDraft {
                        name: seed.name.to_string(),
                        slug: seed.slug.to_string(),
                        base_price: seed.base_price,
                        stock: 0,
                        status: ProductStatus::Active,
                    })
                    .await?
            }
        };

        let variants: Vec<VariantDraft> = seed
            .variants
            .iter()
            .map(|v| VariantDraft {
                sku: v.sku.to_string(),
                size: Some(v.size.to_string()),
                color: None,
                material: None,
                price: v.price,
                stock: v.stock,
            })
            .collect();

        let outcome = catalog.reconcile_variants(&product.id, &variants).await?;
        info!(
            slug = seed.slug,
            inserted = outcome.inserted,
            updated = outcome.updated,
            removed = outcome.removed,
            "Seeded product"
        );
    }

    println!("Seed complete: {} new products, {} total", created, catalog.count().await?);

    db.close().await;
    Ok(())
}

//! # Database Handle
//!
//! Opens the SQLite file, applies the pragmas the ledger depends on and hands
//! out repositories that share one pool.
//!
//! ## Writers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   How concurrent writers meet                           │
//! │                                                                         │
//! │  transition A ──► BEGIN IMMEDIATE ──► holds write lock ──► COMMIT      │
//! │                                                 │                       │
//! │  transition B ──► BEGIN IMMEDIATE ──► SQLITE_BUSY, retried internally  │
//! │                                       for up to `busy_timeout`          │
//! │                                                 │                       │
//! │                                                 ▼                       │
//! │                                       lock acquired, reads A's stock    │
//! │                                                                         │
//! │  Readers never wait: WAL lets them see the last committed state.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use rupantorii_core::DEFAULT_ORDER_PREFIX;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::alerts::AlertRepository;
use crate::repository::catalog::CatalogRepository;
use crate::repository::order::OrderRepository;

// =============================================================================
// Configuration
// =============================================================================

/// How to open the store.
///
/// ```rust,ignore
/// let config = DbConfig::new("./rupantorii.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// Pool size. Default: 5
    pub max_connections: u32,

    /// How long to wait for a free pooled connection. Default: 30 seconds
    pub acquire_timeout: Duration,

    /// How long a writer waits for SQLite's write lock before giving up.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Apply pending migrations when opening. Default: true
    pub run_migrations: bool,

    /// Prefix of generated order numbers. Default: `RUP`
    pub order_number_prefix: String,
}

impl DbConfig {
    /// Defaults for a file-backed store. The file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            order_number_prefix: DEFAULT_ORDER_PREFIX.to_string(),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn order_number_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.order_number_prefix = prefix.into();
        self
    }

    /// A private in-memory store for tests.
    ///
    /// Every SQLite connection to `:memory:` gets its own database, so the
    /// pool is capped at one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(":memory:")
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the store. Cheap to clone.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./rupantorii.db")).await?;
/// let detail = db.orders().create_order(submission).await?;
/// let report = db.alerts().low_stock(LOW_STOCK_THRESHOLD).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    order_number_prefix: String,
}

impl Database {
    /// Opens (creating if needed) the database and the pool.
    ///
    /// Every connection runs with WAL journaling, `synchronous = NORMAL`,
    /// foreign keys on and the configured busy timeout. Foreign keys matter
    /// here: they stop a variant that an order item points at from being
    /// deleted.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening store");

        let url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = u64::try_from(config.busy_timeout.as_millis()).unwrap_or(u64::MAX),
            "Pool ready"
        );

        let db = Database {
            pool,
            order_number_prefix: config.order_number_prefix,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies any embedded migrations not yet recorded.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// The order ledger, stamping new orders with this store's prefix.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone(), self.order_number_prefix.clone())
    }

    pub fn alerts(&self) -> AlertRepository {
        AlertRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        debug!("Closing store");
        self.pool.close().await;
    }

    /// `true` when a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

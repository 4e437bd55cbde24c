//! # Database Pool
//!
//! One [`Database`] handle per process, shared by every HTTP handler and the
//! submission queue.
//!
//! ## Reads and Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET /sales, /invoices ...        POST /mutations                       │
//! │        │                                 │                              │
//! │        ▼                                 ▼                              │
//! │  repository reads on any           db.begin_write()                    │
//! │  pooled connection                 BEGIN IMMEDIATE ── takes the single  │
//! │  (WAL: never blocked)              SQLite write lock up front           │
//! │                                          │                              │
//! │                                          ├── reads + guarded UPDATEs    │
//! │                                          ▼                              │
//! │                                    COMMIT                               │
//! │                                                                         │
//! │  A second writer waits on the lock (busy_timeout) instead of failing   │
//! │  with "database is locked" when it tries to upgrade a read snapshot.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::product::ProductRepository;
use crate::repository::register::RegisterRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::site::SiteRepository;
use crate::repository::submission::SubmissionRepository;
use crate::repository::tax_config::TaxConfigRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings, usually built from the service's `[database]` section.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("/var/lib/caja/caja.db").max_connections(8)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    /// Default: 5
    pub max_connections: u32,
    /// Default: 1
    pub min_connections: u32,
    /// How long a request waits for a pooled connection. Default: 30 s
    pub connect_timeout: Duration,
    /// How long a writer waits for the SQLite write lock before giving up.
    /// Default: 10 s
    pub busy_timeout: Duration,
    /// `None` keeps connections forever (needed for `:memory:`).
    pub idle_timeout: Option<Duration>,
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed database; the file is created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
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

    /// Isolated database for tests.
    ///
    /// Each connection to `:memory:` is its own database, so the pool is
    /// pinned to one connection that never idles out. Operations must never
    /// touch the pool while holding a transaction.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Repository access plus the transactional POS operations
/// (see [`crate::operations`]).
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool (WAL, `synchronous=NORMAL`, foreign keys on) and runs
    /// migrations unless disabled.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.idle_timeout.map(|_| Duration::from_secs(30 * 60)))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Pool ready"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a transaction that holds the write lock from its first
    /// statement.
    ///
    /// A plain `BEGIN` reads under a shared snapshot and fails with
    /// `SQLITE_BUSY` when it later tries to write after another connection
    /// committed. Every read-then-write mutation goes through here.
    pub async fn begin_write(&self) -> DbResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    pub fn sites(&self) -> SiteRepository {
        SiteRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn registers(&self) -> RegisterRepository {
        RegisterRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// SUNAT issuer configuration and correlative counters.
    pub fn tax_configs(&self) -> TaxConfigRepository {
        TaxConfigRepository::new(self.pool.clone())
    }

    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// SUNAT submission queue.
    pub fn submissions(&self) -> SubmissionRepository {
        SubmissionRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

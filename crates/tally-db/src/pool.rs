//! # Database Pool Management
//!
//! Connection pool creation, configuration, and per-user scoping.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  App Startup                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::from_settings(&TallyConfig)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.user(uid)? ──► UserScope                                           │
//! │                      ├── products() / sales() / debts() / reports()    │
//! │                      └── subscribe_products / _sales / _debts          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so readers don't block
//! the single writer. Concurrent checkouts are serialized by SQLite's write
//! lock; the busy timeout equals the connect timeout.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tally_core::{CartLimits, Debt, Product, Sale, ValidationError, DEFAULT_RETENTION_DAYS};
use tracing::{debug, info};

use crate::config::TallyConfig;
use crate::error::{DbError, DbResult};
use crate::feed::{self, ChangeFeed, Collection, Subscription};
use crate::migrations;
use crate::repository::debt::DebtRepository;
use crate::repository::product::ProductRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sale::SaleRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/tally.db")
///     .max_connections(5)
///     .retention_days(30);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection and busy timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Cart bounds enforced before every checkout.
    pub cart_limits: CartLimits,

    /// Age in days after which `purge_expired` removes sales.
    /// Default: 30
    pub retention_days: u32,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            cart_limits: CartLimits::default(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    /// Builds the configuration from loaded settings.
    pub fn from_settings(settings: &TallyConfig) -> Self {
        DbConfig::new(settings.database.path.clone())
            .max_connections(settings.database.max_connections)
            .connect_timeout(Duration::from_secs(settings.database.connect_timeout_secs))
            .cart_limits(settings.sales.cart_limits())
            .retention_days(settings.sales.retention_days)
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn cart_limits(mut self, limits: CartLimits) -> Self {
        self.cart_limits = limits;
        self
    }

    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let config = DbConfig::in_memory();
    /// let db = Database::new(config).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(":memory:")
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle.
///
/// Owns the pool and the change feed. All data access goes through a
/// [`UserScope`]; there is no unscoped repository.
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
    feed: ChangeFeed,
    cart_limits: CartLimits,
    retention_days: u32,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled (line and payment rows cascade)
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            .busy_timeout(config.connect_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            feed: ChangeFeed::new(),
            cart_limits: config.cart_limits,
            retention_days: config.retention_days,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Applies pending migrations in order and records them in
    /// `_sqlx_migrations`. Safe to run repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The change feed every repository publishes to.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Scopes data access to one signed-in user.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let user = db.user(&uid)?;
    /// let sale = user.sales().record_sale(&cart).await?;
    /// ```
    pub fn user(&self, uid: &str) -> DbResult<UserScope> {
        let uid = uid.trim();
        if uid.is_empty() {
            return Err(ValidationError::Required {
                field: "uid".to_string(),
            }
            .into());
        }

        Ok(UserScope {
            db: self.clone(),
            owner_id: uid.to_string(),
        })
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// User Scope
// =============================================================================

/// Repositories and subscriptions for one user's namespace.
#[derive(Debug, Clone)]
pub struct UserScope {
    db: Database,
    owner_id: String,
}

impl UserScope {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.db.pool.clone(), &self.owner_id, self.db.feed.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(
            self.db.pool.clone(),
            &self.owner_id,
            self.db.feed.clone(),
            self.db.cart_limits,
            self.db.retention_days,
        )
    }

    pub fn debts(&self) -> DebtRepository {
        DebtRepository::new(
            self.db.pool.clone(),
            &self.owner_id,
            self.db.feed.clone(),
            self.db.cart_limits,
        )
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.db.pool.clone(), &self.owner_id)
    }

    /// Delivers the full product list now and after every product change.
    pub fn subscribe_products<C, E>(&self, on_change: C, on_error: E) -> Subscription
    where
        C: FnMut(Vec<Product>) + Send + 'static,
        E: FnMut(DbError) + Send + 'static,
    {
        let repo = self.products();
        feed::subscribe(
            &self.db.feed,
            self.owner_id.clone(),
            Collection::Products,
            move || {
                let repo = repo.clone();
                async move { repo.list().await }
            },
            on_change,
            on_error,
        )
    }

    /// Delivers all sales, newest first, now and after every sale change.
    pub fn subscribe_sales<C, E>(&self, on_change: C, on_error: E) -> Subscription
    where
        C: FnMut(Vec<Sale>) + Send + 'static,
        E: FnMut(DbError) + Send + 'static,
    {
        let repo = self.sales();
        feed::subscribe(
            &self.db.feed,
            self.owner_id.clone(),
            Collection::Sales,
            move || {
                let repo = repo.clone();
                async move { repo.list().await }
            },
            on_change,
            on_error,
        )
    }

    /// Delivers all debts, newest first, now and after every debt change.
    pub fn subscribe_debts<C, E>(&self, on_change: C, on_error: E) -> Subscription
    where
        C: FnMut(Vec<Debt>) + Send + 'static,
        E: FnMut(DbError) + Send + 'static,
    {
        let repo = self.debts();
        feed::subscribe(
            &self.db.feed,
            self.owner_id.clone(),
            Collection::Debts,
            move || {
                let repo = repo.clone();
                async move { repo.list(None).await }
            },
            on_change,
            on_error,
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

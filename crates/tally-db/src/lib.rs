//! # tally-db: Database Layer for Tally POS
//!
//! This crate provides persistence for the Tally POS system: products,
//! cash sales, debts with their payment ledger, and reports. It uses SQLite
//! for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  UI action (checkout, pay debt, open report)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  UserScope    │    │  ChangeFeed  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (feed.rs)   │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo      │───►│ broadcast    │  │   │
//! │  │   │ Migrations    │    │ DebtRepo      │    │ snapshots    │  │   │
//! │  │   │               │    │ ReportRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/pos/tally.db (platform data dir)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration and per-user scoping
//! - [`config`] - `tally.toml` settings with environment overrides
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`feed`] - Change notifications and subscriptions
//! - [`cache`] - Snapshot cache for the UI layer
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig, TallyConfig};
//!
//! let settings = TallyConfig::load(None)?;
//! let db = Database::new(DbConfig::from_settings(&settings)).await?;
//!
//! let user = db.user(&uid)?;
//! let sale = user.sales().record_sale(&cart).await?;
//! let report = user.reports().report(start, end).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::SnapshotCache;
pub use config::TallyConfig;
pub use error::{DbError, DbResult};
pub use feed::{Change, ChangeFeed, Collection, Subscription};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig, UserScope};

// Repository re-exports for convenience
pub use repository::debt::DebtRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;

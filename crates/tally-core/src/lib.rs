//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate holds the pricing, cart, debt and reporting rules of Tally POS
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 UI layer (external collaborator)                │   │
//! │  │   Catalog ──► Sale screen ──► Debts screen ──► Reports screen  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ authenticated uid                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌────────┐ ┌────────┐ ┌──────────┐   │   │
//! │  │  │ pricing │ │  cart   │ │  debt  │ │ report │ │validation│   │   │
//! │  │  │ margin  │ │ totals  │ │ terms  │ │  fold  │ │  rules   │   │   │
//! │  │  └─────────┘ └─────────┘ └────────┘ └────────┘ └──────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │     SQLite transactions, repositories, change feed, config      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` (integer cents) and `Rate` (basis points)
//! - [`pricing`] - Sale price derivation from cost and margin
//! - [`types`] - Domain records (Product, Sale, Debt, Payment)
//! - [`cart`] - Cart validation, stock checks, sale line capture and totals
//! - [`debt`] - Credit terms and payment planning
//! - [`report`] - Date ranges and report folding
//! - [`validation`] - Field-level input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::{Money, Rate};
//! use tally_core::pricing::sale_price;
//!
//! // $100.00 at a 20% margin sells for $120.00
//! let price = sale_price(Money::from_cents(10_000), Rate::from_bps(2_000));
//! assert_eq!(price.cents(), 12_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod debt;
pub mod error;
pub mod money;
pub mod pricing;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLimits, CartLine, SaleTotals};
pub use debt::{DebtAmounts, DebtTerms, NewDebt, PaymentPlan};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::{Money, Rate};
pub use report::{DateRange, EntryKind, Report, ReportEntry};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Sales older than this many days are removed by the retention purge.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

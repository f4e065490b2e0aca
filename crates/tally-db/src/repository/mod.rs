//! # Repository Module
//!
//! Per-user repository implementations for Tally POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  UI layer                                                              │
//! │       │                                                                 │
//! │       │  db.user(uid)?.sales().record_sale(&cart)                      │
//! │       ▼                                                                 │
//! │  SaleRepository { pool, owner_id, feed, limits }                       │
//! │       │                                                                 │
//! │       │  one sqlx transaction                                          │
//! │       ▼                                                                 │
//! │  SQLite Database   ──commit──► ChangeFeed                              │
//! │                                                                         │
//! │  Every query filters on owner_id: a repository never sees another      │
//! │  user's rows.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog and stock
//! - [`SaleRepository`](sale::SaleRepository) - Cash sales and retention
//! - [`DebtRepository`](debt::DebtRepository) - Credit sales and payments
//! - [`ReportRepository`](report::ReportRepository) - Date-range reports
//!
//! ## Locking Convention
//! SQLite transactions start deferred. Every locked section below begins
//! with a write (an `updated_at` touch) so the write lock is held before the
//! first read, and the values read stay authoritative until commit.

pub mod debt;
pub mod product;
pub mod report;
pub mod sale;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tally_core::cart::{self, Cart};
use tally_core::{CoreError, Money, SaleLine};
use tracing::debug;

use crate::error::DbResult;

// =============================================================================
// Line Snapshots
// =============================================================================

/// Tables holding line snapshots: `(table, parent column)`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LineTable {
    Sale,
    Debt,
}

impl LineTable {
    fn table(self) -> &'static str {
        match self {
            LineTable::Sale => "sale_lines",
            LineTable::Debt => "debt_lines",
        }
    }

    fn parent_column(self) -> &'static str {
        match self {
            LineTable::Sale => "sale_id",
            LineTable::Debt => "debt_id",
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    product_id: String,
    name_snapshot: String,
    unit_price_cents: i64,
    unit_cost_cents: i64,
    quantity: i64,
    line_total_cents: i64,
}

impl From<LineRow> for SaleLine {
    fn from(row: LineRow) -> Self {
        SaleLine {
            product_id: row.product_id,
            name: row.name_snapshot,
            unit_price: Money::from_cents(row.unit_price_cents),
            unit_cost: Money::from_cents(row.unit_cost_cents),
            quantity: row.quantity,
            line_total: Money::from_cents(row.line_total_cents),
        }
    }
}

/// Loads the lines of one sale or debt, in cart order.
pub(crate) async fn fetch_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    parent_id: &str,
) -> DbResult<Vec<SaleLine>> {
    let sql = format!(
        "SELECT product_id, name_snapshot, unit_price_cents, unit_cost_cents, quantity, line_total_cents \
         FROM {} WHERE {} = ? ORDER BY position",
        table.table(),
        table.parent_column()
    );

    let rows: Vec<LineRow> = sqlx::query_as(&sql)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(SaleLine::from).collect())
}

/// Writes the lines of one sale or debt.
pub(crate) async fn insert_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    parent_id: &str,
    lines: &[SaleLine],
) -> DbResult<()> {
    let sql = format!(
        "INSERT INTO {} ({}, position, product_id, name_snapshot, unit_price_cents, \
         unit_cost_cents, quantity, line_total_cents) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        table.table(),
        table.parent_column()
    );

    for (position, line) in lines.iter().enumerate() {
        sqlx::query(&sql)
            .bind(parent_id)
            .bind(position as i64)
            .bind(&line.product_id)
            .bind(&line.name)
            .bind(line.unit_price.cents())
            .bind(line.unit_cost.cents())
            .bind(line.quantity)
            .bind(line.line_total.cents())
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

// =============================================================================
// Stock Transaction
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    name: String,
    cost_cents: i64,
    stock: i64,
}

/// Decrements stock for every cart line and captures the line snapshots.
///
/// Must run inside a transaction. Lines are handled in cart order; the
/// first missing product or short stock aborts with an error and the
/// caller's transaction is dropped, rolling back every earlier decrement.
///
/// ```text
/// for each line:
///   1. UPDATE products SET updated_at   ← takes the write lock, proves existence
///   2. SELECT name, cost, stock         ← authoritative re-read
///   3. cart::capture_line               ← InsufficientStock check
///   4. UPDATE products SET stock = stock - qty
/// ```
pub(crate) async fn take_stock(
    conn: &mut SqliteConnection,
    owner_id: &str,
    cart: &Cart,
    now: DateTime<Utc>,
) -> DbResult<Vec<SaleLine>> {
    let mut captured = Vec::with_capacity(cart.len());

    for line in &cart.lines {
        let touched = sqlx::query("UPDATE products SET updated_at = ? WHERE id = ? AND owner_id = ?")
            .bind(now)
            .bind(&line.product_id)
            .bind(owner_id)
            .execute(&mut *conn)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(line.product_id.clone()).into());
        }

        let row: StockRow =
            sqlx::query_as("SELECT name, cost_cents, stock FROM products WHERE id = ? AND owner_id = ?")
                .bind(&line.product_id)
                .bind(owner_id)
                .fetch_one(&mut *conn)
                .await?;

        let sale_line = cart::capture_line(line, &row.name, Money::from_cents(row.cost_cents), row.stock)?;

        debug!(
            product_id = %line.product_id,
            available = row.stock,
            quantity = line.quantity,
            "Taking stock"
        );

        sqlx::query("UPDATE products SET stock = stock - ? WHERE id = ? AND owner_id = ?")
            .bind(line.quantity)
            .bind(&line.product_id)
            .bind(owner_id)
            .execute(&mut *conn)
            .await?;

        captured.push(sale_line);
    }

    Ok(captured)
}

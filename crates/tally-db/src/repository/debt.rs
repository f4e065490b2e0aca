//! # Debt Repository
//!
//! Credit sales and their payment ledger.
//!
//! ## Ledger Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Debt Ledger                                     │
//! │                                                                         │
//! │  create ──► amount_paid = 0, status = pending, payments = []           │
//! │                                                                         │
//! │  apply_payment(amount), inside one transaction:                        │
//! │    1. touch debts.updated_at      ← write lock, proves existence       │
//! │    2. read total / amount_paid    ← authoritative                      │
//! │    3. plan_payment                ← InvalidAmount / AlreadyPaid /      │
//! │                                     OverPayment (never clamped)        │
//! │    4. UPDATE amount_paid, status, paid_at                              │
//! │    5. INSERT debt_payments row    ← history only grows                 │
//! │    6. COMMIT                                                           │
//! │                                                                         │
//! │  Always: 0 ≤ amount_paid ≤ total, Σ payments = amount_paid,            │
//! │          status = paid ⇔ amount_paid = total                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tally_core::debt::{self, PaymentPlan};
use tally_core::{
    new_id, CartLimits, CoreError, Debt, DebtStatus, Money, NewDebt, Payment, Rate, SaleTotals,
};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::feed::{ChangeFeed, Collection};
use crate::repository::{fetch_lines, insert_lines, take_stock, LineTable};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct DebtRow {
    id: String,
    owner_id: String,
    client_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    subtotal_cents: i64,
    interest_bps: i64,
    installments: i64,
    installment_cents: i64,
    total_cents: i64,
    amount_paid_cents: i64,
    status: DebtStatus,
    paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    amount_cents: i64,
    paid_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct BalanceRow {
    total_cents: i64,
    amount_paid_cents: i64,
}

const DEBT_COLUMNS: &str = "id, owner_id, client_name, created_at, updated_at, subtotal_cents, \
     interest_bps, installments, installment_cents, total_cents, amount_paid_cents, status, paid_at";

async fn fetch_payments(conn: &mut SqliteConnection, debt_id: &str) -> DbResult<Vec<Payment>> {
    let rows: Vec<PaymentRow> = sqlx::query_as(
        "SELECT id, amount_cents, paid_at FROM debt_payments WHERE debt_id = ? ORDER BY position",
    )
    .bind(debt_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Payment {
            id: row.id,
            amount: Money::from_cents(row.amount_cents),
            paid_at: row.paid_at,
        })
        .collect())
}

async fn hydrate(conn: &mut SqliteConnection, rows: Vec<DebtRow>) -> DbResult<Vec<Debt>> {
    let mut debts = Vec::with_capacity(rows.len());
    for row in rows {
        let lines = fetch_lines(conn, LineTable::Debt, &row.id).await?;
        let payments = fetch_payments(conn, &row.id).await?;
        debts.push(Debt {
            lines,
            payments,
            id: row.id,
            owner_id: row.owner_id,
            client_name: row.client_name,
            created_at: row.created_at,
            subtotal: Money::from_cents(row.subtotal_cents),
            interest: Rate::from_bps(u32::try_from(row.interest_bps).unwrap_or(0)),
            installments: u32::try_from(row.installments).unwrap_or(1).max(1),
            installment_amount: Money::from_cents(row.installment_cents),
            total: Money::from_cents(row.total_cents),
            amount_paid: Money::from_cents(row.amount_paid_cents),
            status: row.status,
            paid_at: row.paid_at,
            updated_at: row.updated_at,
        });
    }
    Ok(debts)
}

async fn load_debt(conn: &mut SqliteConnection, owner_id: &str, id: &str) -> DbResult<Debt> {
    let row: Option<DebtRow> = sqlx::query_as(&format!(
        "SELECT {DEBT_COLUMNS} FROM debts WHERE id = ? AND owner_id = ?"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(&mut *conn)
    .await?;

    let row = row.ok_or_else(|| CoreError::DebtNotFound(id.to_string()))?;
    hydrate(conn, vec![row])
        .await?
        .pop()
        .ok_or_else(|| CoreError::DebtNotFound(id.to_string()).into())
}

/// Debts created in `[start, end)`, newest first.
pub(crate) async fn fetch_debts_between(
    conn: &mut SqliteConnection,
    owner_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> DbResult<Vec<Debt>> {
    let rows: Vec<DebtRow> = sqlx::query_as(&format!(
        "SELECT {DEBT_COLUMNS} FROM debts \
         WHERE owner_id = ? AND created_at >= ? AND created_at < ? \
         ORDER BY created_at DESC, id"
    ))
    .bind(owner_id)
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;

    hydrate(conn, rows).await
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for one user's debts.
#[derive(Debug, Clone)]
pub struct DebtRepository {
    pool: SqlitePool,
    owner_id: String,
    feed: ChangeFeed,
    limits: CartLimits,
}

impl DebtRepository {
    /// Creates a new DebtRepository scoped to `owner_id`.
    pub fn new(
        pool: SqlitePool,
        owner_id: impl Into<String>,
        feed: ChangeFeed,
        limits: CartLimits,
    ) -> Self {
        DebtRepository {
            pool,
            owner_id: owner_id.into(),
            feed,
            limits,
        }
    }

    /// Checks out a cart on credit, stamped now.
    pub async fn create(&self, new_debt: &NewDebt) -> DbResult<Debt> {
        self.create_at(new_debt, Utc::now()).await
    }

    /// Checks out a cart on credit with an explicit timestamp.
    ///
    /// Stock is taken exactly as for a cash sale, in the same transaction
    /// that writes the debt.
    pub async fn create_at(&self, new_debt: &NewDebt, now: DateTime<Utc>) -> DbResult<Debt> {
        new_debt.validate(&self.limits)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let lines = take_stock(&mut tx, &self.owner_id, &new_debt.cart, now).await?;
        let totals = SaleTotals::from_lines(&lines)?;
        let amounts = new_debt.terms.amounts(totals.total)?;

        let debt = Debt {
            id: new_id(),
            owner_id: self.owner_id.clone(),
            client_name: new_debt.client_name.trim().to_string(),
            created_at: now,
            lines,
            subtotal: amounts.subtotal,
            interest: new_debt.terms.interest,
            installments: new_debt.terms.installments,
            installment_amount: amounts.installment_amount,
            total: amounts.total,
            amount_paid: Money::zero(),
            payments: Vec::new(),
            status: DebtStatus::for_amounts(Money::zero(), amounts.total),
            paid_at: None,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO debts (
                id, owner_id, client_name, created_at, updated_at, subtotal_cents,
                interest_bps, installments, installment_cents, total_cents,
                amount_paid_cents, status, paid_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, NULL)
            "#,
        )
        .bind(&debt.id)
        .bind(&debt.owner_id)
        .bind(&debt.client_name)
        .bind(debt.created_at)
        .bind(debt.updated_at)
        .bind(debt.subtotal.cents())
        .bind(i64::from(debt.interest.bps()))
        .bind(i64::from(debt.installments))
        .bind(debt.installment_amount.cents())
        .bind(debt.total.cents())
        .bind(debt.status)
        .execute(&mut *tx)
        .await?;

        insert_lines(&mut tx, LineTable::Debt, &debt.id, &debt.lines).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            debt_id = %debt.id,
            client = %debt.client_name,
            total = %debt.total,
            installments = debt.installments,
            "Debt created"
        );

        self.feed.publish(&self.owner_id, Collection::Products);
        self.feed.publish(&self.owner_id, Collection::Debts);
        Ok(debt)
    }

    /// Applies a partial or full payment, stamped now.
    pub async fn apply_payment(&self, id: &str, amount: Money) -> DbResult<Debt> {
        self.apply_payment_at(id, amount, Utc::now()).await
    }

    /// Applies a partial or full payment with an explicit timestamp.
    pub async fn apply_payment_at(
        &self,
        id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> DbResult<Debt> {
        debt::validate_payment_amount(amount)?;
        self.settle(id, now, |total, paid| debt::plan_payment(id, total, paid, amount))
            .await
    }

    /// Pays whatever remains, stamped now.
    pub async fn apply_final_payment(&self, id: &str) -> DbResult<Debt> {
        self.apply_final_payment_at(id, Utc::now()).await
    }

    /// Pays whatever remains. The remainder is read inside the transaction.
    pub async fn apply_final_payment_at(&self, id: &str, now: DateTime<Utc>) -> DbResult<Debt> {
        self.settle(id, now, |total, paid| debt::plan_final_payment(id, total, paid))
            .await
    }

    async fn settle<P>(&self, id: &str, now: DateTime<Utc>, plan: P) -> DbResult<Debt>
    where
        P: FnOnce(Money, Money) -> tally_core::CoreResult<PaymentPlan>,
    {
        let result = self.settle_in_tx(id, now, plan).await;

        match &result {
            Ok(debt) => {
                info!(
                    debt_id = %debt.id,
                    amount_paid = %debt.amount_paid,
                    remaining = %debt.remaining(),
                    status = ?debt.status,
                    "Payment applied"
                );
                self.feed.publish(&self.owner_id, Collection::Debts);
            }
            Err(e) => warn!(debt_id = %id, error = %e, "Payment rejected"),
        }

        result
    }

    async fn settle_in_tx<P>(&self, id: &str, now: DateTime<Utc>, plan: P) -> DbResult<Debt>
    where
        P: FnOnce(Money, Money) -> tally_core::CoreResult<PaymentPlan>,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let touched = sqlx::query("UPDATE debts SET updated_at = ? WHERE id = ? AND owner_id = ?")
            .bind(now)
            .bind(id)
            .bind(&self.owner_id)
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(CoreError::DebtNotFound(id.to_string()).into());
        }

        let balance: BalanceRow = sqlx::query_as(
            "SELECT total_cents, amount_paid_cents FROM debts WHERE id = ? AND owner_id = ?",
        )
        .bind(id)
        .bind(&self.owner_id)
        .fetch_one(&mut *tx)
        .await?;

        let plan = plan(
            Money::from_cents(balance.total_cents),
            Money::from_cents(balance.amount_paid_cents),
        )?;

        debug!(
            debt_id = %id,
            amount = %plan.amount,
            amount_paid = %plan.amount_paid,
            "Planned payment"
        );

        let paid_at = plan.settles().then_some(now);
        sqlx::query(
            "UPDATE debts SET amount_paid_cents = ?, status = ?, paid_at = ? WHERE id = ? AND owner_id = ?",
        )
        .bind(plan.amount_paid.cents())
        .bind(plan.status)
        .bind(paid_at)
        .bind(id)
        .bind(&self.owner_id)
        .execute(&mut *tx)
        .await?;

        let position: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM debt_payments WHERE debt_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO debt_payments (id, debt_id, position, amount_cents, paid_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new_id())
        .bind(id)
        .bind(position)
        .bind(plan.amount.cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let debt = load_debt(&mut tx, &self.owner_id, id).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(debt)
    }

    /// Gets a debt by ID.
    pub async fn get(&self, id: &str) -> DbResult<Debt> {
        let mut conn = self.pool.acquire().await?;
        load_debt(&mut conn, &self.owner_id, id).await
    }

    /// Debts newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<DebtStatus>) -> DbResult<Vec<Debt>> {
        let mut conn = self.pool.acquire().await?;

        let rows: Vec<DebtRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {DEBT_COLUMNS} FROM debts WHERE owner_id = ? AND status = ? \
                     ORDER BY created_at DESC, id"
                ))
                .bind(&self.owner_id)
                .bind(status)
                .fetch_all(&mut *conn)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {DEBT_COLUMNS} FROM debts WHERE owner_id = ? ORDER BY created_at DESC, id"
                ))
                .bind(&self.owner_id)
                .fetch_all(&mut *conn)
                .await?
            }
        };

        hydrate(&mut conn, rows).await
    }

    /// Debts created in `[start, end)`, newest first.
    pub async fn list_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DbResult<Vec<Debt>> {
        let mut conn = self.pool.acquire().await?;
        fetch_debts_between(&mut conn, &self.owner_id, start, end).await
    }

    /// Sum of what is still owed across pending debts.
    pub async fn outstanding_total(&self) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_cents - amount_paid_cents), 0) FROM debts \
             WHERE owner_id = ? AND status = 'pending'",
        )
        .bind(&self.owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }

    /// Deletes a debt with its lines and payments. Irreversible; stock is
    /// not restored.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting debt");

        let result = sqlx::query("DELETE FROM debts WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(&self.owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::DebtNotFound(id.to_string()).into());
        }

        info!(debt_id = %id, "Debt deleted");
        self.feed.publish(&self.owner_id, Collection::Debts);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Report Repository
//!
//! Date-range reports over sales and debts. Read only.
//!
//! Both collections are read inside one transaction so the report sees a
//! single consistent snapshot, then folded by [`Report::build`].

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tally_core::{DateRange, Report, ReportEntry};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::debt::fetch_debts_between;
use crate::repository::sale::fetch_sales_between;

/// Repository for one user's reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
    owner_id: String,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool, owner_id: impl Into<String>) -> Self {
        ReportRepository {
            pool,
            owner_id: owner_id.into(),
        }
    }

    /// Report over `[start 00:00, end 23:59:59.999]` UTC, both days included.
    ///
    /// Fails with `InvalidRange` when `start > end`.
    pub async fn report(&self, start: NaiveDate, end: NaiveDate) -> DbResult<Report> {
        let range = DateRange::new(start, end)?;
        self.report_for(range).await
    }

    /// Report over an already validated range.
    pub async fn report_for(&self, range: DateRange) -> DbResult<Report> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let sales = fetch_sales_between(&mut tx, &self.owner_id, range.start_at(), range.end_before()).await?;
        let debts = fetch_debts_between(&mut tx, &self.owner_id, range.start_at(), range.end_before()).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            owner_id = %self.owner_id,
            sales = sales.len(),
            debts = debts.len(),
            "Building report"
        );

        let entries = sales
            .iter()
            .map(ReportEntry::from_sale)
            .chain(debts.iter().map(ReportEntry::from_debt));

        Ok(Report::build(range, entries))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError, UserScope};
    use chrono::{NaiveDate, TimeZone, Utc};
    use tally_core::{
        Cart, CoreError, DebtTerms, EntryKind, Money, NewDebt, NewProduct, Product, Rate,
    };

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    async fn product(user: &UserScope, name: &str, cost: i64, margin_bps: u32) -> Product {
        user.products()
            .insert(NewProduct {
                name: name.to_string(),
                cost: Money::from_cents(cost),
                margin: Rate::from_bps(margin_bps),
                stock: 100,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_report_merges_sales_and_debts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.user("u1").unwrap();

        // sale prices 100.00, 50.00 and 200.00
        let big = product(&user, "Big", 8_000, 2_500).await;
        let small = product(&user, "Small", 4_000, 2_500).await;
        let tool = product(&user, "Tool", 12_000, 6_667).await;
        assert_eq!(big.sale_price(), Money::from_cents(10_000));
        assert_eq!(small.sale_price(), Money::from_cents(5_000));

        let sales = user.sales();
        let at = |d, h| Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap();
        sales
            .record_sale_at(&Cart::new().add(&big.id, 1, big.sale_price()), at(3, 10))
            .await
            .unwrap();
        sales
            .record_sale_at(&Cart::new().add(&small.id, 1, small.sale_price()), at(31, 23))
            .await
            .unwrap();
        // outside the range
        sales
            .record_sale_at(
                &Cart::new().add(&big.id, 1, big.sale_price()),
                Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            )
            .await
            .unwrap();

        let new_debt = NewDebt::new(
            "Ana",
            Cart::new().add(&tool.id, 1, Money::from_cents(20_000)),
            DebtTerms::default(),
        );
        user.debts().create_at(&new_debt, at(15, 9)).await.unwrap();

        let report = user.reports().report(day(1), day(31)).await.unwrap();

        assert_eq!(report.transaction_count, 3);
        assert_eq!(report.total_sales, Money::from_cents(35_000));
        assert_eq!(report.total_cost, Money::from_cents(8_000 + 4_000 + 12_000));
        assert_eq!(report.total_profit, report.total_sales - report.total_cost);

        // newest first
        assert_eq!(report.transactions[0].total, Money::from_cents(5_000));
        assert_eq!(report.transactions[1].kind, EntryKind::Credit);
        assert_eq!(report.transactions[1].detail, "Debt: Ana");
        assert_eq!(report.transactions[2].kind, EntryKind::Cash);
    }

    #[tokio::test]
    async fn test_report_rejects_inverted_range() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.user("u1").unwrap();

        assert!(matches!(
            user.reports().report(day(31), day(1)).await,
            Err(DbError::Domain(CoreError::InvalidRange { .. }))
        ));
    }

    #[tokio::test]
    async fn test_empty_report() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let report = db.user("u1").unwrap().reports().report(day(1), day(1)).await.unwrap();

        assert_eq!(report.transaction_count, 0);
        assert_eq!(report.total_sales, Money::zero());
        assert!(report.transactions.is_empty());
    }
}

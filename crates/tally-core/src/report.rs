//! # Report Module
//!
//! Date ranges and the pure fold behind the sales report.
//!
//! ## Report Assembly
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DateRange::new(2024-01-01, 2024-01-31)                                 │
//! │       │  [2024-01-01T00:00:00Z, 2024-02-01T00:00:00Z)                  │
//! │       ▼                                                                 │
//! │  sales in range ──► ReportEntry { kind: Cash,   "Cash sale" }          │
//! │  debts in range ──► ReportEntry { kind: Credit, "Debt: Ana" }          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Report::build  ── newest first, totals summed, count                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Day boundaries are UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Debt, Sale};

// =============================================================================
// Date Range
// =============================================================================

/// A closed range of calendar days.
///
/// Deserialization goes through [`DateRange::new`], so an inverted range
/// from the UI is rejected the same way as one built in Rust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(try_from = "RawDateRange")]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "String")]
    start: NaiveDate,
    #[ts(as = "String")]
    end: NaiveDate,
}

impl DateRange {
    /// Creates a range; `start` after `end` is `InvalidRange`.
    /// A single day (`start == end`) is valid.
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// First instant of the range (start of the first day).
    pub fn start_at(&self) -> DateTime<Utc> {
        midnight(self.start)
    }

    /// First instant after the range (start of the day after `end`).
    pub fn end_before(&self) -> DateTime<Utc> {
        match self.end.succ_opt() {
            Some(next) => midnight(next),
            None => DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Last instant of the range (end of the last day).
    pub fn end_at(&self) -> DateTime<Utc> {
        let end_before = self.end_before();
        end_before
            .checked_sub_signed(Duration::nanoseconds(1))
            .unwrap_or(end_before)
    }

    /// Whether the instant falls on one of the range's days.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        day >= self.start && day <= self.end
    }
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = CoreError;

    fn try_from(raw: RawDateRange) -> CoreResult<Self> {
        DateRange::new(raw.start, raw.end)
    }
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

// =============================================================================
// Report Entry
// =============================================================================

/// Source of a report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A cash sale.
    Cash,
    /// A credit sale (debt).
    Credit,
}

/// One row of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportEntry {
    /// Sale or debt id.
    pub id: String,
    pub kind: EntryKind,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    /// Human readable label ("Cash sale", "Debt: Ana").
    pub detail: String,
    pub total: Money,
    pub cost: Money,
    pub profit: Money,
}

impl ReportEntry {
    pub fn from_sale(sale: &Sale) -> Self {
        Self {
            id: sale.id.clone(),
            kind: EntryKind::Cash,
            occurred_at: sale.created_at,
            detail: "Cash sale".to_string(),
            total: sale.total,
            cost: sale.cost,
            profit: sale.profit,
        }
    }

    /// Debt entries count the full financed total, interest included,
    /// against the cost captured on the debt's lines.
    pub fn from_debt(debt: &Debt) -> Self {
        let cost = debt.cost();
        Self {
            id: debt.id.clone(),
            kind: EntryKind::Credit,
            occurred_at: debt.created_at,
            detail: format!("Debt: {}", debt.client_name),
            total: debt.total,
            cost,
            profit: debt.total - cost,
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// Aggregated sales report over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Report {
    pub range: DateRange,
    pub total_sales: Money,
    pub total_cost: Money,
    pub total_profit: Money,
    pub transaction_count: usize,
    /// Newest first.
    pub transactions: Vec<ReportEntry>,
}

impl Report {
    /// Folds entries into a report.
    ///
    /// Entries outside `range` are ignored. Ties on `occurred_at` are
    /// broken by id so the order is stable.
    pub fn build(range: DateRange, entries: impl IntoIterator<Item = ReportEntry>) -> Self {
        let mut transactions: Vec<ReportEntry> = entries
            .into_iter()
            .filter(|e| range.contains(e.occurred_at))
            .collect();

        transactions.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total_sales: Money = transactions.iter().map(|e| e.total).sum();
        let total_cost: Money = transactions.iter().map(|e| e.cost).sum();
        let total_profit: Money = transactions.iter().map(|e| e.profit).sum();

        Self {
            range,
            total_sales,
            total_cost,
            total_profit,
            transaction_count: transactions.len(),
            transactions,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Domain Types
//!
//! Core domain records used throughout Tally POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │      Debt       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name           │   │  lines[]        │   │  client_name    │       │
//! │  │  cost           │   │  total          │   │  lines[]        │       │
//! │  │  margin (bps)   │   │  cost           │   │  total          │       │
//! │  │  stock          │   │  profit         │   │  amount_paid    │       │
//! │  └─────────────────┘   └─────────────────┘   │  payments[]     │       │
//! │                                              │  status         │       │
//! │  ┌─────────────────┐   ┌─────────────────┐   └─────────────────┘       │
//! │  │    SaleLine     │   │    Payment      │                              │
//! │  │  (snapshot)     │   │  amount, when   │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! Every record carries `owner_id`, the uid of the authenticated user.
//! Records of different owners never mix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::{Money, Rate};
use crate::pricing;

/// Generates a fresh record identifier (UUID v4).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
///
/// The sale price is never stored; it is derived from `cost` and `margin`
/// on every read so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owner (authenticated uid).
    pub owner_id: String,

    /// Display name shown on the sale screen.
    pub name: String,

    /// Unit cost.
    pub cost: Money,

    /// Profit margin over cost.
    pub margin: Rate,

    /// Units on hand. Never negative.
    pub stock: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Derived sale price: `cost + round(cost × margin)`.
    #[inline]
    pub fn sale_price(&self) -> Money {
        pricing::sale_price(self.cost, self.margin)
    }

    /// Whether the product can appear on the sale screen.
    #[inline]
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub cost: Money,
    pub margin: Rate,
    pub stock: i64,
}

/// Editable product fields. Stock is changed only through
/// restocking or sales, never through an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    pub name: String,
    pub cost: Money,
    pub margin: Rate,
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line of a sale or a debt.
/// Uses snapshot pattern to freeze product data at time of checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    /// Product name at time of checkout (frozen).
    pub name: String,
    /// Price captured when the line was added to the cart.
    pub unit_price: Money,
    /// Cost read inside the checkout transaction (frozen).
    pub unit_cost: Money,
    pub quantity: i64,
    /// unit_price × quantity
    pub line_total: Money,
}

impl SaleLine {
    /// Cost of the whole line (unit_cost × quantity).
    #[inline]
    pub fn line_cost(&self) -> Money {
        self.unit_cost.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A completed cash sale. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub owner_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub lines: Vec<SaleLine>,
    pub total: Money,
    pub cost: Money,
    /// total - cost. Negative when sold below cost.
    pub profit: Money,
}

// =============================================================================
// Debt Status
// =============================================================================

/// Settlement state of a debt, derived from `amount_paid` and `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    /// Something is still owed.
    Pending,
    /// amount_paid has reached total.
    Paid,
}

impl DebtStatus {
    /// Status implied by the ledger amounts (exact integer comparison).
    pub fn for_amounts(amount_paid: Money, total: Money) -> Self {
        if amount_paid >= total {
            DebtStatus::Paid
        } else {
            DebtStatus::Pending
        }
    }
}

impl Default for DebtStatus {
    fn default() -> Self {
        DebtStatus::Pending
    }
}

// =============================================================================
// Payment
// =============================================================================

/// One entry of a debt's append-only payment history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

// =============================================================================
// Debt
// =============================================================================

/// A credit sale with interest, installments and a payment ledger.
///
/// ## Ledger Invariants
/// - `amount_paid` never decreases and never exceeds `total`
/// - Σ `payments[].amount` == `amount_paid`
/// - `status` is `Paid` iff `amount_paid == total`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Debt {
    pub id: String,
    pub owner_id: String,
    pub client_name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub lines: Vec<SaleLine>,
    pub subtotal: Money,
    pub interest: Rate,
    pub installments: u32,
    /// Informational per-installment amount.
    pub installment_amount: Money,
    pub total: Money,
    pub amount_paid: Money,
    pub payments: Vec<Payment>,
    pub status: DebtStatus,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    /// What is still owed.
    #[inline]
    pub fn remaining(&self) -> Money {
        self.total - self.amount_paid
    }

    /// Σ unit_cost × quantity over the captured lines.
    pub fn cost(&self) -> Money {
        self.lines.iter().map(SaleLine::line_cost).sum()
    }

    #[inline]
    pub fn is_paid(&self) -> bool {
        self.status == DebtStatus::Paid
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

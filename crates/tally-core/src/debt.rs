//! # Debt Module
//!
//! Credit terms and payment planning for the debt ledger.
//!
//! ## Debt Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  NewDebt { client, cart, terms }                                        │
//! │       │   subtotal = Σ line_total                                      │
//! │       │   total    = subtotal + round(subtotal × interest)             │
//! │       │   installment_amount = round(total / installments)             │
//! │       ▼                                                                 │
//! │  ┌──────────┐  plan_payment(amount)   ┌──────────┐                     │
//! │  │ PENDING  │ ──────────────────────► │ PENDING  │  amount_paid < total│
//! │  └──────────┘                         └──────────┘                     │
//! │       │                                    │                            │
//! │       │ plan_final_payment()               │ amount == remaining        │
//! │       ▼                                    ▼                            │
//! │  ┌──────────┐                                                           │
//! │  │   PAID   │  amount_paid == total, paid_at recorded                  │
//! │  └──────────┘  further payments → AlreadyPaid                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is pure. The database layer reads the current ledger
//! amounts inside a transaction, asks this module for a [`PaymentPlan`],
//! and writes the plan back before committing.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{Cart, CartLimits};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Rate};
use crate::types::DebtStatus;
use crate::validation::validate_client_name;

// =============================================================================
// Terms
// =============================================================================

/// Interest and installment count agreed at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtTerms {
    pub interest: Rate,
    pub installments: u32,
}

impl DebtTerms {
    /// Builds terms; an installment count below one becomes one.
    pub fn new(interest: Rate, installments: u32) -> Self {
        Self {
            interest,
            installments: installments.max(1),
        }
    }

    /// Single payment, no interest.
    pub fn cash_on_account() -> Self {
        Self::new(Rate::zero(), 1)
    }

    /// Derives the debt amounts for a given subtotal.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::debt::DebtTerms;
    /// use tally_core::money::{Money, Rate};
    ///
    /// let amounts = DebtTerms::new(Rate::from_bps(1_000), 3)
    ///     .amounts(Money::from_cents(30_000))
    ///     .unwrap();
    /// assert_eq!(amounts.total.cents(), 33_000);
    /// assert_eq!(amounts.installment_amount.cents(), 11_000);
    /// ```
    ///
    /// A financed total beyond i64 is `OutOfRange`.
    pub fn amounts(&self, subtotal: Money) -> CoreResult<DebtAmounts> {
        let total = subtotal
            .checked_apply_rate(self.interest)
            .and_then(|interest| subtotal.checked_add(interest))
            .ok_or_else(|| ValidationError::exceeds_max("total"))?;
        Ok(DebtAmounts {
            subtotal,
            total,
            installment_amount: total.split(self.installments),
        })
    }
}

impl Default for DebtTerms {
    fn default() -> Self {
        Self::cash_on_account()
    }
}

/// Amounts fixed when a debt is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtAmounts {
    pub subtotal: Money,
    pub total: Money,
    pub installment_amount: Money,
}

// =============================================================================
// New Debt
// =============================================================================

/// Checkout-to-credit input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewDebt {
    pub client_name: String,
    pub cart: Cart,
    pub terms: DebtTerms,
}

impl NewDebt {
    pub fn new(client_name: impl Into<String>, cart: Cart, terms: DebtTerms) -> Self {
        Self {
            client_name: client_name.into(),
            cart,
            terms,
        }
    }

    /// Checks client name and cart before any storage call.
    pub fn validate(&self, limits: &CartLimits) -> CoreResult<()> {
        validate_client_name(&self.client_name)?;
        self.cart.validate(limits)
    }
}

// =============================================================================
// Payment Planning
// =============================================================================

/// Result of applying a payment to the current ledger amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPlan {
    /// Amount to append to the payment history.
    pub amount: Money,
    /// amount_paid after the payment.
    pub amount_paid: Money,
    /// Status implied by the new amount_paid.
    pub status: DebtStatus,
}

impl PaymentPlan {
    /// Whether this payment settles the debt.
    #[inline]
    pub fn settles(&self) -> bool {
        self.status == DebtStatus::Paid
    }
}

/// Rejects non-positive payment amounts before touching storage.
pub fn validate_payment_amount(amount: Money) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(CoreError::InvalidAmount { amount });
    }
    Ok(())
}

/// Plans a partial or full payment.
///
/// ## Rules (checked in order)
/// 1. `amount > 0`, else `InvalidAmount`
/// 2. `amount_paid < total`, else `AlreadyPaid`
/// 3. `amount <= total - amount_paid`, else `OverPayment` (never clamped)
///
/// ## Example
/// ```rust
/// use tally_core::debt::plan_payment;
/// use tally_core::money::Money;
/// use tally_core::types::DebtStatus;
///
/// let plan = plan_payment("d1", Money::from_cents(30_000), Money::zero(), Money::from_cents(10_000)).unwrap();
/// assert_eq!(plan.amount_paid.cents(), 10_000);
/// assert_eq!(plan.status, DebtStatus::Pending);
/// ```
pub fn plan_payment(
    debt_id: &str,
    total: Money,
    amount_paid: Money,
    amount: Money,
) -> CoreResult<PaymentPlan> {
    validate_payment_amount(amount)?;

    if amount_paid >= total {
        return Err(CoreError::AlreadyPaid(debt_id.to_string()));
    }

    let remaining = total - amount_paid;
    if amount > remaining {
        return Err(CoreError::OverPayment {
            debt_id: debt_id.to_string(),
            amount,
            remaining,
        });
    }

    let amount_paid = amount_paid + amount;
    Ok(PaymentPlan {
        amount,
        amount_paid,
        status: DebtStatus::for_amounts(amount_paid, total),
    })
}

/// Plans the payment of whatever remains.
pub fn plan_final_payment(
    debt_id: &str,
    total: Money,
    amount_paid: Money,
) -> CoreResult<PaymentPlan> {
    if amount_paid >= total {
        return Err(CoreError::AlreadyPaid(debt_id.to_string()));
    }
    plan_payment(debt_id, total, amount_paid, total - amount_paid)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn test_terms_clamp_installments() {
        assert_eq!(DebtTerms::new(Rate::zero(), 0).installments, 1);
        assert_eq!(DebtTerms::new(Rate::zero(), 6).installments, 6);
        assert_eq!(DebtTerms::default(), DebtTerms::cash_on_account());
    }

    #[test]
    fn test_amounts_with_interest() {
        let amounts = DebtTerms::new(Rate::from_bps(1_500), 4).amounts(cents(10_000)).unwrap();
        assert_eq!(amounts.subtotal.cents(), 10_000);
        assert_eq!(amounts.total.cents(), 11_500);
        assert_eq!(amounts.installment_amount.cents(), 2_875);
    }

    #[test]
    fn test_financed_total_beyond_i64_rejected() {
        let terms = DebtTerms::new(Rate::from_bps(1_000), 2);
        assert!(matches!(
            terms.amounts(cents(i64::MAX - 10)),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(DebtTerms::cash_on_account().amounts(cents(i64::MAX)).is_ok());
    }

    #[test]
    fn test_installment_rounding() {
        let amounts = DebtTerms::new(Rate::zero(), 3).amounts(cents(1_000)).unwrap();
        assert_eq!(amounts.total.cents(), 1_000);
        assert_eq!(amounts.installment_amount.cents(), 333);
    }

    #[test]
    fn test_scenario_c_partial_then_overpayment() {
        let total = cents(30_000);
        let plan = plan_payment("d1", total, Money::zero(), cents(10_000)).unwrap();
        assert_eq!(plan.amount_paid.cents(), 10_000);
        assert_eq!(plan.status, DebtStatus::Pending);
        assert!(!plan.settles());

        match plan_payment("d1", total, plan.amount_paid, cents(25_000)) {
            Err(CoreError::OverPayment { remaining, .. }) => assert_eq!(remaining.cents(), 20_000),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_scenario_d_final_payment() {
        let total = cents(30_000);
        let first = plan_payment("d1", total, Money::zero(), cents(12_000)).unwrap();
        let last = plan_final_payment("d1", total, first.amount_paid).unwrap();
        assert_eq!(last.amount.cents(), 18_000);
        assert_eq!(last.amount_paid, total);
        assert!(last.settles());
        assert_eq!(first.amount + last.amount, total);
    }

    #[test]
    fn test_already_paid() {
        let total = cents(5_000);
        assert!(matches!(
            plan_payment("d1", total, total, cents(1)),
            Err(CoreError::AlreadyPaid(_))
        ));
        assert!(matches!(
            plan_final_payment("d1", total, total),
            Err(CoreError::AlreadyPaid(_))
        ));
    }

    #[test]
    fn test_invalid_amount_checked_first() {
        let total = cents(5_000);
        assert!(matches!(
            plan_payment("d1", total, total, Money::zero()),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert!(matches!(
            plan_payment("d1", total, Money::zero(), cents(-10)),
            Err(CoreError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_new_debt_validation() {
        let cart = Cart::new().add("p1", 1, cents(1_000));
        let limits = CartLimits::default();

        assert!(NewDebt::new("Ana", cart.clone(), DebtTerms::default())
            .validate(&limits)
            .is_ok());
        assert!(matches!(
            NewDebt::new("  ", cart, DebtTerms::default()).validate(&limits),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            NewDebt::new("Ana", Cart::new(), DebtTerms::default()).validate(&limits),
            Err(CoreError::EmptyCart)
        ));
    }
}

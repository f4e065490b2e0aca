//! # Money Module
//!
//! Provides the `Money` and `Rate` types for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Debt ledger with floats:                                               │
//! │    total = 300.00, paid = 120.00 + 0.1 + 0.2 ...                        │
//! │    "is it fully paid?"  paid == total  ❌ may never be exactly true    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    30000 cents - 12000 cents = 18000 cents remaining                    │
//! │    paid == total is an exact integer comparison                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{Money, Rate};
//!
//! let cost = Money::from_cents(10_000); // $100.00
//! let margin = Rate::from_bps(2_000);    // 20%
//!
//! assert_eq!(cost.apply_rate(margin).cents(), 2_000);
//! assert_eq!((cost + cost.apply_rate(margin)).cents(), 12_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: profit may be negative when a sale was priced below cost
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.cost ──► sale_price(cost, margin) ──► CartLine.unit_price     │
/// │                                                     │                   │
/// │                                                     ▼                   │
/// │  SaleLine.line_total ──► Sale.total / Debt.subtotal ──► Debt.total     │
/// │                                                                         │
/// │  Debt.amount_paid += Payment.amount   (exact, never rounded)            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// Only for amounts already bounded by validation; user-supplied
    /// prices and quantities go through [`Money::checked_mul_quantity`].
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies money by a quantity, `None` if the result leaves the i64 range.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(299).checked_mul_quantity(3), Some(Money::from_cents(897)));
    /// assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul_quantity(3), None);
    /// ```
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, clamping at the i64 bounds.
    #[inline]
    pub const fn saturating_add(&self, other: Money) -> Self {
        Money(self.0.saturating_add(other.0))
    }

    /// Sums amounts, `None` as soon as a partial sum overflows.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let half = Money::from_cents(i64::MAX / 2);
    /// assert_eq!(Money::checked_sum([half, half]), Some(Money::from_cents(i64::MAX - 1)));
    /// assert_eq!(Money::checked_sum([half, half, half]), None);
    /// ```
    pub fn checked_sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }

    /// Returns `self × rate`, rounded half away from zero to the cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps ± 5000) / 10000`.
    /// i128 prevents overflow on large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Money, Rate};
    ///
    /// // 8.25% of $10.00 = $0.825 → $0.83
    /// let part = Money::from_cents(1000).apply_rate(Rate::from_bps(825));
    /// assert_eq!(part.cents(), 83);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        Money::from_cents(clamp_cents(round_div(product, 10_000)))
    }

    /// Like [`Money::apply_rate`], `None` if the result leaves the i64 range.
    pub fn checked_apply_rate(&self, rate: Rate) -> Option<Money> {
        let product = self.0 as i128 * rate.bps() as i128;
        i64::try_from(round_div(product, 10_000))
            .ok()
            .map(Money::from_cents)
    }

    /// Splits the amount into `parts` equal shares, rounded half up to the cent.
    ///
    /// The shares do not necessarily add back up to the original amount:
    /// 1000 / 3 = 333 (×3 = 999). Callers treat the share as informational.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(30_000).split(3).cents(), 10_000);
    /// assert_eq!(Money::from_cents(1000).split(3).cents(), 333);
    /// assert_eq!(Money::from_cents(1001).split(2).cents(), 501);
    /// ```
    pub fn split(&self, parts: u32) -> Money {
        let parts = parts.max(1) as i128;
        Money::from_cents(round_div(self.0 as i128, parts) as i64)
    }
}

fn clamp_cents(cents: i128) -> i64 {
    i64::try_from(cents).unwrap_or(if cents < 0 { i64::MIN } else { i64::MAX })
}

/// Integer division rounding half away from zero.
fn round_div(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Rate Type
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01%, so 2000 bps = 20%.
/// Used for both profit margins and debt interest rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (UI convenience).
    ///
    /// Negative or non-finite percentages collapse to zero; validation of
    /// user input happens before this conversion.
    pub fn from_percentage(pct: f64) -> Self {
        if !pct.is_finite() || pct <= 0.0 {
            return Rate(0);
        }
        Rate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display; the UI layer handles localized formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
        assert_eq!(format!("{}", Rate::from_bps(825)), "8.25%");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_apply_rate_rounding() {
        assert_eq!(Money::from_cents(10_000).apply_rate(Rate::from_bps(2_000)).cents(), 2_000);
        // 0.825 → 0.83
        assert_eq!(Money::from_cents(1000).apply_rate(Rate::from_bps(825)).cents(), 83);
        // 0.824 → 0.82
        assert_eq!(Money::from_cents(1000).apply_rate(Rate::from_bps(824)).cents(), 82);
        // negative amounts round away from zero
        assert_eq!(Money::from_cents(-1000).apply_rate(Rate::from_bps(825)).cents(), -83);
        assert!(Money::from_cents(1234).apply_rate(Rate::zero()).is_zero());
    }

    #[test]
    fn test_checked_ops_reject_overflow() {
        let half = Money::from_cents(i64::MAX / 2);

        assert_eq!(half.checked_mul_quantity(2), Some(Money::from_cents(i64::MAX - 1)));
        assert_eq!(half.checked_mul_quantity(3), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(Money::checked_sum([half, half, half]), None);
        assert_eq!(Money::checked_sum(Vec::new()), Some(Money::zero()));

        // 150% of i64::MAX does not fit
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max.checked_apply_rate(Rate::from_bps(15_000)), None);
        assert_eq!(max.apply_rate(Rate::from_bps(15_000)), max);
        assert_eq!(max.saturating_add(Money::from_cents(1)), max);
    }

    #[test]
    fn test_split_into_installments() {
        assert_eq!(Money::from_cents(30_000).split(3).cents(), 10_000);
        assert_eq!(Money::from_cents(1000).split(3).cents(), 333);
        assert_eq!(Money::from_cents(2000).split(3).cents(), 667);
        // zero parts is treated as a single installment
        assert_eq!(Money::from_cents(500).split(0).cents(), 500);
    }

    #[test]
    fn test_rate_from_percentage() {
        assert_eq!(Rate::from_percentage(20.0).bps(), 2000);
        assert_eq!(Rate::from_percentage(8.25).bps(), 825);
        assert_eq!(Rate::from_percentage(-3.0), Rate::zero());
        assert_eq!(Rate::from_percentage(f64::NAN), Rate::zero());
        assert!((Rate::from_bps(1250).percentage() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(-100).is_negative());
    }
}

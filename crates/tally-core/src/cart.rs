//! # Cart Module
//!
//! Checkout input, its validation, and the pure steps of the sale protocol.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart { lines: [CartLine { product_id, quantity, unit_price }] }       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Cart::validate(limits)          ← before any storage call             │
//! │       │  EmptyCart / InvalidQuantity / CartTooLarge / InvalidTotal     │
//! │       ▼                                                                 │
//! │  ┌──────────────── one database transaction ────────────────────┐      │
//! │  │  for each line, in order:                                    │      │
//! │  │     re-read product (name, cost, stock)                      │      │
//! │  │     capture_line(...)    ← InsufficientStock check           │      │
//! │  │     write stock - quantity                                   │      │
//! │  │  SaleTotals::from_lines(...)                                 │      │
//! │  │  insert sale / debt                                          │      │
//! │  └──────────────────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unit prices are captured by the caller when a line is added to the cart.
//! The checkout never re-prices a line, even if the product changed since.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::SaleLine;
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// One requested line of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    /// Price shown to the user when the line was added.
    pub unit_price: Money,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// unit_price × quantity; a product beyond i64 is `OutOfRange`.
    #[inline]
    pub fn line_total(&self) -> CoreResult<Money> {
        self.unit_price
            .checked_mul_quantity(self.quantity)
            .ok_or_else(|| ValidationError::exceeds_max("line_total").into())
    }
}

// =============================================================================
// Cart Limits
// =============================================================================

/// Upper bounds enforced by [`Cart::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLimits {
    pub max_lines: usize,
    pub max_item_quantity: i64,
}

impl Default for CartLimits {
    fn default() -> Self {
        Self {
            max_lines: MAX_CART_LINES,
            max_item_quantity: MAX_ITEM_QUANTITY,
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// An ordered list of cart lines.
///
/// The same product may appear on several lines; each line is checked
/// against the stock left by the lines before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// Appends a line; builder style for tests and callers assembling carts.
    pub fn add(mut self, product_id: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        self.lines.push(CartLine::new(product_id, quantity, unit_price));
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Σ unit_price × quantity over all lines.
    pub fn total(&self) -> CoreResult<Money> {
        let mut total = Money::zero();
        for line in &self.lines {
            total = total
                .checked_add(line.line_total()?)
                .ok_or_else(|| ValidationError::exceeds_max("total"))?;
        }
        Ok(total)
    }

    /// Checks the cart before any storage call.
    ///
    /// ## Rules
    /// - at least one line (`EmptyCart`)
    /// - no more than `limits.max_lines` lines (`CartTooLarge`)
    /// - every quantity within `1..=limits.max_item_quantity` (`InvalidQuantity`)
    /// - no negative unit price
    /// - line totals and the cart total within i64 (`OutOfRange`)
    /// - a strictly positive total (`InvalidTotal`)
    pub fn validate(&self, limits: &CartLimits) -> CoreResult<()> {
        if self.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        if self.len() > limits.max_lines {
            return Err(CoreError::CartTooLarge {
                max: limits.max_lines,
            });
        }

        for line in &self.lines {
            if line.quantity <= 0 || line.quantity > limits.max_item_quantity {
                return Err(CoreError::InvalidQuantity {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                });
            }

            if line.unit_price.is_negative() {
                return Err(ValidationError::OutOfRange {
                    field: "unit_price".to_string(),
                    min: 0,
                    max: i64::MAX,
                }
                .into());
            }
        }

        let total = self.total()?;
        if !total.is_positive() {
            return Err(CoreError::InvalidTotal { total });
        }

        Ok(())
    }
}

// =============================================================================
// Line Capture
// =============================================================================

/// Checks stock for one cart line and freezes it into a [`SaleLine`].
///
/// `name`, `unit_cost` and `available` must come from the product row read
/// inside the checkout transaction.
pub fn capture_line(
    line: &CartLine,
    name: &str,
    unit_cost: Money,
    available: i64,
) -> CoreResult<SaleLine> {
    if available < line.quantity {
        return Err(CoreError::InsufficientStock {
            product: name.to_string(),
            available,
            requested: line.quantity,
        });
    }

    Ok(SaleLine {
        product_id: line.product_id.clone(),
        name: name.to_string(),
        unit_price: line.unit_price,
        unit_cost,
        quantity: line.quantity,
        line_total: line.line_total()?,
    })
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Totals of a set of captured lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    /// Σ line_total
    pub total: Money,
    /// Σ unit_cost × quantity
    pub cost: Money,
    /// total - cost
    pub profit: Money,
}

impl SaleTotals {
    /// Sums captured lines. Costs are re-read from storage, so their
    /// products are checked here as well.
    pub fn from_lines(lines: &[SaleLine]) -> CoreResult<Self> {
        let total = Money::checked_sum(lines.iter().map(|l| l.line_total))
            .ok_or_else(|| ValidationError::exceeds_max("total"))?;

        let mut cost = Money::zero();
        for line in lines {
            cost = line
                .unit_cost
                .checked_mul_quantity(line.quantity)
                .and_then(|line_cost| cost.checked_add(line_cost))
                .ok_or_else(|| ValidationError::exceeds_max("cost"))?;
        }

        // both sums are non-negative, so the difference fits
        Ok(Self {
            total,
            cost,
            profit: total - cost,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> CartLimits {
        CartLimits::default()
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert!(matches!(
            Cart::new().validate(&limits()),
            Err(CoreError::EmptyCart)
        ));
    }

    #[test]
    fn test_invalid_quantity_rejected() {
        let cart = Cart::new().add("p1", 0, Money::from_cents(100));
        assert!(matches!(
            cart.validate(&limits()),
            Err(CoreError::InvalidQuantity { quantity: 0, .. })
        ));

        let cart = Cart::new().add("p1", 1_000, Money::from_cents(100));
        assert!(matches!(
            cart.validate(&limits()),
            Err(CoreError::InvalidQuantity { quantity: 1_000, .. })
        ));
    }

    #[test]
    fn test_cart_too_large() {
        let tight = CartLimits {
            max_lines: 2,
            max_item_quantity: 10,
        };
        let cart = Cart::new()
            .add("a", 1, Money::from_cents(100))
            .add("b", 1, Money::from_cents(100))
            .add("c", 1, Money::from_cents(100));
        assert!(matches!(
            cart.validate(&tight),
            Err(CoreError::CartTooLarge { max: 2 })
        ));
    }

    #[test]
    fn test_zero_total_rejected() {
        let cart = Cart::new().add("freebie", 2, Money::zero());
        assert!(matches!(
            cart.validate(&limits()),
            Err(CoreError::InvalidTotal { .. })
        ));
    }

    #[test]
    fn test_negative_price_rejected() {
        let cart = Cart::new()
            .add("a", 1, Money::from_cents(500))
            .add("b", 1, Money::from_cents(-100));
        assert!(matches!(
            cart.validate(&limits()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_valid_cart_total() {
        let cart = Cart::new()
            .add("a", 2, Money::from_cents(12_000))
            .add("b", 3, Money::from_cents(250));
        assert!(cart.validate(&limits()).is_ok());
        assert_eq!(cart.total().unwrap().cents(), 24_750);
    }

    #[test]
    fn test_capture_line_checks_stock() {
        let line = CartLine::new("p1", 5, Money::from_cents(300));
        let err = capture_line(&line, "Cola", Money::from_cents(200), 3).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                product,
                available,
                requested,
            } => {
                assert_eq!(product, "Cola");
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let captured = capture_line(&line, "Cola", Money::from_cents(200), 5).unwrap();
        assert_eq!(captured.line_total.cents(), 1_500);
        assert_eq!(captured.unit_cost.cents(), 200);
        assert_eq!(captured.name, "Cola");
    }

    #[test]
    fn test_sale_totals() {
        // Scenario B: cost 100.00, price 120.00, two units
        let line = CartLine::new("p1", 2, Money::from_cents(12_000));
        let captured = capture_line(&line, "Flour", Money::from_cents(10_000), 5).unwrap();
        let totals = SaleTotals::from_lines(&[captured]).unwrap();
        assert_eq!(totals.total.cents(), 24_000);
        assert_eq!(totals.cost.cents(), 20_000);
        assert_eq!(totals.profit.cents(), 4_000);
    }

    #[test]
    fn test_profit_can_be_negative() {
        let line = CartLine::new("p1", 1, Money::from_cents(80));
        let captured = capture_line(&line, "Loss leader", Money::from_cents(100), 1).unwrap();
        let totals = SaleTotals::from_lines(&[captured]).unwrap();
        assert_eq!(totals.profit.cents(), -20);
    }

    #[test]
    fn test_oversized_amounts_rejected_not_wrapped() {
        let overflowing_line = Cart::new().add("p", 3, Money::from_cents(i64::MAX / 2));
        assert!(matches!(
            overflowing_line.validate(&limits()),
            Err(CoreError::Validation(ValidationError::OutOfRange { ref field, .. }))
                if field == "line_total"
        ));

        // each line fits, their sum does not
        let overflowing_sum = Cart::new()
            .add("a", 1, Money::from_cents(i64::MAX / 2))
            .add("b", 1, Money::from_cents(i64::MAX / 2))
            .add("c", 1, Money::from_cents(i64::MAX / 2));
        assert!(matches!(
            overflowing_sum.validate(&limits()),
            Err(CoreError::Validation(ValidationError::OutOfRange { ref field, .. }))
                if field == "total"
        ));

        let line = CartLine::new("p", 3, Money::from_cents(100));
        let captured = capture_line(&line, "Bolt", Money::from_cents(i64::MAX / 2), 5).unwrap();
        assert!(matches!(
            SaleTotals::from_lines(&[captured]),
            Err(CoreError::Validation(ValidationError::OutOfRange { ref field, .. }))
                if field == "cost"
        ));
    }
}

//! # Pricing
//!
//! Sale price derivation for the inventory ledger.
//!
//! ```text
//!   cost ──┐
//!          ├──► sale_price = cost + round_half_up(cost × margin / 10000)
//!  margin ─┘
//! ```
//!
//! The sale price is a derived field: it is computed on every read and is
//! never stored, so editing cost or margin reprices the catalog at once.
//! Prices already captured in a cart, sale or debt are not affected.

use crate::money::{Money, Rate};

/// Sale price of a product with the given unit cost and margin.
///
/// ## Example
/// ```rust
/// use tally_core::money::{Money, Rate};
/// use tally_core::pricing::sale_price;
///
/// assert_eq!(sale_price(Money::from_cents(10_000), Rate::from_bps(2_000)).cents(), 12_000);
/// assert_eq!(sale_price(Money::from_cents(999), Rate::from_bps(3_333)).cents(), 1_332);
/// ```
pub fn sale_price(cost: Money, margin: Rate) -> Money {
    cost.saturating_add(cost.apply_rate(margin))
}

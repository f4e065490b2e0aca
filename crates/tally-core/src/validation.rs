//! # Validation Module
//!
//! Field-level input rules for Tally POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI layer                                                     │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE + Cart::validate                                 │
//! │  └── Rejects bad input before any storage call                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK (stock >= 0) constraints                         │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_client_name, validate_product_name};
//!
//! assert!(validate_product_name("Flour 1kg").is_ok());
//! assert!(validate_client_name("   ").is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{NewProduct, ProductUpdate};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest product or client name accepted.
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty (after trimming)
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Coca-Cola 330ml").is_ok());
/// assert!(validate_product_name("").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

/// Validates the client name of a credit sale. Same rules as product names.
pub fn validate_client_name(name: &str) -> ValidationResult<()> {
    validate_name("client_name", name)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a unit cost.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
pub fn validate_cost(cost: Money) -> ValidationResult<()> {
    if cost.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "cost".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a stock level.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates every field of a product before insert.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_cost(product.cost)?;
    validate_stock(product.stock)
}

/// Validates a product edit.
pub fn validate_product_update(update: &ProductUpdate) -> ValidationResult<()> {
    validate_product_name(&update.name)?;
    validate_cost(update.cost)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Rate;

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Coca-Cola 330ml").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
        assert!(validate_product_name(&"ñ".repeat(200)).is_ok());
    }

    #[test]
    fn test_validate_client_name_field() {
        match validate_client_name("") {
            Err(ValidationError::Required { field }) => assert_eq!(field, "client_name"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(validate_client_name("Ana").is_ok());
    }

    #[test]
    fn test_validate_cost_and_stock() {
        assert!(validate_cost(Money::zero()).is_ok());
        assert!(validate_cost(Money::from_cents(1099)).is_ok());
        assert!(validate_cost(Money::from_cents(-1)).is_err());

        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-1).is_err());
    }

    #[test]
    fn test_validate_new_product() {
        let mut product = NewProduct {
            name: "Rice".to_string(),
            cost: Money::from_cents(500),
            margin: Rate::from_bps(3_000),
            stock: 10,
        };
        assert!(validate_new_product(&product).is_ok());

        product.stock = -3;
        assert!(validate_new_product(&product).is_err());

        let update = ProductUpdate {
            name: String::new(),
            cost: Money::from_cents(500),
            margin: Rate::zero(),
        };
        assert!(validate_product_update(&update).is_err());
    }
}

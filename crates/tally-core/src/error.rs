//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → UI layer                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Kinds
//! Every error maps onto one [`ErrorKind`] so the UI can decide how to react:
//!
//! | Kind         | Raised                          | Examples                      |
//! |--------------|---------------------------------|-------------------------------|
//! | `Validation` | before any storage call         | EmptyCart, InvalidAmount      |
//! | `NotFound`   | inside a transaction or a read  | ProductNotFound, DebtNotFound |
//! | `Conflict`   | only inside a transaction       | InsufficientStock, AlreadyPaid|
//! | `Transport`  | storage layer, returned verbatim| connection lost, busy timeout |

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of every error surfaced to the UI layer.
///
/// Nothing is retried automatically and no kind is fatal; the caller
/// shows the message and lets the user decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Transport,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Checkout attempted with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line quantity is not within 1..=max.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: String, quantity: i64 },

    /// The cart adds up to zero or less.
    #[error("Invalid cart total: {total}")]
    InvalidTotal { total: Money },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Payment amount is zero or negative.
    #[error("Invalid payment amount: {amount}")]
    InvalidAmount { amount: Money },

    /// Report range with start after end.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: String, end: String },

    /// Product cannot be found for this owner.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Debt cannot be found for this owner.
    #[error("Debt not found: {0}")]
    DebtNotFound(String),

    /// Insufficient stock to complete the sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Re-read stock inside the transaction: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Cola", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Transaction rolls back, UI shows: "Only 3 Cola in stock"
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Payment larger than what is still owed.
    #[error("Payment of {amount} exceeds remaining balance {remaining} on debt {debt_id}")]
    OverPayment {
        debt_id: String,
        amount: Money,
        remaining: Money,
    },

    /// Debt is already settled.
    #[error("Debt {0} is already paid")]
    AlreadyPaid(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies the error for the UI layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::EmptyCart
            | CoreError::InvalidQuantity { .. }
            | CoreError::InvalidTotal { .. }
            | CoreError::CartTooLarge { .. }
            | CoreError::InvalidAmount { .. }
            | CoreError::InvalidRange { .. }
            | CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::ProductNotFound(_) | CoreError::DebtNotFound(_) => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. }
            | CoreError::OverPayment { .. }
            | CoreError::AlreadyPaid(_) => ErrorKind::Conflict,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

}

impl ValidationError {
    /// A non-negative amount or count that does not fit in an i64.
    pub fn exceeds_max(field: &str) -> Self {
        ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Cola".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Cola: available 3, requested 5"
        );

        let err = CoreError::OverPayment {
            debt_id: "d1".to_string(),
            amount: Money::from_cents(20_000),
            remaining: Money::from_cents(18_000),
        };
        assert_eq!(
            err.to_string(),
            "Payment of $200.00 exceeds remaining balance $180.00 on debt d1"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "client_name".to_string(),
        };
        assert_eq!(err.to_string(), "client_name is required");

        let err = ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        };
        assert_eq!(err.to_string(), "name must be at most 200 characters");

        let err = ValidationError::exceeds_max("total");
        assert_eq!(
            err.to_string(),
            format!("total must be between 0 and {}", i64::MAX)
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CoreError::EmptyCart.kind(), ErrorKind::Validation);
        assert_eq!(
            CoreError::InvalidAmount { amount: Money::zero() }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(CoreError::DebtNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::AlreadyPaid("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            CoreError::InsufficientStock {
                product: "Cola".into(),
                available: 0,
                requested: 1
            }
            .kind(),
            ErrorKind::Conflict
        );
    }
}

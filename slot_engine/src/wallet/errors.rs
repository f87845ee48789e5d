//! Ledger error types.

use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::models::AccountId;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A single store call exceeded its query timeout
    #[error("Ledger operation timed out after {0:?}")]
    QueryTimeout(Duration),

    /// Non-SQL store fault (begin/commit/row I/O on an in-process ledger)
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// Account not found by internal id
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account not found by external id
    #[error("Account not found for external id {0}")]
    UnknownAccount(Uuid),

    /// Debit would drive the balance negative
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    /// Balance arithmetic overflowed the decimal range
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// An account with this external id already exists
    #[error("Account already exists for external id {0}")]
    DuplicateAccount(Uuid),
}

impl LedgerError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_)
            | LedgerError::QueryTimeout(_)
            | LedgerError::Unavailable(_)
            | LedgerError::BalanceOverflow => "Internal server error".to_string(),
            LedgerError::AccountNotFound(_) | LedgerError::UnknownAccount(_) => {
                "Account not found".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

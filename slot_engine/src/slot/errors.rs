//! Settlement error types.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::wallet::LedgerError;

/// Whether a failed settlement attempt may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recoverability {
    /// A fresh attempt after a short wait may succeed
    Recoverable,
    /// Surface to the caller immediately
    Fatal,
}

/// Settlement errors
#[derive(Debug, Error)]
pub enum SpinError {
    /// External id does not resolve to an account
    #[error("Account not found for external id {0}")]
    AccountNotFound(Uuid),

    /// Balance cannot cover the bet
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    /// Bet must be positive
    #[error("Invalid bet amount: {0}")]
    InvalidBet(Decimal),

    /// `bet * multiplier` does not fit in a decimal
    #[error("Payout overflow: bet {bet} x multiplier {multiplier}")]
    PayoutOverflow { bet: Decimal, multiplier: Decimal },

    /// Transaction begin/commit/rollback or row I/O failed
    #[error("Storage fault: {0}")]
    Storage(#[source] LedgerError),

    /// Caller cancelled before commit
    #[error("Settlement cancelled")]
    Cancelled,

    /// Caller deadline passed before commit
    #[error("Settlement deadline exceeded")]
    DeadlineExceeded,
}

impl SpinError {
    /// Classify for the retry policy. Only insufficient funds is retried.
    pub fn recoverability(&self) -> Recoverability {
        match self {
            SpinError::InsufficientFunds { .. } => Recoverability::Recoverable,
            SpinError::AccountNotFound(_)
            | SpinError::InvalidBet(_)
            | SpinError::PayoutOverflow { .. }
            | SpinError::Storage(_)
            | SpinError::Cancelled
            | SpinError::DeadlineExceeded => Recoverability::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverability() == Recoverability::Recoverable
    }

    /// True for errors the caller can correct (unknown account, funds, bet amount)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SpinError::AccountNotFound(_)
                | SpinError::InsufficientFunds { .. }
                | SpinError::InvalidBet(_)
        )
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            SpinError::Storage(_) | SpinError::PayoutOverflow { .. } => {
                "Internal server error".to_string()
            }
            SpinError::AccountNotFound(_) => "Account not found".to_string(),
            SpinError::InsufficientFunds { .. } => "Insufficient funds".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<LedgerError> for SpinError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                available,
                required,
            } => SpinError::InsufficientFunds {
                available,
                required,
            },
            LedgerError::UnknownAccount(external_id) => SpinError::AccountNotFound(external_id),
            LedgerError::InvalidAmount(amount) => SpinError::InvalidBet(amount),
            other => SpinError::Storage(other),
        }
    }
}

/// Result type for settlement operations
pub type SpinResult<T> = Result<T, SpinError>;

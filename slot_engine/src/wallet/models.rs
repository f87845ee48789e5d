//! Ledger data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal (storage-local) account id
pub type AccountId = i64;

/// Decimal places every stored amount carries (`NUMERIC(20, 4)` columns)
pub const LEDGER_SCALE: u32 = 4;

/// True if `amount` can be stored without rounding
pub fn fits_ledger_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= LEDGER_SCALE
}

/// Account holding a single balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub external_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settled spin. Immutable once the settlement transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinRecord {
    pub id: i64,
    pub account_id: AccountId,
    pub bet_amount: Decimal,
    pub win_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl SpinRecord {
    /// Balance change this spin applied: `win - bet`
    pub fn net(&self) -> Decimal {
        self.win_amount - self.bet_amount
    }
}

/// Spin row to append inside a settlement transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewSpin {
    pub account_id: AccountId,
    pub bet_amount: Decimal,
    pub win_amount: Decimal,
}

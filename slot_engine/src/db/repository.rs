//! Ledger store trait definitions and the PostgreSQL implementation.
//!
//! A [`LedgerStore`] hands out explicit [`LedgerTx`] handles. Every data call
//! takes the handle, so the atomic boundary is visible at each call site and
//! nothing is looked up from ambient state.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::sync::Arc;
use uuid::Uuid;

use super::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_default_timeout, with_timeout};
use crate::wallet::{Account, AccountId, LedgerError, LedgerResult, NewSpin, SpinRecord};

/// Transactional store holding one balance per account
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Transaction handle type
    type Tx: LedgerTx;

    /// Begin a new transaction
    async fn begin(&self) -> LedgerResult<Self::Tx>;
}

/// Open ledger transaction.
///
/// Dropping a handle without calling [`LedgerTx::commit`] discards its writes.
#[async_trait]
pub trait LedgerTx: Send {
    /// Resolve an external id to the account row (balance as seen by this transaction)
    async fn find_account(&mut self, external_id: Uuid) -> LedgerResult<Option<Account>>;

    /// Insert a new account with a zero balance
    async fn insert_account(&mut self, external_id: Uuid) -> LedgerResult<Account>;

    /// Lock the balance row for the rest of the transaction and read it
    async fn lock_balance(&mut self, account_id: AccountId) -> LedgerResult<Option<Decimal>>;

    /// Overwrite the balance of a row previously locked with `lock_balance`.
    /// Only the balance mutator calls this.
    async fn write_balance(&mut self, account_id: AccountId, balance: Decimal) -> LedgerResult<()>;

    /// Append a spin to the history log
    async fn append_spin(&mut self, spin: NewSpin) -> LedgerResult<SpinRecord>;

    /// Spin history for an account, newest first
    async fn list_spins(
        &mut self,
        account_id: AccountId,
        limit: i64,
    ) -> LedgerResult<Vec<SpinRecord>>;

    /// Commit the transaction
    async fn commit(self) -> LedgerResult<()>;

    /// Roll back the transaction
    async fn rollback(self) -> LedgerResult<()>;
}

/// PostgreSQL implementation of `LedgerStore`
#[derive(Clone)]
pub struct PgLedger {
    pool: Arc<PgPool>,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn from_shared(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> LedgerResult<PgLedgerTx> {
        let tx = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, self.pool.begin()).await?;
        Ok(PgLedgerTx { tx })
    }
}

/// PostgreSQL ledger transaction
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        external_id: row.get("external_id"),
        balance: row.get("balance"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}

fn spin_from_row(row: &PgRow) -> SpinRecord {
    SpinRecord {
        id: row.get("id"),
        account_id: row.get("account_id"),
        bet_amount: row.get("bet_amount"),
        win_amount: row.get("win_amount"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_account(&mut self, external_id: Uuid) -> LedgerResult<Option<Account>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, external_id, balance, created_at, updated_at
                FROM accounts
                WHERE external_id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(external_id)
            .fetch_optional(&mut *self.tx),
        )
        .await?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn insert_account(&mut self, external_id: Uuid) -> LedgerResult<Account> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO accounts (external_id, balance)
                VALUES ($1, 0)
                ON CONFLICT (external_id) DO NOTHING
                RETURNING id, external_id, balance, created_at, updated_at
                "#,
            )
            .bind(external_id)
            .fetch_optional(&mut *self.tx),
        )
        .await?
        .ok_or(LedgerError::DuplicateAccount(external_id))?;

        Ok(account_from_row(&row))
    }

    async fn lock_balance(&mut self, account_id: AccountId) -> LedgerResult<Option<Decimal>> {
        // Row lock held until commit/rollback; serialises concurrent debits
        let row = with_default_timeout(
            sqlx::query("SELECT balance FROM accounts WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
                .bind(account_id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;

        Ok(row.map(|r| r.get("balance")))
    }

    async fn write_balance(&mut self, account_id: AccountId, balance: Decimal) -> LedgerResult<()> {
        let result = with_default_timeout(
            sqlx::query("UPDATE accounts SET balance = $1, updated_at = NOW() WHERE id = $2")
                .bind(balance)
                .bind(account_id)
                .execute(&mut *self.tx),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        Ok(())
    }

    async fn append_spin(&mut self, spin: NewSpin) -> LedgerResult<SpinRecord> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO spins (account_id, bet_amount, win_amount)
                VALUES ($1, $2, $3)
                RETURNING id, account_id, bet_amount, win_amount, created_at
                "#,
            )
            .bind(spin.account_id)
            .bind(spin.bet_amount)
            .bind(spin.win_amount)
            .fetch_one(&mut *self.tx),
        )
        .await?;

        Ok(spin_from_row(&row))
    }

    async fn list_spins(
        &mut self,
        account_id: AccountId,
        limit: i64,
    ) -> LedgerResult<Vec<SpinRecord>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, account_id, bet_amount, win_amount, created_at
                FROM spins
                WHERE account_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
                "#,
            )
            .bind(account_id)
            .bind(limit)
            .fetch_all(&mut *self.tx),
        )
        .await?;

        Ok(rows.iter().map(spin_from_row).collect())
    }

    async fn commit(self) -> LedgerResult<()> {
        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, self.tx.commit()).await
    }

    async fn rollback(self) -> LedgerResult<()> {
        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, self.tx.rollback()).await
    }
}

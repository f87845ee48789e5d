//! In-process ledger store.
//!
//! Transactions are fully serialised: a transaction holds the store lock from
//! `begin` until it commits, rolls back or is dropped. Writes are staged in the
//! handle and only applied on commit, so an abandoned handle leaves no trace.
//!
//! Faults can be injected at each store call to exercise rollback paths.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::repository::{LedgerStore, LedgerTx};
use crate::wallet::{Account, AccountId, LedgerError, LedgerResult, NewSpin, SpinRecord};

/// Store call at which an injected fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    FindAccount,
    LockBalance,
    WriteBalance,
    AppendSpin,
    Commit,
    Rollback,
}

const FAULT_POINTS: usize = 7;

impl FaultPoint {
    const ALL: [FaultPoint; FAULT_POINTS] = [
        FaultPoint::Begin,
        FaultPoint::FindAccount,
        FaultPoint::LockBalance,
        FaultPoint::WriteBalance,
        FaultPoint::AppendSpin,
        FaultPoint::Commit,
        FaultPoint::Rollback,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for FaultPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultPoint::Begin => write!(f, "begin"),
            FaultPoint::FindAccount => write!(f, "find_account"),
            FaultPoint::LockBalance => write!(f, "lock_balance"),
            FaultPoint::WriteBalance => write!(f, "write_balance"),
            FaultPoint::AppendSpin => write!(f, "append_spin"),
            FaultPoint::Commit => write!(f, "commit"),
            FaultPoint::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    skip: [AtomicUsize; FAULT_POINTS],
    remaining: [AtomicUsize; FAULT_POINTS],
}

impl Faults {
    fn trip(&self, point: FaultPoint) -> LedgerResult<()> {
        let slot = &self.remaining[point.index()];
        if slot.load(Ordering::SeqCst) == 0 {
            return Ok(());
        }
        // Calls inside the skip window pass through untouched
        let skipped = self.skip[point.index()]
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if skipped {
            return Ok(());
        }
        let tripped = slot
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(LedgerError::Unavailable(format!("injected fault at {point}")))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    by_external_id: HashMap<Uuid, AccountId>,
    spins: Vec<SpinRecord>,
    next_account_id: AccountId,
    next_spin_id: i64,
}

/// In-memory ledger
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    faults: Arc<Faults>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls at `point` fail with `LedgerError::Unavailable`
    pub fn inject_fault(&self, point: FaultPoint, times: usize) {
        self.inject_fault_after(point, 0, times);
    }

    /// Let `skip` calls at `point` succeed, then fail the following `times`
    pub fn inject_fault_after(&self, point: FaultPoint, skip: usize, times: usize) {
        self.faults.skip[point.index()].store(skip, Ordering::SeqCst);
        self.faults.remaining[point.index()].store(times, Ordering::SeqCst);
    }

    /// Clear all pending injected faults
    pub fn clear_faults(&self) {
        for point in FaultPoint::ALL {
            self.faults.skip[point.index()].store(0, Ordering::SeqCst);
            self.faults.remaining[point.index()].store(0, Ordering::SeqCst);
        }
    }

    /// Create an account with an opening balance, outside any settlement
    pub async fn seed_account(&self, external_id: Uuid, balance: Decimal) -> LedgerResult<Account> {
        let mut state = self.state.lock().await;
        if state.by_external_id.contains_key(&external_id) {
            return Err(LedgerError::DuplicateAccount(external_id));
        }

        state.next_account_id += 1;
        let now = Utc::now();
        let account = Account {
            id: state.next_account_id,
            external_id,
            balance,
            created_at: now,
            updated_at: now,
        };
        state.by_external_id.insert(external_id, account.id);
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    /// Committed balance of an account
    pub async fn balance_of(&self, account_id: AccountId) -> Option<Decimal> {
        let state = self.state.lock().await;
        state.accounts.get(&account_id).map(|a| a.balance)
    }

    /// Committed spins of an account, oldest first
    pub async fn spins_of(&self, account_id: AccountId) -> Vec<SpinRecord> {
        let state = self.state.lock().await;
        state
            .spins
            .iter()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    type Tx = MemoryLedgerTx;

    async fn begin(&self) -> LedgerResult<MemoryLedgerTx> {
        self.faults.trip(FaultPoint::Begin)?;
        let guard = self.state.clone().lock_owned().await;

        Ok(MemoryLedgerTx {
            guard,
            faults: self.faults.clone(),
            new_accounts: Vec::new(),
            balances: HashMap::new(),
            spins: Vec::new(),
        })
    }
}

/// In-memory ledger transaction
pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<LedgerState>,
    faults: Arc<Faults>,
    new_accounts: Vec<Account>,
    balances: HashMap<AccountId, Decimal>,
    spins: Vec<SpinRecord>,
}

impl MemoryLedgerTx {
    fn account(&self, account_id: AccountId) -> Option<Account> {
        let mut account = self
            .new_accounts
            .iter()
            .find(|a| a.id == account_id)
            .or_else(|| self.guard.accounts.get(&account_id))
            .cloned()?;

        if let Some(balance) = self.balances.get(&account_id) {
            account.balance = *balance;
        }
        Some(account)
    }

    fn account_id_for(&self, external_id: Uuid) -> Option<AccountId> {
        self.new_accounts
            .iter()
            .find(|a| a.external_id == external_id)
            .map(|a| a.id)
            .or_else(|| self.guard.by_external_id.get(&external_id).copied())
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn find_account(&mut self, external_id: Uuid) -> LedgerResult<Option<Account>> {
        self.faults.trip(FaultPoint::FindAccount)?;
        Ok(self
            .account_id_for(external_id)
            .and_then(|id| self.account(id)))
    }

    async fn insert_account(&mut self, external_id: Uuid) -> LedgerResult<Account> {
        if self.account_id_for(external_id).is_some() {
            return Err(LedgerError::DuplicateAccount(external_id));
        }

        let now = Utc::now();
        let account = Account {
            id: self.guard.next_account_id + self.new_accounts.len() as AccountId + 1,
            external_id,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        self.new_accounts.push(account.clone());
        Ok(account)
    }

    async fn lock_balance(&mut self, account_id: AccountId) -> LedgerResult<Option<Decimal>> {
        self.faults.trip(FaultPoint::LockBalance)?;
        Ok(self.account(account_id).map(|a| a.balance))
    }

    async fn write_balance(&mut self, account_id: AccountId, balance: Decimal) -> LedgerResult<()> {
        self.faults.trip(FaultPoint::WriteBalance)?;
        if self.account(account_id).is_none() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        self.balances.insert(account_id, balance);
        Ok(())
    }

    async fn append_spin(&mut self, spin: NewSpin) -> LedgerResult<SpinRecord> {
        self.faults.trip(FaultPoint::AppendSpin)?;
        if self.account(spin.account_id).is_none() {
            return Err(LedgerError::AccountNotFound(spin.account_id));
        }

        let record = SpinRecord {
            id: self.guard.next_spin_id + self.spins.len() as i64 + 1,
            account_id: spin.account_id,
            bet_amount: spin.bet_amount,
            win_amount: spin.win_amount,
            created_at: Utc::now(),
        };
        self.spins.push(record.clone());
        Ok(record)
    }

    async fn list_spins(
        &mut self,
        account_id: AccountId,
        limit: i64,
    ) -> LedgerResult<Vec<SpinRecord>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .guard
            .spins
            .iter()
            .chain(self.spins.iter())
            .rev()
            .filter(|s| s.account_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn commit(self) -> LedgerResult<()> {
        self.faults.trip(FaultPoint::Commit)?;

        let MemoryLedgerTx {
            mut guard,
            new_accounts,
            balances,
            spins,
            ..
        } = self;
        let now = Utc::now();

        for account in new_accounts {
            guard.next_account_id = guard.next_account_id.max(account.id);
            guard.by_external_id.insert(account.external_id, account.id);
            guard.accounts.insert(account.id, account);
        }
        for (account_id, balance) in balances {
            if let Some(account) = guard.accounts.get_mut(&account_id) {
                account.balance = balance;
                account.updated_at = now;
            }
        }
        for spin in spins {
            guard.next_spin_id = guard.next_spin_id.max(spin.id);
            guard.spins.push(spin);
        }
        Ok(())
    }

    async fn rollback(self) -> LedgerResult<()> {
        // Staged writes are dropped with the handle either way
        self.faults.trip(FaultPoint::Rollback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let ledger = MemoryLedger::new();
        let account = ledger.seed_account(Uuid::new_v4(), dec!(10)).await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        tx.lock_balance(account.id).await.unwrap();
        tx.write_balance(account.id, dec!(7)).await.unwrap();
        let spin = tx
            .append_spin(NewSpin {
                account_id: account.id,
                bet_amount: dec!(3),
                win_amount: Decimal::ZERO,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(ledger.balance_of(account.id).await, Some(dec!(7)));
        assert_eq!(ledger.spins_of(account.id).await, vec![spin]);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let ledger = MemoryLedger::new();
        let account = ledger.seed_account(Uuid::new_v4(), dec!(10)).await.unwrap();

        {
            let mut tx = ledger.begin().await.unwrap();
            tx.write_balance(account.id, dec!(0)).await.unwrap();
        }

        assert_eq!(ledger.balance_of(account.id).await, Some(dec!(10)));
    }

    #[tokio::test]
    async fn test_transactions_are_serialised() {
        let ledger = MemoryLedger::new();
        let tx = ledger.begin().await.unwrap();

        let second = tokio::time::timeout(Duration::from_millis(20), ledger.begin()).await;
        assert!(second.is_err(), "second begin should wait for the first");

        tx.rollback().await.unwrap();
        assert!(ledger.begin().await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let ledger = MemoryLedger::new();
        ledger.inject_fault(FaultPoint::Begin, 1);

        let err = ledger.begin().await.err().expect("first begin fails");
        assert!(err.to_string().contains("begin"));
        assert!(ledger.begin().await.is_ok());
    }

    #[tokio::test]
    async fn test_fault_after_skipped_calls() {
        let ledger = MemoryLedger::new();
        let account = ledger.seed_account(Uuid::new_v4(), dec!(10)).await.unwrap();
        ledger.inject_fault_after(FaultPoint::WriteBalance, 1, 1);

        let mut tx = ledger.begin().await.unwrap();
        assert!(tx.write_balance(account.id, dec!(5)).await.is_ok());
        assert!(matches!(
            tx.write_balance(account.id, dec!(6)).await,
            Err(LedgerError::Unavailable(_))
        ));
        assert!(tx.write_balance(account.id, dec!(7)).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_faults_resets_skip_window() {
        let ledger = MemoryLedger::new();
        ledger.inject_fault_after(FaultPoint::Begin, 3, 1);
        ledger.clear_faults();

        for _ in 0..5 {
            ledger.begin().await.unwrap().rollback().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_inserted_account_visible_after_commit() {
        let ledger = MemoryLedger::new();
        let external_id = Uuid::new_v4();

        let mut tx = ledger.begin().await.unwrap();
        let account = tx.insert_account(external_id).await.unwrap();
        assert_eq!(
            tx.find_account(external_id).await.unwrap().map(|a| a.id),
            Some(account.id)
        );
        tx.commit().await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        assert!(tx.find_account(external_id).await.unwrap().is_some());
        assert!(matches!(
            tx.insert_account(external_id).await,
            Err(LedgerError::DuplicateAccount(_))
        ));
    }

    #[tokio::test]
    async fn test_list_spins_newest_first_with_limit() {
        let ledger = MemoryLedger::new();
        let account = ledger.seed_account(Uuid::new_v4(), dec!(100)).await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        for bet in [dec!(1), dec!(2), dec!(3)] {
            tx.append_spin(NewSpin {
                account_id: account.id,
                bet_amount: bet,
                win_amount: Decimal::ZERO,
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        let recent = tx.list_spins(account.id, 2).await.unwrap();
        let bets: Vec<_> = recent.iter().map(|s| s.bet_amount).collect();
        assert_eq!(bets, vec![dec!(3), dec!(2)]);
    }
}

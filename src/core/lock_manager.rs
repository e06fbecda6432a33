//! Per-account exclusive locks with ordered, bounded acquisition
//!
//! # Design
//!
//! Each account gets one async mutex, created on first use. An operation that touches
//! several accounts acquires their locks in ascending identifier order, so two transfers
//! between the same pair of accounts in opposite directions cannot deadlock.
//!
//! Acquisition shares a single deadline across all locks. If the deadline passes, every
//! lock already acquired is released (the guards are dropped) and the caller receives
//! `LedgerError::Timeout`.
//!
//! # Commit Gate
//!
//! Account locks serialize writers only. `CommitGate` separates multi-step commits from
//! readers that need a view across accounts: a commit holds the shared side while it
//! mutates, a consistent read holds the exclusive side, so a reader never observes a
//! debit without its matching credit. Neither side is held across an await point.
//!
//! # Thread Safety
//!
//! The lock table is a `DashMap`; its shard guard is released before awaiting a mutex, so
//! waiters for one account never block lookups of another.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout_at, Instant};
use tracing::{trace, warn};

use crate::types::{AccountId, LedgerError};

/// Upper bound for deadlines when `now + timeout` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Whole milliseconds of `duration`, saturating at `u64::MAX`
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Exclusive access to a set of accounts, released on drop
#[derive(Debug)]
pub struct AccountLockSet {
    accounts: Vec<AccountId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountLockSet {
    /// Locked accounts in acquisition order
    pub fn accounts(&self) -> &[AccountId] {
        &self.accounts
    }
}

/// Table of per-account locks
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, account: AccountId) -> Arc<Mutex<()>> {
        self.locks.entry(account).or_default().value().clone()
    }

    /// Acquire the locks of `accounts` in ascending order within `timeout`
    ///
    /// Duplicates are locked once.
    ///
    /// # Returns
    ///
    /// * `Ok(AccountLockSet)` - All locks held until the set is dropped
    /// * `Err(LedgerError::Timeout)` - Deadline passed; nothing is held
    pub async fn acquire(
        &self,
        accounts: &[AccountId],
        timeout: Duration,
    ) -> Result<AccountLockSet, LedgerError> {
        let mut ordered = accounts.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut guards = Vec::with_capacity(ordered.len());

        for &account in &ordered {
            let lock = self.lock_for(account);
            match timeout_at(deadline, lock.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    warn!(
                        accounts = ?ordered,
                        blocked_on = account,
                        timeout_ms = duration_millis(timeout),
                        "Timed out acquiring account locks"
                    );
                    return Err(LedgerError::Timeout {
                        accounts: ordered,
                        waited_ms: duration_millis(timeout),
                    });
                }
            }
        }

        trace!(accounts = ?ordered, "Account locks acquired");
        Ok(AccountLockSet {
            accounts: ordered,
            _guards: guards,
        })
    }

    /// Drop the lock of a physically removed account
    pub fn forget(&self, account: AccountId) {
        self.locks.remove(&account);
    }

    /// Number of accounts with a lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Boundary between multi-step commits and consistent multi-account reads
#[derive(Debug, Default)]
pub struct CommitGate {
    gate: RwLock<()>,
}

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a commit; other commits may run alongside, consistent reads wait
    pub fn commit(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read()
    }

    /// Run `read` while no commit is in progress
    pub fn read_consistent<T>(&self, read: impl FnOnce() -> T) -> T {
        let _exclusive = self.gate.write();
        read()
    }
}

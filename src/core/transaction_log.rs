//! Append-only transaction log
//!
//! This module provides the `InMemoryTransactionLog` and the `TransactionHistory` view
//! returned by account history queries.
//!
//! # Design
//!
//! Committed transactions are stored once, keyed by identifier. A per-account index keeps
//! the identifiers of every transaction that references the account, in append order, so
//! that a history query never scans the whole log.
//!
//! `TransactionHistory` captures the identifier list at query time and resolves records
//! lazily on iteration. It can be iterated any number of times; each pass yields the same
//! records newest first.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::traits::TransactionLog;
use crate::types::{AccountId, LedgerError, NewTransaction, Transaction, TransactionId};

/// Source a `TransactionHistory` resolves identifiers against
pub trait TransactionLookup: Send + Sync {
    fn lookup(&self, id: &TransactionId) -> Option<Transaction>;
}

impl TransactionLookup for DashMap<TransactionId, Transaction> {
    fn lookup(&self, id: &TransactionId) -> Option<Transaction> {
        self.get(id).map(|entry| entry.value().clone())
    }
}

/// Restartable, lazily resolved view over an account's transactions
///
/// The set of identifiers is fixed when the view is created; transactions appended
/// afterwards are not included.
#[derive(Clone)]
pub struct TransactionHistory {
    /// Newest first
    ids: Arc<[TransactionId]>,
    source: Arc<dyn TransactionLookup>,
}

impl TransactionHistory {
    /// Create a view over `ids` (newest first) resolved against `source`
    pub fn new(ids: Vec<TransactionId>, source: Arc<dyn TransactionLookup>) -> Self {
        Self {
            ids: ids.into(),
            source,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate the transactions, newest first
    pub fn iter(&self) -> impl Iterator<Item = Transaction> + '_ {
        self.ids.iter().filter_map(|id| self.source.lookup(id))
    }
}

impl fmt::Debug for TransactionHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHistory")
            .field("ids", &self.ids)
            .finish()
    }
}

impl<'a> IntoIterator for &'a TransactionHistory {
    type Item = Transaction;
    type IntoIter = Box<dyn Iterator<Item = Transaction> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Thread-safe in-memory transaction log
#[derive(Debug, Default)]
pub struct InMemoryTransactionLog {
    /// All committed transactions by identifier
    transactions: Arc<DashMap<TransactionId, Transaction>>,

    /// Identifiers referencing each account, oldest first
    by_account: DashMap<AccountId, Vec<TransactionId>>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of committed transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionLog for InMemoryTransactionLog {
    fn append(&self, transaction: NewTransaction) -> Result<Transaction, LedgerError> {
        let committed = transaction.commit(Uuid::new_v4(), Utc::now());

        self.transactions.insert(committed.id, committed.clone());
        for account in [committed.sender_account_id, committed.receiver_account_id]
            .into_iter()
            .flatten()
        {
            self.by_account.entry(account).or_default().push(committed.id);
        }

        debug!(
            tx = %committed.id,
            kind = ?committed.transaction_type,
            amount = %committed.amount,
            "Transaction appended"
        );
        Ok(committed)
    }

    fn list_for_account(&self, account_id: AccountId) -> Result<TransactionHistory, LedgerError> {
        let ids: Vec<TransactionId> = self
            .by_account
            .get(&account_id)
            .map(|entry| entry.value().iter().rev().copied().collect())
            .unwrap_or_default();

        let source: Arc<dyn TransactionLookup> = self.transactions.clone();
        Ok(TransactionHistory::new(ids, source))
    }

    fn get_by_id(
        &self,
        account_id: AccountId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        self.transactions
            .get(&transaction_id)
            .map(|entry| entry.value().clone())
            .filter(|tx| tx.references(account_id))
            .ok_or_else(|| LedgerError::transaction_not_found(account_id, transaction_id))
    }

    fn has_entries(&self, account_id: AccountId) -> Result<bool, LedgerError> {
        Ok(self
            .by_account
            .get(&account_id)
            .map(|entry| !entry.value().is_empty())
            .unwrap_or(false))
    }
}

//! Thread-safe in-memory account ledger
//!
//! This module provides the `InMemoryLedger` struct, the authoritative balance store used
//! by tests and by the replay driver.
//!
//! # Design
//!
//! Accounts live in a `DashMap` keyed by account identifier. Every mutation goes through
//! a single `update` helper that holds the entry's shard lock for the duration of the
//! closure, so a debit or credit is applied atomically and exactly once.
//!
//! Closures compute the new balance first and assign it only when every check passed;
//! a failed operation leaves the account untouched.
//!
//! # Thread Safety
//!
//! Concurrent operations on different accounts proceed in parallel. Serializing the two
//! halves of a transfer is not the ledger's job: the coordinator holds both account locks
//! around the debit/credit pair.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::traits::AccountLedger;
use crate::config::LedgerConfig;
use crate::types::{generate_account_number, Account, AccountId, CustomerId, LedgerError};

/// Reject amounts with more decimal places than the ledger keeps
pub fn ensure_representable(amount: Decimal, scale: u32) -> Result<(), LedgerError> {
    if amount.normalize().scale() > scale {
        return Err(LedgerError::invalid_amount(
            amount,
            &format!("more than {} decimal places", scale),
        ));
    }
    Ok(())
}

fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(amount, "must be positive"));
    }
    Ok(())
}

/// Thread-safe in-memory account ledger
#[derive(Debug)]
pub struct InMemoryLedger {
    accounts: DashMap<AccountId, Account>,

    /// Next identifier to hand out; identifiers start at 1 and are never reused
    next_id: AtomicU64,

    account_number_prefix: String,
    amount_scale: u32,
}

impl InMemoryLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            accounts: DashMap::new(),
            next_id: AtomicU64::new(1),
            account_number_prefix: config.account_number_prefix.clone(),
            amount_scale: config.amount_scale,
        }
    }

    /// Apply a closure to an open account and return the resulting balance
    ///
    /// The entry stays locked while the closure runs.
    fn update<F>(&self, account_id: AccountId, f: F) -> Result<Decimal, LedgerError>
    where
        F: FnOnce(&mut Account) -> Result<(), LedgerError>,
    {
        let mut entry = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        let account = entry.value_mut();

        if account.is_closed() {
            return Err(LedgerError::account_closed(account_id));
        }

        f(account)?;
        Ok(account.balance)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(&LedgerConfig::default())
    }
}

impl AccountLedger for InMemoryLedger {
    fn open_account(
        &self,
        customer_id: CustomerId,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        if initial_balance < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                initial_balance,
                "initial balance must not be negative",
            ));
        }
        ensure_representable(initial_balance, self.amount_scale)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let number = generate_account_number(&self.account_number_prefix, id).ok_or_else(|| {
            LedgerError::persistence_failure("open_account", "account number space exhausted")
        })?;

        let account = Account::new(id, customer_id, number, initial_balance);
        self.accounts.insert(id, account.clone());

        info!(
            account = id,
            customer = customer_id,
            number = %account.account_number,
            balance = %initial_balance,
            "Account opened"
        );
        Ok(account)
    }

    fn account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .get(&account_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    fn balance(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        self.accounts
            .get(&account_id)
            .map(|entry| entry.value().balance)
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    fn debit(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        ensure_positive(amount)?;

        let balance = self.update(account_id, |account| {
            if account.balance < amount {
                return Err(LedgerError::insufficient_funds(
                    account_id,
                    account.balance,
                    amount,
                ));
            }

            account.balance = account
                .balance
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("debit", account_id))?;
            Ok(())
        })?;

        debug!(account = account_id, amount = %amount, balance = %balance, "Debited");
        Ok(balance)
    }

    fn credit(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        ensure_positive(amount)?;

        let balance = self.update(account_id, |account| {
            account.balance = account
                .balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("credit", account_id))?;
            Ok(())
        })?;

        debug!(account = account_id, amount = %amount, balance = %balance, "Credited");
        Ok(balance)
    }

    fn close_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        let mut entry = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        let account = entry.value_mut();

        if account.is_closed() {
            return Err(LedgerError::account_closed(account_id));
        }

        account.closed_at = Some(Utc::now());
        Ok(account.clone())
    }

    fn remove_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .remove(&account_id)
            .map(|(_, account)| account)
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    fn accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>, LedgerError> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| entry.value().customer_id == customer_id)
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }

    fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }
}

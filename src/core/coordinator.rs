//! Transfer orchestration with ordered locking and compensating rollback
//!
//! This module provides the `TransferCoordinator` struct, which validates money
//! movements, serializes them per account, and applies them to the ledger and the
//! transaction log as one unit.
//!
//! # Design
//!
//! A transfer runs in three phases:
//!
//! 1. Validation without locks: amount, description, ownership, receiver resolution.
//!    The first failing check wins.
//! 2. Lock acquisition: both accounts, ascending by identifier, bounded by
//!    `LedgerConfig::lock_timeout`.
//! 3. Commit under the locks: closed/funds checks, debit, credit, log append.
//!
//! Phase 3 is a synchronous call made after the last await point. Dropping the future can
//! only happen before the locks are held or after the commit finished, so cancellation
//! never leaves a half-applied transfer.
//!
//! Phase 3 also holds the shared side of the `CommitGate`. Readers that go through
//! [`TransferCoordinator::consistent_read`] therefore see either none or all of a commit.
//!
//! If a step of phase 3 fails after the ledger was mutated, the applied steps are reversed
//! before the error is returned. A failed reversal escalates to
//! `LedgerError::RollbackFailed` carrying the accounts and amount involved.
//!
//! # Architecture
//!
//! ```text
//! TransferCoordinator
//!     ├── Arc<dyn AccountLedger>     (balances)
//!     ├── Arc<dyn TransactionLog>    (committed records)
//!     ├── Arc<dyn AccountDirectory>  (account numbers, ownership)
//!     ├── Arc<AccountLocks>          (per-account exclusive access)
//!     └── Arc<CommitGate>            (commits vs. consistent reads)
//! ```
//!
//! # Thread Safety
//!
//! The coordinator is cheap to clone and every clone shares the same collaborators and
//! lock table, so clones can be handed to independent tasks.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::ledger::ensure_representable;
use super::lock_manager::{AccountLocks, CommitGate};
use super::traits::{AccountDirectory, AccountLedger, TransactionLog};
use crate::config::LedgerConfig;
use crate::types::{
    Account, AccountId, CustomerId, LedgerError, NewTransaction, Transaction, TransactionType,
    TransferRequest,
};

/// A ledger mutation that undoes an already applied step
#[derive(Debug, Clone, Copy)]
enum Reversal {
    Credit(AccountId),
    Debit(AccountId),
}

/// Money-movement orchestrator
#[derive(Clone)]
pub struct TransferCoordinator {
    ledger: Arc<dyn AccountLedger>,
    log: Arc<dyn TransactionLog>,
    directory: Arc<dyn AccountDirectory>,
    locks: Arc<AccountLocks>,
    gate: Arc<CommitGate>,
    config: Arc<LedgerConfig>,
}

impl fmt::Debug for TransferCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferCoordinator")
            .field("locks", &self.locks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransferCoordinator {
    /// Create a new TransferCoordinator
    ///
    /// # Arguments
    ///
    /// * `ledger` - Balance store
    /// * `log` - Transaction log receiving one record per committed operation
    /// * `directory` - Account number resolution and ownership checks
    /// * `config` - Lock timeout, amount precision and description bound
    pub fn new(
        ledger: Arc<dyn AccountLedger>,
        log: Arc<dyn TransactionLog>,
        directory: Arc<dyn AccountDirectory>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            ledger,
            log,
            directory,
            locks: Arc::new(AccountLocks::new()),
            gate: Arc::new(CommitGate::new()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Run `read` while no commit is in progress
    ///
    /// Balances and histories read inside `read` reflect whole operations only.
    pub fn consistent_read<T>(&self, read: impl FnOnce() -> T) -> T {
        self.gate.read_consistent(read)
    }

    fn validate_amount(&self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(amount, "must be positive"));
        }
        ensure_representable(amount, self.config.amount_scale)
    }

    fn validate_description(&self, description: &str) -> Result<(), LedgerError> {
        let len = description.chars().count();
        if len > self.config.max_description_len {
            return Err(LedgerError::invalid_transfer(&format!(
                "description is {} characters, at most {} allowed",
                len, self.config.max_description_len
            )));
        }
        Ok(())
    }

    fn ensure_owner(&self, customer_id: CustomerId, account_id: AccountId) -> Result<(), LedgerError> {
        if !self.directory.is_owner(customer_id, account_id)? {
            debug!(customer = customer_id, account = account_id, "Ownership check failed");
            return Err(LedgerError::forbidden(customer_id, account_id));
        }
        Ok(())
    }

    fn ensure_open(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        let account = self.ledger.account(account_id)?;
        if account.is_closed() {
            return Err(LedgerError::account_closed(account_id));
        }
        Ok(account)
    }

    /// Undo applied steps in order after `cause` interrupted an operation
    ///
    /// Returns `cause` when every reversal succeeded, otherwise `RollbackFailed`.
    fn roll_back(
        &self,
        accounts: Vec<AccountId>,
        amount: Decimal,
        cause: LedgerError,
        reversals: &[Reversal],
    ) -> LedgerError {
        for reversal in reversals {
            let result = match *reversal {
                Reversal::Credit(account) => self.ledger.credit(account, amount),
                Reversal::Debit(account) => self.ledger.debit(account, amount),
            };

            if let Err(rollback_error) = result {
                error!(
                    accounts = ?accounts,
                    amount = %amount,
                    cause = %cause,
                    rollback_error = %rollback_error,
                    "Rollback failed, manual reconciliation required"
                );
                return LedgerError::rollback_failed(accounts, amount, &cause, &rollback_error);
            }
        }

        warn!(accounts = ?accounts, amount = %amount, cause = %cause, "Operation rolled back");
        cause
    }

    /// Move funds from one of the customer's accounts to another account
    ///
    /// # Arguments
    ///
    /// * `customer_id` - Initiating customer; must own `sender_id`
    /// * `sender_id` - Account to debit
    /// * `request` - Receiver account number, amount and description
    ///
    /// # Returns
    ///
    /// * `Ok(Transaction)` - The committed TRANSFER record
    /// * `Err(LedgerError::InvalidAmount)` - Amount not positive or too precise
    /// * `Err(LedgerError::InvalidTransfer)` - Description too long or self-transfer
    /// * `Err(LedgerError::Forbidden)` - Customer does not own the sender account
    /// * `Err(LedgerError::AccountNumberNotFound)` - Receiver number does not resolve
    /// * `Err(LedgerError::Timeout)` - Account locks not acquired in time
    /// * `Err(LedgerError::AccountClosed)` - Either account is closed
    /// * `Err(LedgerError::InsufficientFunds)` - Sender balance below the amount
    /// * `Err(LedgerError::RollbackFailed)` - A failure could not be compensated
    pub async fn transfer(
        &self,
        customer_id: CustomerId,
        sender_id: AccountId,
        request: TransferRequest,
    ) -> Result<Transaction, LedgerError> {
        let TransferRequest {
            receiver_account_number,
            amount,
            description,
        } = request;

        self.validate_amount(amount)?;
        self.validate_description(&description)?;
        self.ensure_owner(customer_id, sender_id)?;

        let receiver_id = self.directory.resolve_account_number(&receiver_account_number)?;
        if receiver_id == sender_id {
            return Err(LedgerError::invalid_transfer(
                "sender and receiver are the same account",
            ));
        }

        let _locks = self
            .locks
            .acquire(&[sender_id, receiver_id], self.config.lock_timeout)
            .await?;

        self.commit_transfer(sender_id, receiver_id, amount, description)
    }

    fn commit_transfer(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Decimal,
        description: String,
    ) -> Result<Transaction, LedgerError> {
        let sender = self.ensure_open(sender_id)?;
        self.ensure_open(receiver_id)?;
        if sender.balance < amount {
            return Err(LedgerError::insufficient_funds(sender_id, sender.balance, amount));
        }

        let _commit = self.gate.commit();
        self.ledger.debit(sender_id, amount)?;

        if let Err(cause) = self.ledger.credit(receiver_id, amount) {
            return Err(self.roll_back(
                vec![sender_id, receiver_id],
                amount,
                cause,
                &[Reversal::Credit(sender_id)],
            ));
        }

        match self
            .log
            .append(NewTransaction::transfer(sender_id, receiver_id, amount, description))
        {
            Ok(transaction) => {
                info!(
                    tx = %transaction.id,
                    sender = sender_id,
                    receiver = receiver_id,
                    amount = %amount,
                    "Transfer committed"
                );
                Ok(transaction)
            }
            Err(cause) => Err(self.roll_back(
                vec![sender_id, receiver_id],
                amount,
                cause,
                &[Reversal::Debit(receiver_id), Reversal::Credit(sender_id)],
            )),
        }
    }

    /// Apply a single-account movement and record it, reversing the movement if the
    /// record cannot be appended
    fn commit_single(
        &self,
        account_id: AccountId,
        amount: Decimal,
        transaction: NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        let _commit = self.gate.commit();
        let reversal = match transaction.transaction_type {
            TransactionType::Deposit => {
                self.ledger.credit(account_id, amount)?;
                Reversal::Debit(account_id)
            }
            _ => {
                self.ledger.debit(account_id, amount)?;
                Reversal::Credit(account_id)
            }
        };

        match self.log.append(transaction) {
            Ok(transaction) => {
                info!(
                    tx = %transaction.id,
                    kind = ?transaction.transaction_type,
                    account = account_id,
                    amount = %amount,
                    "Movement committed"
                );
                Ok(transaction)
            }
            Err(cause) => Err(self.roll_back(vec![account_id], amount, cause, &[reversal])),
        }
    }

    /// Add external funds to one of the customer's accounts
    ///
    /// Recorded as a DEPOSIT with no sender.
    pub async fn deposit(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, LedgerError> {
        self.validate_amount(amount)?;
        self.validate_description(description)?;
        self.ensure_owner(customer_id, account_id)?;

        let _locks = self
            .locks
            .acquire(&[account_id], self.config.lock_timeout)
            .await?;

        self.commit_single(
            account_id,
            amount,
            NewTransaction::deposit(account_id, amount, description),
        )
    }

    /// Remove funds from one of the customer's accounts
    ///
    /// Recorded as a WITHDRAWAL with no receiver.
    pub async fn withdraw(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, LedgerError> {
        self.validate_amount(amount)?;
        self.validate_description(description)?;
        self.ensure_owner(customer_id, account_id)?;

        let _locks = self
            .locks
            .acquire(&[account_id], self.config.lock_timeout)
            .await?;

        self.commit_single(
            account_id,
            amount,
            NewTransaction::withdrawal(account_id, amount, description),
        )
    }

    /// Remove an account no transaction references, directory entry first
    ///
    /// The directory entry is restored if the ledger refuses the removal, so an account
    /// number never resolves to a missing account.
    fn remove_unused(&self, account: &Account) -> Result<Account, LedgerError> {
        let _commit = self.gate.commit();
        self.directory.unregister_account(account)?;

        match self.ledger.remove_account(account.id) {
            Ok(removed) => Ok(removed),
            Err(cause) => match self.directory.register_account(account) {
                Ok(()) => {
                    warn!(account = account.id, cause = %cause, "Account removal rolled back");
                    Err(cause)
                }
                Err(restore) => {
                    error!(
                        account = account.id,
                        cause = %cause,
                        rollback_error = %restore,
                        "Rollback failed, manual reconciliation required"
                    );
                    Err(LedgerError::rollback_failed(
                        vec![account.id],
                        account.balance,
                        &cause,
                        &restore,
                    ))
                }
            },
        }
    }

    /// Close one of the customer's accounts
    ///
    /// The balance must be zero. An account referenced by any transaction is closed
    /// logically and stays readable; otherwise it is removed from the ledger and the
    /// directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Account)` - Final state of the account
    /// * `Err(LedgerError::AccountNotFound)` - No such account
    /// * `Err(LedgerError::Forbidden)` - Owned by another customer
    /// * `Err(LedgerError::AccountClosed)` - Already closed
    /// * `Err(LedgerError::AccountNotEmpty)` - Balance is not zero
    pub async fn close(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
    ) -> Result<Account, LedgerError> {
        let account = self.ledger.account(account_id)?;
        if account.customer_id != customer_id {
            return Err(LedgerError::forbidden(customer_id, account_id));
        }

        let locks = self
            .locks
            .acquire(&[account_id], self.config.lock_timeout)
            .await?;

        let account = self.ensure_open(account_id)?;
        if !account.balance.is_zero() {
            return Err(LedgerError::AccountNotEmpty {
                account: account_id,
                balance: account.balance,
            });
        }

        if self.log.has_entries(account_id)? {
            let closed = {
                let _commit = self.gate.commit();
                self.ledger.close_account(account_id)?
            };
            info!(account = account_id, customer = customer_id, "Account closed");
            return Ok(closed);
        }

        let removed = self.remove_unused(&account)?;
        drop(locks);
        self.locks.forget(account_id);

        info!(account = account_id, customer = customer_id, "Account removed");
        Ok(removed)
    }
}

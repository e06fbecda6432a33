//! Core traits for the ledger, the transaction log and the account directory
//!
//! The transfer coordinator depends only on these capabilities, injected at
//! construction as `Arc<dyn ...>`. The in-memory implementations in this crate back
//! tests and the replay driver; a durable backend implements the same traits.
//!
//! All methods take `&self`: implementations are shared between concurrent callers and
//! synchronize internally.

use rust_decimal::Decimal;

use crate::types::{
    Account, AccountId, Customer, CustomerId, LedgerError, NewTransaction, Transaction,
    TransactionId,
};

use super::transaction_log::TransactionHistory;

/// Authoritative balance store
///
/// Each single-account mutation is atomic. Keeping a debit/credit pair invisible to
/// other transfers is the coordinator's job (it holds the account locks); reads that
/// span accounts go through `TransferCoordinator::consistent_read` to see whole
/// commits only.
pub trait AccountLedger: Send + Sync {
    /// Open an account with a non-negative initial balance
    fn open_account(
        &self,
        customer_id: CustomerId,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError>;

    /// Get a snapshot of an account
    fn account(&self, account_id: AccountId) -> Result<Account, LedgerError>;

    /// Get the current balance of an account
    fn balance(&self, account_id: AccountId) -> Result<Decimal, LedgerError>;

    /// Decrease the balance, failing with `InsufficientFunds` rather than going negative
    fn debit(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError>;

    /// Increase the balance
    fn credit(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError>;

    /// Mark an account closed; it stays readable
    fn close_account(&self, account_id: AccountId) -> Result<Account, LedgerError>;

    /// Physically remove an account that no transaction references
    fn remove_account(&self, account_id: AccountId) -> Result<Account, LedgerError>;

    /// All accounts owned by a customer, ordered by identifier
    fn accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>, LedgerError>;

    /// All accounts, ordered by identifier
    fn all_accounts(&self) -> Result<Vec<Account>, LedgerError>;
}

/// Append-only record of committed transactions
pub trait TransactionLog: Send + Sync {
    /// Assign identifier and timestamp, store, and return the committed record
    fn append(&self, transaction: NewTransaction) -> Result<Transaction, LedgerError>;

    /// Transactions referencing the account, newest first
    fn list_for_account(&self, account_id: AccountId) -> Result<TransactionHistory, LedgerError>;

    /// A transaction that references the account as sender or receiver
    fn get_by_id(
        &self,
        account_id: AccountId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError>;

    /// Whether any transaction references the account
    fn has_entries(&self, account_id: AccountId) -> Result<bool, LedgerError>;
}

/// Customer registry and account-number/ownership resolution
pub trait AccountDirectory: Send + Sync {
    /// Resolve an account number to its identifier
    fn resolve_account_number(&self, account_number: &str) -> Result<AccountId, LedgerError>;

    /// Whether the customer owns the account; unknown accounts are not owned
    fn is_owner(&self, customer_id: CustomerId, account_id: AccountId) -> Result<bool, LedgerError>;

    /// Make a newly opened account resolvable
    fn register_account(&self, account: &Account) -> Result<(), LedgerError>;

    /// Forget a physically removed account
    fn unregister_account(&self, account: &Account) -> Result<(), LedgerError>;

    /// Register a customer with a unique email
    fn register_customer(&self, email: &str, credential: &str) -> Result<Customer, LedgerError>;

    /// Look up a customer
    fn customer(&self, customer_id: CustomerId) -> Result<Customer, LedgerError>;
}

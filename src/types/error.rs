//! Error types for the bank ledger
//!
//! This module defines every error the ledger core can return. Errors carry enough
//! context (account identifiers, balances, amounts) to be logged as-is and, for
//! failed rollbacks, to drive manual reconciliation.
//!
//! # Error Categories
//!
//! - **Lookup Errors**: unknown accounts, account numbers, customers, transactions
//! - **Business Rule Errors**: ownership, amounts, self-transfers, insufficient funds
//! - **Concurrency Errors**: lock-acquisition timeouts, optimistic-concurrency conflicts
//! - **Persistence Errors**: storage collaborator failures and failed rollbacks
//! - **Replay Errors**: file I/O and CSV parsing in the command replay driver
//!
//! [`LedgerError::kind`] collapses the variants onto a small [`ErrorKind`] taxonomy that
//! a transport layer can map to its own status codes.

use rust_decimal::Decimal;
use thiserror::Error;

use super::account::AccountId;
use super::customer::CustomerId;
use super::transaction::TransactionId;

/// Distinguishable failure categories exposed to callers of the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Account, account number, customer or transaction could not be resolved
    NotFound,
    /// The initiating customer does not own the account
    Forbidden,
    /// Amount is non-positive, negative or not representable at ledger precision
    InvalidAmount,
    /// Request is well-formed but not allowed (self-transfer, closed account, ...)
    InvalidTransfer,
    /// Sender balance is lower than the requested amount
    InsufficientFunds,
    /// Account locks could not be acquired before the deadline
    Timeout,
    /// Optimistic-concurrency collision reported by a ledger backend
    ConflictRetryable,
    /// Storage collaborator failed
    PersistenceFailure,
    /// Request collides with existing state (duplicate email, non-empty account)
    Conflict,
    /// Request data is malformed (bad email, unreadable input)
    InvalidRequest,
}

impl ErrorKind {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::ConflictRetryable)
    }
}

/// Main error type for the bank ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No account with the given identifier exists
    #[error("Account {account} not found")]
    AccountNotFound {
        /// Account identifier that was looked up
        account: AccountId,
    },

    /// No account carries the given account number
    #[error("Account number '{number}' not found")]
    AccountNumberNotFound {
        /// Account number that was looked up
        number: String,
    },

    /// No customer with the given identifier exists
    #[error("Customer {customer} not found")]
    CustomerNotFound {
        /// Customer identifier that was looked up
        customer: CustomerId,
    },

    /// Transaction is absent or does not reference the account
    #[error("Transaction {tx} not found for account {account}")]
    TransactionNotFound {
        /// Account the transaction was requested through
        account: AccountId,
        /// Transaction identifier
        tx: TransactionId,
    },

    /// Initiating customer does not own the account
    #[error("Customer {customer} does not own account {account}")]
    Forbidden {
        /// Initiating customer
        customer: CustomerId,
        /// Account the customer tried to act on
        account: AccountId,
    },

    /// Amount failed validation
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
        /// Why it was rejected
        reason: String,
    },

    /// Transfer request is not allowed
    #[error("Invalid transfer: {reason}")]
    InvalidTransfer {
        /// Why the request was rejected
        reason: String,
    },

    /// Account balance is lower than the requested debit
    #[error(
        "Insufficient funds in account {account}: available {available}, requested {requested}"
    )]
    InsufficientFunds {
        /// Account being debited
        account: AccountId,
        /// Balance at the time of the check
        available: Decimal,
        /// Requested debit
        requested: Decimal,
    },

    /// Account has been logically closed
    #[error("Account {account} is closed")]
    AccountClosed {
        /// Closed account
        account: AccountId,
    },

    /// Account cannot be closed while it still holds funds
    #[error("Account {account} still holds {balance}")]
    AccountNotEmpty {
        /// Account that was asked to close
        account: AccountId,
        /// Remaining balance
        balance: Decimal,
    },

    /// Email is already registered
    #[error("Email '{email}' is already registered")]
    DuplicateEmail {
        /// The duplicate email
        email: String,
    },

    /// Email is malformed
    #[error("Invalid email '{email}'")]
    InvalidEmail {
        /// The rejected email
        email: String,
    },

    /// Balance arithmetic would overflow
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Account being updated
        account: AccountId,
    },

    /// Account locks were not acquired in time
    #[error("Timed out after {waited_ms}ms waiting for accounts {accounts:?}")]
    Timeout {
        /// Accounts the operation needed exclusive access to
        accounts: Vec<AccountId>,
        /// Configured wait bound in milliseconds
        waited_ms: u64,
    },

    /// Ledger backend detected a concurrent modification
    #[error("Concurrent modification of account {account}, retry the operation")]
    ConflictRetryable {
        /// Account whose version changed underneath the operation
        account: AccountId,
    },

    /// Storage collaborator failed; the current attempt was abandoned
    #[error("Persistence failure during {operation}: {message}")]
    PersistenceFailure {
        /// Operation that failed
        operation: String,
        /// Backend error message
        message: String,
    },

    /// A compensating rollback failed; ledger state needs manual reconciliation
    #[error(
        "Rollback failed for {amount} between accounts {accounts:?}: {cause}; manual reconciliation required"
    )]
    RollbackFailed {
        /// Accounts touched by the abandoned operation
        accounts: Vec<AccountId>,
        /// Amount the operation attempted to move
        amount: Decimal,
        /// Error that interrupted the operation followed by the rollback error
        cause: String,
    },

    /// I/O error while reading or writing replay files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error in replay input
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl LedgerError {
    /// Category of this error for transport-level mapping
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound { .. }
            | LedgerError::AccountNumberNotFound { .. }
            | LedgerError::CustomerNotFound { .. }
            | LedgerError::TransactionNotFound { .. } => ErrorKind::NotFound,
            LedgerError::Forbidden { .. } => ErrorKind::Forbidden,
            LedgerError::InvalidAmount { .. } | LedgerError::ArithmeticOverflow { .. } => {
                ErrorKind::InvalidAmount
            }
            LedgerError::InvalidTransfer { .. } | LedgerError::AccountClosed { .. } => {
                ErrorKind::InvalidTransfer
            }
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::Timeout { .. } => ErrorKind::Timeout,
            LedgerError::ConflictRetryable { .. } => ErrorKind::ConflictRetryable,
            LedgerError::PersistenceFailure { .. } | LedgerError::RollbackFailed { .. } => {
                ErrorKind::PersistenceFailure
            }
            LedgerError::AccountNotEmpty { .. } | LedgerError::DuplicateEmail { .. } => {
                ErrorKind::Conflict
            }
            LedgerError::InvalidEmail { .. }
            | LedgerError::IoError { .. }
            | LedgerError::ParseError { .. } => ErrorKind::InvalidRequest,
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    /// Create an AccountNumberNotFound error
    pub fn account_number_not_found(number: &str) -> Self {
        LedgerError::AccountNumberNotFound {
            number: number.to_string(),
        }
    }

    /// Create a CustomerNotFound error
    pub fn customer_not_found(customer: CustomerId) -> Self {
        LedgerError::CustomerNotFound { customer }
    }

    /// Create a TransactionNotFound error
    pub fn transaction_not_found(account: AccountId, tx: TransactionId) -> Self {
        LedgerError::TransactionNotFound { account, tx }
    }

    /// Create a Forbidden error
    pub fn forbidden(customer: CustomerId, account: AccountId) -> Self {
        LedgerError::Forbidden { customer, account }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            reason: reason.to_string(),
        }
    }

    /// Create an InvalidTransfer error
    pub fn invalid_transfer(reason: &str) -> Self {
        LedgerError::InvalidTransfer {
            reason: reason.to_string(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            available,
            requested,
        }
    }

    /// Create an AccountClosed error
    pub fn account_closed(account: AccountId) -> Self {
        LedgerError::AccountClosed { account }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Create a PersistenceFailure error
    pub fn persistence_failure(operation: &str, message: impl Into<String>) -> Self {
        LedgerError::PersistenceFailure {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Create a RollbackFailed error from the interrupting error and the rollback error
    pub fn rollback_failed(
        accounts: Vec<AccountId>,
        amount: Decimal,
        original: &LedgerError,
        rollback: &LedgerError,
    ) -> Self {
        LedgerError::RollbackFailed {
            accounts,
            amount,
            cause: format!("{}; rollback: {}", original, rollback),
        }
    }
}

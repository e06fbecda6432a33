//! Transaction-related types for the bank ledger
//!
//! This module defines the immutable transaction records kept by the transaction log,
//! the transfer request accepted by the coordinator, and the command records replayed
//! by the CLI.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountId;
use super::customer::CustomerId;

/// Transaction identifier
pub type TransactionId = Uuid;

/// Kinds of money movement recorded in the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Funds moved between two ledger accounts
    Transfer,

    /// Funds entering a ledger account from outside
    Deposit,

    /// Funds leaving a ledger account to the outside
    Withdrawal,
}

/// A committed transaction
///
/// Created exactly once per successful operation and never modified afterwards.
/// The external side of a deposit (sender) or withdrawal (receiver) is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub sender_account_id: Option<AccountId>,
    pub receiver_account_id: Option<AccountId>,
    pub amount: Decimal,
    pub description: String,
    pub transaction_type: TransactionType,
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// Whether the transaction moves funds into or out of the account
    pub fn references(&self, account: AccountId) -> bool {
        self.sender_account_id == Some(account) || self.receiver_account_id == Some(account)
    }
}

/// A transaction about to be appended to the log
///
/// The log assigns the identifier and timestamp on append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub sender_account_id: Option<AccountId>,
    pub receiver_account_id: Option<AccountId>,
    pub amount: Decimal,
    pub description: String,
    pub transaction_type: TransactionType,
}

impl NewTransaction {
    pub fn transfer(
        sender: AccountId,
        receiver: AccountId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        NewTransaction {
            sender_account_id: Some(sender),
            receiver_account_id: Some(receiver),
            amount,
            description: description.into(),
            transaction_type: TransactionType::Transfer,
        }
    }

    pub fn deposit(account: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        NewTransaction {
            sender_account_id: None,
            receiver_account_id: Some(account),
            amount,
            description: description.into(),
            transaction_type: TransactionType::Deposit,
        }
    }

    pub fn withdrawal(account: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        NewTransaction {
            sender_account_id: Some(account),
            receiver_account_id: None,
            amount,
            description: description.into(),
            transaction_type: TransactionType::Withdrawal,
        }
    }

    /// Turn into a committed record with the assigned identifier and timestamp
    pub fn commit(self, id: TransactionId, date: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            sender_account_id: self.sender_account_id,
            receiver_account_id: self.receiver_account_id,
            amount: self.amount,
            description: self.description,
            transaction_type: self.transaction_type,
            date,
        }
    }
}

/// Request to move funds out of one of the caller's accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Account number of the receiving account
    pub receiver_account_number: String,

    /// Amount to move, strictly positive
    pub amount: Decimal,

    /// Free-text description, bounded in length
    pub description: String,
}

impl TransferRequest {
    pub fn new(
        receiver_account_number: impl Into<String>,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        TransferRequest {
            receiver_account_number: receiver_account_number.into(),
            amount,
            description: description.into(),
        }
    }
}

/// Command types understood by the replay driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Register a customer (description carries the email)
    Register,

    /// Open an account (amount carries the initial balance)
    Open,

    /// Deposit into an owned account
    Deposit,

    /// Withdraw from an owned account
    Withdrawal,

    /// Transfer from an owned account to an account number
    Transfer,

    /// Close an owned account
    Close,
}

/// One replayed command
///
/// Field usage depends on the command type; unused fields are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    /// The command to run
    pub command: CommandType,

    /// Initiating customer (unused by `register`)
    pub customer: Option<CustomerId>,

    /// Account the command acts on
    pub account: Option<AccountId>,

    /// Receiver account number for transfers
    pub target: Option<String>,

    /// Amount with ledger precision
    pub amount: Option<Decimal>,

    /// Description, or the email for `register`
    pub description: Option<String>,
}

impl CommandRecord {
    /// Whether this command creates state other commands in the same batch may depend on
    pub fn is_setup(&self) -> bool {
        matches!(self.command, CommandType::Register | CommandType::Open)
    }
}

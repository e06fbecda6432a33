//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account state and account-number format
//! - `customer`: Registered customers
//! - `transaction`: Transaction records, transfer requests and replay commands
//! - `error`: Error types for the ledger

pub mod account;
pub mod customer;
pub mod error;
pub mod transaction;

pub use account::{
    generate_account_number, is_well_formed_account_number, Account, AccountId,
    ACCOUNT_NUMBER_LEN,
};
pub use customer::{Customer, CustomerId};
pub use error::{ErrorKind, LedgerError};
pub use transaction::{
    CommandRecord, CommandType, NewTransaction, Transaction, TransactionId, TransactionType,
    TransferRequest,
};

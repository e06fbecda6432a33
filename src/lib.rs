//! Bank Ledger Library
//! # Overview
//!
//! This library provides a money-transfer and balance-consistency core: an account
//! ledger, an append-only transaction log and a transfer coordinator that moves funds
//! between accounts atomically under concurrent access.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Customer, Transaction, errors)
//! - [`config`] - Ledger configuration
//! - [`core`] - Business logic components:
//!   - [`core::traits`] - Ledger, log and directory capabilities
//!   - [`core::coordinator`] - Validated, locked and compensated money movement
//!   - [`core::lock_manager`] - Ordered per-account locks with bounded waits
//!   - [`core::bank`] - Customer-facing facade
//! - [`io`] - Replay CSV parsing and account-state output
//! - [`strategy`] - Sequential and concurrent replay pipelines
//! - [`cli`] / [`logging`] - Replay binary support
//!
//! # Guarantees
//!
//! - A committed transfer debits the sender and credits the receiver by the same amount
//!   and appends exactly one TRANSFER record
//! - A failed attempt leaves balances and the log unchanged, or reports
//!   `RollbackFailed` with the accounts and amount involved
//! - Balances never go negative
//! - Transfers sharing an account behave as if run one after another; locks are
//!   taken in ascending account order and waits are bounded

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use config::LedgerConfig;
pub use core::{
    AccountDirectory, AccountLedger, Bank, InMemoryDirectory, InMemoryLedger,
    InMemoryTransactionLog, TransactionHistory, TransactionLog, TransferCoordinator,
};
pub use io::write_accounts_csv;
pub use types::{
    Account, AccountId, Customer, CustomerId, ErrorKind, LedgerError, Transaction,
    TransactionId, TransactionType, TransferRequest,
};

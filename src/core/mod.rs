//! Core business logic module
//!
//! This module contains the ledger core components:
//! - `traits` - Ledger, transaction log and directory abstractions
//! - `ledger` - In-memory account ledger
//! - `transaction_log` - Append-only transaction log and history views
//! - `directory` - Customer registry, account numbers and ownership
//! - `lock_manager` - Per-account locks with ordered, bounded acquisition and the commit gate
//! - `coordinator` - Transfers, deposits, withdrawals and closures
//! - `bank` - Customer-facing facade and replay command dispatch
//! - `batch_processor` - Batch execution partitioned by connected customers

pub mod bank;
pub mod batch_processor;
pub mod coordinator;
pub mod directory;
pub mod ledger;
pub mod lock_manager;
pub mod traits;
pub mod transaction_log;

pub use bank::{Bank, CommandOutcome};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use coordinator::TransferCoordinator;
pub use directory::InMemoryDirectory;
pub use ledger::InMemoryLedger;
pub use lock_manager::{AccountLockSet, AccountLocks, CommitGate};
pub use traits::{AccountDirectory, AccountLedger, TransactionLog};
pub use transaction_log::{InMemoryTransactionLog, TransactionHistory, TransactionLookup};

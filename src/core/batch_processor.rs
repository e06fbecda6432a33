//! Batch execution of replayed commands with account-group partitioning
//!
//! This module provides the `BatchProcessor` struct, which runs one batch of replayed
//! commands against a shared `Bank`.
//!
//! # Design
//!
//! `register` and `open` commands are barriers. Later commands refer to the customer
//! and account identifiers they assign, so every command before a barrier finishes
//! before it runs, and every command after it starts afterwards.
//!
//! The money-movement commands between two barriers form a segment. A segment is split
//! into groups of customers whose accounts are connected: a command links its customer
//! to the owner of the account it names and, for transfers, to the owner of the target
//! account. Each group runs on its own tokio task in file order, so no command can
//! observe the effect of a command from another group. The replay therefore ends in the
//! same state as running the whole batch in file order.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── Bank  (cloneable; shares ledger, log, directory and lock table)
//! ```

use std::collections::HashMap;

use tracing::{debug, error, warn};

use super::bank::{Bank, CommandOutcome};
use crate::types::{CommandRecord, CustomerId, LedgerError};

/// Result of executing a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The command that was executed
    pub record: CommandRecord,

    /// What it produced, or why it failed
    pub result: Result<CommandOutcome, LedgerError>,
}

/// Disjoint sets of customers whose commands must not be reordered
#[derive(Debug, Default)]
struct CustomerGroups {
    parent: HashMap<CustomerId, CustomerId>,
}

impl CustomerGroups {
    /// Representative of the customer's group; the smallest member once merged
    fn find(&mut self, customer: CustomerId) -> CustomerId {
        let mut root = customer;
        while let Some(&parent) = self.parent.get(&root) {
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut current = customer;
        while current != root {
            let next = self.parent.get(&current).copied().unwrap_or(root);
            self.parent.insert(current, root);
            current = next;
        }
        root
    }

    fn union(&mut self, a: CustomerId, b: CustomerId) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            self.parent.insert(root_a.max(root_b), root_a.min(root_b));
        }
    }
}

/// Batch processor with account-group partitioning
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    bank: Bank,
}

impl BatchProcessor {
    pub fn new(bank: Bank) -> Self {
        Self { bank }
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    /// Split money-movement commands into independent partitions
    ///
    /// Account owners are resolved against the current ledger state, so the commands
    /// must not contain barriers.
    ///
    /// # Guarantees
    ///
    /// - Every command appears exactly once in the output
    /// - Commands of connected customers share a partition and keep their order
    /// - Commands without a customer each get a partition of their own
    /// - Partitions are ordered by their first command
    pub fn partition(&self, batch: Vec<CommandRecord>) -> Vec<Vec<CommandRecord>> {
        let mut groups = CustomerGroups::default();
        for record in &batch {
            if let Some(customer) = record.customer {
                for owner in self.owners_named(record) {
                    groups.union(customer, owner);
                }
            }
        }

        let mut slots: HashMap<CustomerId, usize> = HashMap::new();
        let mut partitions: Vec<Vec<CommandRecord>> = Vec::new();
        for record in batch {
            match record.customer {
                Some(customer) => {
                    let root = groups.find(customer);
                    let slot = *slots.entry(root).or_insert_with(|| {
                        partitions.push(Vec::new());
                        partitions.len() - 1
                    });
                    partitions[slot].push(record);
                }
                None => partitions.push(vec![record]),
            }
        }

        partitions
    }

    /// Owners of the accounts a command names; unknown accounts are skipped
    fn owners_named(&self, record: &CommandRecord) -> Vec<CustomerId> {
        let account_owner = record
            .account
            .and_then(|account| self.bank.account_owner(account).ok());
        let target_owner = record
            .target
            .as_deref()
            .and_then(|number| self.bank.account_number_owner(number).ok());
        account_owner.into_iter().chain(target_owner).collect()
    }

    /// Execute one command, logging a rejection instead of propagating it
    pub async fn process_one(&self, record: CommandRecord) -> ProcessingResult {
        let result = self.bank.execute(record.clone()).await;
        match &result {
            Ok(outcome) => debug!(command = ?record.command, ?outcome, "Command executed"),
            Err(err) => warn!(
                command = ?record.command,
                customer = ?record.customer,
                account = ?record.account,
                kind = ?err.kind(),
                error = %err,
                "Command rejected"
            ),
        }
        ProcessingResult { record, result }
    }

    /// Execute commands one after another in the given order
    ///
    /// Failures are captured; they do not stop the sequence.
    pub async fn process_sequence(&self, records: Vec<CommandRecord>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.process_one(record).await);
        }
        results
    }

    /// Execute one segment of money-movement commands, one task per partition
    pub async fn process_partitions(&self, records: Vec<CommandRecord>) -> Vec<ProcessingResult> {
        let mut partitions = self.partition(records);
        if partitions.len() <= 1 {
            return match partitions.pop() {
                Some(records) => self.process_sequence(records).await,
                None => Vec::new(),
            };
        }

        debug!(partitions = partitions.len(), "Running partitions");
        let mut tasks = Vec::with_capacity(partitions.len());
        for records in partitions {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_sequence(records).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(partition_results) => results.extend(partition_results),
                Err(e) => error!(error = %e, "Partition task failed"),
            }
        }
        results
    }

    /// Execute a batch, running barriers in file order between concurrent segments
    ///
    /// Results of a segment come before the barrier that ends it; within a segment
    /// they are grouped by partition.
    pub async fn process_batch(&self, batch: Vec<CommandRecord>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(batch.len());
        let mut segment = Vec::new();

        for record in batch {
            if record.is_setup() {
                results.extend(self.process_partitions(std::mem::take(&mut segment)).await);
                results.push(self.process_one(record).await);
            } else {
                segment.push(record);
            }
        }
        results.extend(self.process_partitions(segment).await);

        results
    }
}

//! Sequential replay strategy
//!
//! Streams commands with the synchronous `SyncReader` and executes each one before
//! reading the next, on a current-thread tokio runtime. The result is fully
//! deterministic: commands take effect in file order.

use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use super::{write_accounts, ProcessingStrategy, ReplayOptions};
use crate::core::{Bank, BatchProcessor};
use crate::io::SyncReader;
use crate::types::LedgerError;

/// Replays commands one at a time in file order
#[derive(Debug, Clone, Default)]
pub struct SequentialReplayStrategy {
    options: ReplayOptions,
}

impl SequentialReplayStrategy {
    pub fn new(options: ReplayOptions) -> Self {
        Self { options }
    }
}

impl ProcessingStrategy for SequentialReplayStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| LedgerError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        let reader = SyncReader::new(input_path)?;
        let processor = BatchProcessor::new(Bank::in_memory(self.options.ledger.clone()));

        let (executed, rejected) = runtime.block_on(async {
            let mut executed = 0usize;
            let mut rejected = 0usize;

            for row in reader {
                match row {
                    Ok(record) => {
                        if processor.process_one(record).await.result.is_ok() {
                            executed += 1;
                        } else {
                            rejected += 1;
                        }
                    }
                    Err(e) => warn!(error = %e, "Skipping invalid row"),
                }
            }

            (executed, rejected)
        });

        info!(executed, rejected, "Replay finished");
        write_accounts(processor.bank(), &self.options, output)
    }
}

//! Replay strategy module
//!
//! This module defines the Strategy pattern for complete replay pipelines, covering CSV
//! parsing, command execution against a fresh in-memory `Bank` and output of the final
//! account states. The implementation (sequential, concurrent batch) is selected at
//! runtime.

use std::io::Write;
use std::path::Path;

use crate::cli::{OutputFormat, StrategyType};
use crate::config::LedgerConfig;
use crate::core::Bank;
use crate::io::{write_accounts_csv, write_accounts_json};
use crate::types::LedgerError;

pub mod concurrent;
pub mod sequential;

pub use concurrent::{BatchConfig, ConcurrentReplayStrategy};
pub use sequential::SequentialReplayStrategy;

/// Replay pipeline
///
/// Each strategy reads commands from a CSV file, runs them against its own `Bank` and
/// writes the final account states to the output.
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the commands in `input_path` and write account states to `output`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Replay finished, possibly with rejected commands
    /// * `Err(LedgerError)` - Fatal failure (input unreadable, output unwritable)
    ///
    /// Individual command failures are logged and do not stop the replay.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError>;
}

/// Settings shared by every strategy
#[derive(Clone, Debug, Default)]
pub struct ReplayOptions {
    pub ledger: LedgerConfig,
    pub format: OutputFormat,
}

/// Write the bank's final account states in the requested format
pub(crate) fn write_accounts(
    bank: &Bank,
    options: &ReplayOptions,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let accounts = bank.accounts_snapshot()?;
    match options.format {
        OutputFormat::Csv => write_accounts_csv(&accounts, options.ledger.amount_scale, output),
        OutputFormat::Json => write_accounts_json(&accounts, options.ledger.amount_scale, output),
    }
}

/// Create a replay strategy
///
/// # Arguments
///
/// * `strategy_type` - Sequential or concurrent replay
/// * `options` - Ledger configuration and output format
/// * `batch_config` - Batch settings for the concurrent strategy (ignored otherwise)
pub fn create_strategy(
    strategy_type: StrategyType,
    options: ReplayOptions,
    batch_config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sequential => Box::new(SequentialReplayStrategy::new(options)),
        StrategyType::Concurrent => Box::new(ConcurrentReplayStrategy::new(
            options,
            batch_config.unwrap_or_default(),
        )),
    }
}

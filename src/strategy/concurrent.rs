//! Concurrent batch replay strategy
//!
//! Reads commands in batches with the `csv-async` reader and hands each batch to a
//! `BatchProcessor`, which runs `register` and `open` commands in file order and the
//! money movements between them as one task per group of connected customers, on a
//! multi-threaded tokio runtime.
//!
//! Batches are processed one after another, so a command never overtakes a command of
//! an earlier batch. The final state matches the sequential strategy.

use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use super::{write_accounts, ProcessingStrategy, ReplayOptions};
use crate::core::{Bank, BatchProcessor};
use crate::io::AsyncReader;
use crate::types::LedgerError;

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Worker threads of the replay runtime
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, replacing zero values with defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                default = default.batch_size,
                "Invalid batch_size (0), using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                default = default.max_concurrent_batches,
                "Invalid max_concurrent_batches (0), using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Replays commands in batches partitioned by connected customers
#[derive(Debug, Clone)]
pub struct ConcurrentReplayStrategy {
    options: ReplayOptions,
    config: BatchConfig,
}

impl ConcurrentReplayStrategy {
    pub fn new(options: ReplayOptions, config: BatchConfig) -> Self {
        Self { options, config }
    }
}

impl ProcessingStrategy for ConcurrentReplayStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .enable_time()
            .build()
            .map_err(|e| LedgerError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        let processor = BatchProcessor::new(Bank::in_memory(self.options.ledger.clone()));

        runtime.block_on(async {
            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| LedgerError::IoError {
                    message: format!("Failed to open file '{}': {}", input_path.display(), e),
                })?;

            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut batches = 0usize;
            let mut executed = 0usize;
            let mut rejected = 0usize;

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                batches += 1;
                for result in processor.process_batch(batch).await {
                    if result.result.is_ok() {
                        executed += 1;
                    } else {
                        rejected += 1;
                    }
                }
            }

            info!(batches, executed, rejected, "Replay finished");
            Ok::<(), LedgerError>(())
        })?;

        write_accounts(processor.bank(), &self.options, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_concurrent_batches, num_cpus::get());
    }

    #[rstest]
    #[case::valid(50, 4, 50, 4)]
    #[case::zero_batch(0, 4, 1000, 4)]
    fn test_batch_config_new(
        #[case] batch_size: usize,
        #[case] max_concurrent: usize,
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = BatchConfig::new(batch_size, max_concurrent);
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_batch_config_zero_concurrency_falls_back() {
        let config = BatchConfig::new(10, 0);
        assert_eq!(config.max_concurrent_batches, num_cpus::get());
    }

    #[test]
    fn test_concurrent_strategy_replays_across_batches() {
        let file = create_temp_csv(
            "type,customer,account,target,amount,description\n\
             register,,,,,alice@example.com\n\
             register,,,,,bob@example.com\n\
             open,1,,,100,\n\
             open,2,,,50,\n\
             withdrawal,1,1,,30,\n\
             deposit,2,2,,25,\n\
             withdrawal,1,1,,20,\n",
        );
        let strategy = ConcurrentReplayStrategy::new(ReplayOptions::default(), BatchConfig::new(2, 2));
        let mut output = Vec::new();

        strategy.process(file.path(), &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,customer,number,balance,status\n\
             1,1,4000000000000010,50.00,open\n\
             2,2,4000000000000028,75.00,open\n"
        );
    }

    #[test]
    fn test_concurrent_strategy_handles_missing_file() {
        let strategy = ConcurrentReplayStrategy::new(ReplayOptions::default(), BatchConfig::default());
        let mut output = Vec::new();

        let result = strategy.process(Path::new("nonexistent.csv"), &mut output);

        match result {
            Err(LedgerError::IoError { message }) => {
                assert!(message.contains("Failed to open file"))
            }
            other => panic!("expected IoError, got {:?}", other),
        }
    }
}

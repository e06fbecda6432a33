//! Bank Ledger replay CLI
//!
//! Replays customer, account and money-movement commands from a CSV file against an
//! in-memory ledger and prints the final account states.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > accounts.csv
//! cargo run -- --strategy concurrent --batch-size 2000 commands.csv > accounts.csv
//! cargo run -- --format json --log-level info commands.csv
//! ```
//!
//! # Replay Strategies
//!
//! - **sequential**: Commands run one at a time in file order (default)
//! - **concurrent**: Batches partitioned by connected customers on a multi-threaded runtime
//!
//! # Exit Codes
//!
//! - 0: Success (rejected commands are logged, not fatal)
//! - 1: Error (missing arguments, file not found, output not writable, etc.)

use bank_ledger::cli;
use bank_ledger::logging;
use bank_ledger::strategy::{self, ReplayOptions};
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();

    if let Err(e) = logging::init_logging(&args.log_level, args.log_format) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let options = ReplayOptions {
        ledger: args.to_ledger_config(),
        format: args.format,
    };
    let batch_config = match args.strategy {
        cli::StrategyType::Concurrent => Some(args.to_batch_config()),
        cli::StrategyType::Sequential => None,
    };
    let strategy = strategy::create_strategy(args.strategy, options, batch_config);

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!(error = %e, "Replay failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

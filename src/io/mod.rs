//! I/O module
//!
//! Handles replay CSV parsing and account-state output.
//!
//! # Components
//!
//! - `csv_format` - Record conversion and CSV/JSON output
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_csv_record, write_accounts_csv, write_accounts_json, AccountRow, CsvRecord,
};
pub use sync_reader::SyncReader;

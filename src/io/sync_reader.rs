//! Synchronous CSV reader for replay files
//!
//! `SyncReader` streams commands from a file one row at a time, so memory use does not
//! grow with file size.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::{CommandRecord, LedgerError};

/// Streaming reader yielding one command per data row
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,

    /// Data rows consumed so far; the header is line 1
    line_num: u64,
}

impl SyncReader {
    /// Open a replay file
    ///
    /// # Returns
    ///
    /// * `Err(LedgerError::IoError)` - The file cannot be opened
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| LedgerError::IoError {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<CommandRecord, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CsvRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;
        let line = self.line_num + 1;

        let result = row
            .map_err(LedgerError::from)
            .and_then(convert_csv_record)
            .map_err(|err| match err {
                LedgerError::ParseError { message, .. } => LedgerError::ParseError {
                    line: Some(line),
                    message,
                },
                other => other,
            });

        Some(result)
    }
}

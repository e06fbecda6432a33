//! Replay file formats
//!
//! This module converts raw CSV rows into `CommandRecord`s and renders final account
//! states as CSV or JSON.
//!
//! # Input Format
//!
//! ```text
//! type,customer,account,target,amount,description
//! register,,,,,alice@example.com
//! open,1,,,1000,
//! transfer,1,1,4000000000000028,250.50,rent
//! ```
//!
//! Types are case-insensitive. Columns a command does not use may be left empty.
//!
//! # Output Format
//!
//! ```text
//! account,customer,number,balance,status
//! 1,1,4000000000000010,749.50,open
//! ```

use std::io::Write;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Account, AccountId, CommandRecord, CommandType, CustomerId, LedgerError};

/// Raw CSV row as read from the replay file
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub command: String,
    pub customer: Option<CustomerId>,
    pub account: Option<AccountId>,
    pub target: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
}

fn parse_error(message: String) -> LedgerError {
    LedgerError::ParseError {
        line: None,
        message,
    }
}

/// Convert a raw CSV row into a validated command
///
/// # Returns
///
/// * `Ok(CommandRecord)` - Known command type with a parseable amount
/// * `Err(LedgerError::ParseError)` - Unknown type or malformed amount
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<CommandRecord, LedgerError> {
    let command = match csv_record.command.trim().to_lowercase().as_str() {
        "register" => CommandType::Register,
        "open" => CommandType::Open,
        "deposit" => CommandType::Deposit,
        "withdrawal" => CommandType::Withdrawal,
        "transfer" => CommandType::Transfer,
        "close" => CommandType::Close,
        _ => {
            return Err(parse_error(format!(
                "Invalid command type: '{}'",
                csv_record.command
            )))
        }
    };

    let amount = match csv_record.amount {
        Some(amount_str) if !amount_str.trim().is_empty() => {
            let amount = Decimal::from_str(amount_str.trim())
                .map_err(|_| parse_error(format!("Invalid amount '{}'", amount_str)))?;
            Some(amount)
        }
        _ => None,
    };

    let non_empty = |value: Option<String>| {
        value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    Ok(CommandRecord {
        command,
        customer: csv_record.customer,
        account: csv_record.account,
        target: non_empty(csv_record.target),
        amount,
        description: non_empty(csv_record.description),
    })
}

/// One row of replay output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRow {
    pub account: AccountId,
    pub customer: CustomerId,
    pub number: String,
    /// Balance rendered with exactly the ledger's number of decimal places
    pub balance: String,
    pub status: &'static str,
}

impl AccountRow {
    pub fn from_account(account: &Account, scale: u32) -> Self {
        AccountRow {
            account: account.id,
            customer: account.customer_id,
            number: account.account_number.clone(),
            balance: format!("{:.*}", scale as usize, account.balance),
            status: if account.is_closed() { "closed" } else { "open" },
        }
    }
}

fn rows(accounts: &[Account], scale: u32) -> Vec<AccountRow> {
    let mut sorted = accounts.to_vec();
    sorted.sort_by_key(|account| account.id);
    sorted
        .iter()
        .map(|account| AccountRow::from_account(account, scale))
        .collect()
}

/// Write account states as CSV, sorted by account identifier
///
/// # Arguments
///
/// * `accounts` - Final account states
/// * `scale` - Decimal places for balances
/// * `output` - Destination writer
pub fn write_accounts_csv(
    accounts: &[Account],
    scale: u32,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    // Header is written explicitly so an empty ledger still produces one
    writer.write_record(["account", "customer", "number", "balance", "status"])?;
    for row in rows(accounts, scale) {
        writer.write_record([
            row.account.to_string(),
            row.customer.to_string(),
            row.number,
            row.balance,
            row.status.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write account states as a JSON array, sorted by account identifier
pub fn write_accounts_json(
    accounts: &[Account],
    scale: u32,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    serde_json::to_writer_pretty(&mut *output, &rows(accounts, scale)).map_err(|e| {
        LedgerError::IoError {
            message: format!("Failed to write JSON output: {}", e),
        }
    })?;
    writeln!(output)?;
    Ok(())
}

//! Account-related types for the bank ledger
//!
//! This module defines the Account structure and the account-number format.
//!
//! # Account Numbers
//!
//! Account numbers are 16-digit numeric strings built from a configurable issuer
//! prefix, the zero-padded account identifier and a trailing Luhn check digit:
//!
//! ```text
//! 4000 00000000001 0
//! ^^^^ ^^^^^^^^^^^ ^
//! prefix   id      check digit
//! ```
//!
//! Because the identifier is embedded, numbers are unique for as long as identifiers
//! are, and the check digit lets callers reject mistyped numbers before a lookup.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::customer::CustomerId;

/// Account identifier
///
/// Assigned by the ledger in ascending order; lock ordering relies on it.
pub type AccountId = u64;

/// Number of digits in a well-formed account number
pub const ACCOUNT_NUMBER_LEN: usize = 16;

/// Customer account state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique account identifier
    pub id: AccountId,

    /// Owning customer
    pub customer_id: CustomerId,

    /// Unique 16-digit account number
    pub account_number: String,

    /// Current balance, never negative after a committed operation
    pub balance: Decimal,

    /// When the account was opened
    pub created_at: DateTime<Utc>,

    /// When the account was logically closed
    ///
    /// Closed accounts stay readable (their transactions still reference them) but
    /// reject further debits and credits.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new open account
    pub fn new(
        id: AccountId,
        customer_id: CustomerId,
        account_number: String,
        initial_balance: Decimal,
    ) -> Self {
        Account {
            id,
            customer_id,
            account_number,
            balance: initial_balance,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    /// Whether the account has been logically closed
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// Build the account number for an account identifier
///
/// Returns `None` when the prefix is not numeric, is too long, or the identifier does
/// not fit in the digits left between prefix and check digit.
pub fn generate_account_number(prefix: &str, id: AccountId) -> Option<String> {
    if !prefix.chars().all(|c| c.is_ascii_digit()) || prefix.len() >= ACCOUNT_NUMBER_LEN - 1 {
        return None;
    }

    let width = ACCOUNT_NUMBER_LEN - 1 - prefix.len();
    let digits = id.to_string();
    if digits.len() > width {
        return None;
    }

    let payload = format!("{}{:0>width$}", prefix, digits, width = width);
    let check = luhn_check_digit(&payload);
    Some(format!("{}{}", payload, check))
}

/// Whether a string is a well-formed account number
///
/// Checks length, that every character is a digit, and the Luhn check digit.
pub fn is_well_formed_account_number(number: &str) -> bool {
    if number.len() != ACCOUNT_NUMBER_LEN || !number.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let (payload, check) = number.split_at(ACCOUNT_NUMBER_LEN - 1);
    check.chars().next().and_then(|c| c.to_digit(10)) == Some(luhn_check_digit(payload))
}

fn luhn_check_digit(payload: &str) -> u32 {
    // Rightmost payload digit sits next to the check digit, so it is doubled.
    let sum: u32 = payload
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    (10 - sum % 10) % 10
}

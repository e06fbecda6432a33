//! Ledger configuration
//!
//! Controls the bounded lock wait, the fixed-point precision of amounts, the maximum
//! description length and the issuer prefix of generated account numbers.

use std::time::Duration;

use tracing::warn;

use crate::types::ACCOUNT_NUMBER_LEN;

/// Largest supported number of decimal places for amounts
pub const MAX_AMOUNT_SCALE: u32 = 10;

/// Configuration for the ledger core
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerConfig {
    /// Upper bound on waiting for account locks before failing with `Timeout`
    pub lock_timeout: Duration,
    /// Number of decimal places amounts may carry
    pub amount_scale: u32,
    /// Maximum description length in characters
    pub max_description_len: usize,
    /// Leading digits of every generated account number
    pub account_number_prefix: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            amount_scale: 2,
            max_description_len: 255,
            account_number_prefix: "4000".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Create a new LedgerConfig, replacing invalid values with defaults
    pub fn new(
        lock_timeout: Duration,
        amount_scale: u32,
        max_description_len: usize,
        account_number_prefix: &str,
    ) -> Self {
        let default = Self::default();

        let lock_timeout = if lock_timeout.is_zero() {
            warn!(
                default = ?default.lock_timeout,
                "Invalid lock_timeout (0), using default"
            );
            default.lock_timeout
        } else {
            lock_timeout
        };

        let amount_scale = if amount_scale > MAX_AMOUNT_SCALE {
            warn!(
                amount_scale,
                default = default.amount_scale,
                "Invalid amount_scale, using default"
            );
            default.amount_scale
        } else {
            amount_scale
        };

        let max_description_len = if max_description_len == 0 {
            warn!(
                default = default.max_description_len,
                "Invalid max_description_len (0), using default"
            );
            default.max_description_len
        } else {
            max_description_len
        };

        // Keep at least eight digits for the account identifier.
        let prefix_ok = !account_number_prefix.is_empty()
            && account_number_prefix.len() <= ACCOUNT_NUMBER_LEN - 9
            && account_number_prefix.chars().all(|c| c.is_ascii_digit());
        let account_number_prefix = if prefix_ok {
            account_number_prefix.to_string()
        } else {
            warn!(
                prefix = account_number_prefix,
                default = %default.account_number_prefix,
                "Invalid account_number_prefix, using default"
            );
            default.account_number_prefix
        };

        Self {
            lock_timeout,
            amount_scale,
            max_description_len,
            account_number_prefix,
        }
    }
}

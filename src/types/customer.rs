//! Customer-related types for the bank ledger

use serde::{Deserialize, Serialize};

/// Customer identifier
pub type CustomerId = u32;

/// A registered customer
///
/// Credential material is opaque to the ledger: it is stored as handed over by the
/// registration flow and never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Unique customer identifier
    pub id: CustomerId,

    /// Unique email, stored lowercased
    pub email: String,

    #[serde(skip)]
    pub credential: String,
}

impl Customer {
    pub fn new(id: CustomerId, email: &str, credential: impl Into<String>) -> Self {
        Customer {
            id,
            email: normalize_email(email),
            credential: credential.into(),
        }
    }
}

/// Lowercase and trim an email for storage and uniqueness checks
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whether an email has a non-empty local part and a dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

//! In-memory account directory
//!
//! Resolves account numbers to identifiers, answers ownership questions and keeps the
//! customer registry with its case-insensitive email index.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use super::traits::AccountDirectory;
use crate::types::customer::{is_valid_email, normalize_email};
use crate::types::{Account, AccountId, Customer, CustomerId, LedgerError};

/// Thread-safe in-memory directory
#[derive(Debug)]
pub struct InMemoryDirectory {
    customers: DashMap<CustomerId, Customer>,

    /// Normalized email to customer
    emails: DashMap<String, CustomerId>,

    /// Account number to account
    numbers: DashMap<String, AccountId>,

    /// Account to owning customer
    owners: DashMap<AccountId, CustomerId>,

    next_customer_id: AtomicU32,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
            emails: DashMap::new(),
            numbers: DashMap::new(),
            owners: DashMap::new(),
            next_customer_id: AtomicU32::new(1),
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountDirectory for InMemoryDirectory {
    fn resolve_account_number(&self, account_number: &str) -> Result<AccountId, LedgerError> {
        self.numbers
            .get(account_number)
            .map(|entry| *entry.value())
            .ok_or_else(|| LedgerError::account_number_not_found(account_number))
    }

    fn is_owner(&self, customer_id: CustomerId, account_id: AccountId) -> Result<bool, LedgerError> {
        Ok(self
            .owners
            .get(&account_id)
            .map(|entry| *entry.value() == customer_id)
            .unwrap_or(false))
    }

    fn register_account(&self, account: &Account) -> Result<(), LedgerError> {
        match self.numbers.entry(account.account_number.clone()) {
            Entry::Occupied(_) => {
                return Err(LedgerError::persistence_failure(
                    "register_account",
                    format!("account number {} already registered", account.account_number),
                ))
            }
            Entry::Vacant(slot) => {
                slot.insert(account.id);
            }
        }
        self.owners.insert(account.id, account.customer_id);
        Ok(())
    }

    fn unregister_account(&self, account: &Account) -> Result<(), LedgerError> {
        self.numbers.remove(&account.account_number);
        self.owners.remove(&account.id);
        Ok(())
    }

    fn register_customer(&self, email: &str, credential: &str) -> Result<Customer, LedgerError> {
        if !is_valid_email(email) {
            return Err(LedgerError::InvalidEmail {
                email: email.to_string(),
            });
        }

        let normalized = normalize_email(email);

        // The vacant entry holds the shard lock, so two registrations of the same
        // email cannot both pass the uniqueness check.
        let slot = match self.emails.entry(normalized.clone()) {
            Entry::Occupied(_) => return Err(LedgerError::DuplicateEmail { email: normalized }),
            Entry::Vacant(slot) => slot,
        };

        let id = self.next_customer_id.fetch_add(1, Ordering::SeqCst);
        let customer = Customer::new(id, &normalized, credential);
        self.customers.insert(id, customer.clone());
        slot.insert(id);

        info!(customer = id, email = %customer.email, "Customer registered");
        Ok(customer)
    }

    fn customer(&self, customer_id: CustomerId) -> Result<Customer, LedgerError> {
        self.customers
            .get(&customer_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::customer_not_found(customer_id))
    }
}

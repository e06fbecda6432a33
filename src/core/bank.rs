//! Service facade over the ledger core
//!
//! `Bank` wires a ledger, a transaction log and a directory to one `TransferCoordinator`
//! and exposes the customer-facing operations: registration, account lifecycle, money
//! movement and history queries. Every operation takes the initiating customer
//! explicitly.
//!
//! Reads go through [`TransferCoordinator::consistent_read`], so they observe every
//! movement either fully applied or not at all.
//!
//! `Bank::execute` runs one replayed `CommandRecord` and is what the replay strategies
//! call.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use super::coordinator::TransferCoordinator;
use super::directory::InMemoryDirectory;
use super::ledger::InMemoryLedger;
use super::traits::{AccountDirectory, AccountLedger, TransactionLog};
use super::transaction_log::{InMemoryTransactionLog, TransactionHistory};
use crate::config::LedgerConfig;
use crate::types::{
    Account, AccountId, CommandRecord, CommandType, Customer, CustomerId, LedgerError,
    Transaction, TransactionId, TransferRequest,
};

/// Result of a successfully executed command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Registered(Customer),
    Opened(Account),
    Committed(Transaction),
    Closed(Account),
}

/// Customer-facing ledger service
#[derive(Clone)]
pub struct Bank {
    ledger: Arc<dyn AccountLedger>,
    log: Arc<dyn TransactionLog>,
    directory: Arc<dyn AccountDirectory>,
    coordinator: TransferCoordinator,
}

impl std::fmt::Debug for Bank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bank")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl Bank {
    /// Create a Bank over the given collaborators
    pub fn new(
        ledger: Arc<dyn AccountLedger>,
        log: Arc<dyn TransactionLog>,
        directory: Arc<dyn AccountDirectory>,
        config: LedgerConfig,
    ) -> Self {
        let coordinator = TransferCoordinator::new(
            Arc::clone(&ledger),
            Arc::clone(&log),
            Arc::clone(&directory),
            config,
        );

        Self {
            ledger,
            log,
            directory,
            coordinator,
        }
    }

    /// Create a Bank backed by the in-memory ledger, log and directory
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(
            Arc::new(InMemoryLedger::new(&config)),
            Arc::new(InMemoryTransactionLog::new()),
            Arc::new(InMemoryDirectory::new()),
            config,
        )
    }

    pub fn coordinator(&self) -> &TransferCoordinator {
        &self.coordinator
    }

    /// Register a customer with a unique email
    pub fn register_customer(&self, email: &str, credential: &str) -> Result<Customer, LedgerError> {
        self.directory.register_customer(email, credential)
    }

    pub fn customer(&self, customer_id: CustomerId) -> Result<Customer, LedgerError> {
        self.directory.customer(customer_id)
    }

    /// Open an account for an existing customer
    ///
    /// The opening balance is not recorded as a transaction.
    pub fn open_account(
        &self,
        customer_id: CustomerId,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        self.directory.customer(customer_id)?;

        let account = self.ledger.open_account(customer_id, initial_balance)?;
        if let Err(err) = self.directory.register_account(&account) {
            // Not yet resolvable, so nothing else can have touched it
            if let Err(cleanup) = self.ledger.remove_account(account.id) {
                warn!(account = account.id, error = %cleanup, "Failed to drop unregistered account");
            }
            return Err(err);
        }

        Ok(account)
    }

    /// Accounts of an existing customer, ordered by identifier
    pub fn accounts(&self, customer_id: CustomerId) -> Result<Vec<Account>, LedgerError> {
        self.directory.customer(customer_id)?;
        self.coordinator
            .consistent_read(|| self.ledger.accounts_for_customer(customer_id))
    }

    /// One of the customer's accounts
    ///
    /// # Returns
    ///
    /// * `Err(LedgerError::AccountNotFound)` - No such account
    /// * `Err(LedgerError::Forbidden)` - Owned by another customer
    pub fn account(&self, customer_id: CustomerId, account_id: AccountId) -> Result<Account, LedgerError> {
        self.coordinator
            .consistent_read(|| self.owned_account(customer_id, account_id))
    }

    fn owned_account(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
    ) -> Result<Account, LedgerError> {
        let account = self.ledger.account(account_id)?;
        if account.customer_id != customer_id {
            return Err(LedgerError::forbidden(customer_id, account_id));
        }
        Ok(account)
    }

    /// Close one of the customer's accounts; see [`TransferCoordinator::close`]
    pub async fn close_account(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
    ) -> Result<Account, LedgerError> {
        self.coordinator.close(customer_id, account_id).await
    }

    pub async fn transfer(
        &self,
        customer_id: CustomerId,
        sender_id: AccountId,
        request: TransferRequest,
    ) -> Result<Transaction, LedgerError> {
        self.coordinator.transfer(customer_id, sender_id, request).await
    }

    pub async fn deposit(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, LedgerError> {
        self.coordinator
            .deposit(customer_id, account_id, amount, description)
            .await
    }

    pub async fn withdraw(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, LedgerError> {
        self.coordinator
            .withdraw(customer_id, account_id, amount, description)
            .await
    }

    /// Transaction history of one of the customer's accounts, newest first
    pub fn transactions(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
    ) -> Result<TransactionHistory, LedgerError> {
        self.coordinator.consistent_read(|| {
            self.owned_account(customer_id, account_id)?;
            self.log.list_for_account(account_id)
        })
    }

    /// One transaction of one of the customer's accounts
    pub fn transaction(
        &self,
        customer_id: CustomerId,
        account_id: AccountId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        self.coordinator.consistent_read(|| {
            self.owned_account(customer_id, account_id)?;
            self.log.get_by_id(account_id, transaction_id)
        })
    }

    /// Owner of an account
    pub fn account_owner(&self, account_id: AccountId) -> Result<CustomerId, LedgerError> {
        Ok(self.ledger.account(account_id)?.customer_id)
    }

    /// Owner of the account an account number resolves to
    pub fn account_number_owner(&self, account_number: &str) -> Result<CustomerId, LedgerError> {
        let account_id = self.directory.resolve_account_number(account_number)?;
        self.account_owner(account_id)
    }

    /// Every account, ordered by identifier
    pub fn accounts_snapshot(&self) -> Result<Vec<Account>, LedgerError> {
        self.coordinator.consistent_read(|| self.ledger.all_accounts())
    }

    /// Run one replayed command
    ///
    /// # Returns
    ///
    /// * `Ok(CommandOutcome)` - What the command produced
    /// * `Err(LedgerError::ParseError)` - A field the command needs is missing
    /// * `Err(LedgerError)` - The operation itself failed
    pub async fn execute(&self, record: CommandRecord) -> Result<CommandOutcome, LedgerError> {
        let command = record.command;
        let description = record.description.unwrap_or_default();

        match command {
            CommandType::Register => self
                .register_customer(&description, "")
                .map(CommandOutcome::Registered),
            CommandType::Open => {
                let customer = required(record.customer, command, "customer")?;
                self.open_account(customer, record.amount.unwrap_or(Decimal::ZERO))
                    .map(CommandOutcome::Opened)
            }
            CommandType::Deposit => {
                let customer = required(record.customer, command, "customer")?;
                let account = required(record.account, command, "account")?;
                let amount = required(record.amount, command, "amount")?;
                self.deposit(customer, account, amount, &description)
                    .await
                    .map(CommandOutcome::Committed)
            }
            CommandType::Withdrawal => {
                let customer = required(record.customer, command, "customer")?;
                let account = required(record.account, command, "account")?;
                let amount = required(record.amount, command, "amount")?;
                self.withdraw(customer, account, amount, &description)
                    .await
                    .map(CommandOutcome::Committed)
            }
            CommandType::Transfer => {
                let customer = required(record.customer, command, "customer")?;
                let account = required(record.account, command, "account")?;
                let target = required(record.target, command, "target")?;
                let amount = required(record.amount, command, "amount")?;
                self.transfer(customer, account, TransferRequest::new(target, amount, description))
                    .await
                    .map(CommandOutcome::Committed)
            }
            CommandType::Close => {
                let customer = required(record.customer, command, "customer")?;
                let account = required(record.account, command, "account")?;
                self.close_account(customer, account)
                    .await
                    .map(CommandOutcome::Closed)
            }
        }
    }
}

fn required<T>(value: Option<T>, command: CommandType, field: &str) -> Result<T, LedgerError> {
    value.ok_or_else(|| LedgerError::ParseError {
        line: None,
        message: format!("{:?} command requires '{}'", command, field),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionType;

    fn bank() -> Bank {
        Bank::in_memory(LedgerConfig::default())
    }

    fn command(command: CommandType) -> CommandRecord {
        CommandRecord {
            command,
            customer: None,
            account: None,
            target: None,
            amount: None,
            description: None,
        }
    }

    #[test]
    fn test_open_account_requires_customer() {
        let bank = bank();
        assert_eq!(
            bank.open_account(1, Decimal::ZERO),
            Err(LedgerError::CustomerNotFound { customer: 1 })
        );
        assert!(bank.accounts_snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_accounts_and_account_lookup() {
        let bank = bank();
        let alice = bank.register_customer("alice@example.com", "pw").unwrap();
        let bob = bank.register_customer("bob@example.com", "pw").unwrap();
        let a1 = bank.open_account(alice.id, Decimal::new(10, 0)).unwrap();
        let b1 = bank.open_account(bob.id, Decimal::ZERO).unwrap();
        let a2 = bank.open_account(alice.id, Decimal::ZERO).unwrap();

        let ids: Vec<AccountId> = bank.accounts(alice.id).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![a1.id, a2.id]);

        assert_eq!(bank.account(alice.id, a1.id).unwrap(), a1);
        assert_eq!(
            bank.account(alice.id, b1.id),
            Err(LedgerError::Forbidden {
                customer: alice.id,
                account: b1.id
            })
        );
        assert_eq!(
            bank.account(alice.id, 99),
            Err(LedgerError::AccountNotFound { account: 99 })
        );
        assert!(matches!(
            bank.accounts(42),
            Err(LedgerError::CustomerNotFound { customer: 42 })
        ));
    }

    #[test]
    fn test_account_owner_lookups() {
        let bank = bank();
        let alice = bank.register_customer("alice@example.com", "pw").unwrap();
        let account = bank.open_account(alice.id, Decimal::ZERO).unwrap();

        assert_eq!(bank.account_owner(account.id), Ok(alice.id));
        assert_eq!(bank.account_number_owner(&account.account_number), Ok(alice.id));
        assert!(bank.account_owner(99).is_err());
        assert!(bank.account_number_owner("4000000000000999").is_err());
    }

    #[tokio::test]
    async fn test_history_queries_check_ownership() {
        let bank = bank();
        let alice = bank.register_customer("alice@example.com", "pw").unwrap();
        let bob = bank.register_customer("bob@example.com", "pw").unwrap();
        let a = bank.open_account(alice.id, Decimal::new(100, 0)).unwrap();
        let b = bank.open_account(bob.id, Decimal::ZERO).unwrap();

        let tx = bank
            .transfer(
                alice.id,
                a.id,
                TransferRequest::new(b.account_number.clone(), Decimal::new(40, 0), "lunch"),
            )
            .await
            .unwrap();

        assert_eq!(bank.transactions(alice.id, a.id).unwrap().len(), 1);
        assert_eq!(bank.transaction(bob.id, b.id, tx.id), Ok(tx.clone()));
        assert!(matches!(
            bank.transactions(bob.id, a.id),
            Err(LedgerError::Forbidden { .. })
        ));
        assert!(matches!(
            bank.transaction(bob.id, a.id, tx.id),
            Err(LedgerError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_full_flow() {
        let bank = bank();

        let mut register = command(CommandType::Register);
        register.description = Some("alice@example.com".to_string());
        let alice = match bank.execute(register).await.unwrap() {
            CommandOutcome::Registered(customer) => customer,
            other => panic!("unexpected outcome {:?}", other),
        };

        let mut open = command(CommandType::Open);
        open.customer = Some(alice.id);
        open.amount = Some(Decimal::new(100, 0));
        let first = match bank.execute(open.clone()).await.unwrap() {
            CommandOutcome::Opened(account) => account,
            other => panic!("unexpected outcome {:?}", other),
        };
        open.amount = None;
        let second = match bank.execute(open).await.unwrap() {
            CommandOutcome::Opened(account) => account,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(second.balance, Decimal::ZERO);

        let mut transfer = command(CommandType::Transfer);
        transfer.customer = Some(alice.id);
        transfer.account = Some(first.id);
        transfer.target = Some(second.account_number.clone());
        transfer.amount = Some(Decimal::new(25, 0));
        match bank.execute(transfer).await.unwrap() {
            CommandOutcome::Committed(tx) => {
                assert_eq!(tx.transaction_type, TransactionType::Transfer)
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let mut withdrawal = command(CommandType::Withdrawal);
        withdrawal.customer = Some(alice.id);
        withdrawal.account = Some(second.id);
        withdrawal.amount = Some(Decimal::new(25, 0));
        bank.execute(withdrawal).await.unwrap();

        let mut close = command(CommandType::Close);
        close.customer = Some(alice.id);
        close.account = Some(second.id);
        match bank.execute(close).await.unwrap() {
            CommandOutcome::Closed(account) => assert!(account.is_closed()),
            other => panic!("unexpected outcome {:?}", other),
        }

        let snapshot = bank.accounts_snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].balance, Decimal::new(75, 0));
        assert!(snapshot[1].is_closed());
    }

    #[tokio::test]
    async fn test_execute_reports_missing_fields() {
        let bank = bank();

        let mut deposit = command(CommandType::Deposit);
        deposit.customer = Some(1);
        deposit.account = Some(1);

        let result = bank.execute(deposit).await;

        assert_eq!(
            result,
            Err(LedgerError::ParseError {
                line: None,
                message: "Deposit command requires 'amount'".to_string()
            })
        );
    }
}

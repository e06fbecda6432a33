//! Transfer consistency properties through the public API
//!
//! Covers money conservation, non-negative balances, stable transaction lookup,
//! serializable concurrent transfers, snapshot consistency, bounded lock waits and the
//! reference scenarios
//! (successful transfer, insufficient funds, self-transfer, foreign sender, racing
//! overdraft).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bank_ledger::core::{AccountDirectory, AccountLedger, InMemoryDirectory, InMemoryTransactionLog};
use bank_ledger::{
    Account, AccountId, Bank, CustomerId, ErrorKind, InMemoryLedger, LedgerConfig, LedgerError,
    TransactionType, TransferRequest,
};
use rstest::rstest;
use rust_decimal::Decimal;

fn dec(units: i64) -> Decimal {
    Decimal::new(units, 0)
}

struct Setup {
    bank: Bank,
    alice: CustomerId,
    bob: CustomerId,
    x: Account,
    y: Account,
}

fn setup(x_balance: Decimal, y_balance: Decimal) -> Setup {
    let bank = Bank::in_memory(LedgerConfig::default());
    let alice = bank.register_customer("alice@example.com", "pw").unwrap().id;
    let bob = bank.register_customer("bob@example.com", "pw").unwrap().id;
    let x = bank.open_account(alice, x_balance).unwrap();
    let y = bank.open_account(bob, y_balance).unwrap();
    Setup {
        bank,
        alice,
        bob,
        x,
        y,
    }
}

fn balance(bank: &Bank, customer: CustomerId, account: AccountId) -> Decimal {
    bank.account(customer, account).unwrap().balance
}

fn total(bank: &Bank) -> Decimal {
    bank.accounts_snapshot()
        .unwrap()
        .iter()
        .map(|a| a.balance)
        .sum()
}

#[tokio::test]
async fn scenario_transfer_entire_balance() {
    let s = setup(dec(1000), Decimal::ZERO);

    let tx = s
        .bank
        .transfer(
            s.alice,
            s.x.id,
            TransferRequest::new(s.y.account_number.clone(), dec(1000), "test description"),
        )
        .await
        .unwrap();

    assert_eq!(balance(&s.bank, s.alice, s.x.id), Decimal::ZERO);
    assert_eq!(balance(&s.bank, s.bob, s.y.id), dec(1000));
    assert_eq!(tx.transaction_type, TransactionType::Transfer);
    assert_eq!(tx.description, "test description");

    let x_history: Vec<_> = s.bank.transactions(s.alice, s.x.id).unwrap().iter().collect();
    let y_history: Vec<_> = s.bank.transactions(s.bob, s.y.id).unwrap().iter().collect();
    assert_eq!(x_history, vec![tx.clone()]);
    assert_eq!(y_history, vec![tx]);
}

#[tokio::test]
async fn scenario_insufficient_funds_changes_nothing() {
    let s = setup(dec(500), Decimal::ZERO);

    let err = s
        .bank
        .transfer(
            s.alice,
            s.x.id,
            TransferRequest::new(s.y.account_number.clone(), dec(1000), "too much"),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(balance(&s.bank, s.alice, s.x.id), dec(500));
    assert_eq!(balance(&s.bank, s.bob, s.y.id), Decimal::ZERO);
    assert!(s.bank.transactions(s.alice, s.x.id).unwrap().is_empty());
    assert!(s.bank.transactions(s.bob, s.y.id).unwrap().is_empty());
}

#[tokio::test]
async fn scenario_self_transfer_rejected() {
    let s = setup(dec(500), Decimal::ZERO);

    let err = s
        .bank
        .transfer(
            s.alice,
            s.x.id,
            TransferRequest::new(s.x.account_number.clone(), dec(10), "self"),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidTransfer);
    assert_eq!(balance(&s.bank, s.alice, s.x.id), dec(500));
}

#[tokio::test]
async fn scenario_foreign_sender_forbidden() {
    let s = setup(dec(500), dec(500));

    let err = s
        .bank
        .transfer(
            s.bob,
            s.x.id,
            TransferRequest::new(s.y.account_number.clone(), dec(10), "not mine"),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(balance(&s.bank, s.alice, s.x.id), dec(500));
    assert_eq!(balance(&s.bank, s.bob, s.y.id), dec(500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_racing_overdraft_has_one_winner() {
    let s = setup(dec(1000), Decimal::ZERO);

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let bank = s.bank.clone();
            let request = TransferRequest::new(s.y.account_number.clone(), dec(600), "race");
            let (alice, x) = (s.alice, s.x.id);
            tokio::spawn(async move { bank.transfer(alice, x, request).await })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = results.into_iter().find_map(|r| r.err()).unwrap();
    assert_eq!(failure.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(balance(&s.bank, s.alice, s.x.id), dec(400));
    assert_eq!(balance(&s.bank, s.bob, s.y.id), dec(600));
}

#[rstest]
#[case::few(4, 50)]
#[case::many(64, 10)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_are_serializable(#[case] n: i64, #[case] amount: i64) {
    let initial = dec(1000);
    let s = setup(initial, Decimal::ZERO);

    let tasks: Vec<_> = (0..n)
        .map(|_| {
            let bank = s.bank.clone();
            let request = TransferRequest::new(s.y.account_number.clone(), dec(amount), "batch");
            let (alice, x) = (s.alice, s.x.id);
            tokio::spawn(async move { bank.transfer(alice, x, request).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(balance(&s.bank, s.alice, s.x.id), initial - dec(n * amount));
    assert_eq!(balance(&s.bank, s.bob, s.y.id), dec(n * amount));
    assert_eq!(s.bank.transactions(s.alice, s.x.id).unwrap().len(), n as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_direction_transfers_conserve_money() {
    let s = setup(dec(500), dec(500));

    let mut tasks = Vec::new();
    for i in 0..100 {
        let bank = s.bank.clone();
        let (customer, from, to) = if i % 2 == 0 {
            (s.alice, s.x.id, s.y.account_number.clone())
        } else {
            (s.bob, s.y.id, s.x.account_number.clone())
        };
        tasks.push(tokio::spawn(async move {
            bank.transfer(customer, from, TransferRequest::new(to, dec(7), "ping-pong"))
                .await
        }));
    }

    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => {}
            Err(err) => assert_eq!(err.kind(), ErrorKind::InsufficientFunds),
        }
    }

    assert_eq!(total(&s.bank), dec(1000));
    for account in s.bank.accounts_snapshot().unwrap() {
        assert!(account.balance >= Decimal::ZERO);
    }
}

#[tokio::test]
async fn conservation_over_mixed_transfers() {
    let bank = Bank::in_memory(LedgerConfig::default());
    let mut accounts = Vec::new();
    for i in 0..5u32 {
        let customer = bank
            .register_customer(&format!("c{}@example.com", i), "pw")
            .unwrap()
            .id;
        accounts.push(bank.open_account(customer, dec(100)).unwrap());
    }
    let before = total(&bank);

    // Deterministic pseudo-random walk, including rejected overdrafts
    let mut seed: u64 = 42;
    for _ in 0..200 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let from = &accounts[(seed >> 33) as usize % accounts.len()];
        let to = &accounts[(seed >> 17) as usize % accounts.len()];
        let amount = Decimal::new(((seed >> 40) % 5000) as i64 + 1, 2);

        let result = bank
            .transfer(
                from.customer_id,
                from.id,
                TransferRequest::new(to.account_number.clone(), amount, "walk"),
            )
            .await;

        if let Err(err) = result {
            assert!(matches!(
                err.kind(),
                ErrorKind::InsufficientFunds | ErrorKind::InvalidTransfer
            ));
        }
        assert_eq!(total(&bank), before);
    }
}

#[tokio::test]
async fn get_by_id_returns_identical_records() {
    let s = setup(dec(100), Decimal::ZERO);
    let tx = s
        .bank
        .transfer(
            s.alice,
            s.x.id,
            TransferRequest::new(s.y.account_number.clone(), dec(5), "once"),
        )
        .await
        .unwrap();

    let first = s.bank.transaction(s.alice, s.x.id, tx.id).unwrap();
    let second = s.bank.transaction(s.alice, s.x.id, tx.id).unwrap();
    let via_receiver = s.bank.transaction(s.bob, s.y.id, tx.id).unwrap();

    assert_eq!(first, tx);
    assert_eq!(first, second);
    assert_eq!(first, via_receiver);
}

#[tokio::test]
async fn history_is_newest_first_and_restartable() {
    let s = setup(dec(100), Decimal::ZERO);
    let mut ids = Vec::new();
    for amount in [1, 2, 3] {
        let tx = s
            .bank
            .transfer(
                s.alice,
                s.x.id,
                TransferRequest::new(s.y.account_number.clone(), dec(amount), "step"),
            )
            .await
            .unwrap();
        ids.push(tx.id);
    }
    ids.reverse();

    let history = s.bank.transactions(s.alice, s.x.id).unwrap();
    let first: Vec<_> = history.iter().map(|tx| tx.id).collect();
    let second: Vec<_> = (&history).into_iter().map(|tx| tx.id).collect();

    assert_eq!(first, ids);
    assert_eq!(second, ids);
}

/// Ledger whose debits block the calling thread after applying, while enabled
#[derive(Debug)]
struct SlowLedger {
    inner: InMemoryLedger,
    slow: AtomicBool,
    delay: Duration,
}

impl AccountLedger for SlowLedger {
    fn open_account(
        &self,
        customer_id: CustomerId,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        self.inner.open_account(customer_id, initial_balance)
    }

    fn account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.inner.account(account_id)
    }

    fn balance(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        self.inner.balance(account_id)
    }

    fn debit(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        let balance = self.inner.debit(account_id, amount)?;
        if self.slow.load(Ordering::SeqCst) {
            std::thread::sleep(self.delay);
        }
        Ok(balance)
    }

    fn credit(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.inner.credit(account_id, amount)
    }

    fn close_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.inner.close_account(account_id)
    }

    fn remove_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.inner.remove_account(account_id)
    }

    fn accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>, LedgerError> {
        self.inner.accounts_for_customer(customer_id)
    }

    fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.inner.all_accounts()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lock_wait_is_bounded() {
    let config = LedgerConfig::new(Duration::from_millis(50), 2, 255, "4000");
    let ledger = Arc::new(SlowLedger {
        inner: InMemoryLedger::new(&config),
        slow: AtomicBool::new(false),
        delay: Duration::from_millis(500),
    });
    let directory = Arc::new(InMemoryDirectory::new());
    let bank = Bank::new(
        ledger.clone(),
        Arc::new(InMemoryTransactionLog::new()),
        directory.clone(),
        config,
    );

    let alice = bank.register_customer("alice@example.com", "pw").unwrap().id;
    let bob = bank.register_customer("bob@example.com", "pw").unwrap().id;
    let x = bank.open_account(alice, dec(100)).unwrap();
    let y = bank.open_account(bob, dec(100)).unwrap();
    assert_eq!(directory.resolve_account_number(&y.account_number), Ok(y.id));

    ledger.slow.store(true, Ordering::SeqCst);

    let holder = {
        let bank = bank.clone();
        let to = y.account_number.clone();
        tokio::spawn(async move {
            bank.transfer(alice, x.id, TransferRequest::new(to, dec(10), "slow"))
                .await
        })
    };

    // Give the first transfer time to take both locks
    tokio::time::sleep(Duration::from_millis(100)).await;

    let waiter = bank
        .transfer(
            bob,
            y.id,
            TransferRequest::new(x.account_number.clone(), dec(10), "blocked"),
        )
        .await;

    let err = waiter.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.kind().is_retryable());

    holder.await.unwrap().unwrap();
    ledger.slow.store(false, Ordering::SeqCst);

    assert_eq!(bank.account(alice, x.id).unwrap().balance, dec(90));
    assert_eq!(bank.account(bob, y.id).unwrap().balance, dec(110));
}

fn slow_bank(config: LedgerConfig, delay: Duration) -> (Bank, Arc<SlowLedger>) {
    let ledger = Arc::new(SlowLedger {
        inner: InMemoryLedger::new(&config),
        slow: AtomicBool::new(false),
        delay,
    });
    let bank = Bank::new(
        ledger.clone(),
        Arc::new(InMemoryTransactionLog::new()),
        Arc::new(InMemoryDirectory::new()),
        config,
    );
    (bank, ledger)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshots_never_observe_half_applied_transfers() {
    let (bank, ledger) = slow_bank(LedgerConfig::default(), Duration::from_millis(1));

    let alice = bank.register_customer("alice@example.com", "pw").unwrap().id;
    let bob = bank.register_customer("bob@example.com", "pw").unwrap().id;
    let x = bank.open_account(alice, dec(1000)).unwrap();
    let y = bank.open_account(bob, dec(1000)).unwrap();
    ledger.slow.store(true, Ordering::SeqCst);

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let bank = bank.clone();
        let done = done.clone();
        std::thread::spawn(move || {
            let mut snapshots = 0usize;
            let mut mismatched = 0usize;
            loop {
                let finished = done.load(Ordering::SeqCst);
                if total(&bank) != dec(2000) {
                    mismatched += 1;
                }
                snapshots += 1;
                if finished {
                    return (snapshots, mismatched);
                }
            }
        })
    };

    let mut tasks = Vec::new();
    for i in 0..60 {
        let bank = bank.clone();
        let (customer, from, to) = if i % 2 == 0 {
            (alice, x.id, y.account_number.clone())
        } else {
            (bob, y.id, x.account_number.clone())
        };
        tasks.push(tokio::spawn(async move {
            bank.transfer(customer, from, TransferRequest::new(to, dec(1), "ping-pong"))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    done.store(true, Ordering::SeqCst);
    let (snapshots, mismatched) = reader.join().unwrap();
    ledger.slow.store(false, Ordering::SeqCst);

    assert!(snapshots > 0);
    assert_eq!(mismatched, 0);
    assert_eq!(total(&bank), dec(2000));
    assert_eq!(bank.account(alice, x.id).unwrap().balance, dec(1000));
    assert_eq!(bank.account(bob, y.id).unwrap().balance, dec(1000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_transfer_changes_nothing() {
    let config = LedgerConfig::new(Duration::from_secs(5), 2, 255, "4000");
    let (bank, ledger) = slow_bank(config, Duration::from_millis(300));

    let alice = bank.register_customer("alice@example.com", "pw").unwrap().id;
    let bob = bank.register_customer("bob@example.com", "pw").unwrap().id;
    let x = bank.open_account(alice, dec(100)).unwrap();
    let y = bank.open_account(bob, dec(100)).unwrap();
    ledger.slow.store(true, Ordering::SeqCst);

    let holder = {
        let bank = bank.clone();
        let to = y.account_number.clone();
        tokio::spawn(async move {
            bank.transfer(alice, x.id, TransferRequest::new(to, dec(10), "slow"))
                .await
        })
    };

    // Give the first transfer time to take both locks
    tokio::time::sleep(Duration::from_millis(50)).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        bank.transfer(
            bob,
            y.id,
            TransferRequest::new(x.account_number.clone(), dec(30), "abandoned"),
        ),
    )
    .await;
    assert!(abandoned.is_err());

    holder.await.unwrap().unwrap();
    ledger.slow.store(false, Ordering::SeqCst);

    assert_eq!(balance(&bank, alice, x.id), dec(90));
    assert_eq!(balance(&bank, bob, y.id), dec(110));
    assert_eq!(bank.transactions(alice, x.id).unwrap().len(), 1);
    assert_eq!(bank.transactions(bob, y.id).unwrap().len(), 1);

    bank.transfer(
        bob,
        y.id,
        TransferRequest::new(x.account_number.clone(), dec(30), "retried"),
    )
    .await
    .unwrap();
    assert_eq!(balance(&bank, alice, x.id), dec(120));
    assert_eq!(balance(&bank, bob, y.id), dec(80));
}

//! Postgres Integration Tests
//!
//! Require a database with DATABASE_URL set:
//! cargo test --test integration_postgres -- --ignored

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use wallet_gateway::domain::{Currency, DomainError, ErrorKind, OperationContext, Role};
use wallet_gateway::ledger::{LedgerError, PgLedger, TransactionLedger, TransactionStatus};
use wallet_gateway::store::{
    AccountNumber, AccountStore, BalanceAdjustment, BalanceSlot, PgAccountStore, StoreError,
};
use wallet_gateway::{EngineSettings, Wallet};

mod common;

struct Registered {
    context: OperationContext,
    account: AccountNumber,
}

async fn register(wallet: &Wallet, prefix: &str, role: Role) -> Registered {
    let registration = wallet
        .register_user(prefix, &common::unique_email(prefix), "password123", role)
        .await
        .expect("registration failed");
    Registered {
        context: OperationContext::new(registration.user_id, role),
        account: registration.account_number,
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_registration_creates_zeroed_account() {
    let pool = common::setup_test_db().await;
    let wallet = Wallet::postgres(pool, EngineSettings::default());

    let email = common::unique_email("zeroed");
    let registration = wallet
        .register_user("Zeroed", &email, "password123", Role::Customer)
        .await
        .unwrap();
    assert!(registration.account_number.as_str().parse::<u64>().unwrap() >= 1001);

    let balances = wallet.get_balance(registration.user_id).await.unwrap();
    assert_eq!(balances.balances.len(), Currency::ALL.len());
    assert!(balances.balances.values().all(|b| b.is_zero()));
    assert!(balances.commission_balance.is_zero());

    let session = wallet.login(&email, "password123").await.unwrap();
    assert_eq!(session.user_id, registration.user_id);

    let duplicate = wallet
        .register_user("Again", &email, "password123", Role::Customer)
        .await
        .unwrap_err();
    assert_eq!(duplicate.kind(), ErrorKind::Conflict);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_transfer_and_ledger_roundtrip() {
    let pool = common::setup_test_db().await;
    let wallet = Wallet::postgres(pool.clone(), EngineSettings::default());
    let ledger = PgLedger::new(pool);

    let a = register(&wallet, "pg-a", Role::Customer).await;
    let b = register(&wallet, "pg-b", Role::Customer).await;
    let admin = register(&wallet, "pg-admin", Role::Admin).await;

    wallet
        .deposit_into_user_by_account(&admin.context, a.account.as_str(), "ZambianKwacha", "200")
        .await
        .unwrap();
    let receipt = wallet
        .transfer_funds(&a.context, b.account.as_str(), "ZambianKwacha", "50")
        .await
        .unwrap();

    let stored = ledger.get(receipt.transaction_id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Completed);
    assert_eq!(stored.amount, Some(dec!(50)));
    assert_eq!(stored.currency, Some(Currency::ZambianKwacha));

    let err = wallet
        .withdraw_funds(&a.context, a.account.as_str(), "ZambianKwacha", "500")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    let history = ledger.list_by_account(&a.account).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().last().is_some_and(|r| !r.status.is_completed()));

    let a_balances = wallet.get_balance(a.context.actor_user_id).await.unwrap();
    let b_balances = wallet.get_balance(b.context.actor_user_id).await.unwrap();
    assert_eq!(a_balances.amount(Currency::ZambianKwacha), dec!(150));
    assert_eq!(b_balances.amount(Currency::ZambianKwacha), dec!(50));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_batch_is_all_or_nothing() {
    let pool = common::setup_test_db().await;
    let wallet = Wallet::postgres(pool.clone(), EngineSettings::default());
    let store = PgAccountStore::new(pool);

    let a = register(&wallet, "batch-a", Role::Customer).await;
    let b = register(&wallet, "batch-b", Role::Customer).await;
    store
        .adjust_balance(&a.account, Currency::USDollar, dec!(10))
        .await
        .unwrap();

    let usd = BalanceSlot::Currency(Currency::USDollar);
    let result = store
        .apply(&[
            BalanceAdjustment::credit(&b.account, usd, dec!(25)),
            BalanceAdjustment::debit(&a.account, usd, dec!(25)),
        ])
        .await;
    assert!(matches!(result, Err(StoreError::InsufficientFunds { .. })));

    assert_eq!(
        store.get_balance(&a.account, Currency::USDollar).await.unwrap(),
        dec!(10)
    );
    assert!(store
        .get_balance(&b.account, Currency::USDollar)
        .await
        .unwrap()
        .is_zero());

    let missing = store
        .adjust_balance(&AccountNumber::new("0"), Currency::USDollar, Decimal::ONE)
        .await;
    assert!(matches!(missing, Err(StoreError::AccountNotFound(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_deposits_lose_nothing() {
    let pool = common::setup_test_db().await;
    let wallet = Arc::new(Wallet::postgres(pool, EngineSettings::default()));

    let target = register(&wallet, "concurrent", Role::Customer).await;
    let admin = register(&wallet, "concurrent-admin", Role::Admin).await;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let wallet = Arc::clone(&wallet);
        let context = admin.context.clone();
        let account = target.account.clone();
        handles.push(tokio::spawn(async move {
            wallet
                .deposit_into_user_by_account(&context, account.as_str(), "MalawianKwacha", "1")
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let balances = wallet.get_balance(target.context.actor_user_id).await.unwrap();
    assert_eq!(balances.amount(Currency::MalawianKwacha), dec!(50));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_agent_commission_persists() {
    let pool = common::setup_test_db().await;
    let wallet = Wallet::postgres(pool, EngineSettings::default());

    let customer = register(&wallet, "commission-customer", Role::Customer).await;
    let agent = register(&wallet, "commission-agent", Role::Agent).await;

    wallet
        .deposit_into_user_by_account(&agent.context, customer.account.as_str(), "USD", "20")
        .await
        .unwrap();

    let balances = wallet.get_balance(agent.context.actor_user_id).await.unwrap();
    assert_eq!(balances.commission_balance, Decimal::ONE);
    assert!(balances.amount(Currency::ZimbabweanDollar).is_zero());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_unknown_actor_rejected() {
    let pool = common::setup_test_db().await;
    let wallet = Wallet::postgres(pool, EngineSettings::default());
    let ghost = OperationContext::new(Uuid::new_v4(), Role::Admin);

    let err = wallet
        .deposit_into_user_by_account(&ghost, "1001", "USD", "1")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unauthorized(_)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_batch_rolls_back_when_its_record_cannot_be_written() {
    let pool = common::setup_test_db().await;
    let wallet = Wallet::postgres(pool.clone(), EngineSettings::default());
    let store = PgAccountStore::new(pool.clone());
    let ledger = PgLedger::new(pool);

    let customer = register(&wallet, "rollback-customer", Role::Customer).await;
    let admin = register(&wallet, "rollback-admin", Role::Admin).await;

    let receipt = wallet
        .deposit_into_user_by_account(&admin.context, customer.account.as_str(), "USD", "10")
        .await
        .unwrap();
    let existing = ledger.get(receipt.transaction_id).await.unwrap().unwrap();

    // Re-using a stored transaction id makes the insert fail inside the transaction
    let usd = BalanceSlot::Currency(Currency::USDollar);
    let result = store
        .apply_recorded(
            &[BalanceAdjustment::credit(&customer.account, usd, dec!(90))],
            &existing,
            &ledger,
        )
        .await;
    assert!(matches!(
        result,
        Err(StoreError::Ledger(LedgerError::DuplicateRecord(id))) if id == existing.id
    ));

    let balances = wallet.get_balance(customer.context.actor_user_id).await.unwrap();
    assert_eq!(balances.amount(Currency::USDollar), dec!(10));
    assert_eq!(ledger.list_by_account(&customer.account).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_sessions_persist_hashed() {
    let pool = common::setup_test_db().await;
    let wallet = Wallet::postgres(pool.clone(), EngineSettings::default());

    let email = common::unique_email("session");
    let registration = wallet
        .register_user("Session", &email, "password123", Role::Agent)
        .await
        .unwrap();
    let session = wallet.login(&email, "password123").await.unwrap();

    let context = wallet.authenticate(&session.token).await.unwrap();
    assert_eq!(context.actor_user_id, registration.user_id);
    assert_eq!(context.claimed_role, Role::Agent);

    // The raw token is never written
    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE token_hash = $1")
        .bind(&session.token)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);

    wallet.logout(&session.token).await.unwrap();
    let err = wallet.authenticate(&session.token).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidSession));
}

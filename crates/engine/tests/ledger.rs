use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Statement};
use uuid::Uuid;

use engine::{
    AccountOwner, AdjustmentBatchCmd, Engine, EngineError, Identity, PurchaseCmd, ShopCapability,
    TopUpCmd, TransactionKind, TransactionStatus, TransferCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn admin() -> Identity {
    Identity::admin("root")
}

fn cashier(user_id: &str) -> Identity {
    Identity::member(user_id).with_grant("bar", vec![ShopCapability::Sell])
}

async fn personal_account(engine: &Engine, user_id: &str, balance_minor: i64) -> Uuid {
    let account = engine
        .new_account(AccountOwner::Personal(user_id.to_string()), &admin())
        .await
        .unwrap();
    if balance_minor > 0 {
        engine
            .top_up(TopUpCmd::new(account.id, balance_minor), &admin())
            .await
            .unwrap();
    }
    account.id
}

#[allow(clippy::too_many_arguments)]
async fn insert_product(
    db: &DatabaseConnection,
    shop_id: &str,
    name: &str,
    price_minor: i64,
    stock: f64,
    depletion_factor: f64,
    self_service: bool,
    linked_event_id: Option<String>,
) -> Uuid {
    let id = Uuid::new_v4();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO products \
         (id, shop_id, name, price_minor, stock, depletion_factor, self_service, archived, linked_event_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
        vec![
            id.to_string().into(),
            shop_id.into(),
            name.into(),
            price_minor.into(),
            stock.into(),
            depletion_factor.into(),
            self_service.into(),
            linked_event_id.into(),
        ],
    ))
    .await
    .unwrap();
    id
}

async fn product_stock(db: &DatabaseConnection, product_id: Uuid) -> f64 {
    engine::products::Entity::find_by_id(product_id.to_string())
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn balance(engine: &Engine, account_id: Uuid) -> i64 {
    engine
        .account(account_id, &admin())
        .await
        .unwrap()
        .balance_minor
}

/// Sum of completed ledger rows; must always match the stored balance.
async fn completed_sum(db: &DatabaseConnection, account_id: Uuid) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_sql_and_values(
            backend,
            "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
             FROM transactions WHERE account_id = ? AND status = 'completed'",
            vec![account_id.to_string().into()],
        ))
        .await
        .unwrap();
    row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0)
}

#[tokio::test]
async fn top_up_credits_wallet_and_appends_row() {
    let (engine, db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 0).await;

    engine
        .top_up(
            TopUpCmd::new(alice, 1500).shop_id("bar").description("cash"),
            &cashier("bob"),
        )
        .await
        .unwrap();

    assert_eq!(balance(&engine, alice).await, 1500);
    let history = engine
        .transactions_for_account(alice, 10, &admin())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), TransactionKind::TopUp);
    assert_eq!(completed_sum(&db, alice).await, 1500);
}

#[tokio::test]
async fn top_up_without_sell_grant_is_forbidden() {
    let (engine, _db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 0).await;

    let err = engine
        .top_up(
            TopUpCmd::new(alice, 1500).shop_id("bar"),
            &Identity::member("mallory"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert_eq!(balance(&engine, alice).await, 0);
}

#[tokio::test]
async fn purchase_debits_payer_and_depletes_stock() {
    let (engine, db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 2000).await;
    let beer = insert_product(&db, "bar", "beer", 250, 30.0, 0.5, true, None).await;
    let snack = insert_product(&db, "bar", "snack", 100, 10.0, 1.0, true, None).await;

    let rows = engine
        .record_purchase(
            PurchaseCmd::new(alice, "alice", "bar")
                .line(beer, 2)
                .line(snack, 3),
            &Identity::member("alice"),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].amount_minor, -500);
    assert_eq!(rows[1].amount_minor, -300);
    assert_eq!(rows[0].group_id, rows[1].group_id);
    assert_eq!(balance(&engine, alice).await, 1200);
    assert!((product_stock(&db, beer).await - 29.0).abs() < 1e-9);
    assert!((product_stock(&db, snack).await - 7.0).abs() < 1e-9);
    assert_eq!(completed_sum(&db, alice).await, 1200);
}

#[tokio::test]
async fn failed_purchase_leaves_everything_untouched() {
    let (engine, db) = engine_with_db().await;
    let purse = engine
        .new_account(AccountOwner::Shared("climbing".to_string()), &admin())
        .await
        .unwrap()
        .id;
    engine
        .top_up(TopUpCmd::new(purse, 500), &admin())
        .await
        .unwrap();
    let beer = insert_product(&db, "bar", "beer", 250, 30.0, 1.0, true, None).await;

    let err = engine
        .record_purchase(
            PurchaseCmd::new(purse, "alice", "bar").line(beer, 3),
            &cashier("bob"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(balance(&engine, purse).await, 500);
    assert!((product_stock(&db, beer).await - 30.0).abs() < 1e-9);
    let history = engine
        .transactions_for_account(purse, 10, &admin())
        .await
        .unwrap();
    assert_eq!(history.len(), 1); // only the top-up
}

#[tokio::test]
async fn self_checkout_rejects_counter_only_products() {
    let (engine, db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 2000).await;
    let spirits = insert_product(&db, "bar", "spirits", 400, 10.0, 1.0, false, None).await;

    let err = engine
        .record_purchase(
            PurchaseCmd::new(alice, "alice", "bar").line(spirits, 1),
            &Identity::member("alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidProduct(_)));

    // The same product sells fine over the counter.
    engine
        .record_purchase(
            PurchaseCmd::new(alice, "alice", "bar").line(spirits, 1),
            &cashier("bob"),
        )
        .await
        .unwrap();
    assert_eq!(balance(&engine, alice).await, 1600);
}

#[tokio::test]
async fn selling_to_others_requires_the_sell_capability() {
    let (engine, db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 2000).await;
    let beer = insert_product(&db, "bar", "beer", 250, 30.0, 1.0, true, None).await;

    let err = engine
        .record_purchase(
            PurchaseCmd::new(alice, "alice", "bar").line(beer, 1),
            &Identity::member("mallory"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 2000).await;

    let err = engine
        .record_purchase(
            PurchaseCmd::new(alice, "alice", "bar"),
            &Identity::member("alice"),
        )
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::EmptyCart);
}

#[tokio::test]
async fn frozen_account_refuses_purchases_and_top_ups() {
    let (engine, db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 2000).await;
    let beer = insert_product(&db, "bar", "beer", 250, 30.0, 1.0, true, None).await;
    engine
        .set_account_frozen(alice, true, &admin())
        .await
        .unwrap();

    let err = engine
        .record_purchase(
            PurchaseCmd::new(alice, "alice", "bar").line(beer, 1),
            &Identity::member("alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AccountFrozen(_)));

    let err = engine
        .top_up(TopUpCmd::new(alice, 100), &admin())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AccountFrozen(_)));
    assert_eq!(balance(&engine, alice).await, 2000);
}

#[tokio::test]
async fn transfer_moves_money_as_a_linked_pair() {
    let (engine, db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 1000).await;
    let bob = personal_account(&engine, "bob", 0).await;

    let (debit, credit) = engine
        .record_transfer(
            TransferCmd::new(alice, bob, 400).description("bus fare"),
            &Identity::member("alice"),
        )
        .await
        .unwrap();

    assert_eq!(debit.amount_minor, -400);
    assert_eq!(credit.amount_minor, 400);
    assert_eq!(debit.group_id, credit.group_id);
    assert_eq!(balance(&engine, alice).await, 600);
    assert_eq!(balance(&engine, bob).await, 400);
    assert_eq!(completed_sum(&db, alice).await, 600);
    assert_eq!(completed_sum(&db, bob).await, 400);
}

#[tokio::test]
async fn transfer_beyond_the_balance_moves_nothing() {
    let (engine, _db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 100).await;
    let bob = personal_account(&engine, "bob", 0).await;

    let err = engine
        .record_transfer(
            TransferCmd::new(alice, bob, 400),
            &Identity::member("alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(balance(&engine, alice).await, 100);
    assert_eq!(balance(&engine, bob).await, 0);
}

#[tokio::test]
async fn transfer_from_someone_elses_wallet_is_forbidden() {
    let (engine, _db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 1000).await;
    let bob = personal_account(&engine, "bob", 0).await;

    let err = engine
        .record_transfer(TransferCmd::new(alice, bob, 100), &Identity::member("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    // Admins may move anyone's money.
    engine
        .record_transfer(TransferCmd::new(alice, bob, 100), &admin())
        .await
        .unwrap();
    assert_eq!(balance(&engine, bob).await, 100);
}

#[tokio::test]
async fn cancelling_a_purchase_restores_balance_and_stock() {
    let (engine, db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 2000).await;
    let beer = insert_product(&db, "bar", "beer", 250, 30.0, 0.5, true, None).await;

    let rows = engine
        .record_purchase(
            PurchaseCmd::new(alice, "alice", "bar").line(beer, 4),
            &Identity::member("alice"),
        )
        .await
        .unwrap();
    assert_eq!(balance(&engine, alice).await, 1000);
    assert!((product_stock(&db, beer).await - 28.0).abs() < 1e-9);

    let compensation = engine
        .cancel_transaction(rows[0].id, &Identity::member("alice"))
        .await
        .unwrap();
    assert_eq!(compensation.amount_minor, 1000);
    assert_eq!(compensation.status, TransactionStatus::Cancelled);
    assert_eq!(balance(&engine, alice).await, 2000);
    assert!((product_stock(&db, beer).await - 30.0).abs() < 1e-9);
    assert_eq!(completed_sum(&db, alice).await, 2000);

    // The ledger still holds every row; none were deleted.
    let history = engine
        .transactions_for_account(alice, 10, &admin())
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn a_transaction_cannot_be_cancelled_twice() {
    let (engine, _db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 1000).await;
    let bob = personal_account(&engine, "bob", 0).await;

    let (debit, _) = engine
        .record_transfer(
            TransferCmd::new(alice, bob, 300),
            &Identity::member("alice"),
        )
        .await
        .unwrap();

    engine.cancel_transaction(debit.id, &admin()).await.unwrap();
    let err = engine
        .cancel_transaction(debit.id, &admin())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCancelled(_)));
}

#[tokio::test]
async fn only_the_issuer_or_an_admin_may_cancel() {
    let (engine, _db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 1000).await;
    let bob = personal_account(&engine, "bob", 0).await;

    let (debit, _) = engine
        .record_transfer(
            TransferCmd::new(alice, bob, 300),
            &Identity::member("alice"),
        )
        .await
        .unwrap();

    let err = engine
        .cancel_transaction(debit.id, &Identity::member("mallory"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn cancelling_a_group_reverses_the_whole_pair() {
    let (engine, db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 1000).await;
    let bob = personal_account(&engine, "bob", 500).await;

    let (debit, _) = engine
        .record_transfer(
            TransferCmd::new(alice, bob, 400),
            &Identity::member("alice"),
        )
        .await
        .unwrap();
    let group_id = debit.group_id.unwrap();

    let reversals = engine.cancel_group(group_id, &admin()).await.unwrap();
    assert_eq!(reversals.len(), 2);
    assert_eq!(balance(&engine, alice).await, 1000);
    assert_eq!(balance(&engine, bob).await, 500);
    assert_eq!(completed_sum(&db, alice).await, 1000);
    assert_eq!(completed_sum(&db, bob).await, 500);

    let err = engine.cancel_group(group_id, &admin()).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCancelled(_)));
}

#[tokio::test]
async fn bulk_adjustment_targets_fail_independently() {
    let (engine, _db) = engine_with_db().await;
    let mut accounts = Vec::new();
    for user in ["a", "b", "c", "d", "e"] {
        accounts.push(personal_account(&engine, user, 100).await);
    }
    engine
        .set_account_frozen(accounts[2], true, &admin())
        .await
        .unwrap();

    let outcome = engine
        .record_adjustment_batch(
            AdjustmentBatchCmd::new(accounts.clone(), -150, "storm damage levy"),
            &admin(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded.len(), 4);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].account_id, accounts[2]);
    assert!(matches!(
        outcome.failures[0].reason,
        EngineError::AccountFrozen(_)
    ));
    for tx in &outcome.succeeded {
        assert_eq!(tx.group_id, Some(outcome.group_id));
        assert_eq!(tx.kind(), TransactionKind::Adjustment);
    }
    // Corrections may overdraw.
    assert_eq!(balance(&engine, accounts[0]).await, -50);
    // The frozen target kept its balance.
    assert_eq!(balance(&engine, accounts[2]).await, 100);
}

#[tokio::test]
async fn cancelling_a_partial_batch_reverses_only_its_rows() {
    let (engine, db) = engine_with_db().await;
    let mut accounts = Vec::new();
    for user in ["a", "b", "c", "d", "e"] {
        accounts.push(personal_account(&engine, user, 100).await);
    }
    engine
        .set_account_frozen(accounts[2], true, &admin())
        .await
        .unwrap();

    let outcome = engine
        .record_adjustment_batch(
            AdjustmentBatchCmd::new(accounts.clone(), -150, "storm damage levy"),
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.succeeded.len(), 4);

    let reversals = engine.cancel_group(outcome.group_id, &admin()).await.unwrap();
    assert_eq!(reversals.len(), 4);
    for (i, account) in accounts.iter().enumerate() {
        assert_eq!(balance(&engine, *account).await, 100, "account {i}");
        assert_eq!(completed_sum(&db, *account).await, 100, "account {i}");
    }
    // The frozen target never had a row in the group; it is still frozen.
    let err = engine
        .top_up(TopUpCmd::new(accounts[2], 10), &admin())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AccountFrozen(_)));
}

#[tokio::test]
async fn adjustments_are_admin_only() {
    let (engine, _db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 100).await;

    let err = engine
        .record_adjustment_batch(
            AdjustmentBatchCmd::new(vec![alice], 50, "oops"),
            &Identity::member("alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn duplicate_account_per_owner_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    personal_account(&engine, "alice", 0).await;

    let err = engine
        .new_account(AccountOwner::Personal("alice".to_string()), &admin())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("alice".to_string()));
}

#[tokio::test]
async fn members_cannot_read_other_wallets() {
    let (engine, _db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 100).await;

    let err = engine
        .account(alice, &Identity::member("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine
        .transactions_for_account(alice, 10, &Identity::member("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    engine
        .account_for_user("alice", &Identity::member("alice"))
        .await
        .unwrap();
}

#[tokio::test]
async fn balances_always_match_the_completed_rows() {
    let (engine, db) = engine_with_db().await;
    let alice = personal_account(&engine, "alice", 5000).await;
    let bob = personal_account(&engine, "bob", 0).await;
    let beer = insert_product(&db, "bar", "beer", 250, 30.0, 1.0, true, None).await;

    let rows = engine
        .record_purchase(
            PurchaseCmd::new(alice, "alice", "bar").line(beer, 3),
            &Identity::member("alice"),
        )
        .await
        .unwrap();
    engine
        .record_transfer(
            TransferCmd::new(alice, bob, 1200),
            &Identity::member("alice"),
        )
        .await
        .unwrap();
    engine
        .cancel_transaction(rows[0].id, &admin())
        .await
        .unwrap();
    engine
        .record_adjustment_batch(AdjustmentBatchCmd::new(vec![bob], -77, "fee"), &admin())
        .await
        .unwrap();

    for account in [alice, bob] {
        assert_eq!(
            balance(&engine, account).await,
            completed_sum(&db, account).await
        );
    }
}

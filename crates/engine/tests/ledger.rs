mod common;

use chrono::{TimeDelta, Utc};
use sea_orm::{ConnectionTrait, Statement, TransactionTrait};

use common::{client, failing_harness, harness, verified_account};
use engine::{EngineError, LedgerEntryCmd, LedgerEntryType, Role};

async fn ledger_rows(db: &sea_orm::DatabaseConnection) -> i64 {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM ledger_entries",
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

#[tokio::test]
async fn credit_then_debit_keeps_running_balance() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;

    let first = h
        .engine
        .append_entry(&LedgerEntryCmd::credit(account.id, 50, "top up"))
        .await
        .unwrap();
    assert_eq!(first.available_balance_minor, 50);
    assert_eq!(first.sequence, 1);
    assert_eq!(first.entry_type, LedgerEntryType::Credit);

    let second = h
        .engine
        .append_entry(&LedgerEntryCmd::debit(account.id, 20, "postage"))
        .await
        .unwrap();
    assert_eq!(second.available_balance_minor, 30);
    assert_eq!(second.sequence, 2);
    assert_eq!(h.engine.balance(account.id).await.unwrap().cents(), 30);
}

#[tokio::test]
async fn final_balance_is_credits_minus_debits() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;

    let moves: [(LedgerEntryType, i64); 7] = [
        (LedgerEntryType::Credit, 1_000),
        (LedgerEntryType::Debit, 250),
        (LedgerEntryType::Debit, 900),
        (LedgerEntryType::Credit, 75),
        (LedgerEntryType::Credit, 3),
        (LedgerEntryType::Debit, 1),
        (LedgerEntryType::Credit, 10_000),
    ];
    let mut expected = 0;
    for (entry_type, amount) in moves {
        let cmd = LedgerEntryCmd {
            account_id: account.id,
            entry_type,
            amount_minor: amount,
            description: "move".to_string(),
        };
        let entry = h.engine.append_entry(&cmd).await.unwrap();
        expected += match entry_type {
            LedgerEntryType::Credit => amount,
            LedgerEntryType::Debit => -amount,
        };
        assert_eq!(entry.available_balance_minor, expected);
    }

    assert_eq!(h.engine.balance(account.id).await.unwrap().cents(), 9_927);
    let audit = h.engine.audit_ledger(account.id).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.entries, 7);
}

#[tokio::test]
async fn balance_may_go_negative() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;

    let entry = h
        .engine
        .append_entry(&LedgerEntryCmd::debit(account.id, 1_250, "invoice"))
        .await
        .unwrap();
    assert_eq!(entry.available_balance_minor, -1_250);
    assert_eq!(h.engine.balance(account.id).await.unwrap().to_string(), "-12.50");
}

#[tokio::test]
async fn non_positive_amounts_write_nothing() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;

    for amount in [0, -5] {
        let err = h
            .engine
            .append_entry(&LedgerEntryCmd::credit(account.id, amount, "bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }
    assert!(h.engine.ledger_entries(account.id).await.unwrap().is_empty());
    assert_eq!(ledger_rows(&h.db).await, 0);
}

#[tokio::test]
async fn unknown_account_writes_nothing() {
    let h = harness().await;

    let err = h
        .engine
        .append_entry(&LedgerEntryCmd::credit(4_242, 10, "ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    assert_eq!(ledger_rows(&h.db).await, 0);
    assert!(matches!(
        h.engine.balance(4_242).await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn rolled_back_append_leaves_no_trace() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;
    h.engine
        .append_entry(&LedgerEntryCmd::credit(account.id, 100, "top up"))
        .await
        .unwrap();

    {
        let _guard = h.engine.lock_account(account.id).await;
        let tx = h.db.begin().await.unwrap();
        let pending = h
            .engine
            .append_entry_in(&tx, &LedgerEntryCmd::debit(account.id, 40, "aborted"))
            .await
            .unwrap();
        assert_eq!(pending.available_balance_minor, 60);
        tx.rollback().await.unwrap();
    }

    let today = Utc::now().date_naive();
    let history = h
        .engine
        .ledger_history(account.id, today, today)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(history.iter().all(|e| e.description != "aborted"));
    assert_eq!(h.engine.balance(account.id).await.unwrap().cents(), 100);

    let next = h
        .engine
        .append_entry(&LedgerEntryCmd::debit(account.id, 40, "retried"))
        .await
        .unwrap();
    assert_eq!(next.sequence, 2);
    assert_eq!(next.available_balance_minor, 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_do_not_lose_updates() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;
    let engine = h.engine.clone();

    let credit = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .append_entry(&LedgerEntryCmd::credit(account.id, 10, "credit"))
                .await
        })
    };
    let debit = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .append_entry(&LedgerEntryCmd::debit(account.id, 5, "debit"))
                .await
        })
    };
    credit.await.unwrap().unwrap();
    debit.await.unwrap().unwrap();

    assert_eq!(engine.balance(account.id).await.unwrap().cents(), 5);
    let entries = engine.ledger_entries(account.id).await.unwrap();
    assert_eq!(
        entries.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(engine.audit_ledger(account.id).await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_appends_stay_consistent() {
    let h = harness().await;
    let first = client(&h, "first@market.test").await;
    let second = verified_account(&h.engine, &h.db, "second@market.test", Role::Customer).await;
    let engine = h.engine.clone();

    let mut tasks = Vec::new();
    for i in 0..20_i64 {
        let engine = engine.clone();
        let account_id = if i % 2 == 0 { first.id } else { second.id };
        tasks.push(tokio::spawn(async move {
            let cmd = if i % 3 == 0 {
                LedgerEntryCmd::debit(account_id, i + 1, "debit")
            } else {
                LedgerEntryCmd::credit(account_id, i + 1, "credit")
            };
            engine.append_entry(&cmd).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let signed = |i: i64| if i % 3 == 0 { -(i + 1) } else { i + 1 };
    let expected_first: i64 = (0..20).filter(|i| i % 2 == 0).map(signed).sum();
    let expected_second: i64 = (0..20).filter(|i| i % 2 == 1).map(signed).sum();
    assert_eq!(engine.balance(first.id).await.unwrap().cents(), expected_first);
    assert_eq!(engine.balance(second.id).await.unwrap().cents(), expected_second);
    assert!(engine.audit_ledger(first.id).await.unwrap().is_consistent());
    assert!(engine.audit_ledger(second.id).await.unwrap().is_consistent());
}

#[tokio::test]
async fn accounts_are_independent() {
    let h = harness().await;
    let a = client(&h, "a@market.test").await;
    let b = client(&h, "b@market.test").await;

    h.engine
        .append_entry(&LedgerEntryCmd::credit(a.id, 70, "a"))
        .await
        .unwrap();
    let entry = h
        .engine
        .append_entry(&LedgerEntryCmd::credit(b.id, 5, "b"))
        .await
        .unwrap();
    assert_eq!(entry.sequence, 1);
    assert_eq!(entry.available_balance_minor, 5);
    assert_eq!(h.engine.balance(a.id).await.unwrap().cents(), 70);
}

#[tokio::test]
async fn history_is_filtered_by_day() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;
    h.engine
        .append_entry(&LedgerEntryCmd::credit(account.id, 10, "today"))
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let yesterday = today - TimeDelta::days(1);
    let week_ago = today - TimeDelta::days(7);

    assert_eq!(
        h.engine
            .ledger_history(account.id, week_ago, today)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(
        h.engine
            .ledger_history(account.id, week_ago, yesterday)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        h.engine.ledger_history(account.id, today, yesterday).await,
        Err(EngineError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn audit_reports_tampered_balance() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;
    let mut ids = Vec::new();
    for amount in [100, 200, 300] {
        let entry = h
            .engine
            .append_entry(&LedgerEntryCmd::credit(account.id, amount, "top up"))
            .await
            .unwrap();
        ids.push(entry.id);
    }

    h.db.execute(Statement::from_sql_and_values(
        h.db.get_database_backend(),
        "UPDATE ledger_entries SET available_balance_minor = 999 WHERE id = ?",
        vec![ids[1].into()],
    ))
    .await
    .unwrap();

    let audit = h.engine.audit_ledger(account.id).await.unwrap();
    assert!(!audit.is_consistent());
    assert_eq!(audit.first_mismatch, Some(ids[1]));
    assert_eq!(audit.replayed_balance_minor, 600);
    assert_eq!(audit.stored_balance_minor, 600);
}

#[tokio::test]
async fn recorded_payment_notifies_owner() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;
    h.notifier.clear();

    let outcome = h
        .engine
        .record_payment(" SHOP@market.test ", LedgerEntryType::Credit, 1_500, "bank transfer")
        .await
        .unwrap();
    assert!(outcome.warning.is_none());
    assert_eq!(outcome.value.available_balance_minor, 1_500);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec![account.email]);
    assert_eq!(sent[0].subject, "Payment update");
    assert!(sent[0].body.contains("15.00"));
}

#[tokio::test]
async fn failed_notification_keeps_committed_payment() {
    let (engine, db, _uploads) = failing_harness().await;
    let account = verified_account(&engine, &db, "shop@market.test", Role::Client).await;

    let outcome = engine
        .record_payment("shop@market.test", LedgerEntryType::Credit, 300, "cash")
        .await
        .unwrap();
    assert!(outcome.warning.is_some());
    assert_eq!(engine.balance(account.id).await.unwrap().cents(), 300);
}

#[tokio::test]
async fn append_gives_up_with_conflict_when_sequence_keeps_being_taken() {
    let h = harness().await;
    let account = client(&h, "shop@market.test").await;
    h.engine
        .append_entry(&LedgerEntryCmd::credit(account.id, 100, "top up"))
        .await
        .unwrap();

    // Every insert collides with a row holding the same sequence.
    h.db.execute_unprepared(
        "CREATE TRIGGER take_sequence BEFORE INSERT ON ledger_entries
         WHEN NOT EXISTS (
             SELECT 1 FROM ledger_entries
             WHERE account_id = NEW.account_id AND sequence = NEW.sequence
         )
         BEGIN
             INSERT INTO ledger_entries
                 (account_id, sequence, entry_type, amount_minor,
                  available_balance_minor, description, created_at)
             VALUES
                 (NEW.account_id, NEW.sequence, NEW.entry_type, NEW.amount_minor,
                  NEW.available_balance_minor, 'other writer', NEW.created_at);
         END",
    )
    .await
    .unwrap();

    let err = h
        .engine
        .append_entry(&LedgerEntryCmd::debit(account.id, 30, "postage"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)), "{err:?}");

    assert_eq!(ledger_rows(&h.db).await, 1);
    assert_eq!(h.engine.balance(account.id).await.unwrap().cents(), 100);
}

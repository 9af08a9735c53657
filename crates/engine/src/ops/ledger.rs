use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
    prelude::*,
};

use crate::{
    AccountGuard, EngineError, LedgerAudit, LedgerEntry, LedgerEntryCmd, LedgerEntryType,
    MoneyCents, Notification, Outcome, ResultEngine, accounts, ledger,
};

use super::{Engine, with_tx};

/// Appends that lost a sequence race are retried this many times in total.
const APPEND_ATTEMPTS: usize = 3;

impl Engine {
    /// Acquire the append guard of `account_id`.
    ///
    /// Hold it across a transaction that calls [`Engine::append_entry_in`].
    /// It must be taken before the transaction is opened.
    pub async fn lock_account(&self, account_id: i64) -> AccountGuard {
        self.locks.lock(account_id).await
    }

    /// Append a credit or debit to an account ledger and return the stored
    /// entry.
    ///
    /// The new running balance is the balance of the latest entry (or 0) plus
    /// or minus the amount. Appends on the same account are serialized, so no
    /// update is lost; nothing is written when validation fails.
    pub async fn append_entry(&self, cmd: &LedgerEntryCmd) -> ResultEngine<LedgerEntry> {
        validate_amount(cmd.amount_minor)?;
        let _guard = self.lock_account(cmd.account_id).await;

        retry_on_conflict(cmd.account_id, || self.append_once(cmd)).await
    }

    async fn append_once(&self, cmd: &LedgerEntryCmd) -> ResultEngine<LedgerEntry> {
        with_tx!(self, |db_tx| self.append_entry_in(&db_tx, cmd).await)
    }

    /// Same as [`Engine::append_entry`] but inside a caller-owned
    /// transaction, so the entry commits or rolls back together with the
    /// caller's other writes.
    ///
    /// The caller must hold [`Engine::lock_account`] for `cmd.account_id`.
    pub async fn append_entry_in(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &LedgerEntryCmd,
    ) -> ResultEngine<LedgerEntry> {
        validate_amount(cmd.amount_minor)?;
        self.require_account(db_tx, cmd.account_id).await?;

        let latest = ledger::Entity::find()
            .filter(ledger::Column::AccountId.eq(cmd.account_id))
            .order_by_desc(ledger::Column::Sequence)
            .one(db_tx)
            .await?;
        let (prior_balance, prior_sequence) = latest
            .map(|entry| (entry.available_balance_minor, entry.sequence))
            .unwrap_or((0, 0));

        let balance = cmd.entry_type.apply(
            MoneyCents::new(prior_balance),
            MoneyCents::new(cmd.amount_minor),
        )?;

        let entry = ledger::ActiveModel {
            id: ActiveValue::NotSet,
            account_id: ActiveValue::Set(cmd.account_id),
            sequence: ActiveValue::Set(prior_sequence + 1),
            entry_type: ActiveValue::Set(cmd.entry_type.as_str().to_string()),
            amount_minor: ActiveValue::Set(cmd.amount_minor),
            available_balance_minor: ActiveValue::Set(balance.cents()),
            description: ActiveValue::Set(cmd.description.trim().to_string()),
            created_at: ActiveValue::Set(Utc::now()),
        };
        let model = entry
            .insert(db_tx)
            .await
            .map_err(|err| append_error(cmd.account_id, err))?;

        tracing::debug!(
            account_id = cmd.account_id,
            sequence = model.sequence,
            entry_type = cmd.entry_type.as_str(),
            amount = cmd.amount_minor,
            balance = model.available_balance_minor,
            "ledger entry appended"
        );
        LedgerEntry::try_from(model)
    }

    /// Manual payment recorded by an admin for the account owning `email`.
    ///
    /// The account owner is notified once the entry is committed.
    pub async fn record_payment(
        &self,
        email: &str,
        entry_type: LedgerEntryType,
        amount_minor: i64,
        description: &str,
    ) -> ResultEngine<Outcome<LedgerEntry>> {
        let account = self.account_model_by_email(email).await?;
        let cmd = LedgerEntryCmd {
            account_id: account.id,
            entry_type,
            amount_minor,
            description: description.to_string(),
        };
        let entry = self.append_entry(&cmd).await?;

        let verb = match entry_type {
            LedgerEntryType::Credit => "credited to",
            LedgerEntryType::Debit => "debited from",
        };
        let warning = self
            .notify(Notification::new(
                account.email,
                "Payment update",
                format!(
                    "{} has been {verb} your account ({}). Available balance: {}.",
                    MoneyCents::new(entry.amount_minor),
                    entry.description,
                    MoneyCents::new(entry.available_balance_minor)
                ),
            ))
            .await;
        Ok(Outcome {
            value: entry,
            warning,
        })
    }

    /// Current balance of the account: the running balance of its latest
    /// entry, or 0 without entries.
    pub async fn balance(&self, account_id: i64) -> ResultEngine<MoneyCents> {
        let exists = accounts::Entity::find_by_id(account_id)
            .one(&self.database)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::KeyNotFound("account not exists".to_string()));
        }

        let latest = ledger::Entity::find()
            .filter(ledger::Column::AccountId.eq(account_id))
            .order_by_desc(ledger::Column::Sequence)
            .one(&self.database)
            .await?;
        Ok(MoneyCents::new(
            latest.map(|e| e.available_balance_minor).unwrap_or(0),
        ))
    }

    /// Entries created between the start of `from` and the end of `to` (UTC,
    /// both inclusive), oldest first.
    pub async fn ledger_history(
        &self,
        account_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        if from > to {
            return Err(EngineError::InvalidInput(
                "from date must not be after to date".to_string(),
            ));
        }
        let start: DateTime<Utc> = from.and_time(NaiveTime::MIN).and_utc();
        let end: DateTime<Utc> = to.and_time(NaiveTime::MIN).and_utc() + TimeDelta::days(1);

        let models = ledger::Entity::find()
            .filter(ledger::Column::AccountId.eq(account_id))
            .filter(ledger::Column::CreatedAt.gte(start))
            .filter(ledger::Column::CreatedAt.lt(end))
            .order_by_asc(ledger::Column::Sequence)
            .all(&self.database)
            .await?;
        models.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// Every entry of the account, oldest first.
    pub async fn ledger_entries(&self, account_id: i64) -> ResultEngine<Vec<LedgerEntry>> {
        let models = ledger::Entity::find()
            .filter(ledger::Column::AccountId.eq(account_id))
            .order_by_asc(ledger::Column::Sequence)
            .all(&self.database)
            .await?;
        models.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// Replays the whole ledger of an account and checks every stored running
    /// balance.
    pub async fn audit_ledger(&self, account_id: i64) -> ResultEngine<LedgerAudit> {
        let entries = self.ledger_entries(account_id).await?;
        let audit = crate::ledger::audit_entries(account_id, &entries)?;
        if !audit.is_consistent() {
            tracing::error!(
                account_id,
                first_mismatch = ?audit.first_mismatch,
                replayed = audit.replayed_balance_minor,
                stored = audit.stored_balance_minor,
                "ledger audit failed"
            );
        }
        Ok(audit)
    }
}

fn validate_amount(amount_minor: i64) -> ResultEngine<()> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidAmount(
            "amount must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Runs `attempt_once` until it stops failing with
/// [`EngineError::Conflict`], at most [`APPEND_ATTEMPTS`] times.
async fn retry_on_conflict<T, F, Fut>(account_id: i64, mut attempt_once: F) -> ResultEngine<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ResultEngine<T>>,
{
    let mut attempt = 1;
    loop {
        match attempt_once().await {
            Err(EngineError::Conflict(reason)) if attempt < APPEND_ATTEMPTS => {
                tracing::debug!(account_id, attempt, "ledger append raced, retrying: {reason}");
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// A duplicate `(account_id, sequence)` means another writer appended first.
fn append_error(account_id: i64, err: DbErr) -> EngineError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        EngineError::Conflict(format!("ledger of account {account_id} changed concurrently"))
    } else {
        EngineError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use sea_orm::{ConnectionTrait, Database};

    fn raced() -> EngineError {
        EngineError::Conflict("raced".to_string())
    }

    #[tokio::test]
    async fn conflict_is_retried_until_success() {
        let calls = Cell::new(0);
        let result = retry_on_conflict(7, || {
            calls.set(calls.get() + 1);
            let call = calls.get();
            async move { if call < APPEND_ATTEMPTS { Err(raced()) } else { Ok(call) } }
        })
        .await;
        assert_eq!(result, Ok(APPEND_ATTEMPTS));
        assert_eq!(calls.get(), APPEND_ATTEMPTS);
    }

    #[tokio::test]
    async fn conflict_surfaces_once_attempts_run_out() {
        let calls = Cell::new(0);
        let result: ResultEngine<()> = retry_on_conflict(7, || {
            calls.set(calls.get() + 1);
            async { Err(raced()) }
        })
        .await;
        assert_eq!(result, Err(raced()));
        assert_eq!(calls.get(), APPEND_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: ResultEngine<()> = retry_on_conflict(7, || {
            calls.set(calls.get() + 1);
            async { Err(EngineError::Unauthorized) }
        })
        .await;
        assert_eq!(result, Err(EngineError::Unauthorized));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn duplicate_sequence_maps_to_conflict() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        for sql in [
            "CREATE TABLE entries (account_id INTEGER NOT NULL, sequence INTEGER NOT NULL)",
            "CREATE UNIQUE INDEX uidx_entries ON entries (account_id, sequence)",
            "INSERT INTO entries VALUES (3, 1)",
        ] {
            db.execute_unprepared(sql).await.unwrap();
        }

        let duplicate = db
            .execute_unprepared("INSERT INTO entries VALUES (3, 1)")
            .await
            .unwrap_err();
        assert_eq!(
            append_error(3, duplicate),
            EngineError::Conflict("ledger of account 3 changed concurrently".to_string())
        );

        let missing = db
            .execute_unprepared("INSERT INTO entries VALUES (3, NULL)")
            .await
            .unwrap_err();
        assert!(matches!(append_error(3, missing), EngineError::Database(_)));
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(validate_amount(1).is_ok());
        assert_eq!(
            validate_amount(0),
            Err(EngineError::InvalidAmount(
                "amount must be positive".to_string()
            ))
        );
        assert!(validate_amount(-5).is_err());
    }
}

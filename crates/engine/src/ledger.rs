//! Payment ledger primitives.
//!
//! A [`LedgerEntry`] is an immutable record of one balance-affecting event for
//! an account. Amounts are always positive; [`LedgerEntryType`] carries the
//! sign. Each entry stores the account's running balance right after it was
//! applied, so the current balance is the `available_balance_minor` of the
//! entry with the highest `sequence`.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Credit,
    Debit,
}

impl LedgerEntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    /// Applies an entry of this type to `balance`.
    ///
    /// `amount` must already be validated as positive.
    pub fn apply(self, balance: MoneyCents, amount: MoneyCents) -> ResultEngine<MoneyCents> {
        let next = match self {
            Self::Credit => balance.checked_add(amount),
            Self::Debit => balance.checked_sub(amount),
        };
        next.ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))
    }
}

impl TryFrom<&str> for LedgerEntryType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(EngineError::InvalidInput(format!(
                "invalid entry type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    /// Position of the entry in the account ledger, starting from 1.
    pub sequence: i64,
    pub entry_type: LedgerEntryType,
    pub amount_minor: i64,
    pub available_balance_minor: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: i64,
    pub sequence: i64,
    pub entry_type: String,
    pub amount_minor: i64,
    pub available_balance_minor: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for LedgerEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            account_id: model.account_id,
            sequence: model.sequence,
            entry_type: LedgerEntryType::try_from(model.entry_type.as_str())?,
            amount_minor: model.amount_minor,
            available_balance_minor: model.available_balance_minor,
            description: model.description,
            created_at: model.created_at,
        })
    }
}

/// Result of replaying an account ledger from its first entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub account_id: i64,
    pub entries: usize,
    /// Balance obtained by summing signed amounts.
    pub replayed_balance_minor: i64,
    /// Balance stored on the latest entry (0 when the ledger is empty).
    pub stored_balance_minor: i64,
    /// First entry whose stored running balance disagrees with the replay.
    pub first_mismatch: Option<i64>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.first_mismatch.is_none() && self.replayed_balance_minor == self.stored_balance_minor
    }
}

/// Replays `entries` (ordered by sequence) and checks every running balance.
pub(crate) fn audit_entries(account_id: i64, entries: &[LedgerEntry]) -> ResultEngine<LedgerAudit> {
    let mut balance = MoneyCents::ZERO;
    let mut first_mismatch = None;
    for entry in entries {
        balance = entry
            .entry_type
            .apply(balance, MoneyCents::new(entry.amount_minor))?;
        if first_mismatch.is_none() && balance.cents() != entry.available_balance_minor {
            first_mismatch = Some(entry.id);
        }
    }

    Ok(LedgerAudit {
        account_id,
        entries: entries.len(),
        replayed_balance_minor: balance.cents(),
        stored_balance_minor: entries
            .last()
            .map(|e| e.available_balance_minor)
            .unwrap_or(0),
        first_mismatch,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry(id: i64, entry_type: LedgerEntryType, amount: i64, balance: i64) -> LedgerEntry {
        LedgerEntry {
            id,
            account_id: 1,
            sequence: id,
            entry_type,
            amount_minor: amount,
            available_balance_minor: balance,
            description: String::new(),
            created_at: Utc.timestamp_opt(id, 0).unwrap(),
        }
    }

    #[test]
    fn credit_adds_debit_subtracts() {
        let balance = MoneyCents::new(100);
        assert_eq!(
            LedgerEntryType::Credit
                .apply(balance, MoneyCents::new(50))
                .unwrap(),
            MoneyCents::new(150)
        );
        assert_eq!(
            LedgerEntryType::Debit
                .apply(balance, MoneyCents::new(150))
                .unwrap(),
            MoneyCents::new(-50)
        );
    }

    #[test]
    fn apply_reports_overflow() {
        assert!(
            LedgerEntryType::Credit
                .apply(MoneyCents::new(i64::MAX), MoneyCents::new(1))
                .is_err()
        );
    }

    #[test]
    fn entry_type_parse() {
        assert_eq!(
            LedgerEntryType::try_from("Credit").unwrap(),
            LedgerEntryType::Credit
        );
        assert_eq!(
            LedgerEntryType::try_from("debit").unwrap(),
            LedgerEntryType::Debit
        );
        assert!(LedgerEntryType::try_from("refund").is_err());
    }

    #[test]
    fn audit_accepts_consistent_history() {
        let entries = vec![
            entry(1, LedgerEntryType::Credit, 5000, 5000),
            entry(2, LedgerEntryType::Debit, 2000, 3000),
            entry(3, LedgerEntryType::Debit, 4000, -1000),
        ];
        let audit = audit_entries(1, &entries).unwrap();
        assert!(audit.is_consistent());
        assert_eq!(audit.replayed_balance_minor, -1000);
        assert_eq!(audit.entries, 3);
    }

    #[test]
    fn audit_flags_lost_update() {
        // Two appends computed from the same predecessor.
        let entries = vec![
            entry(1, LedgerEntryType::Credit, 1000, 1000),
            entry(2, LedgerEntryType::Credit, 500, 1500),
            entry(3, LedgerEntryType::Debit, 200, 800),
        ];
        let audit = audit_entries(1, &entries).unwrap();
        assert!(!audit.is_consistent());
        assert_eq!(audit.first_mismatch, Some(3));
        assert_eq!(audit.replayed_balance_minor, 1300);
        assert_eq!(audit.stored_balance_minor, 800);
    }

    #[test]
    fn audit_of_empty_ledger() {
        let audit = audit_entries(7, &[]).unwrap();
        assert!(audit.is_consistent());
        assert_eq!(audit.stored_balance_minor, 0);
    }
}

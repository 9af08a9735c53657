//! Ledger endpoints: balances, history, audits and manual payments.

use api_types::{
    Outcome,
    ledger::{Audit, Balance, HistoryQuery, LedgerEntryView, PaymentNew},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::Account;

use crate::{ServerError, require_admin, require_self_or_admin, server::ServerState, views};

pub async fn balance(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(account_id): Path<i64>,
) -> Result<Json<Balance>, ServerError> {
    require_self_or_admin(&account, account_id)?;
    let balance = state.engine.balance(account_id).await?;
    Ok(Json(Balance {
        account_id,
        balance_minor: balance.cents(),
    }))
}

pub async fn my_history(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<LedgerEntryView>>, ServerError> {
    let entries = state
        .engine
        .ledger_history(account.id, query.from, query.to)
        .await?;
    Ok(Json(entries.into_iter().map(views::ledger_entry).collect()))
}

pub async fn history(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(account_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<LedgerEntryView>>, ServerError> {
    require_self_or_admin(&account, account_id)?;
    let entries = state
        .engine
        .ledger_history(account_id, query.from, query.to)
        .await?;
    Ok(Json(entries.into_iter().map(views::ledger_entry).collect()))
}

pub async fn audit(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(account_id): Path<i64>,
) -> Result<Json<Audit>, ServerError> {
    require_admin(&account)?;
    let audit = state.engine.audit_ledger(account_id).await?;
    let consistent = audit.is_consistent();
    Ok(Json(Audit {
        account_id: audit.account_id,
        entries: audit.entries,
        replayed_balance_minor: audit.replayed_balance_minor,
        stored_balance_minor: audit.stored_balance_minor,
        first_mismatch: audit.first_mismatch,
        consistent,
    }))
}

pub async fn record_payment(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Json(payload): Json<PaymentNew>,
) -> Result<(StatusCode, Json<Outcome<LedgerEntryView>>), ServerError> {
    require_admin(&account)?;
    let outcome = state
        .engine
        .record_payment(
            &payload.email,
            views::engine_entry_type(payload.entry_type),
            payload.amount_minor,
            &payload.description,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(views::outcome(outcome, views::ledger_entry)),
    ))
}

//! Profile and account administration endpoints.

use api_types::{
    Outcome, UploadQuery,
    account::{AccountFlags, AccountView, ListingRemoval, Profile},
};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{Account, ListingRemovalCmd};

use crate::{ServerError, require_admin, server::ServerState, views};

pub async fn me(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
) -> Result<Json<Profile>, ServerError> {
    let profile = state.engine.profile(&account.email).await?;
    Ok(Json(Profile {
        account: views::account(profile.account),
        balance_minor: profile.balance_minor,
    }))
}

pub async fn set_avatar(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<AccountView>, ServerError> {
    let account = state
        .engine
        .set_avatar(account.id, &body, &query.ext)
        .await?;
    Ok(Json(views::account(account)))
}

pub async fn list(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<AccountView>>, ServerError> {
    require_admin(&account)?;
    let accounts = state.engine.list_accounts().await?;
    Ok(Json(accounts.into_iter().map(views::account).collect()))
}

pub async fn update_flags(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(account_id): Path<i64>,
    Json(payload): Json<AccountFlags>,
) -> Result<Json<AccountView>, ServerError> {
    require_admin(&account)?;
    let updated = state
        .engine
        .update_account_flags(account_id, payload.is_vat, payload.can_upload_order)
        .await?;
    Ok(Json(views::account(updated)))
}

pub async fn listing_removal(
    State(state): State<ServerState>,
    Json(payload): Json<ListingRemoval>,
) -> Result<(StatusCode, Json<Outcome<()>>), ServerError> {
    let cmd = ListingRemovalCmd {
        name: payload.name,
        email: payload.email,
        marketplace: payload.marketplace,
        product_name: payload.product_name,
        product_url: payload.product_url,
        meeting: payload.meeting,
        comment: payload.comment,
    };
    let outcome = state.engine.request_listing_removal(&cmd).await?;
    Ok((StatusCode::ACCEPTED, Json(views::outcome(outcome, |()| ()))))
}

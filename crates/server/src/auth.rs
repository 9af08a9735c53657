//! Registration, login and password endpoints.

use api_types::{
    Outcome,
    account::AccountView,
    auth::{ChangePassword, ForgotPassword, Login, Register, ResetPassword, VerifyEmail},
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use engine::{Account, RegisterCmd};

use crate::{ServerError, server::ServerState, views};

pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<Register>,
) -> Result<(StatusCode, Json<Outcome<AccountView>>), ServerError> {
    let cmd = RegisterCmd::new(
        payload.email,
        payload.password,
        payload.first_name,
        payload.last_name,
        views::engine_role(payload.role),
    )
    .vat(payload.is_vat);
    let outcome = state.engine.register(cmd).await?;

    Ok((StatusCode::CREATED, Json(views::outcome(outcome, views::account))))
}

pub async fn login(
    State(state): State<ServerState>,
    Json(payload): Json<Login>,
) -> Result<Json<AccountView>, ServerError> {
    let account = state.engine.login(&payload.email, &payload.password).await?;
    Ok(Json(views::account(account)))
}

pub async fn verify_email(
    State(state): State<ServerState>,
    Json(payload): Json<VerifyEmail>,
) -> Result<Json<AccountView>, ServerError> {
    let account = state
        .engine
        .verify_email(&payload.email, &payload.otp)
        .await?;
    Ok(Json(views::account(account)))
}

pub async fn forgot_password(
    State(state): State<ServerState>,
    Json(payload): Json<ForgotPassword>,
) -> Result<(StatusCode, Json<Outcome<()>>), ServerError> {
    let outcome = state.engine.forgot_password(&payload.email).await?;
    Ok((StatusCode::ACCEPTED, Json(views::outcome(outcome, |()| ()))))
}

pub async fn reset_password(
    State(state): State<ServerState>,
    Json(payload): Json<ResetPassword>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .reset_password(&payload.email, &payload.otp, &payload.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Json(payload): Json<ChangePassword>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .change_password(
            account.id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

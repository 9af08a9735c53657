//! Label print orders.

use api_types::{
    Outcome, UploadQuery,
    label::{FileQuery, LabelOrderNew, LabelOrderView, LabelOrdersQuery},
};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use engine::Account;

use crate::{ServerError, require_admin, server::ServerState, views};

/// The body is the address file to print.
pub async fn create(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Query(query): Query<LabelOrderNew>,
    body: Bytes,
) -> Result<(StatusCode, Json<Outcome<LabelOrderView>>), ServerError> {
    let outcome = state
        .engine
        .create_label_order(
            account.id,
            query.weight_from,
            query.weight_to,
            query.price_minor,
            query.quantity,
            &body,
            &query.ext,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(views::outcome(outcome, views::label_order)),
    ))
}

pub async fn mine(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<LabelOrderView>>, ServerError> {
    let orders = state.engine.label_orders_for_account(account.id).await?;
    Ok(Json(orders.into_iter().map(views::label_order).collect()))
}

pub async fn all(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Query(query): Query<LabelOrdersQuery>,
) -> Result<Json<Vec<LabelOrderView>>, ServerError> {
    require_admin(&account)?;
    let orders = state
        .engine
        .all_label_orders(query.include_delivered)
        .await?;
    Ok(Json(orders.into_iter().map(views::label_order).collect()))
}

/// The body is the printed label file.
pub async fn deliver(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(label_order_id): Path<i64>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<Outcome<LabelOrderView>>, ServerError> {
    require_admin(&account)?;
    let outcome = state
        .engine
        .deliver_label_order(label_order_id, &body, &query.ext)
        .await?;
    Ok(Json(views::outcome(outcome, views::label_order)))
}

pub async fn file(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(label_order_id): Path<i64>,
    Query(query): Query<FileQuery>,
) -> Result<Response, ServerError> {
    let bytes = state
        .engine
        .label_order_file(label_order_id, account.id, query.output)
        .await?;
    Ok(views::binary_file(bytes))
}

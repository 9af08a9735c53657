//! Order endpoints: uploads, invoicing, payment status and tracking.

use api_types::{
    Outcome, Page, PageQuery,
    order::{
        InvoicePreviewView, InvoiceQuery, OrderDetailView, OrderLineView, OrderView,
        StatusUpdate, TrackingImported, TrackingUpdate,
    },
};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use engine::{Account, OrderStatusCmd};

use crate::{ServerError, products::page_params, require_admin, server::ServerState, views};

/// The body is the order CSV file.
pub async fn upload(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    body: Bytes,
) -> Result<(StatusCode, Json<OrderView>), ServerError> {
    let order = state.engine.upload_order(account.id, &body).await?;
    Ok((StatusCode::CREATED, Json(views::order(order))))
}

pub async fn mine(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<OrderView>>, ServerError> {
    let orders = state.engine.orders_for_account(account.id).await?;
    Ok(Json(orders.into_iter().map(views::order).collect()))
}

pub async fn pending(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<OrderView>>, ServerError> {
    require_admin(&account)?;
    let orders = state.engine.pending_orders().await?;
    Ok(Json(orders.into_iter().map(views::order).collect()))
}

pub async fn by_email(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<OrderView>>, ServerError> {
    require_admin(&account)?;
    let orders = state.engine.orders_by_email(&email).await?;
    Ok(Json(orders.into_iter().map(views::order).collect()))
}

pub async fn detail(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderDetailView>, ServerError> {
    let detail = state.engine.order_detail(order_id, account.id).await?;
    Ok(Json(views::order_detail(detail)))
}

pub async fn lines(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(order_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<OrderLineView>>, ServerError> {
    require_admin(&account)?;
    let (page_index, page_size) = page_params(&query);
    let page = state
        .engine
        .order_lines_page(order_id, page_index, page_size)
        .await?;
    Ok(Json(views::page(page, views::order_line)))
}

pub async fn export(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(order_id): Path<i64>,
) -> Result<Response, ServerError> {
    require_admin(&account)?;
    let bytes = state.engine.export_order_lines(order_id).await?;
    Ok(views::csv_file(bytes))
}

/// The body is a tracking CSV file.
pub async fn import_tracking(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(order_id): Path<i64>,
    body: Bytes,
) -> Result<Json<TrackingImported>, ServerError> {
    require_admin(&account)?;
    let updated = state.engine.import_tracking(order_id, &body).await?;
    Ok(Json(TrackingImported { updated }))
}

pub async fn update_tracking(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(order_line_id): Path<i64>,
    Json(payload): Json<TrackingUpdate>,
) -> Result<Json<OrderLineView>, ServerError> {
    require_admin(&account)?;
    let line = state
        .engine
        .update_order_line_tracking(
            order_line_id,
            payload.tracking_no.as_deref(),
            payload.tracking_company.as_deref(),
        )
        .await?;
    Ok(Json(views::order_line(line)))
}

pub async fn invoice_preview(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(order_id): Path<i64>,
) -> Result<Json<InvoicePreviewView>, ServerError> {
    require_admin(&account)?;
    let preview = state.engine.invoice_preview(order_id).await?;
    Ok(Json(views::invoice_preview(preview)))
}

/// The body is the invoice document; its total is debited from the owner.
pub async fn attach_invoice(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(order_id): Path<i64>,
    Query(query): Query<InvoiceQuery>,
    body: Bytes,
) -> Result<Json<Outcome<OrderView>>, ServerError> {
    require_admin(&account)?;
    let outcome = state
        .engine
        .attach_invoice(order_id, &body, &query.ext, query.total_amount_minor)
        .await?;
    Ok(Json(views::outcome(outcome, views::order)))
}

pub async fn invoice(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(order_id): Path<i64>,
) -> Result<Response, ServerError> {
    let bytes = state.engine.order_invoice(order_id, account.id).await?;
    Ok(views::binary_file(bytes))
}

pub async fn set_status(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(order_id): Path<i64>,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<Outcome<OrderView>>, ServerError> {
    require_admin(&account)?;
    let cmd = OrderStatusCmd {
        paid: payload.paid,
        delivered: payload.delivered,
    };
    let outcome = state.engine.set_order_status(order_id, cmd).await?;
    Ok(Json(views::outcome(outcome, views::order)))
}

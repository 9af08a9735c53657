//! Product catalogue endpoints.

use api_types::{
    Page, PageQuery, UploadQuery,
    product::{AdminUpdate, DetailsUpdate, ProductView},
};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use engine::{Account, AdminProductUpdateCmd};

use crate::{ServerError, require_admin, require_client, server::ServerState, views};

const DEFAULT_PAGE_SIZE: u64 = 20;

pub async fn page(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<ProductView>>, ServerError> {
    let (page_index, page_size) = page_params(&query);
    let page = state
        .engine
        .products_page(account.id, page_index, page_size)
        .await?;
    Ok(Json(views::page(page, views::product)))
}

pub async fn update_details(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(sku): Path<String>,
    Json(payload): Json<DetailsUpdate>,
) -> Result<Json<ProductView>, ServerError> {
    require_client(&account)?;
    let product = state
        .engine
        .update_product_details(
            account.id,
            &sku,
            &payload.title,
            payload.description.as_deref(),
        )
        .await?;
    Ok(Json(views::product(product)))
}

pub async fn admin_update(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(product_id): Path<i64>,
    Json(payload): Json<AdminUpdate>,
) -> Result<Json<ProductView>, ServerError> {
    require_admin(&account)?;
    let cmd = AdminProductUpdateCmd {
        packaging: payload.packaging,
        location: payload.location,
        weight_grams: payload.weight_grams,
        quantity: payload.quantity,
    };
    let product = state.engine.admin_update_product(product_id, &cmd).await?;
    Ok(Json(views::product(product)))
}

pub async fn set_image(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(product_id): Path<i64>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<ProductView>, ServerError> {
    let product = state
        .engine
        .set_product_image(account.id, product_id, &body, &query.ext)
        .await?;
    Ok(Json(views::product(product)))
}

pub(crate) fn page_params(query: &PageQuery) -> (u64, u64) {
    (
        query.page_index.unwrap_or(0),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )
}

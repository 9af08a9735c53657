//! Listing submission and review endpoints.

use api_types::{
    Outcome,
    listing::{ListingAdminView, ListingView, ListingsQuery, ProductProposal, Restock, Review},
};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use engine::{Account, ListingItem};

use crate::{ServerError, require_admin, require_client, server::ServerState, views};

/// The body is the listing CSV file.
pub async fn submit(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ListingView>), ServerError> {
    require_client(&account)?;
    let listing = state.engine.submit_listing(account.id, &body).await?;
    Ok((StatusCode::CREATED, Json(views::listing(listing))))
}

pub async fn propose(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Json(payload): Json<ProductProposal>,
) -> Result<(StatusCode, Json<ListingView>), ServerError> {
    require_client(&account)?;
    let item = ListingItem {
        name: payload.name,
        sku: payload.sku,
        description: payload.description,
        quantity: payload.quantity,
        price_minor: payload.price_minor,
        weight_grams: payload.weight_grams,
    };
    let listing = state.engine.propose_product(account.id, &item).await?;
    Ok((StatusCode::CREATED, Json(views::listing(listing))))
}

pub async fn restock(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Json(payload): Json<Restock>,
) -> Result<(StatusCode, Json<ListingView>), ServerError> {
    require_client(&account)?;
    let listing = state
        .engine
        .request_restock(account.id, &payload.sku, payload.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(views::listing(listing))))
}

pub async fn mine(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<ListingView>>, ServerError> {
    let listings = state.engine.listings_for_account(account.id).await?;
    Ok(Json(listings.into_iter().map(views::listing).collect()))
}

pub async fn all(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<Vec<ListingAdminView>>, ServerError> {
    require_admin(&account)?;
    let listings = state
        .engine
        .all_listings(query.status.map(views::engine_listing_status))
        .await?;
    Ok(Json(
        listings.into_iter().map(views::listing_with_owner).collect(),
    ))
}

pub async fn file(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(listing_id): Path<i64>,
) -> Result<Response, ServerError> {
    let bytes = state.engine.listing_file(listing_id, account.id).await?;
    Ok(views::csv_file(bytes))
}

pub async fn review(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(listing_id): Path<i64>,
    Json(payload): Json<Review>,
) -> Result<Json<Outcome<ListingView>>, ServerError> {
    require_admin(&account)?;
    let outcome = state
        .engine
        .review_listing(
            listing_id,
            views::decision(payload.decision),
            payload.remarks.as_deref(),
        )
        .await?;
    Ok(Json(views::outcome(outcome, views::listing)))
}

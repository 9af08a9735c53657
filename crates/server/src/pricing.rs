//! Weight band price tables.

use api_types::pricing::{BandKind, PriceBandUpsert, PriceBandView, WeightQuery};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use engine::{Account, EngineError};

use crate::{ServerError, require_admin, server::ServerState, views};

pub async fn list(
    State(state): State<ServerState>,
    Path(kind): Path<BandKind>,
) -> Result<Json<Vec<PriceBandView>>, ServerError> {
    let bands = state
        .engine
        .price_bands(views::engine_band_kind(kind))
        .await?;
    Ok(Json(bands.into_iter().map(views::price_band).collect()))
}

pub async fn upsert(
    Extension(account): Extension<Account>,
    State(state): State<ServerState>,
    Path(kind): Path<BandKind>,
    Json(payload): Json<PriceBandUpsert>,
) -> Result<Json<PriceBandView>, ServerError> {
    require_admin(&account)?;
    let band = state
        .engine
        .upsert_price_band(
            views::engine_band_kind(kind),
            payload.id,
            payload.weight_from,
            payload.weight_to,
            payload.price_minor,
        )
        .await?;
    Ok(Json(views::price_band(band)))
}

pub async fn quote(
    State(state): State<ServerState>,
    Path(kind): Path<BandKind>,
    Query(query): Query<WeightQuery>,
) -> Result<Json<PriceBandView>, ServerError> {
    let band = state
        .engine
        .price_for_weight(views::engine_band_kind(kind), query.weight_grams)
        .await?
        .ok_or_else(|| {
            EngineError::KeyNotFound(format!("no band covers {} grams", query.weight_grams))
        })?;
    Ok(Json(views::price_band(band)))
}

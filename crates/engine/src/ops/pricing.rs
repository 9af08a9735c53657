use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    BandKind, EngineError, PriceBand, ResultEngine,
    price_bands::{self, overlaps, validate_band},
};

use super::{Engine, with_tx};

impl Engine {
    /// Create a band (`id == None`) or replace an existing one.
    ///
    /// A band may not share any weight with another band of the same kind.
    pub async fn upsert_price_band(
        &self,
        kind: BandKind,
        id: Option<i64>,
        weight_from: i64,
        weight_to: i64,
        price_minor: i64,
    ) -> ResultEngine<PriceBand> {
        validate_band(weight_from, weight_to, price_minor)?;

        let model = with_tx!(self, |db_tx| {
            let bands = price_bands::Entity::find()
                .filter(price_bands::Column::Kind.eq(kind.as_str()))
                .all(&db_tx)
                .await?;

            if matches!(id, Some(id) if !bands.iter().any(|b| b.id == id)) {
                return Err(EngineError::KeyNotFound("price band not exists".to_string()));
            }
            let clash = bands.iter().any(|b| {
                Some(b.id) != id && overlaps(weight_from, weight_to, b.weight_from, b.weight_to)
            });
            if clash {
                return Err(EngineError::InvalidInput(
                    "This combination already exist".to_string(),
                ));
            }

            let active = price_bands::ActiveModel {
                id: id.map_or(ActiveValue::NotSet, ActiveValue::Set),
                kind: ActiveValue::Set(kind.as_str().to_string()),
                weight_from: ActiveValue::Set(weight_from),
                weight_to: ActiveValue::Set(weight_to),
                price_minor: ActiveValue::Set(price_minor),
            };
            let model = match id {
                Some(_) => active.update(&db_tx).await?,
                None => active.insert(&db_tx).await?,
            };
            Ok::<_, EngineError>(model)
        })?;

        tracing::info!(
            kind = kind.as_str(),
            band_id = model.id,
            weight_from,
            weight_to,
            price_minor,
            "price band saved"
        );
        PriceBand::try_from(model)
    }

    /// Bands of one kind ordered by weight.
    pub async fn price_bands(&self, kind: BandKind) -> ResultEngine<Vec<PriceBand>> {
        let models = price_bands::Entity::find()
            .filter(price_bands::Column::Kind.eq(kind.as_str()))
            .order_by_asc(price_bands::Column::WeightFrom)
            .all(&self.database)
            .await?;
        models.into_iter().map(PriceBand::try_from).collect()
    }

    /// The band containing `weight_grams`, if any.
    pub async fn price_for_weight(
        &self,
        kind: BandKind,
        weight_grams: i64,
    ) -> ResultEngine<Option<PriceBand>> {
        let model = price_bands::Entity::find()
            .filter(price_bands::Column::Kind.eq(kind.as_str()))
            .filter(price_bands::Column::WeightFrom.lte(weight_grams))
            .filter(price_bands::Column::WeightTo.gte(weight_grams))
            .one(&self.database)
            .await?;
        model.map(PriceBand::try_from).transpose()
    }
}

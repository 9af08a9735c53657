//! Weight-based price bands.
//!
//! Postage bands price the shipping of an order line by its total weight;
//! label bands price printed shipping labels. Within one kind, bands never
//! overlap, so a weight matches at most one band.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandKind {
    Postage,
    Label,
}

impl BandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postage => "postage",
            Self::Label => "label",
        }
    }
}

impl TryFrom<&str> for BandKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postage" => Ok(Self::Postage),
            "label" => Ok(Self::Label),
            other => Err(EngineError::InvalidInput(format!("invalid band kind: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub id: i64,
    pub kind: BandKind,
    /// Inclusive lower bound, in grams.
    pub weight_from: i64,
    /// Inclusive upper bound, in grams.
    pub weight_to: i64,
    pub price_minor: i64,
}

impl PriceBand {
    pub fn contains(&self, weight: i64) -> bool {
        self.weight_from <= weight && weight <= self.weight_to
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "price_bands")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub kind: String,
    pub weight_from: i64,
    pub weight_to: i64,
    pub price_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for PriceBand {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            kind: BandKind::try_from(model.kind.as_str())?,
            weight_from: model.weight_from,
            weight_to: model.weight_to,
            price_minor: model.price_minor,
        })
    }
}

pub(crate) fn validate_band(weight_from: i64, weight_to: i64, price_minor: i64) -> ResultEngine<()> {
    if weight_from < 0 {
        return Err(EngineError::InvalidInput(
            "weight_from must not be negative".to_string(),
        ));
    }
    if weight_from > weight_to {
        return Err(EngineError::InvalidInput(
            "weight_from must not exceed weight_to".to_string(),
        ));
    }
    if price_minor <= 0 {
        return Err(EngineError::InvalidAmount(
            "price must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Returns `true` when the inclusive ranges share at least one gram.
pub(crate) fn overlaps(a_from: i64, a_to: i64, b_from: i64, b_to: i64) -> bool {
    a_from <= b_to && b_from <= a_to
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_bounds_overlap() {
        assert!(overlaps(0, 100, 100, 200));
        assert!(overlaps(50, 60, 0, 1000));
        assert!(!overlaps(0, 99, 100, 200));
        assert!(!overlaps(201, 300, 100, 200));
    }

    #[test]
    fn band_validation() {
        assert!(validate_band(0, 100, 250).is_ok());
        assert!(validate_band(10, 10, 1).is_ok());
        assert!(validate_band(101, 100, 250).is_err());
        assert!(validate_band(0, 100, 0).is_err());
        assert!(validate_band(-1, 100, 10).is_err());
    }

    #[test]
    fn contains_is_inclusive() {
        let band = PriceBand {
            id: 1,
            kind: BandKind::Postage,
            weight_from: 100,
            weight_to: 200,
            price_minor: 350,
        };
        assert!(band.contains(100));
        assert!(band.contains(200));
        assert!(!band.contains(201));
    }
}

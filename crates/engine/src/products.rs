use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// A stocked product owned by a client account.
///
/// Products are only created or restocked through approved listings; `sku`
/// is unique across the whole marketplace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub title: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub price_minor: Option<i64>,
    pub weight_grams: i64,
    pub location: Option<String>,
    pub packaging: Option<String>,
    pub image: Option<String>,
    pub account_id: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub sku: String,
    pub title: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub price_minor: Option<i64>,
    pub weight_grams: i64,
    pub location: Option<String>,
    pub packaging: Option<String>,
    pub image: Option<String>,
    pub account_id: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Product {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            sku: model.sku,
            title: model.title,
            description: model.description,
            quantity: model.quantity,
            price_minor: model.price_minor,
            weight_grams: model.weight_grams,
            location: model.location,
            packaging: model.packaging,
            image: model.image,
            account_id: model.account_id,
            updated_at: model.updated_at,
        }
    }
}

/// Normalizes a SKU as typed by users and CSV authors.
pub(crate) fn normalize_sku(value: &str) -> Result<String, EngineError> {
    let sku = value.trim();
    if sku.is_empty() {
        return Err(EngineError::InvalidInput("sku must not be empty".to_string()));
    }
    Ok(sku.to_string())
}

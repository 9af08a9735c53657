use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A request to print shipping labels for a weight band.
///
/// The client uploads the label input file; an admin later delivers the
/// printed output file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOrder {
    pub id: i64,
    pub account_id: i64,
    pub weight_from: i64,
    pub weight_to: i64,
    pub price_minor: i64,
    pub quantity: i64,
    pub input_file: String,
    pub output_file: Option<String>,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "label_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: i64,
    pub weight_from: i64,
    pub weight_to: i64,
    pub price_minor: i64,
    pub quantity: i64,
    pub input_file: String,
    pub output_file: Option<String>,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
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

impl From<Model> for LabelOrder {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            weight_from: model.weight_from,
            weight_to: model.weight_to,
            price_minor: model.price_minor,
            quantity: model.quantity,
            input_file: model.input_file,
            output_file: model.output_file,
            delivered: model.delivered,
            created_at: model.created_at,
        }
    }
}

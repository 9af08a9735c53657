//! Customer orders uploaded as CSV by client accounts.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::OrderLine;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub account_id: i64,
    pub csv_file: String,
    /// Set once, when the invoice is attached.
    pub total_amount_minor: Option<i64>,
    pub invoice: Option<String>,
    pub paid: bool,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_invoiced(&self) -> bool {
        self.invoice.is_some()
    }
}

/// An order with its lines and owner, as returned by the detail views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub owner_email: String,
    pub owner_name: String,
    pub lines: Vec<OrderLine>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: i64,
    pub csv_file: String,
    pub total_amount_minor: Option<i64>,
    pub invoice: Option<String>,
    pub paid: bool,
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
    #[sea_orm(has_many = "super::order_lines::Entity")]
    OrderLines,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::order_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Order {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            csv_file: model.csv_file,
            total_amount_minor: model.total_amount_minor,
            invoice: model.invoice,
            paid: model.paid,
            delivered: model.delivered,
            created_at: model.created_at,
        }
    }
}

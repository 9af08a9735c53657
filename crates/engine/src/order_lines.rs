use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One shipment of an order: a product and the buyer it goes to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub product_sku: String,
    pub product_quantity: i64,
    pub buyer_name: String,
    pub buyer_address1: String,
    pub buyer_address2: Option<String>,
    pub buyer_city: String,
    pub buyer_country: String,
    pub buyer_post_code: String,
    pub tracking_no: Option<String>,
    pub tracking_company: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_id: i64,
    pub product_sku: String,
    pub product_quantity: i64,
    pub buyer_name: String,
    pub buyer_address1: String,
    pub buyer_address2: Option<String>,
    pub buyer_city: String,
    pub buyer_country: String,
    pub buyer_post_code: String,
    pub tracking_no: Option<String>,
    pub tracking_company: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for OrderLine {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_sku: model.product_sku,
            product_quantity: model.product_quantity,
            buyer_name: model.buyer_name,
            buyer_address1: model.buyer_address1,
            buyer_address2: model.buyer_address2,
            buyer_city: model.buyer_city,
            buyer_country: model.buyer_country,
            buyer_post_code: model.buyer_post_code,
            tracking_no: model.tracking_no,
            tracking_company: model.tracking_company,
        }
    }
}

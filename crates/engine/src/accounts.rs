//! Accounts.
//!
//! An account is a registered party of the marketplace. Clients own products
//! and upload orders, customers only buy, admins review listings and record
//! payments. Password material and the pending OTP never leave this module:
//! callers get an [`Account`].

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Client,
    Customer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Client => "client",
            Self::Customer => "customer",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "client" => Ok(Self::Client),
            "customer" => Ok(Self::Customer),
            other => Err(EngineError::InvalidInput(format!("invalid role: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_vat: bool,
    pub can_upload_order: bool,
    pub email_verified: bool,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_vat: bool,
    pub can_upload_order: bool,
    pub email_verified: bool,
    pub otp: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ledger::Entity")]
    LedgerEntries,
    #[sea_orm(has_many = "super::listings::Entity")]
    Listings,
    #[sea_orm(has_many = "super::label_orders::Entity")]
    LabelOrders,
}

impl Related<super::ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl Related<super::listings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listings.def()
    }
}

impl Related<super::label_orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LabelOrders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            role: Role::try_from(model.role.as_str())?,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            is_vat: model.is_vat,
            can_upload_order: model.can_upload_order,
            email_verified: model.email_verified,
            avatar: model.avatar,
            created_at: model.created_at,
        })
    }
}

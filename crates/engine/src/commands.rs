//! Command structs for engine operations.
//!
//! These types group parameters for write operations (registration, ledger
//! appends, product edits), keeping call sites readable and avoiding long
//! argument lists.

use crate::{LedgerEntryType, Role};

/// Register a new client or customer account.
#[derive(Clone, Debug)]
pub struct RegisterCmd {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_vat: bool,
}

impl RegisterCmd {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            role,
            is_vat: false,
        }
    }

    #[must_use]
    pub fn vat(mut self, is_vat: bool) -> Self {
        self.is_vat = is_vat;
        self
    }
}

/// Append one entry to an account ledger.
///
/// `amount_minor` is the absolute amount in cents; `entry_type` decides
/// whether it raises or lowers the balance.
#[derive(Clone, Debug)]
pub struct LedgerEntryCmd {
    pub account_id: i64,
    pub entry_type: LedgerEntryType,
    pub amount_minor: i64,
    pub description: String,
}

impl LedgerEntryCmd {
    #[must_use]
    pub fn credit(account_id: i64, amount_minor: i64, description: impl Into<String>) -> Self {
        Self {
            account_id,
            entry_type: LedgerEntryType::Credit,
            amount_minor,
            description: description.into(),
        }
    }

    #[must_use]
    pub fn debit(account_id: i64, amount_minor: i64, description: impl Into<String>) -> Self {
        Self {
            account_id,
            entry_type: LedgerEntryType::Debit,
            amount_minor,
            description: description.into(),
        }
    }
}

/// Warehouse-side product fields an admin may change.
///
/// `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct AdminProductUpdateCmd {
    pub packaging: Option<String>,
    pub location: Option<String>,
    pub weight_grams: Option<i64>,
    pub quantity: Option<i64>,
}

/// A public request to take a product down from an external marketplace.
#[derive(Clone, Debug)]
pub struct ListingRemovalCmd {
    pub name: String,
    pub email: String,
    pub marketplace: String,
    pub product_name: String,
    pub product_url: String,
    pub meeting: String,
    pub comment: String,
}

/// Paid/delivered flags of an order. `None` keeps the current value.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderStatusCmd {
    pub paid: Option<bool>,
    pub delivered: Option<bool>,
}

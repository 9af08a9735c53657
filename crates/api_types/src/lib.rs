use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Role of an account.
///
/// - `admin`: reviews listings, invoices orders and records payments.
/// - `client`: owns products, uploads orders and label orders.
/// - `customer`: buys only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Admin,
    Client,
    Customer,
}

/// Response of a write whose notification may not have been delivered.
///
/// `warning` is set when the write was committed but the email could not be
/// sent.
#[derive(Debug, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Query string of raw-body uploads.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadQuery {
    /// File extension, without the dot.
    pub ext: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page_index: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

pub mod auth {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Register {
        pub email: String,
        pub password: String,
        pub first_name: String,
        pub last_name: String,
        pub role: AccountRole,
        #[serde(default)]
        pub is_vat: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Login {
        pub email: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct VerifyEmail {
        pub email: String,
        pub otp: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ForgotPassword {
        pub email: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ResetPassword {
        pub email: String,
        pub otp: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ChangePassword {
        pub current_password: String,
        pub new_password: String,
    }
}

pub mod account {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: i64,
        pub email: String,
        pub first_name: String,
        pub last_name: String,
        pub role: AccountRole,
        pub is_vat: bool,
        pub can_upload_order: bool,
        pub email_verified: bool,
        pub avatar: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Profile {
        pub account: AccountView,
        /// Missing for admins.
        pub balance_minor: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountFlags {
        pub is_vat: bool,
        pub can_upload_order: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ListingRemoval {
        pub name: String,
        pub email: String,
        pub marketplace: String,
        pub product_name: String,
        pub product_url: String,
        #[serde(default)]
        pub meeting: String,
        #[serde(default)]
        pub comment: String,
    }
}

pub mod ledger {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EntryType {
        Credit,
        Debit,
    }

    /// Manual payment recorded by an admin.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentNew {
        pub email: String,
        pub entry_type: EntryType,
        /// Positive amount in cents.
        pub amount_minor: i64,
        pub description: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerEntryView {
        pub id: i64,
        pub sequence: i64,
        pub entry_type: EntryType,
        pub amount_minor: i64,
        pub available_balance_minor: i64,
        pub description: String,
        pub created_at: DateTime<Utc>,
    }

    /// Both days are inclusive (UTC).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct HistoryQuery {
        pub from: NaiveDate,
        pub to: NaiveDate,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Balance {
        pub account_id: i64,
        pub balance_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Audit {
        pub account_id: i64,
        pub entries: usize,
        pub replayed_balance_minor: i64,
        pub stored_balance_minor: i64,
        pub first_mismatch: Option<i64>,
        pub consistent: bool,
    }
}

pub mod listing {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ListingStatus {
        Pending,
        Approved,
        Rejected,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Decision {
        Approved,
        Rejected,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ListingView {
        pub id: i64,
        pub account_id: i64,
        pub status: ListingStatus,
        pub remarks: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ListingAdminView {
        #[serde(flatten)]
        pub listing: ListingView,
        pub owner_email: String,
        pub owner_name: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ListingsQuery {
        pub status: Option<ListingStatus>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Review {
        pub decision: Decision,
        pub remarks: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProductProposal {
        pub name: String,
        pub sku: String,
        pub description: Option<String>,
        pub quantity: i64,
        pub price_minor: Option<i64>,
        pub weight_grams: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Restock {
        pub sku: String,
        pub quantity: i64,
    }
}

pub mod product {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProductView {
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

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DetailsUpdate {
        pub title: String,
        pub description: Option<String>,
    }

    /// Warehouse fields. Missing fields keep their value.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct AdminUpdate {
        pub packaging: Option<String>,
        pub location: Option<String>,
        pub weight_grams: Option<i64>,
        pub quantity: Option<i64>,
    }
}

pub mod order {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OrderView {
        pub id: i64,
        pub account_id: i64,
        pub total_amount_minor: Option<i64>,
        pub has_invoice: bool,
        pub paid: bool,
        pub delivered: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OrderLineView {
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

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OrderDetailView {
        pub order: OrderView,
        pub owner_email: String,
        pub owner_name: String,
        pub lines: Vec<OrderLineView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TrackingUpdate {
        pub tracking_no: Option<String>,
        pub tracking_company: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TrackingImported {
        pub updated: usize,
    }

    /// Missing flags keep their value.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct StatusUpdate {
        pub paid: Option<bool>,
        pub delivered: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceQuery {
        pub ext: String,
        pub total_amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceLineView {
        pub order_line_id: i64,
        pub product_sku: String,
        pub quantity: i64,
        pub unit_price_minor: Option<i64>,
        pub goods_minor: i64,
        pub weight_grams: i64,
        pub postage_minor: Option<i64>,
        pub line_total_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoicePreviewView {
        pub order_id: i64,
        pub account_id: i64,
        pub owner_email: String,
        pub owner_name: String,
        pub is_vat: bool,
        pub has_invoice: bool,
        pub lines: Vec<InvoiceLineView>,
        pub total_minor: i64,
        pub incomplete: bool,
    }
}

pub mod pricing {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum BandKind {
        Postage,
        Label,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PriceBandView {
        pub id: i64,
        pub kind: BandKind,
        pub weight_from: i64,
        pub weight_to: i64,
        pub price_minor: i64,
    }

    /// Creates a band when `id` is missing.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PriceBandUpsert {
        pub id: Option<i64>,
        pub weight_from: i64,
        pub weight_to: i64,
        pub price_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WeightQuery {
        pub weight_grams: i64,
    }
}

pub mod label {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LabelOrderView {
        pub id: i64,
        pub account_id: i64,
        pub weight_from: i64,
        pub weight_to: i64,
        pub price_minor: i64,
        pub quantity: i64,
        pub has_output: bool,
        pub delivered: bool,
        pub created_at: DateTime<Utc>,
    }

    /// Query string of a label order upload; the body is the address file.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct LabelOrderNew {
        pub weight_from: i64,
        pub weight_to: i64,
        pub price_minor: i64,
        pub quantity: i64,
        pub ext: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct LabelOrdersQuery {
        #[serde(default)]
        pub include_delivered: bool,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct FileQuery {
        /// Printed file instead of the uploaded input.
        #[serde(default)]
        pub output: bool,
    }
}

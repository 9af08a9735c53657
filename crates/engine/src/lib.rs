pub use accounts::{Account, Role};
pub use attachments::{AttachmentStore, Folder};
pub use commands::{
    AdminProductUpdateCmd, LedgerEntryCmd, ListingRemovalCmd, OrderStatusCmd, RegisterCmd,
};
pub use csv_rows::{ExportRow, ListingItem, ListingRow, OrderRow, TrackingRow};
pub use error::EngineError;
pub use label_orders::LabelOrder;
pub use ledger::{LedgerAudit, LedgerEntry, LedgerEntryType};
pub use listings::{Listing, ListingStatus, ListingWithOwner};
pub use locks::AccountGuard;
pub use money::MoneyCents;
pub use notify::{LogNotifier, Notification, Notifier, NotifyError, Outcome, WebhookNotifier};
pub use ops::{
    AccountProfile, Engine, EngineBuilder, InvoiceLine, InvoicePreview, Page, ReviewDecision,
};
pub use order_lines::OrderLine;
pub use orders::{Order, OrderDetail};
pub use price_bands::{BandKind, PriceBand};
pub use products::Product;

mod accounts;
mod attachments;
mod commands;
mod credentials;
mod csv_rows;
mod error;
mod label_orders;
mod ledger;
mod listings;
mod locks;
mod money;
mod notify;
mod ops;
mod order_lines;
mod orders;
mod price_bands;
mod products;

pub type ResultEngine<T> = Result<T, EngineError>;

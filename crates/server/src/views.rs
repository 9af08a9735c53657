//! Conversions from engine values to API payloads.

use api_types::{
    AccountRole, Outcome, Page,
    account::AccountView,
    label::LabelOrderView,
    ledger::{EntryType, LedgerEntryView},
    listing::{Decision, ListingAdminView, ListingStatus, ListingView},
    order::{InvoiceLineView, InvoicePreviewView, OrderDetailView, OrderLineView, OrderView},
    pricing::{BandKind, PriceBandView},
    product::ProductView,
};
use axum::{
    http::header,
    response::{IntoResponse, Response},
};

pub fn role(role: engine::Role) -> AccountRole {
    match role {
        engine::Role::Admin => AccountRole::Admin,
        engine::Role::Client => AccountRole::Client,
        engine::Role::Customer => AccountRole::Customer,
    }
}

pub fn engine_role(role: AccountRole) -> engine::Role {
    match role {
        AccountRole::Admin => engine::Role::Admin,
        AccountRole::Client => engine::Role::Client,
        AccountRole::Customer => engine::Role::Customer,
    }
}

pub fn entry_type(entry_type: engine::LedgerEntryType) -> EntryType {
    match entry_type {
        engine::LedgerEntryType::Credit => EntryType::Credit,
        engine::LedgerEntryType::Debit => EntryType::Debit,
    }
}

pub fn engine_entry_type(entry_type: EntryType) -> engine::LedgerEntryType {
    match entry_type {
        EntryType::Credit => engine::LedgerEntryType::Credit,
        EntryType::Debit => engine::LedgerEntryType::Debit,
    }
}

pub fn listing_status(status: engine::ListingStatus) -> ListingStatus {
    match status {
        engine::ListingStatus::Pending => ListingStatus::Pending,
        engine::ListingStatus::Approved => ListingStatus::Approved,
        engine::ListingStatus::Rejected => ListingStatus::Rejected,
    }
}

pub fn engine_listing_status(status: ListingStatus) -> engine::ListingStatus {
    match status {
        ListingStatus::Pending => engine::ListingStatus::Pending,
        ListingStatus::Approved => engine::ListingStatus::Approved,
        ListingStatus::Rejected => engine::ListingStatus::Rejected,
    }
}

pub fn decision(decision: Decision) -> engine::ReviewDecision {
    match decision {
        Decision::Approved => engine::ReviewDecision::Approved,
        Decision::Rejected => engine::ReviewDecision::Rejected,
    }
}

pub fn engine_band_kind(kind: BandKind) -> engine::BandKind {
    match kind {
        BandKind::Postage => engine::BandKind::Postage,
        BandKind::Label => engine::BandKind::Label,
    }
}

pub fn band_kind(kind: engine::BandKind) -> BandKind {
    match kind {
        engine::BandKind::Postage => BandKind::Postage,
        engine::BandKind::Label => BandKind::Label,
    }
}

pub fn account(account: engine::Account) -> AccountView {
    AccountView {
        id: account.id,
        email: account.email,
        first_name: account.first_name,
        last_name: account.last_name,
        role: role(account.role),
        is_vat: account.is_vat,
        can_upload_order: account.can_upload_order,
        email_verified: account.email_verified,
        avatar: account.avatar,
        created_at: account.created_at,
    }
}

pub fn ledger_entry(entry: engine::LedgerEntry) -> LedgerEntryView {
    LedgerEntryView {
        id: entry.id,
        sequence: entry.sequence,
        entry_type: entry_type(entry.entry_type),
        amount_minor: entry.amount_minor,
        available_balance_minor: entry.available_balance_minor,
        description: entry.description,
        created_at: entry.created_at,
    }
}

pub fn listing(listing: engine::Listing) -> ListingView {
    ListingView {
        id: listing.id,
        account_id: listing.account_id,
        status: listing_status(listing.status),
        remarks: listing.remarks,
        created_at: listing.created_at,
    }
}

pub fn listing_with_owner(value: engine::ListingWithOwner) -> ListingAdminView {
    ListingAdminView {
        listing: listing(value.listing),
        owner_email: value.owner_email,
        owner_name: value.owner_name,
    }
}

pub fn product(product: engine::Product) -> ProductView {
    ProductView {
        id: product.id,
        sku: product.sku,
        title: product.title,
        description: product.description,
        quantity: product.quantity,
        price_minor: product.price_minor,
        weight_grams: product.weight_grams,
        location: product.location,
        packaging: product.packaging,
        image: product.image,
        account_id: product.account_id,
        updated_at: product.updated_at,
    }
}

pub fn order(order: engine::Order) -> OrderView {
    OrderView {
        id: order.id,
        account_id: order.account_id,
        total_amount_minor: order.total_amount_minor,
        has_invoice: order.invoice.is_some(),
        paid: order.paid,
        delivered: order.delivered,
        created_at: order.created_at,
    }
}

pub fn order_line(line: engine::OrderLine) -> OrderLineView {
    OrderLineView {
        id: line.id,
        order_id: line.order_id,
        product_sku: line.product_sku,
        product_quantity: line.product_quantity,
        buyer_name: line.buyer_name,
        buyer_address1: line.buyer_address1,
        buyer_address2: line.buyer_address2,
        buyer_city: line.buyer_city,
        buyer_country: line.buyer_country,
        buyer_post_code: line.buyer_post_code,
        tracking_no: line.tracking_no,
        tracking_company: line.tracking_company,
    }
}

pub fn order_detail(detail: engine::OrderDetail) -> OrderDetailView {
    OrderDetailView {
        order: order(detail.order),
        owner_email: detail.owner_email,
        owner_name: detail.owner_name,
        lines: detail.lines.into_iter().map(order_line).collect(),
    }
}

pub fn invoice_preview(preview: engine::InvoicePreview) -> InvoicePreviewView {
    InvoicePreviewView {
        order_id: preview.order_id,
        account_id: preview.account_id,
        owner_email: preview.owner_email,
        owner_name: preview.owner_name,
        is_vat: preview.is_vat,
        has_invoice: preview.has_invoice,
        lines: preview
            .lines
            .into_iter()
            .map(|line| InvoiceLineView {
                order_line_id: line.order_line_id,
                product_sku: line.product_sku,
                quantity: line.quantity,
                unit_price_minor: line.unit_price_minor,
                goods_minor: line.goods_minor,
                weight_grams: line.weight_grams,
                postage_minor: line.postage_minor,
                line_total_minor: line.line_total_minor,
            })
            .collect(),
        total_minor: preview.total_minor,
        incomplete: preview.incomplete,
    }
}

pub fn price_band(band: engine::PriceBand) -> PriceBandView {
    PriceBandView {
        id: band.id,
        kind: band_kind(band.kind),
        weight_from: band.weight_from,
        weight_to: band.weight_to,
        price_minor: band.price_minor,
    }
}

pub fn label_order(order: engine::LabelOrder) -> LabelOrderView {
    LabelOrderView {
        id: order.id,
        account_id: order.account_id,
        weight_from: order.weight_from,
        weight_to: order.weight_to,
        price_minor: order.price_minor,
        quantity: order.quantity,
        has_output: order.output_file.is_some(),
        delivered: order.delivered,
        created_at: order.created_at,
    }
}

pub fn page<T, U>(page: engine::Page<T>, map: impl FnMut(T) -> U) -> Page<U> {
    Page {
        items: page.items.into_iter().map(map).collect(),
        total: page.total,
    }
}

pub fn outcome<T, U>(outcome: engine::Outcome<T>, map: impl FnOnce(T) -> U) -> Outcome<U> {
    Outcome {
        data: map(outcome.value),
        warning: outcome.warning,
    }
}

pub fn csv_file(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "text/csv")], bytes).into_response()
}

pub fn binary_file(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
}

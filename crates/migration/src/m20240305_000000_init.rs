//! Initial schema migration.
//!
//! - `accounts`: registered parties (admins, clients, customers)
//! - `ledger_entries`: append-only payment ledger with running balances
//! - `products`: inventory owned by client accounts
//! - `listings`: uploaded product CSVs waiting for admin review
//! - `orders` / `order_lines`: uploaded order CSVs
//! - `price_bands`: postage and label prices by weight range
//! - `label_orders`: print label requests

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    Role,
    IsVat,
    CanUploadOrder,
    EmailVerified,
    Otp,
    Avatar,
    CreatedAt,
}

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    AccountId,
    Sequence,
    EntryType,
    AmountMinor,
    AvailableBalanceMinor,
    Description,
    CreatedAt,
}

#[derive(Iden)]
enum Products {
    Table,
    Id,
    Sku,
    Title,
    Description,
    Quantity,
    PriceMinor,
    WeightGrams,
    Location,
    Packaging,
    Image,
    AccountId,
    UpdatedAt,
}

#[derive(Iden)]
enum Listings {
    Table,
    Id,
    AccountId,
    CsvFile,
    Status,
    Remarks,
    CreatedAt,
}

#[derive(Iden)]
enum Orders {
    Table,
    Id,
    AccountId,
    CsvFile,
    TotalAmountMinor,
    Invoice,
    Paid,
    Delivered,
    CreatedAt,
}

#[derive(Iden)]
enum OrderLines {
    Table,
    Id,
    OrderId,
    ProductSku,
    ProductQuantity,
    BuyerName,
    BuyerAddress1,
    BuyerAddress2,
    BuyerCity,
    BuyerCountry,
    BuyerPostCode,
    TrackingNo,
    TrackingCompany,
}

#[derive(Iden)]
enum PriceBands {
    Table,
    Id,
    Kind,
    WeightFrom,
    WeightTo,
    PriceMinor,
}

#[derive(Iden)]
enum LabelOrders {
    Table,
    Id,
    AccountId,
    WeightFrom,
    WeightTo,
    PriceMinor,
    Quantity,
    InputFile,
    OutputFile,
    Delivered,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Accounts::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Accounts::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Accounts::FirstName).string().not_null())
                    .col(ColumnDef::new(Accounts::LastName).string().not_null())
                    .col(ColumnDef::new(Accounts::Role).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::IsVat)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Accounts::CanUploadOrder)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Accounts::EmailVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Accounts::Otp).string())
                    .col(ColumnDef::new(Accounts::Avatar).string())
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Ledger entries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::AccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::Sequence)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::EntryType).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::AvailableBalanceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::Description)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_entries-account_id")
                            .from(LedgerEntries::Table, LedgerEntries::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // The running balance of entry n is derived from entry n-1: two writers
        // that read the same predecessor collide here instead of both committing.
        manager
            .create_index(
                Index::create()
                    .name("uidx-ledger_entries-account_id-sequence")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::AccountId)
                    .col(LedgerEntries::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-account_id-created_at")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::AccountId)
                    .col(LedgerEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Products
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::Sku).string().not_null().unique_key())
                    .col(ColumnDef::new(Products::Title).string().not_null())
                    .col(ColumnDef::new(Products::Description).string())
                    .col(ColumnDef::new(Products::Quantity).big_integer().not_null())
                    .col(ColumnDef::new(Products::PriceMinor).big_integer())
                    .col(ColumnDef::new(Products::WeightGrams).big_integer().not_null())
                    .col(ColumnDef::new(Products::Location).string())
                    .col(ColumnDef::new(Products::Packaging).string())
                    .col(ColumnDef::new(Products::Image).string())
                    .col(ColumnDef::new(Products::AccountId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-products-account_id")
                            .from(Products::Table, Products::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Listings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Listings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Listings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Listings::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(Listings::CsvFile).string().not_null())
                    .col(
                        ColumnDef::new(Listings::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Listings::Remarks).string())
                    .col(
                        ColumnDef::new(Listings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-listings-account_id")
                            .from(Listings::Table, Listings::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Orders + lines
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(Orders::CsvFile).string().not_null())
                    .col(ColumnDef::new(Orders::TotalAmountMinor).big_integer())
                    .col(ColumnDef::new(Orders::Invoice).string())
                    .col(
                        ColumnDef::new(Orders::Paid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Orders::Delivered)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-orders-account_id")
                            .from(Orders::Table, Orders::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderLines::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderLines::OrderId).big_integer().not_null())
                    .col(ColumnDef::new(OrderLines::ProductSku).string().not_null())
                    .col(
                        ColumnDef::new(OrderLines::ProductQuantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderLines::BuyerName).string().not_null())
                    .col(ColumnDef::new(OrderLines::BuyerAddress1).string().not_null())
                    .col(ColumnDef::new(OrderLines::BuyerAddress2).string())
                    .col(ColumnDef::new(OrderLines::BuyerCity).string().not_null())
                    .col(ColumnDef::new(OrderLines::BuyerCountry).string().not_null())
                    .col(ColumnDef::new(OrderLines::BuyerPostCode).string().not_null())
                    .col(ColumnDef::new(OrderLines::TrackingNo).string())
                    .col(ColumnDef::new(OrderLines::TrackingCompany).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-order_lines-order_id")
                            .from(OrderLines::Table, OrderLines::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-order_lines-order_id")
                    .table(OrderLines::Table)
                    .col(OrderLines::OrderId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Price bands
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PriceBands::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceBands::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PriceBands::Kind).string().not_null())
                    .col(ColumnDef::new(PriceBands::WeightFrom).big_integer().not_null())
                    .col(ColumnDef::new(PriceBands::WeightTo).big_integer().not_null())
                    .col(ColumnDef::new(PriceBands::PriceMinor).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Label orders
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LabelOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LabelOrders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LabelOrders::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(LabelOrders::WeightFrom).big_integer().not_null())
                    .col(ColumnDef::new(LabelOrders::WeightTo).big_integer().not_null())
                    .col(ColumnDef::new(LabelOrders::PriceMinor).big_integer().not_null())
                    .col(ColumnDef::new(LabelOrders::Quantity).big_integer().not_null())
                    .col(ColumnDef::new(LabelOrders::InputFile).string().not_null())
                    .col(ColumnDef::new(LabelOrders::OutputFile).string())
                    .col(
                        ColumnDef::new(LabelOrders::Delivered)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(LabelOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-label_orders-account_id")
                            .from(LabelOrders::Table, LabelOrders::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LabelOrders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PriceBands::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Listings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}

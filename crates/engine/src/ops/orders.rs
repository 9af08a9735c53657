use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sea_orm::{
    ActiveValue, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use serde::Serialize;

use crate::{
    BandKind, EngineError, ExportRow, Folder, LedgerEntry, LedgerEntryCmd, MoneyCents, Notification, Order,
    OrderDetail, OrderLine, OrderRow, OrderStatusCmd, Outcome, ResultEngine, Role, TrackingRow,
    csv_rows::{parse_rows, write_rows},
    order_lines, orders, products,
};

use super::{Engine, Page, check_page_size, normalize_optional_text, with_tx};

/// One priced line of an invoice draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InvoiceLine {
    pub order_line_id: i64,
    pub product_sku: String,
    pub quantity: i64,
    /// `None` when the product has no price yet.
    pub unit_price_minor: Option<i64>,
    pub goods_minor: i64,
    pub weight_grams: i64,
    /// `None` when no postage band covers the weight.
    pub postage_minor: Option<i64>,
    pub line_total_minor: i64,
}

/// Draft of the invoice an admin is about to attach to an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InvoicePreview {
    pub order_id: i64,
    pub account_id: i64,
    pub owner_email: String,
    pub owner_name: String,
    pub is_vat: bool,
    pub has_invoice: bool,
    pub lines: Vec<InvoiceLine>,
    pub total_minor: i64,
    /// `true` when a price or a postage band was missing for some line.
    pub incomplete: bool,
}

impl Engine {
    /// Upload an order CSV.
    ///
    /// Every SKU must be a product of the uploader and the quantities, summed
    /// per SKU, must fit the current stock. The order, its lines and the
    /// stock decrements commit together.
    pub async fn upload_order(&self, account_id: i64, csv: &[u8]) -> ResultEngine<Order> {
        let account = self.account(account_id).await?;
        if account.role != Role::Client || !account.can_upload_order {
            return Err(EngineError::Forbidden(
                "order upload is not enabled for this account".to_string(),
            ));
        }
        let rows = parse_rows::<OrderRow>(csv)?;

        let requested = quantities_by_sku(&rows)?;

        let stock: HashMap<String, products::Model> = products::Entity::find()
            .filter(products::Column::AccountId.eq(account_id))
            .filter(products::Column::Sku.is_in(requested.keys().cloned()))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|p| (p.sku.clone(), p))
            .collect();
        check_stock(&requested, &stock)?;

        let file = self.attachments.save(Folder::Orders, csv, "csv").await?;
        let inserted = self
            .insert_order(account_id, &file, &rows, &requested, &stock)
            .await;
        let order = match inserted {
            Ok(order) => order,
            Err(err) => {
                self.attachments.discard(Folder::Orders, &file).await;
                return Err(err);
            }
        };

        tracing::info!(
            account_id,
            order_id = order.id,
            lines = rows.len(),
            "order uploaded"
        );
        Ok(Order::from(order))
    }

    /// Orders of one account, newest first.
    pub async fn orders_for_account(&self, account_id: i64) -> ResultEngine<Vec<Order>> {
        let models = orders::Entity::find()
            .filter(orders::Column::AccountId.eq(account_id))
            .order_by_desc(orders::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Order::from).collect())
    }

    pub async fn orders_by_email(&self, email: &str) -> ResultEngine<Vec<Order>> {
        let account = self.account_by_email(email).await?;
        self.orders_for_account(account.id).await
    }

    /// Orders not delivered yet, oldest first.
    pub async fn pending_orders(&self) -> ResultEngine<Vec<Order>> {
        let models = orders::Entity::find()
            .filter(orders::Column::Delivered.eq(false))
            .order_by_asc(orders::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Order::from).collect())
    }

    /// Order with lines and owner. Non-admin viewers only see their own
    /// orders; other orders look missing.
    pub async fn order_detail(&self, order_id: i64, viewer_id: i64) -> ResultEngine<OrderDetail> {
        let viewer = self.account(viewer_id).await?;
        let order = self.require_order(order_id).await?;
        if !viewer.is_admin() && order.account_id != viewer_id {
            return Err(EngineError::KeyNotFound("order not exists".to_string()));
        }

        let owner = self.account(order.account_id).await?;
        let lines = order_lines::Entity::find()
            .filter(order_lines::Column::OrderId.eq(order_id))
            .order_by_asc(order_lines::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(OrderLine::from)
            .collect();

        Ok(OrderDetail {
            order,
            owner_name: owner.full_name(),
            owner_email: owner.email,
            lines,
        })
    }

    pub async fn order_lines_page(
        &self,
        order_id: i64,
        page_index: u64,
        page_size: u64,
    ) -> ResultEngine<Page<OrderLine>> {
        check_page_size(page_size)?;
        self.require_order(order_id).await?;
        let paginator = order_lines::Entity::find()
            .filter(order_lines::Column::OrderId.eq(order_id))
            .order_by_asc(order_lines::Column::Id)
            .paginate(&self.database, page_size);
        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page_index)
            .await?
            .into_iter()
            .map(OrderLine::from)
            .collect();
        Ok(Page { items, total })
    }

    pub async fn update_order_line_tracking(
        &self,
        order_line_id: i64,
        tracking_no: Option<&str>,
        tracking_company: Option<&str>,
    ) -> ResultEngine<OrderLine> {
        let exists = order_lines::Entity::find_by_id(order_line_id)
            .one(&self.database)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::KeyNotFound(
                "order line not exists".to_string(),
            ));
        }
        let model = order_lines::ActiveModel {
            id: ActiveValue::Set(order_line_id),
            tracking_no: ActiveValue::Set(normalize_optional_text(tracking_no)),
            tracking_company: ActiveValue::Set(normalize_optional_text(tracking_company)),
            ..Default::default()
        }
        .update(&self.database)
        .await?;
        Ok(OrderLine::from(model))
    }

    /// Apply a tracking CSV to the lines of one order.
    ///
    /// All rows are applied or none; empty cells keep the current value.
    /// Returns the number of updated lines.
    pub async fn import_tracking(&self, order_id: i64, csv: &[u8]) -> ResultEngine<usize> {
        self.require_order(order_id).await?;
        let rows = parse_rows::<TrackingRow>(csv)?;

        let updated = with_tx!(self, |db_tx| {
            for row in &rows {
                let belongs = order_lines::Entity::find_by_id(row.order_line)
                    .filter(order_lines::Column::OrderId.eq(order_id))
                    .one(&db_tx)
                    .await?
                    .is_some();
                if !belongs {
                    return Err(EngineError::InvalidCsv(format!(
                        "order line {} does not belong to order {order_id}",
                        row.order_line
                    )));
                }

                let mut active = order_lines::ActiveModel {
                    id: ActiveValue::Set(row.order_line),
                    ..Default::default()
                };
                if let Some(number) = &row.tracking_number {
                    active.tracking_no = ActiveValue::Set(Some(number.clone()));
                }
                if let Some(company) = &row.tracking_company {
                    active.tracking_company = ActiveValue::Set(Some(company.clone()));
                }
                if active.is_changed() {
                    active.update(&db_tx).await?;
                }
            }
            Ok::<_, EngineError>(rows.len())
        })?;

        tracing::info!(order_id, lines = updated, "tracking imported");
        Ok(updated)
    }

    /// Order lines as a warehouse CSV. Lines whose postcode appears more than
    /// once in the order are flagged so they can ship together.
    pub async fn export_order_lines(&self, order_id: i64) -> ResultEngine<Vec<u8>> {
        self.require_order(order_id).await?;
        let lines = order_lines::Entity::find()
            .filter(order_lines::Column::OrderId.eq(order_id))
            .order_by_asc(order_lines::Column::Id)
            .all(&self.database)
            .await?;

        let skus: Vec<String> = lines.iter().map(|l| l.product_sku.clone()).collect();
        let locations: HashMap<String, Option<String>> = products::Entity::find()
            .filter(products::Column::Sku.is_in(skus))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|p| (p.sku, p.location))
            .collect();

        let mut postcodes: HashMap<String, usize> = HashMap::new();
        for line in &lines {
            *postcodes.entry(postcode_key(&line.buyer_post_code)).or_default() += 1;
        }

        let rows: Vec<ExportRow> = lines
            .into_iter()
            .map(|line| ExportRow {
                order_line: line.id,
                location: locations.get(&line.product_sku).cloned().flatten(),
                shared_postcode: postcodes
                    .get(&postcode_key(&line.buyer_post_code))
                    .is_some_and(|count| *count > 1),
                product_sku: line.product_sku,
                product_quantity: line.product_quantity,
                buyer_name: line.buyer_name,
                buyer_address1: line.buyer_address1,
                buyer_address2: line.buyer_address2,
                buyer_city: line.buyer_city,
                buyer_country: line.buyer_country,
                buyer_post_code: line.buyer_post_code,
                tracking_company: line.tracking_company,
                tracking_number: line.tracking_no,
            })
            .collect();
        write_rows(&rows)
    }

    /// Price every line of an order: goods at the product price plus postage
    /// for the line weight.
    pub async fn invoice_preview(&self, order_id: i64) -> ResultEngine<InvoicePreview> {
        let order = self.require_order(order_id).await?;
        let owner = self.account(order.account_id).await?;
        let lines = order_lines::Entity::find()
            .filter(order_lines::Column::OrderId.eq(order_id))
            .order_by_asc(order_lines::Column::Id)
            .all(&self.database)
            .await?;
        let catalogue: HashMap<String, products::Model> = products::Entity::find()
            .filter(products::Column::AccountId.eq(order.account_id))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|p| (p.sku.clone(), p))
            .collect();
        let bands = self.price_bands(BandKind::Postage).await?;

        let mut incomplete = false;
        let mut total = MoneyCents::ZERO;
        let mut invoice_lines = Vec::with_capacity(lines.len());
        for line in lines {
            let product = catalogue.get(&line.product_sku);
            let unit_price_minor = product.and_then(|p| p.price_minor);
            let weight_grams = product
                .map_or(0, |p| p.weight_grams)
                .checked_mul(line.product_quantity)
                .ok_or_else(|| line_overflow(&line))?;
            let goods = MoneyCents::new(unit_price_minor.unwrap_or(0))
                .checked_times(line.product_quantity)
                .ok_or_else(|| line_overflow(&line))?;
            let postage_minor = bands
                .iter()
                .find(|b| b.contains(weight_grams))
                .map(|b| b.price_minor);
            if unit_price_minor.is_none() || postage_minor.is_none() {
                incomplete = true;
            }
            let line_total = goods
                .checked_add(MoneyCents::new(postage_minor.unwrap_or(0)))
                .ok_or_else(|| line_overflow(&line))?;
            total = total.checked_add(line_total).ok_or_else(|| {
                EngineError::InvalidAmount(format!("total of order {order_id} is out of range"))
            })?;

            invoice_lines.push(InvoiceLine {
                order_line_id: line.id,
                product_sku: line.product_sku,
                quantity: line.product_quantity,
                unit_price_minor,
                goods_minor: goods.cents(),
                weight_grams,
                postage_minor,
                line_total_minor: line_total.cents(),
            });
        }

        Ok(InvoicePreview {
            order_id,
            account_id: order.account_id,
            owner_name: owner.full_name(),
            owner_email: owner.email,
            is_vat: owner.is_vat,
            has_invoice: order.is_invoiced(),
            lines: invoice_lines,
            total_minor: total.cents(),
            incomplete,
        })
    }

    /// Store the invoice of an order and debit its total from the owner's
    /// ledger, both in one transaction. An order is invoiced once.
    pub async fn attach_invoice(
        &self,
        order_id: i64,
        bytes: &[u8],
        extension: &str,
        total_amount_minor: i64,
    ) -> ResultEngine<Outcome<Order>> {
        if total_amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "invoice total must be positive".to_string(),
            ));
        }
        let order = self.require_order(order_id).await?;
        if order.is_invoiced() {
            return Err(EngineError::InvalidInput(format!(
                "order {order_id} already has an invoice"
            )));
        }

        let file = self
            .attachments
            .save(Folder::Invoices, bytes, extension)
            .await?;
        let _guard = self.lock_account(order.account_id).await;
        let result = self.store_invoice(order_id, &file, total_amount_minor).await;
        let (model, entry) = match result {
            Ok(value) => value,
            Err(err) => {
                self.attachments.discard(Folder::Invoices, &file).await;
                return Err(err);
            }
        };
        tracing::info!(
            order_id,
            total = total_amount_minor,
            balance = entry.available_balance_minor,
            "invoice attached"
        );

        let owner = self.account(model.account_id).await?;
        let warning = self
            .notify(Notification::new(
                owner.email,
                "Invoice",
                format!(
                    "The invoice for order {order_id} ({}) has been generated. \
                     Log in to your account to check the details.",
                    MoneyCents::new(total_amount_minor)
                ),
            ))
            .await;
        Ok(Outcome {
            value: Order::from(model),
            warning,
        })
    }

    /// Update paid/delivered flags.
    ///
    /// Marking an invoiced order paid credits its total back to the owner in
    /// the same transaction. A paid order cannot go back to unpaid.
    pub async fn set_order_status(
        &self,
        order_id: i64,
        cmd: OrderStatusCmd,
    ) -> ResultEngine<Outcome<Order>> {
        let order = self.require_order(order_id).await?;
        let _guard = self.lock_account(order.account_id).await;

        let (model, credited) = with_tx!(self, |db_tx| {
            let current = orders::Entity::find_by_id(order_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("order not exists".to_string()))?;
            if current.paid && cmd.paid == Some(false) {
                return Err(EngineError::InvalidInput(format!(
                    "order {order_id} is already paid"
                )));
            }
            let becomes_paid = !current.paid && cmd.paid == Some(true);
            let total = match (becomes_paid, current.total_amount_minor) {
                (true, Some(total)) => Some(total),
                (true, None) => {
                    return Err(EngineError::InvalidInput(format!(
                        "order {order_id} has no invoiced total"
                    )));
                }
                (false, _) => None,
            };

            let mut active = orders::ActiveModel {
                id: ActiveValue::Set(order_id),
                ..Default::default()
            };
            if let Some(paid) = cmd.paid {
                active.paid = ActiveValue::Set(paid);
            }
            if let Some(delivered) = cmd.delivered {
                active.delivered = ActiveValue::Set(delivered);
            }
            let model = if active.is_changed() {
                active.update(&db_tx).await?
            } else {
                current
            };

            let credited = match total {
                Some(total) => Some(
                    self.append_entry_in(
                        &db_tx,
                        &LedgerEntryCmd::credit(
                            model.account_id,
                            total,
                            format!("Amount credited for the order {order_id}"),
                        ),
                    )
                    .await?,
                ),
                None => None,
            };
            Ok::<_, EngineError>((model, credited))
        })?;
        tracing::info!(
            order_id,
            paid = model.paid,
            delivered = model.delivered,
            credited = credited.is_some(),
            "order status updated"
        );

        let warning = match &credited {
            Some(entry) => {
                let owner = self.account(model.account_id).await?;
                self.notify(Notification::new(
                    owner.email,
                    "Payment received",
                    format!(
                        "{} has been credited for order {order_id}. Available balance: {}.",
                        MoneyCents::new(entry.amount_minor),
                        MoneyCents::new(entry.available_balance_minor)
                    ),
                ))
                .await
            }
            None => None,
        };
        Ok(Outcome {
            value: Order::from(model),
            warning,
        })
    }

    /// Invoice file of an order. Clients may only read their own.
    pub async fn order_invoice(&self, order_id: i64, viewer_id: i64) -> ResultEngine<Vec<u8>> {
        let detail = self.order_detail(order_id, viewer_id).await?;
        let invoice = detail
            .order
            .invoice
            .ok_or_else(|| EngineError::KeyNotFound("invoice".to_string()))?;
        self.attachments.read(Folder::Invoices, &invoice).await
    }

    async fn insert_order(
        &self,
        account_id: i64,
        file: &str,
        rows: &[OrderRow],
        requested: &BTreeMap<String, i64>,
        stock: &HashMap<String, products::Model>,
    ) -> ResultEngine<orders::Model> {
        with_tx!(self, |db_tx| {
            let order = orders::ActiveModel {
                id: ActiveValue::NotSet,
                account_id: ActiveValue::Set(account_id),
                csv_file: ActiveValue::Set(file.to_string()),
                total_amount_minor: ActiveValue::Set(None),
                invoice: ActiveValue::Set(None),
                paid: ActiveValue::Set(false),
                delivered: ActiveValue::Set(false),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;

            let lines = rows.iter().map(|row| order_lines::ActiveModel {
                id: ActiveValue::NotSet,
                order_id: ActiveValue::Set(order.id),
                product_sku: ActiveValue::Set(row.product_sku.clone()),
                product_quantity: ActiveValue::Set(row.product_quantity),
                buyer_name: ActiveValue::Set(row.buyer_name.clone()),
                buyer_address1: ActiveValue::Set(row.buyer_address1.clone()),
                buyer_address2: ActiveValue::Set(row.buyer_address2.clone()),
                buyer_city: ActiveValue::Set(row.buyer_city.clone()),
                buyer_country: ActiveValue::Set(row.buyer_country.clone()),
                buyer_post_code: ActiveValue::Set(row.buyer_post_code.clone()),
                tracking_no: ActiveValue::Set(None),
                tracking_company: ActiveValue::Set(None),
            });
            order_lines::Entity::insert_many(lines).exec(&db_tx).await?;

            let now = Utc::now();
            for (sku, quantity) in requested {
                let product = stock
                    .get(sku)
                    .ok_or_else(|| EngineError::KeyNotFound(sku.clone()))?;
                // Guarded decrement: a concurrent upload may have taken the stock since the check.
                let updated = products::Entity::update_many()
                    .col_expr(
                        products::Column::Quantity,
                        Expr::col(products::Column::Quantity).sub(*quantity),
                    )
                    .col_expr(products::Column::UpdatedAt, Expr::value(now))
                    .filter(products::Column::Id.eq(product.id))
                    .filter(products::Column::Quantity.gte(*quantity))
                    .exec(&db_tx)
                    .await?;
                if updated.rows_affected == 0 {
                    return Err(EngineError::InsufficientStock(format!(
                        "Products {sku} do not have enough quantity"
                    )));
                }
            }
            Ok::<_, EngineError>(order)
        })
    }

    /// Record the invoice and debit the order total. The caller holds the
    /// account lock.
    async fn store_invoice(
        &self,
        order_id: i64,
        file: &str,
        total_amount_minor: i64,
    ) -> ResultEngine<(orders::Model, LedgerEntry)> {
        with_tx!(self, |db_tx| {
            let current = orders::Entity::find_by_id(order_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("order not exists".to_string()))?;
            if current.invoice.is_some() {
                return Err(EngineError::InvalidInput(format!(
                    "order {order_id} already has an invoice"
                )));
            }

            let model = orders::ActiveModel {
                id: ActiveValue::Set(order_id),
                total_amount_minor: ActiveValue::Set(Some(total_amount_minor)),
                invoice: ActiveValue::Set(Some(file.to_string())),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            let entry = self
                .append_entry_in(
                    &db_tx,
                    &LedgerEntryCmd::debit(
                        model.account_id,
                        total_amount_minor,
                        format!("Debited amount for the order {order_id}"),
                    ),
                )
                .await?;
            Ok::<_, EngineError>((model, entry))
        })
    }

    async fn require_order(&self, order_id: i64) -> ResultEngine<Order> {
        orders::Entity::find_by_id(order_id)
            .one(&self.database)
            .await?
            .map(Order::from)
            .ok_or_else(|| EngineError::KeyNotFound("order not exists".to_string()))
    }
}

/// Reports every unknown SKU, then every SKU short of stock.
fn quantities_by_sku(rows: &[OrderRow]) -> ResultEngine<BTreeMap<String, i64>> {
    let mut requested: BTreeMap<String, i64> = BTreeMap::new();
    for row in rows {
        let total = requested.entry(row.product_sku.clone()).or_default();
        *total = total.checked_add(row.product_quantity).ok_or_else(|| {
            EngineError::InvalidInput(format!(
                "total quantity of {} is out of range",
                row.product_sku
            ))
        })?;
    }
    Ok(requested)
}

fn line_overflow(line: &order_lines::Model) -> EngineError {
    EngineError::InvalidAmount(format!(
        "line {} ({} x {}) is out of range",
        line.id, line.product_sku, line.product_quantity
    ))
}

fn check_stock(
    requested: &BTreeMap<String, i64>,
    stock: &HashMap<String, products::Model>,
) -> ResultEngine<()> {
    let unknown: Vec<&str> = requested
        .keys()
        .filter(|sku| !stock.contains_key(*sku))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "Products {} do not exist. Check the SKU and try again.",
            unknown.join(", ")
        )));
    }

    let short: Vec<String> = requested
        .iter()
        .filter_map(|(sku, qty)| {
            let available = stock.get(sku).map_or(0, |p| p.quantity);
            (*qty > available).then(|| format!("{sku} (requested {qty}, available {available})"))
        })
        .collect();
    if !short.is_empty() {
        return Err(EngineError::InsufficientStock(format!(
            "Products {} do not have enough quantity. Please update the quantity and try again.",
            short.join(", ")
        )));
    }
    Ok(())
}

fn postcode_key(postcode: &str) -> String {
    postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

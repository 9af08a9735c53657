mod common;

use common::{admin, client, harness, order_csv, postage_band, stocked_client};
use engine::{EngineError, LedgerEntryType, OrderStatusCmd};

#[tokio::test]
async fn upload_decrements_stock_per_sku() {
    let h = harness().await;
    let shop = stocked_client(&h, "shop@market.test", &[("MUG-1", 10, "4.50", 300), ("CUP-1", 3, "2", 100)]).await;

    let order = h
        .engine
        .upload_order(
            shop.id,
            &order_csv(&[("MUG-1", 2, "LS1 1AA"), ("MUG-1", 3, "LS2 2BB"), ("CUP-1", 3, "LS1 1AA")]),
        )
        .await
        .unwrap();
    assert!(!order.paid && !order.delivered && !order.is_invoiced());

    assert_eq!(h.engine.owned_product(shop.id, "MUG-1").await.unwrap().quantity, 5);
    assert_eq!(h.engine.owned_product(shop.id, "CUP-1").await.unwrap().quantity, 0);

    let detail = h.engine.order_detail(order.id, shop.id).await.unwrap();
    assert_eq!(detail.lines.len(), 3);
    assert_eq!(detail.owner_email, "shop@market.test");
    assert_eq!(h.engine.orders_for_account(shop.id).await.unwrap().len(), 1);
    assert_eq!(h.engine.orders_by_email("shop@market.test").await.unwrap().len(), 1);
}

#[tokio::test]
async fn shortfalls_are_reported_together_and_nothing_changes() {
    let h = harness().await;
    let shop = stocked_client(&h, "shop@market.test", &[("MUG-1", 4, "4.50", 300), ("CUP-1", 1, "2", 100)]).await;

    let err = h
        .engine
        .upload_order(
            shop.id,
            &order_csv(&[("MUG-1", 3, "A1"), ("MUG-1", 2, "A2"), ("CUP-1", 2, "A3")]),
        )
        .await
        .unwrap_err();
    let EngineError::InsufficientStock(msg) = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(msg.contains("MUG-1 (requested 5, available 4)"));
    assert!(msg.contains("CUP-1 (requested 2, available 1)"));

    assert_eq!(h.engine.owned_product(shop.id, "MUG-1").await.unwrap().quantity, 4);
    assert!(h.engine.orders_for_account(shop.id).await.unwrap().is_empty());
    let orders_dir = h.uploads.join("orders");
    assert!(!orders_dir.exists() || std::fs::read_dir(orders_dir).unwrap().next().is_none());
}

#[tokio::test]
async fn upload_requires_permission_and_own_skus() {
    let h = harness().await;
    let shop = stocked_client(&h, "shop@market.test", &[("MUG-1", 4, "4.50", 300)]).await;
    let newcomer = client(&h, "new@market.test").await;

    assert!(matches!(
        h.engine
            .upload_order(newcomer.id, &order_csv(&[("MUG-1", 1, "A1")]))
            .await,
        Err(EngineError::Forbidden(_))
    ));

    let other = stocked_client(&h, "other@market.test", &[("CUP-9", 4, "1", 10)]).await;
    assert!(matches!(
        h.engine
            .upload_order(other.id, &order_csv(&[("MUG-1", 1, "A1")]))
            .await,
        Err(EngineError::InvalidInput(msg)) if msg.contains("MUG-1")
    ));
    assert_eq!(h.engine.owned_product(shop.id, "MUG-1").await.unwrap().quantity, 4);
}

#[tokio::test]
async fn clients_only_see_their_orders() {
    let h = harness().await;
    let admin = admin(&h).await;
    let shop = stocked_client(&h, "shop@market.test", &[("MUG-1", 4, "4.50", 300)]).await;
    let other = client(&h, "other@market.test").await;
    let order = h
        .engine
        .upload_order(shop.id, &order_csv(&[("MUG-1", 1, "A1")]))
        .await
        .unwrap();

    assert!(h.engine.order_detail(order.id, admin.id).await.is_ok());
    assert!(matches!(
        h.engine.order_detail(order.id, other.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn invoice_debits_and_payment_credits() {
    let h = harness().await;
    admin(&h).await;
    let shop = stocked_client(&h, "shop@market.test", &[("MUG-1", 4, "4.50", 300)]).await;
    let order = h
        .engine
        .upload_order(shop.id, &order_csv(&[("MUG-1", 2, "A1")]))
        .await
        .unwrap();
    h.notifier.clear();

    // Paying before invoicing has no amount to credit.
    assert!(matches!(
        h.engine
            .set_order_status(order.id, OrderStatusCmd { paid: Some(true), delivered: None })
            .await,
        Err(EngineError::InvalidInput(_))
    ));

    let invoiced = h
        .engine
        .attach_invoice(order.id, b"%PDF-1.4", "pdf", 1_250)
        .await
        .unwrap();
    assert_eq!(invoiced.value.total_amount_minor, Some(1_250));
    assert!(invoiced.value.is_invoiced());
    assert_eq!(h.engine.balance(shop.id).await.unwrap().cents(), -1_250);
    assert_eq!(h.notifier.subjects(), vec!["Invoice".to_string()]);
    assert_eq!(
        h.engine.order_invoice(order.id, shop.id).await.unwrap(),
        b"%PDF-1.4"
    );

    assert!(matches!(
        h.engine.attach_invoice(order.id, b"again", "pdf", 10).await,
        Err(EngineError::InvalidInput(_))
    ));
    assert_eq!(h.engine.balance(shop.id).await.unwrap().cents(), -1_250);

    let paid = h
        .engine
        .set_order_status(order.id, OrderStatusCmd { paid: Some(true), delivered: None })
        .await
        .unwrap();
    assert!(paid.value.paid);
    assert_eq!(h.engine.balance(shop.id).await.unwrap().cents(), 0);

    // Paying again does not credit twice.
    h.engine
        .set_order_status(order.id, OrderStatusCmd { paid: Some(true), delivered: Some(true) })
        .await
        .unwrap();
    assert_eq!(h.engine.balance(shop.id).await.unwrap().cents(), 0);
    assert!(matches!(
        h.engine
            .set_order_status(order.id, OrderStatusCmd { paid: Some(false), delivered: None })
            .await,
        Err(EngineError::InvalidInput(_))
    ));

    let entries = h.engine.ledger_entries(shop.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry_type, LedgerEntryType::Debit);
    assert_eq!(
        entries[0].description,
        format!("Debited amount for the order {}", order.id)
    );
    assert_eq!(entries[1].entry_type, LedgerEntryType::Credit);
    assert_eq!(
        entries[1].description,
        format!("Amount credited for the order {}", order.id)
    );
    assert!(h.engine.pending_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn delivery_alone_touches_no_ledger() {
    let h = harness().await;
    let shop = stocked_client(&h, "shop@market.test", &[("MUG-1", 4, "4.50", 300)]).await;
    let order = h
        .engine
        .upload_order(shop.id, &order_csv(&[("MUG-1", 1, "A1")]))
        .await
        .unwrap();
    assert_eq!(h.engine.pending_orders().await.unwrap().len(), 1);

    let outcome = h
        .engine
        .set_order_status(order.id, OrderStatusCmd { paid: None, delivered: Some(true) })
        .await
        .unwrap();
    assert!(outcome.value.delivered);
    assert!(outcome.warning.is_none());
    assert!(h.engine.ledger_entries(shop.id).await.unwrap().is_empty());
    assert!(h.engine.pending_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn tracking_import_is_all_or_nothing() {
    let h = harness().await;
    let shop = stocked_client(&h, "shop@market.test", &[("MUG-1", 9, "4.50", 300)]).await;
    let order = h
        .engine
        .upload_order(shop.id, &order_csv(&[("MUG-1", 1, "A1"), ("MUG-1", 1, "A2")]))
        .await
        .unwrap();
    let other = h
        .engine
        .upload_order(shop.id, &order_csv(&[("MUG-1", 1, "B1")]))
        .await
        .unwrap();
    let lines = h.engine.order_lines_page(order.id, 0, 10).await.unwrap().items;
    let foreign = h.engine.order_lines_page(other.id, 0, 10).await.unwrap().items;

    let bad = format!(
        "Orderline,Tracking_company,Tracking_number\n{},DPD,X1\n{},DPD,X2\n",
        lines[0].id, foreign[0].id
    );
    assert!(matches!(
        h.engine.import_tracking(order.id, bad.as_bytes()).await,
        Err(EngineError::InvalidCsv(_))
    ));
    let unchanged = h.engine.order_detail(order.id, shop.id).await.unwrap();
    assert!(unchanged.lines.iter().all(|l| l.tracking_no.is_none()));

    let good = format!(
        "Orderline,Tracking_company,Tracking_number\n{},DPD,X1\n{},,X2\n",
        lines[0].id, lines[1].id
    );
    assert_eq!(h.engine.import_tracking(order.id, good.as_bytes()).await.unwrap(), 2);
    let detail = h.engine.order_detail(order.id, shop.id).await.unwrap();
    assert_eq!(detail.lines[0].tracking_company.as_deref(), Some("DPD"));
    assert_eq!(detail.lines[1].tracking_no.as_deref(), Some("X2"));
    assert_eq!(detail.lines[1].tracking_company, None);

    let line = h
        .engine
        .update_order_line_tracking(lines[1].id, Some("X3"), Some("Royal Mail"))
        .await
        .unwrap();
    assert_eq!(line.tracking_no.as_deref(), Some("X3"));
    assert_eq!(line.tracking_company.as_deref(), Some("Royal Mail"));
}

#[tokio::test]
async fn export_flags_shared_postcodes() {
    let h = harness().await;
    let shop = stocked_client(&h, "shop@market.test", &[("MUG-1", 9, "4.50", 300)]).await;
    let mug = h.engine.owned_product(shop.id, "MUG-1").await.unwrap();
    h.engine
        .admin_update_product(
            mug.id,
            &engine::AdminProductUpdateCmd {
                location: Some("B-07".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let order = h
        .engine
        .upload_order(
            shop.id,
            &order_csv(&[("MUG-1", 1, "LS1 1AA"), ("MUG-1", 1, "ls11aa"), ("MUG-1", 1, "M1 1AE")]),
        )
        .await
        .unwrap();

    let csv = String::from_utf8(h.engine.export_order_lines(order.id).await.unwrap()).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 4);
    assert!(rows[0].starts_with("Orderline,ProductSKU,ProductQuantity,Location"));
    assert!(rows[1].contains("B-07") && rows[1].contains(",true,"));
    assert!(rows[2].contains(",true,"));
    assert!(rows[3].contains(",false,"));
}

#[tokio::test]
async fn invoice_preview_prices_goods_and_postage() {
    let h = harness().await;
    let shop = stocked_client(
        &h,
        "shop@market.test",
        &[("MUG-1", 9, "4.50", 300), ("CUP-1", 9, "", 100)],
    )
    .await;
    postage_band(&h.engine, 0, 500, 199).await;
    postage_band(&h.engine, 501, 2_000, 399).await;
    let order = h
        .engine
        .upload_order(shop.id, &order_csv(&[("MUG-1", 2, "A1"), ("CUP-1", 1, "A2")]))
        .await
        .unwrap();

    let preview = h.engine.invoice_preview(order.id).await.unwrap();
    assert_eq!(preview.lines.len(), 2);
    let mug = &preview.lines[0];
    assert_eq!(mug.weight_grams, 600);
    assert_eq!(mug.goods_minor, 900);
    assert_eq!(mug.postage_minor, Some(399));
    assert_eq!(mug.line_total_minor, 1_299);
    let cup = &preview.lines[1];
    assert_eq!(cup.unit_price_minor, None);
    assert_eq!(cup.postage_minor, Some(199));
    assert_eq!(preview.total_minor, 1_498);
    assert!(preview.incomplete);
    assert!(!preview.has_invoice);
}

#[tokio::test]
async fn quantities_past_i64_are_rejected_without_touching_stock() {
    let h = harness().await;
    let shop = stocked_client(&h, "shop@market.test", &[("SKU-1", 5, "1.00", 100)]).await;

    let err = h
        .engine
        .upload_order(
            shop.id,
            &order_csv(&[("SKU-1", i64::MAX, "A1"), ("SKU-1", i64::MAX, "A2")]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)), "{err:?}");

    assert_eq!(h.engine.owned_product(shop.id, "SKU-1").await.unwrap().quantity, 5);
    assert!(h.engine.orders_for_account(shop.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn invoice_of_huge_line_reports_amount_error() {
    let h = harness().await;
    let shop = stocked_client(&h, "shop@market.test", &[("BULK-1", i64::MAX, "4.50", 1)]).await;
    let order = h
        .engine
        .upload_order(shop.id, &order_csv(&[("BULK-1", i64::MAX, "A1")]))
        .await
        .unwrap();

    assert!(matches!(
        h.engine.invoice_preview(order.id).await,
        Err(EngineError::InvalidAmount(_))
    ));
}

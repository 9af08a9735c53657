#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc, sync::Mutex};

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Account, AttachmentStore, BandKind, Engine, Notification, Notifier, NotifyError, RegisterCmd,
    Role,
};
use migration::MigratorTrait;
use uuid::Uuid;

pub const PASSWORD: &str = "Secret#123";

/// Keeps every notification it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.subject).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Refuses every notification.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected(503))
    }
}

pub struct Harness {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
    pub notifier: Arc<RecordingNotifier>,
    pub uploads: PathBuf,
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.uploads);
    }
}

pub async fn database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub fn uploads_dir() -> PathBuf {
    std::env::temp_dir().join(format!("market_engine_{}", Uuid::new_v4()))
}

pub async fn harness() -> Harness {
    let db = database().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let uploads = uploads_dir();
    let engine = Engine::builder()
        .database(db.clone())
        .attachments(AttachmentStore::new(&uploads))
        .notifier(notifier.clone())
        .frontend_url("https://market.test/")
        .build()
        .await
        .unwrap();
    Harness {
        engine: Arc::new(engine),
        db,
        notifier,
        uploads,
    }
}

pub async fn failing_harness() -> (Engine, DatabaseConnection, PathBuf) {
    let db = database().await;
    let uploads = uploads_dir();
    let engine = Engine::builder()
        .database(db.clone())
        .attachments(AttachmentStore::new(&uploads))
        .notifier(Arc::new(FailingNotifier))
        .build()
        .await
        .unwrap();
    (engine, db, uploads)
}

/// Pending one-time code of `email`, read straight from the table.
pub async fn stored_otp(db: &DatabaseConnection, email: &str) -> Option<String> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT otp FROM accounts WHERE email = ?",
            vec![email.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<Option<String>>("", "otp").unwrap()
}

pub async fn stored_password_hash(db: &DatabaseConnection, email: &str) -> String {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT password_hash FROM accounts WHERE email = ?",
            vec![email.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<String>("", "password_hash").unwrap()
}

pub async fn verified_account(engine: &Engine, db: &DatabaseConnection, email: &str, role: Role) -> Account {
    engine
        .register(RegisterCmd::new(email, PASSWORD, "Ada", "Lovelace", role))
        .await
        .unwrap();
    let otp = stored_otp(db, email).await.unwrap();
    engine.verify_email(email, &otp).await.unwrap()
}

pub async fn client(h: &Harness, email: &str) -> Account {
    verified_account(&h.engine, &h.db, email, Role::Client).await
}

pub async fn admin(h: &Harness) -> Account {
    h.engine
        .create_admin("admin@market.test", PASSWORD, "Grace", "Hopper")
        .await
        .unwrap()
}

/// Client whose catalogue holds `products` (sku, quantity, price, weight),
/// approved through a listing.
pub async fn stocked_client(h: &Harness, email: &str, products: &[(&str, i64, &str, i64)]) -> Account {
    let account = client(h, email).await;
    let mut csv = String::from("Name,SKU,Description,Quantity,Price,Weight\n");
    for (sku, quantity, price, weight) in products {
        csv.push_str(&format!("Item {sku},{sku},,{quantity},{price},{weight}\n"));
    }
    let listing = h
        .engine
        .submit_listing(account.id, csv.as_bytes())
        .await
        .unwrap();
    h.engine
        .review_listing(listing.id, engine::ReviewDecision::Approved, None)
        .await
        .unwrap();
    h.engine
        .update_account_flags(account.id, false, true)
        .await
        .unwrap()
}

pub fn order_csv(lines: &[(&str, i64, &str)]) -> Vec<u8> {
    let mut csv = String::from(
        "BuyerName,BuyerAddress1,BuyerAddress2,BuyerCity,BuyerCountry,BuyerPostCode,ProductSKU,ProductQuantity\n",
    );
    for (sku, quantity, postcode) in lines {
        csv.push_str(&format!(
            "Jane Doe,1 High Street,,Leeds,UK,{postcode},{sku},{quantity}\n"
        ));
    }
    csv.into_bytes()
}

pub async fn postage_band(engine: &Engine, from: i64, to: i64, price: i64) {
    engine
        .upsert_price_band(BandKind::Postage, None, from, to, price)
        .await
        .unwrap();
}

use std::{fmt, sync::Arc, time::Duration};

use sea_orm::{DatabaseConnection, DatabaseTransaction, prelude::*};
use serde::Serialize;

use crate::{
    AttachmentStore, EngineError, LogNotifier, Notification, Notifier, NotifyError, ResultEngine,
    accounts, locks::AccountLocks,
};

mod accounts_ops;
mod auth;
mod labels;
mod ledger;
mod listings;
mod orders;
mod pricing;
mod products;

pub use accounts_ops::AccountProfile;
pub use listings::ReviewDecision;
pub use orders::{InvoiceLine, InvoicePreview};

const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_ATTACHMENTS_ROOT: &str = "uploads";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const MAX_PAGE_SIZE: u64 = 500;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// One page of a listing plus the number of rows across all pages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

pub struct Engine {
    database: DatabaseConnection,
    attachments: AttachmentStore,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
    frontend_url: String,
    locks: AccountLocks,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("attachments", &self.attachments)
            .field("notify_timeout", &self.notify_timeout)
            .field("frontend_url", &self.frontend_url)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Delivers `notification` within the configured timeout.
    ///
    /// Must only be called after the triggering write has been committed.
    /// Returns the warning to hand back to the caller when delivery failed.
    async fn notify(&self, notification: Notification) -> Option<String> {
        let sent = tokio::time::timeout(self.notify_timeout, self.notifier.send(&notification))
            .await
            .unwrap_or(Err(NotifyError::Timeout(self.notify_timeout)));
        match sent {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(
                    to = ?notification.to,
                    subject = %notification.subject,
                    "notification not delivered: {err}"
                );
                Some(format!("notification not delivered: {err}"))
            }
        }
    }

    async fn notify_all(&self, notifications: Vec<Notification>) -> Option<String> {
        let mut warnings = Vec::new();
        for notification in notifications {
            if let Some(warning) = self.notify(notification).await {
                warnings.push(warning);
            }
        }
        if warnings.is_empty() {
            None
        } else {
            Some(warnings.join("; "))
        }
    }

    async fn admin_emails(&self) -> ResultEngine<Vec<String>> {
        let admins = accounts::Entity::find()
            .filter(accounts::Column::Role.eq(crate::Role::Admin.as_str()))
            .all(&self.database)
            .await?;
        Ok(admins.into_iter().map(|a| a.email).collect())
    }

    async fn require_account(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: i64,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find_by_id(account_id)
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))
    }
}

fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn check_page_size(page_size: u64) -> ResultEngine<()> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(EngineError::InvalidInput(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    attachments: Option<AttachmentStore>,
    notifier: Option<Arc<dyn Notifier>>,
    notify_timeout: Option<Duration>,
    frontend_url: Option<String>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Where uploaded files are kept. Defaults to `./uploads`.
    pub fn attachments(mut self, store: AttachmentStore) -> EngineBuilder {
        self.attachments = Some(store);
        self
    }

    /// Defaults to [`LogNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> EngineBuilder {
        self.notifier = Some(notifier);
        self
    }

    pub fn notify_timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.notify_timeout = Some(timeout);
        self
    }

    /// Base URL used in links sent by email (password reset).
    pub fn frontend_url(mut self, url: impl Into<String>) -> EngineBuilder {
        self.frontend_url = Some(url.into());
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let attachments = self
            .attachments
            .unwrap_or_else(|| AttachmentStore::new(DEFAULT_ATTACHMENTS_ROOT));
        tokio::fs::create_dir_all(attachments.root()).await?;

        Ok(Engine {
            database: self.database,
            attachments,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            notify_timeout: self.notify_timeout.unwrap_or(DEFAULT_NOTIFY_TIMEOUT),
            frontend_url: self
                .frontend_url
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            locks: AccountLocks::default(),
        })
    }
}

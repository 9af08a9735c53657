//! Outgoing notifications (verification codes, payment receipts, admin
//! alerts).
//!
//! Delivery is best effort: the engine always commits its own writes first and
//! only then calls the [`Notifier`], bounded by a timeout. A failed delivery is
//! logged and reported back as a warning in [`Outcome`]; it never undoes the
//! operation that triggered it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
    #[error("notification endpoint answered {0}")]
    Rejected(u16),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            to = ?notification.to,
            subject = %notification.subject,
            "{}",
            notification.body
        );
        Ok(())
    }
}

/// Posts every notification as JSON to a mail relay.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!("{:?}", response);
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Value of a committed operation plus an optional delivery warning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warning: self.warning,
        }
    }
}

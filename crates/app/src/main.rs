use std::{sync::Arc, time::Duration};

use engine::{AttachmentStore, Engine, LogNotifier, Notifier, WebhookNotifier};
use migration::{Migrator, MigratorTrait};
use tracing_subscriber::EnvFilter;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "market={level},server={level},engine={level}",
            level = settings.app.level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let db = connect_database(&settings.storage.database_url).await?;

    let notifier: Arc<dyn Notifier> = match &settings.notifier.webhook_url {
        Some(url) => {
            tracing::info!("Sending notifications to {url}");
            Arc::new(WebhookNotifier::new(url.as_str()))
        }
        None => {
            tracing::warn!("no webhook configured, notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    let engine = Engine::builder()
        .database(db)
        .attachments(AttachmentStore::new(&settings.storage.uploads))
        .notifier(notifier)
        .notify_timeout(Duration::from_secs(settings.notifier.timeout_secs))
        .frontend_url(settings.notifier.frontend_url.as_str())
        .build()
        .await?;

    let listener = tokio::net::TcpListener::bind(settings.address()).await?;
    server::run_with_listener(engine, listener).await?;

    Ok(())
}

async fn connect_database(
    url: &str,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

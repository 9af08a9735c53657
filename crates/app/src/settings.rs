//! Settings for the marketplace service.
//!
//! Values come from an optional `settings.toml` in the working directory and
//! from `MARKET__<SECTION>__<KEY>` environment variables, the latter winning.
use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    /// Log level applied to every crate of the workspace.
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub database_url: String,
    /// Root directory of uploaded files.
    pub uploads: String,
}

#[derive(Debug, Deserialize)]
pub struct Notifier {
    /// Mail relay receiving notifications as JSON. Notifications are only
    /// logged when unset.
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
    /// Base of the links put in emails.
    pub frontend_url: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub storage: Storage,
    pub notifier: Notifier,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = defaults()?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("MARKET").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("app.level", "info")?
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 3000)?
        .set_default("storage.database_url", "sqlite:./market.db?mode=rwc")?
        .set_default("storage.uploads", "uploads")?
        .set_default("notifier.timeout_secs", 5)?
        .set_default("notifier.frontend_url", "http://localhost:8080")
}

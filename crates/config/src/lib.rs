use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use pricing::FeeSchedule;
use serde::Deserialize;

/// Where orders, assignments, and stock live.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local maps; state is lost on restart.
    Memory,
}

/// Runtime settings of the order service.
///
/// Every field maps to an upper-case environment variable of the same name
/// (`DB_HOST`, `DELIVERY_FEE_TIERS`, ...). A `.env` file is honoured; unset
/// variables fall back to the defaults in [`AppConfig::from_env`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Postgres ---
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    /// Maximum pooled connections.
    pub db_pool_size: usize,
    /// Folder with `.sql` files applied at startup.
    pub migrations_dir: String,
    pub storage_backend: StorageBackend,

    // --- Notifications ---
    /// Broker addresses; `KAFKA_BROKERS=a:9092,b:9092`.
    pub kafka_brokers: Vec<String>,
    /// Topic notifications are published to.
    pub kafka_notification_topic: String,
    /// When false, notifications are only logged.
    pub notifications_enabled: bool,

    // --- HTTP ---
    pub http_port: u16,
    /// How long in-flight requests may drain after a shutdown signal, e.g. `"5s"`.
    #[serde(deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,

    // --- Orders ---
    /// Distance-banded delivery fees, written as `<max_km>:<price>,...`.
    #[serde(deserialize_with = "deserialize_fee_schedule")]
    pub delivery_fee_tiers: FeeSchedule,
    /// Leading part of generated order numbers.
    pub order_number_prefix: String,
}

/// Reads durations written the humantime way (`"500ms"`, `"5s"`, `"1m"`).
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

fn deserialize_fee_schedule<'de, D>(deserializer: D) -> Result<FeeSchedule, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    val.parse()
        .map_err(|e| D::Error::custom(format!("Invalid delivery fee tiers '{val}': {e}")))
}

impl AppConfig {
    /// Reads `.env` if present, then the process environment.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env(None)
    }

    /// Builds the configuration from defaults plus either the process environment
    /// (`overrides == None`) or an explicit variable map.
    pub fn from_env(overrides: Option<HashMap<String, String>>) -> Result<Self> {
        let environment = config::Environment::default()
            .source(overrides)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("kafka_brokers");

        let settings = config::Config::builder()
            // Postgres
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "cod_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "cod_orders")?
            .set_default("db_pool_size", 16)?
            .set_default("migrations_dir", "migrations")?
            .set_default("storage_backend", "postgres")?
            // Notifications
            .set_default("kafka_brokers", vec!["localhost:9092"])?
            .set_default("kafka_notification_topic", "cod-notifications")?
            .set_default("notifications_enabled", false)?
            // HTTP
            .set_default("http_port", 8081)?
            .set_default("shutdown_timeout", "5s")?
            // Orders
            .set_default("delivery_fee_tiers", FeeSchedule::default().to_string())?
            .set_default("order_number_prefix", "COD")?
            .add_source(environment)
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }

    /// libpq-style connection string for the configured database.
    pub fn database_dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode=disable",
            self.db_host, self.db_port, self.db_user, self.db_password, self.db_name
        )
    }
}

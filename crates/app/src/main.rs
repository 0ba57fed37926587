//! Cash-on-delivery order service.
//!
//! Wires storage, the notification dispatcher, and the lifecycle services
//! behind the HTTP API, and drains requests on shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use app_config::{AppConfig, StorageBackend};
use notifier::KafkaNotifier;
use repository::{MemoryStore, PgStore};
use server::Server;
use service::{CodServices, Collaborators, Notifier, TracingNotifier};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber; `RUST_LOG` overrides the default `info` level.
fn init_logger() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn build_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    if !config.notifications_enabled {
        info!("Notifications are logged only");
        return Arc::new(TracingNotifier);
    }
    match KafkaNotifier::from_config(config) {
        Ok(notifier) => Arc::new(notifier),
        Err(err) => {
            error!(error = %err, "Kafka notifier unavailable, falling back to log-only notifications");
            Arc::new(TracingNotifier)
        }
    }
}

async fn build_collaborators(config: &AppConfig, notifier: Arc<dyn Notifier>) -> Result<Collaborators> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = db::init_db_pool(config)
                .await
                .context("Failed to initialize database")?;
            info!("Database initialized successfully");
            Ok(Collaborators::from_store(Arc::new(PgStore::new(pool)), notifier))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all state is lost on restart");
            Ok(Collaborators::from_store(Arc::new(MemoryStore::new()), notifier))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    info!("COD order service starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;

    let notifier = build_notifier(&config);
    let collaborators = build_collaborators(&config, notifier).await?;
    let services = CodServices::new(
        collaborators,
        config.delivery_fee_tiers.clone(),
        &config.order_number_prefix,
    );

    let shutdown = Arc::new(Notify::new());
    let http_server = Server::new(config.http_port, services, config.delivery_fee_tiers.clone())?;

    let mut tasks = JoinSet::new();
    let server_shutdown = shutdown.clone();
    tasks.spawn(async move {
        http_server
            .start(async move { server_shutdown.notified().await })
            .await
    });

    tokio::select! {
        _ = server::shutdown_signal() => {
            shutdown.notify_one();
        }
        Some(res) = tasks.join_next() => {
            // The server stopped on its own; nothing left to drain.
            return match res {
                Ok(result) => result,
                Err(err) => Err(err).context("HTTP server task failed"),
            };
        }
    }

    match tokio::time::timeout(config.shutdown_timeout, tasks.join_next()).await {
        Ok(Some(Ok(Err(err)))) => error!(error = %err, "HTTP server error"),
        Ok(Some(Err(err))) => error!(error = %err, "Task error"),
        Ok(_) => {}
        Err(_) => {
            warn!(timeout = ?config.shutdown_timeout, "Shutdown timed out, aborting in-flight requests");
            tasks.abort_all();
        }
    }

    info!("Application stopped");
    Ok(())
}

//! Server crate provides the HTTP API over the order lifecycle services.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{MatchedPath, State},
    response::Response,
    routing::{get, post},
};
use pricing::FeeSchedule;
use service::CodServices;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

mod error;
mod handlers;
mod metrics;

pub use error::ApiError;
pub use handlers::{
    ActorRequest, CancelAssignmentRequest, CreateOrderRequest, DeliverRequest, DeliveryFeeResponse, ReasonRequest,
    RiderRequest,
};

use metrics::Metrics;

/// Server represents the HTTP server for the order lifecycle.
pub struct Server {
    port: u16,
    state: AppState,
}

/// Application state shared between request handlers
#[derive(Clone)]
pub(crate) struct AppState {
    services: CodServices,
    fees: Arc<FeeSchedule>,
    metrics: Arc<Metrics>,
}

impl Server {
    /// # Errors
    /// Returns an error if the metrics registry cannot be built.
    pub fn new(port: u16, services: CodServices, fees: FeeSchedule) -> Result<Self> {
        info!(port, "Initializing HTTP server");
        let metrics = Metrics::new().context("Failed to create metrics registry")?;
        Ok(Self {
            port,
            state: AppState {
                services,
                fees: Arc::new(fees),
                metrics: Arc::new(metrics),
            },
        })
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .context("Failed to bind to port")?;

        info!(port = self.port, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/orders", post(handlers::create_order))
            .route("/api/orders/{id}", get(handlers::get_order))
            .route("/api/orders/{id}/history", get(handlers::order_history))
            .route("/api/orders/{id}/reservations", get(handlers::order_reservations))
            .route("/api/orders/{id}/assignments", get(handlers::order_assignments))
            .route("/api/orders/{id}/sale", get(handlers::order_sale))
            .route("/api/orders/{id}/accept", post(handlers::accept_order))
            .route("/api/orders/{id}/reject", post(handlers::reject_order))
            .route("/api/orders/{id}/cancel", post(handlers::cancel_order))
            .route("/api/orders/{id}/ready", post(handlers::mark_ready))
            .route("/api/orders/{id}/rider", post(handlers::request_rider))
            .route("/api/orders/{id}/resolve-stock", post(handlers::resolve_stock))
            .route("/api/sellers/{id}/orders", get(handlers::seller_orders))
            .route("/api/assignments/{id}", get(handlers::get_assignment))
            .route("/api/assignments/{id}/accept", post(handlers::accept_assignment))
            .route("/api/assignments/{id}/pickup", post(handlers::pick_up))
            .route("/api/assignments/{id}/deliver", post(handlers::deliver))
            .route("/api/assignments/{id}/fail", post(handlers::fail_delivery))
            .route("/api/assignments/{id}/cancel", post(handlers::cancel_assignment))
            .route("/api/riders/{id}/assignments", get(handlers::rider_assignments))
            .route("/api/audit/{id}", get(handlers::audit_trail))
            .route("/api/delivery-fee", get(handlers::delivery_fee))
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .layer(axum::middleware::from_fn_with_state(
                self.state.metrics.clone(),
                metrics_middleware,
            ))
            .with_state(self.state.clone())
    }
}

/// Middleware for collecting metrics on HTTP requests.
/// Requests are labelled with the route template, not the concrete path.
async fn metrics_middleware(
    State(metrics): State<Arc<Metrics>>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = req.method().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |path| path.as_str().to_string());

    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16();

    metrics.record_request(&method, &endpoint, status, start.elapsed());
    if status >= 400 {
        metrics.record_error("http", &endpoint);
    }
    response
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

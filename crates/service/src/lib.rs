//! Cash-on-delivery order lifecycle.
//!
//! [`OrderLifecycleEngine`] owns orders, [`DeliveryAssignmentManager`] owns rider
//! assignments, and the two stay in step through [`DeliveryEvent`]s. Stock, POS,
//! audit, and notification work hangs off the transitions.

use std::sync::Arc;

use pricing::FeeSchedule;
use repository::{
    AssignmentsRepository, AuditRepository, OrdersRepository, ProfileDirectory, SalesRepository,
    StatusHistoryRepository, StockLedger,
};

mod best_effort;
mod delivery;
mod effects;
mod error;
mod events;
mod lifecycle;
mod notify;
mod order_number;
mod pos;
mod stock;

pub use best_effort::BestEffort;
pub use delivery::DeliveryAssignmentManager;
pub use effects::Effects;
pub use error::ServiceError;
pub use events::{DeliveryEvent, DeliveryEventHandler};
pub use lifecycle::OrderLifecycleEngine;
pub use notify::{Notifier, TracingNotifier};
pub use order_number::OrderNumberGenerator;
pub use pos::SaleRecorder;
pub use stock::{ReservationReport, StockReservationManager};

/// Everything the services talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrdersRepository>,
    pub history: Arc<dyn StatusHistoryRepository>,
    pub assignments: Arc<dyn AssignmentsRepository>,
    pub ledger: Arc<dyn StockLedger>,
    pub sales: Arc<dyn SalesRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Takes every repository from one store.
    pub fn from_store<S>(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self
    where
        S: OrdersRepository
            + StatusHistoryRepository
            + AssignmentsRepository
            + StockLedger
            + SalesRepository
            + AuditRepository
            + ProfileDirectory
            + 'static,
    {
        Self {
            orders: store.clone(),
            history: store.clone(),
            assignments: store.clone(),
            ledger: store.clone(),
            sales: store.clone(),
            audit: store.clone(),
            profiles: store,
            notifier,
        }
    }
}

/// The wired pair of services.
#[derive(Clone)]
pub struct CodServices {
    pub orders: Arc<OrderLifecycleEngine>,
    pub deliveries: Arc<DeliveryAssignmentManager>,
}

impl CodServices {
    pub fn new(collaborators: Collaborators, fees: FeeSchedule, order_number_prefix: &str) -> Self {
        let effects = Arc::new(Effects::new(
            collaborators.history.clone(),
            collaborators.audit.clone(),
            collaborators.profiles.clone(),
            collaborators.notifier.clone(),
        ));
        let orders = Arc::new(OrderLifecycleEngine::new(
            &collaborators,
            effects.clone(),
            fees,
            OrderNumberGenerator::new(order_number_prefix),
        ));
        let deliveries = Arc::new(DeliveryAssignmentManager::new(
            collaborators.assignments.clone(),
            effects,
            orders.clone(),
        ));
        Self { orders, deliveries }
    }
}

//! Domain types for the cash-on-delivery order lifecycle.
//!
//! Everything here is plain data plus the status tables that say which
//! transitions are legal. Persistence and side effects live in the
//! `repository` and `service` crates.

mod audit;
mod delivery;
mod order;
mod profile;
mod sale;
mod stock;

pub use audit::{AuditAction, AuditRecord, Notification, NotificationEvent};
pub use delivery::{AssignmentStatus, DeliveryAssignment};
pub use order::{
    GeoPoint, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, PaymentStatus,
    StatusHistoryEntry,
};
pub use profile::{Profile, ProfileRole};
pub use sale::{PaymentMethod, Sale, SaleItem};
pub use stock::{ReservationStatus, StockReservation};

use thiserror::Error;

/// Raised when a status string read from storage or a request does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} status: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

/// Raised by the in-model state machines when a transition is not allowed from the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move {entity} from {from} to {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

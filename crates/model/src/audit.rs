use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UnknownStatus;

/// State-changing actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    OrderCreated,
    OrderAccepted,
    OrderRejected,
    OrderCancelled,
    OrderReady,
    RiderRequested,
    AssignmentAccepted,
    AssignmentCancelled,
    OrderPickedUp,
    OrderDelivered,
    DeliveryFailed,
    CashDiscrepancy,
}

impl AuditAction {
    pub const ALL: [AuditAction; 12] = [
        AuditAction::OrderCreated,
        AuditAction::OrderAccepted,
        AuditAction::OrderRejected,
        AuditAction::OrderCancelled,
        AuditAction::OrderReady,
        AuditAction::RiderRequested,
        AuditAction::AssignmentAccepted,
        AuditAction::AssignmentCancelled,
        AuditAction::OrderPickedUp,
        AuditAction::OrderDelivered,
        AuditAction::DeliveryFailed,
        AuditAction::CashDiscrepancy,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AuditAction::OrderCreated => "order_created",
            AuditAction::OrderAccepted => "order_accepted",
            AuditAction::OrderRejected => "order_rejected",
            AuditAction::OrderCancelled => "order_cancelled",
            AuditAction::OrderReady => "order_ready",
            AuditAction::RiderRequested => "rider_requested",
            AuditAction::AssignmentAccepted => "assignment_accepted",
            AuditAction::AssignmentCancelled => "assignment_cancelled",
            AuditAction::OrderPickedUp => "order_picked_up",
            AuditAction::OrderDelivered => "order_delivered",
            AuditAction::DeliveryFailed => "delivery_failed",
            AuditAction::CashDiscrepancy => "cash_discrepancy",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "audit action",
                value: s.to_string(),
            })
    }
}

/// Immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    /// e.g. "order", "delivery_assignment"
    pub resource_type: String,
    pub resource_id: Uuid,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// To the buyer, on placement.
    OrderPlaced,
    /// To the seller, on placement.
    NewOrder,
    OrderStatusChanged,
    DeliveryAssigned,
}

impl NotificationEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationEvent::OrderPlaced => "order_placed",
            NotificationEvent::NewOrder => "new_order",
            NotificationEvent::OrderStatusChanged => "order_status_changed",
            NotificationEvent::DeliveryAssigned => "delivery_assigned",
        }
    }
}

/// A message for the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: Uuid,
    pub email: Option<String>,
    pub event_type: NotificationEvent,
    pub payload: serde_json::Value,
}

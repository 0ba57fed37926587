//! Side effects that accompany every transition: status history, audit, notifications.
//! All of them are best-effort.

use std::sync::Arc;

use chrono::Utc;
use model::{AuditAction, AuditRecord, Notification, NotificationEvent, Order, StatusHistoryEntry};
use repository::{AuditRepository, ProfileDirectory, StatusHistoryRepository};
use serde_json::Value;
use uuid::Uuid;

use crate::best_effort::BestEffort;
use crate::notify::Notifier;

pub struct Effects {
    history: Arc<dyn StatusHistoryRepository>,
    audit: Arc<dyn AuditRepository>,
    profiles: Arc<dyn ProfileDirectory>,
    notifier: Arc<dyn Notifier>,
    guard: BestEffort,
}

impl Effects {
    pub fn new(
        history: Arc<dyn StatusHistoryRepository>,
        audit: Arc<dyn AuditRepository>,
        profiles: Arc<dyn ProfileDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            history,
            audit,
            profiles,
            notifier,
            guard: BestEffort::new(),
        }
    }

    pub fn guard(&self) -> &BestEffort {
        &self.guard
    }

    /// Appends a status-history row for the order's current status.
    pub async fn record_status(
        &self,
        order: &Order,
        actor_id: Option<Uuid>,
        note: Option<String>,
        transition: &'static str,
    ) {
        let entry = StatusHistoryEntry {
            id: Uuid::new_v4(),
            order_id: order.id,
            status: order.status,
            actor_id,
            note,
            created_at: Utc::now(),
        };
        self.guard
            .run(order.id, transition, "status_history", self.history.append(&entry))
            .await;
    }

    pub async fn audit(
        &self,
        order_id: Uuid,
        transition: &'static str,
        actor_id: Option<Uuid>,
        action: AuditAction,
        resource_type: &str,
        resource_id: Uuid,
        details: Value,
    ) {
        let record = AuditRecord {
            actor_id,
            action,
            resource_type: resource_type.to_string(),
            resource_id,
            details,
            created_at: Utc::now(),
        };
        self.guard
            .run(order_id, transition, "audit", self.audit.append(&record))
            .await;
    }

    /// Looks up the recipient's email and dispatches. A failed lookup still sends,
    /// without an email.
    pub async fn notify(
        &self,
        order_id: Uuid,
        transition: &'static str,
        recipient_id: Uuid,
        event_type: NotificationEvent,
        payload: Value,
    ) {
        let email = self
            .guard
            .run(order_id, transition, "profiles", self.profiles.get(recipient_id))
            .await
            .flatten()
            .map(|profile| profile.email);
        let notification = Notification {
            recipient_id,
            email,
            event_type,
            payload,
        };
        self.guard
            .run(order_id, transition, "notifier", self.notifier.notify(&notification))
            .await;
    }

    /// Tells the buyer the order moved to a new status.
    pub async fn notify_status(&self, order: &Order, transition: &'static str) {
        let payload = serde_json::json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "status": order.status,
        });
        self.notify(order.id, transition, order.buyer_id, NotificationEvent::OrderStatusChanged, payload)
            .await;
    }
}

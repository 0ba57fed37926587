//! Delivery Assignment Manager.
//!
//! Drives the rider-facing sub-lifecycle. Each stored transition is published to the
//! [`DeliveryEventHandler`], which keeps the order in step with the assignment.

use std::sync::Arc;

use chrono::Utc;
use model::{AssignmentStatus, AuditAction, DeliveryAssignment};
use repository::AssignmentsRepository;
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::effects::Effects;
use crate::error::ServiceError;
use crate::events::{DeliveryEvent, DeliveryEventHandler};

pub struct DeliveryAssignmentManager {
    assignments: Arc<dyn AssignmentsRepository>,
    effects: Arc<Effects>,
    observer: Arc<dyn DeliveryEventHandler>,
}

fn authorize_rider(assignment: &DeliveryAssignment, actor_id: Uuid) -> Result<(), ServiceError> {
    if assignment.rider_id != actor_id {
        return Err(ServiceError::Authorization(format!(
            "{actor_id} is not the rider of assignment {}",
            assignment.id
        )));
    }
    Ok(())
}

impl DeliveryAssignmentManager {
    pub fn new(
        assignments: Arc<dyn AssignmentsRepository>,
        effects: Arc<Effects>,
        observer: Arc<dyn DeliveryEventHandler>,
    ) -> Self {
        Self {
            assignments,
            effects,
            observer,
        }
    }

    async fn load(&self, assignment_id: Uuid) -> Result<DeliveryAssignment, ServiceError> {
        self.assignments
            .get_by_id(assignment_id)
            .await
            .map_err(|err| ServiceError::from_lookup(err, format!("assignment {assignment_id}")))
    }

    async fn store(&self, assignment: &DeliveryAssignment, expected: AssignmentStatus) -> Result<(), ServiceError> {
        debug_assert!(assignment.is_consistent(), "assignment {} is {} with inconsistent cash/failure fields", assignment.id, assignment.status);
        self.assignments
            .update_if_status(assignment, expected)
            .await
            .map_err(|err| ServiceError::from_write(err, format!("assignment {}", assignment.id)))
    }

    /// Hands the event to the observer. Unless the order already took the change (a
    /// [`ServiceError::Dependency`] comes back only after the order committed), the
    /// assignment is put back to `before`.
    async fn publish(&self, before: &DeliveryAssignment, event: DeliveryEvent) -> Result<DeliveryAssignment, ServiceError> {
        match self.observer.on_delivery_event(&event).await {
            Ok(()) => Ok(event.into_assignment()),
            Err(err @ ServiceError::Dependency { .. }) => Err(err),
            Err(err) => {
                let after = event.assignment();
                if let Err(revert) = self.assignments.update_if_status(before, after.status).await {
                    error!(
                        assignment_id = %after.id,
                        order_id = %after.order_id,
                        event = event.name(),
                        error = %revert,
                        "Could not revert assignment after the order did not follow"
                    );
                }
                Err(err)
            }
        }
    }

    /// Rider takes the job. The order status does not change.
    #[instrument(skip(self))]
    pub async fn accept(&self, assignment_id: Uuid, actor_id: Uuid) -> Result<DeliveryAssignment, ServiceError> {
        let mut assignment = self.load(assignment_id).await?;
        authorize_rider(&assignment, actor_id)?;
        let previous = assignment.status;
        assignment.accept(Utc::now())?;
        self.store(&assignment, previous).await?;

        self.effects
            .audit(
                assignment.order_id,
                "accept_assignment",
                Some(actor_id),
                AuditAction::AssignmentAccepted,
                "delivery_assignment",
                assignment.id,
                json!({ "order_id": assignment.order_id }),
            )
            .await;
        info!(assignment_id = %assignment.id, "Assignment accepted");
        Ok(assignment)
    }

    #[instrument(skip(self))]
    pub async fn mark_picked_up(&self, assignment_id: Uuid, actor_id: Uuid) -> Result<DeliveryAssignment, ServiceError> {
        let mut assignment = self.load(assignment_id).await?;
        authorize_rider(&assignment, actor_id)?;
        let before = assignment.clone();
        assignment.pick_up(Utc::now())?;
        self.store(&assignment, before.status).await?;

        let assignment = self
            .publish(&before, DeliveryEvent::PickedUp { assignment, actor_id })
            .await?;
        info!(assignment_id = %assignment.id, "Order picked up");
        Ok(assignment)
    }

    /// Rider handed the goods over and collected `collected_amount` in cash.
    ///
    /// A collected amount different from the amount due is stored as a discrepancy and
    /// does not block completion.
    ///
    /// # Errors
    /// [`ServiceError::Dependency`] if stock fulfilment failed after the delivery was stored.
    #[instrument(skip(self))]
    pub async fn mark_delivered(
        &self,
        assignment_id: Uuid,
        actor_id: Uuid,
        collected_amount: i64,
    ) -> Result<DeliveryAssignment, ServiceError> {
        if collected_amount < 0 {
            return Err(ServiceError::Validation("collected cash must not be negative".into()));
        }
        let mut assignment = self.load(assignment_id).await?;
        authorize_rider(&assignment, actor_id)?;
        let before = assignment.clone();
        assignment.deliver(collected_amount, Utc::now())?;
        self.store(&assignment, before.status).await?;

        let assignment = self
            .publish(&before, DeliveryEvent::Delivered { assignment, actor_id })
            .await?;
        info!(
            assignment_id = %assignment.id,
            collected = collected_amount,
            discrepancy = assignment.cash_discrepancy.unwrap_or_default(),
            "Order delivered"
        );
        Ok(assignment)
    }

    #[instrument(skip(self))]
    pub async fn mark_failed(
        &self,
        assignment_id: Uuid,
        actor_id: Uuid,
        reason: &str,
    ) -> Result<DeliveryAssignment, ServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::Validation("a failure reason is required".into()));
        }
        let mut assignment = self.load(assignment_id).await?;
        authorize_rider(&assignment, actor_id)?;
        let before = assignment.clone();
        assignment.fail(reason, Utc::now())?;
        self.store(&assignment, before.status).await?;

        let assignment = self
            .publish(&before, DeliveryEvent::Failed { assignment, actor_id })
            .await?;
        info!(assignment_id = %assignment.id, %reason, "Delivery failed");
        Ok(assignment)
    }

    /// Withdraws an assignment before pickup. Either the seller or the assigned rider may
    /// do this; the order goes back to `awaiting_rider`.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        assignment_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<DeliveryAssignment, ServiceError> {
        let mut assignment = self.load(assignment_id).await?;
        if actor_id != assignment.rider_id && actor_id != assignment.seller_id {
            return Err(ServiceError::Authorization(format!(
                "{actor_id} may not cancel assignment {}",
                assignment.id
            )));
        }
        let before = assignment.clone();
        assignment.cancel(Utc::now())?;
        self.store(&assignment, before.status).await?;

        let reason = reason.filter(|r| !r.trim().is_empty());
        let assignment = self
            .publish(&before, DeliveryEvent::Cancelled { assignment, actor_id, reason })
            .await?;
        info!(assignment_id = %assignment.id, "Assignment cancelled");
        Ok(assignment)
    }

    pub async fn get(&self, assignment_id: Uuid) -> Result<DeliveryAssignment, ServiceError> {
        self.load(assignment_id).await
    }

    /// Open assignments of a rider, oldest first.
    pub async fn active_for_rider(&self, rider_id: Uuid) -> Result<Vec<DeliveryAssignment>, ServiceError> {
        Ok(self.assignments.list_active_by_rider(rider_id).await?)
    }
}

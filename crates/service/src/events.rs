use async_trait::async_trait;
use model::DeliveryAssignment;
use uuid::Uuid;

use crate::error::ServiceError;

/// Emitted by the delivery manager after an assignment transition has been stored.
/// `assignment` is the state after the transition.
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    PickedUp { assignment: DeliveryAssignment, actor_id: Uuid },
    Delivered { assignment: DeliveryAssignment, actor_id: Uuid },
    Failed { assignment: DeliveryAssignment, actor_id: Uuid },
    Cancelled { assignment: DeliveryAssignment, actor_id: Uuid, reason: Option<String> },
}

impl DeliveryEvent {
    pub fn assignment(&self) -> &DeliveryAssignment {
        match self {
            DeliveryEvent::PickedUp { assignment, .. }
            | DeliveryEvent::Delivered { assignment, .. }
            | DeliveryEvent::Failed { assignment, .. }
            | DeliveryEvent::Cancelled { assignment, .. } => assignment,
        }
    }

    pub fn into_assignment(self) -> DeliveryAssignment {
        match self {
            DeliveryEvent::PickedUp { assignment, .. }
            | DeliveryEvent::Delivered { assignment, .. }
            | DeliveryEvent::Failed { assignment, .. }
            | DeliveryEvent::Cancelled { assignment, .. } => assignment,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeliveryEvent::PickedUp { .. } => "picked_up",
            DeliveryEvent::Delivered { .. } => "delivered",
            DeliveryEvent::Failed { .. } => "failed",
            DeliveryEvent::Cancelled { .. } => "cancelled",
        }
    }
}

/// Reacts to assignment transitions. The order lifecycle engine is the production
/// subscriber; it mirrors each event onto the order.
///
/// Any error other than [`ServiceError::Dependency`] means the handler wrote nothing to the
/// order, and the publisher rolls its own transition back. `Dependency` is returned only
/// after the order change committed; the assignment then stands and stock is reconciled
/// separately.
#[async_trait]
pub trait DeliveryEventHandler: Send + Sync {
    async fn on_delivery_event(&self, event: &DeliveryEvent) -> Result<(), ServiceError>;
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Order, TransitionError, UnknownStatus};

/// Rider-facing sub-lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    Accepted,
    PickedUp,
    Delivered,
    Failed,
    Cancelled,
}

impl AssignmentStatus {
    pub const ALL: [AssignmentStatus; 6] = [
        AssignmentStatus::Assigned,
        AssignmentStatus::Accepted,
        AssignmentStatus::PickedUp,
        AssignmentStatus::Delivered,
        AssignmentStatus::Failed,
        AssignmentStatus::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Accepted => "accepted",
            AssignmentStatus::PickedUp => "picked_up",
            AssignmentStatus::Delivered => "delivered",
            AssignmentStatus::Failed => "failed",
            AssignmentStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            AssignmentStatus::Delivered | AssignmentStatus::Failed | AssignmentStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        matches!(
            (self, next),
            (Assigned, Accepted)
                | (Accepted, PickedUp)
                | (PickedUp, Delivered)
                | (PickedUp, Failed)
                | (Assigned | Accepted, Cancelled)
        )
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssignmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "assignment",
                value: s.to_string(),
            })
    }
}

/// One rider's task for one order.
///
/// Addresses and the cash amount are snapshots taken when the rider was requested;
/// later edits to the order do not flow into an open assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub rider_id: Uuid,
    pub seller_id: Uuid,
    pub pickup_address: String,
    pub delivery_address: String,
    pub delivery_phone: String,
    pub cash_amount: i64,
    pub cash_collected: bool,
    pub collected_amount: Option<i64>,
    /// `collected_amount - cash_amount` once delivered.
    pub cash_discrepancy: Option<i64>,
    pub status: AssignmentStatus,
    pub failure_reason: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub actual_pickup_time: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryAssignment {
    /// Opens a fresh assignment for `order`, snapshotting addresses and cash due.
    pub fn open(order: &Order, rider_id: Uuid, pickup_address: String, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            rider_id,
            seller_id: order.seller_id,
            pickup_address,
            delivery_address: order.delivery_address.clone(),
            delivery_phone: order.delivery_phone.clone(),
            cash_amount: order.total_amount,
            cash_collected: false,
            collected_amount: None,
            cash_discrepancy: None,
            status: AssignmentStatus::Assigned,
            failure_reason: None,
            assigned_at: at,
            accepted_at: None,
            actual_pickup_time: None,
            actual_delivery_time: None,
            updated_at: at,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// `cash_collected` iff delivered, `failure_reason` iff failed.
    pub fn is_consistent(&self) -> bool {
        self.cash_collected == (self.status == AssignmentStatus::Delivered)
            && self.failure_reason.is_some() == (self.status == AssignmentStatus::Failed)
    }

    fn advance(&mut self, next: AssignmentStatus, at: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                entity: "assignment",
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    pub fn accept(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(AssignmentStatus::Accepted, at)?;
        self.accepted_at = Some(at);
        Ok(())
    }

    pub fn pick_up(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(AssignmentStatus::PickedUp, at)?;
        self.actual_pickup_time = Some(at);
        Ok(())
    }

    pub fn deliver(&mut self, collected_amount: i64, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(AssignmentStatus::Delivered, at)?;
        self.cash_collected = true;
        self.collected_amount = Some(collected_amount);
        self.cash_discrepancy = Some(collected_amount - self.cash_amount);
        self.actual_delivery_time = Some(at);
        Ok(())
    }

    pub fn fail(&mut self, reason: &str, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(AssignmentStatus::Failed, at)?;
        self.failure_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(AssignmentStatus::Cancelled, at)
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{TransitionError, UnknownStatus};

/// Lifecycle states of a COD order.
///
/// The happy path is strictly ordered; `DeliveryFailed` and `Cancelled` are side exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPharmacyConfirmation,
    PreparingOrder,
    AwaitingRider,
    RiderAssigned,
    OutForDelivery,
    DeliveredAndPaid,
    DeliveryFailed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::PendingPharmacyConfirmation,
        OrderStatus::PreparingOrder,
        OrderStatus::AwaitingRider,
        OrderStatus::RiderAssigned,
        OrderStatus::OutForDelivery,
        OrderStatus::DeliveredAndPaid,
        OrderStatus::DeliveryFailed,
        OrderStatus::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingPharmacyConfirmation => "pending_pharmacy_confirmation",
            OrderStatus::PreparingOrder => "preparing_order",
            OrderStatus::AwaitingRider => "awaiting_rider",
            OrderStatus::RiderAssigned => "rider_assigned",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::DeliveredAndPaid => "delivered_and_paid",
            OrderStatus::DeliveryFailed => "delivery_failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::DeliveredAndPaid | OrderStatus::DeliveryFailed | OrderStatus::Cancelled
        )
    }

    /// States from which the seller may reject or either party may cancel.
    pub const fn is_pre_assignment(self) -> bool {
        matches!(
            self,
            OrderStatus::PendingPharmacyConfirmation
                | OrderStatus::PreparingOrder
                | OrderStatus::AwaitingRider
        )
    }

    /// Transition table. `RiderAssigned -> AwaitingRider` is the only backwards edge and
    /// is taken when an assignment is cancelled before pickup. Delivery can only fail once
    /// the parcel is out, matching the assignment's `picked_up -> failed` edge.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (PendingPharmacyConfirmation, PreparingOrder) => true,
            (PreparingOrder, AwaitingRider) => true,
            (AwaitingRider, RiderAssigned) => true,
            (RiderAssigned, OutForDelivery) => true,
            (RiderAssigned, AwaitingRider) => true,
            (OutForDelivery, DeliveredAndPaid) => true,
            (OutForDelivery, DeliveryFailed) => true,
            (from, Cancelled) => from.is_pre_assignment(),
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "order",
                value: s.to_string(),
            })
    }
}

/// Payment sub-status, kept in lockstep with [`OrderStatus::DeliveredAndPaid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "unpaid" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(UnknownStatus {
                kind: "payment",
                value: other.to_string(),
            }),
        }
    }
}

/// WGS84 coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// One ordered product line. Amounts are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price
    }
}

/// Order: one buyer transaction fulfilled by a single seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub rider_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub delivery_fee: i64,
    pub total_amount: i64,
    pub delivery_address: String,
    pub delivery_phone: String,
    pub notes: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub rider_assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cash_collected_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn items_subtotal(&self) -> i64 {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// `delivered_and_paid` and `paid` imply each other.
    pub fn is_consistent(&self) -> bool {
        (self.status == OrderStatus::DeliveredAndPaid) == (self.payment_status == PaymentStatus::Paid)
    }

    fn advance(&mut self, next: OrderStatus, at: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                entity: "order",
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    pub fn accept(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(OrderStatus::PreparingOrder, at)
    }

    pub fn mark_ready(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(OrderStatus::AwaitingRider, at)
    }

    pub fn assign_rider(&mut self, rider_id: Uuid, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(OrderStatus::RiderAssigned, at)?;
        self.rider_id = Some(rider_id);
        self.rider_assigned_at = Some(at);
        Ok(())
    }

    /// Returns the order to `awaiting_rider` after its assignment was cancelled.
    /// `rider_assigned_at` keeps the first assignment time.
    pub fn release_rider(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(OrderStatus::AwaitingRider, at)?;
        self.rider_id = None;
        Ok(())
    }

    pub fn pick_up(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(OrderStatus::OutForDelivery, at)?;
        self.picked_up_at.get_or_insert(at);
        Ok(())
    }

    pub fn deliver(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(OrderStatus::DeliveredAndPaid, at)?;
        self.payment_status = PaymentStatus::Paid;
        self.delivered_at.get_or_insert(at);
        self.cash_collected_at.get_or_insert(at);
        Ok(())
    }

    pub fn fail_delivery(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(OrderStatus::DeliveryFailed, at)
    }

    /// Cancels the order and appends `reason` to the notes.
    pub fn cancel(&mut self, reason: &str, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.advance(OrderStatus::Cancelled, at)?;
        self.notes = Some(match self.notes.take() {
            Some(notes) if !notes.trim().is_empty() => format!("{notes}\nCancelled: {reason}"),
            _ => format!("Cancelled: {reason}"),
        });
        Ok(())
    }
}

/// Buyer input for a new order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

/// Buyer input for order placement. The buyer is the acting party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub seller_id: Uuid,
    pub items: Vec<NewOrderItem>,
    pub delivery_address: String,
    pub delivery_phone: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    /// Explicit fee; when absent the fee is derived from coordinates.
    #[serde(default)]
    pub delivery_fee: Option<i64>,
}

/// Append-only status trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub actor_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

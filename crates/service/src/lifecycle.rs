//! Order Lifecycle Engine.
//!
//! Owns the order state machine: who may trigger each transition and which side
//! effects go with it. Pickup, delivery, and failure are driven by the delivery
//! manager and reach the engine as [`DeliveryEvent`]s.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use model::{
    AuditAction, AuditRecord, DeliveryAssignment, NewOrder, NotificationEvent, Order, OrderItem,
    OrderStatus, PaymentStatus, Profile, ProfileRole, Sale, StatusHistoryEntry, StockReservation,
};
use pricing::FeeSchedule;
use repository::{
    AssignmentsRepository, AuditRepository, OrdersRepository, ProfileDirectory, RepositoryError,
    StatusHistoryRepository,
};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::effects::Effects;
use crate::error::ServiceError;
use crate::events::{DeliveryEvent, DeliveryEventHandler};
use crate::order_number::OrderNumberGenerator;
use crate::pos::SaleRecorder;
use crate::stock::StockReservationManager;
use crate::Collaborators;

/// Attempts at finding a free order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

pub struct OrderLifecycleEngine {
    orders: Arc<dyn OrdersRepository>,
    assignments: Arc<dyn AssignmentsRepository>,
    profiles: Arc<dyn ProfileDirectory>,
    history: Arc<dyn StatusHistoryRepository>,
    audit_log: Arc<dyn AuditRepository>,
    stock: StockReservationManager,
    sales: SaleRecorder,
    effects: Arc<Effects>,
    fees: FeeSchedule,
    numbers: OrderNumberGenerator,
}

fn authorize_seller(order: &Order, actor_id: Uuid) -> Result<(), ServiceError> {
    if order.seller_id != actor_id {
        return Err(ServiceError::Authorization(format!(
            "{actor_id} is not the seller of order {}",
            order.id
        )));
    }
    Ok(())
}

fn require_reason(reason: &str) -> Result<&str, ServiceError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ServiceError::Validation("a reason is required".into()));
    }
    Ok(reason)
}

/// Checks the structure and required fields of a new order.
fn validate_new_order(input: &NewOrder) -> Result<(), ServiceError> {
    if input.items.is_empty() {
        return Err(ServiceError::Validation("order has no items".into()));
    }
    for item in &input.items {
        if item.quantity <= 0 {
            return Err(ServiceError::Validation(format!(
                "product {}: quantity must be positive",
                item.product_id
            )));
        }
        if item.unit_price < 0 {
            return Err(ServiceError::Validation(format!(
                "product {}: unit price must not be negative",
                item.product_id
            )));
        }
    }
    if input.delivery_address.trim().is_empty() {
        return Err(ServiceError::Validation("delivery address is required".into()));
    }
    if input.delivery_phone.trim().is_empty() {
        return Err(ServiceError::Validation("delivery phone is required".into()));
    }
    if input.delivery_fee.is_some_and(|fee| fee < 0) {
        return Err(ServiceError::Validation("delivery fee must not be negative".into()));
    }
    if let Some(point) = input.coordinates {
        let valid = (-90.0..=90.0).contains(&point.latitude) && (-180.0..=180.0).contains(&point.longitude);
        if !valid {
            return Err(ServiceError::Validation("coordinates out of range".into()));
        }
    }
    Ok(())
}

impl OrderLifecycleEngine {
    pub fn new(
        collaborators: &Collaborators,
        effects: Arc<Effects>,
        fees: FeeSchedule,
        numbers: OrderNumberGenerator,
    ) -> Self {
        Self {
            orders: collaborators.orders.clone(),
            assignments: collaborators.assignments.clone(),
            profiles: collaborators.profiles.clone(),
            history: collaborators.history.clone(),
            audit_log: collaborators.audit.clone(),
            stock: StockReservationManager::new(collaborators.ledger.clone()),
            sales: SaleRecorder::new(collaborators.sales.clone()),
            effects,
            fees,
            numbers,
        }
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.orders
            .get_by_id(order_id)
            .await
            .map_err(|err| ServiceError::from_lookup(err, format!("order {order_id}")))
    }

    /// Check-and-set write of the order against the status it was read with.
    async fn store(&self, order: &Order, expected: OrderStatus) -> Result<(), ServiceError> {
        debug_assert!(order.is_consistent(), "order {} is {} with payment {}", order.id, order.status, order.payment_status);
        self.orders
            .update_if_status(order, expected)
            .await
            .map_err(|err| ServiceError::from_write(err, format!("order {}", order.id)))
    }

    async fn resolve_profile(&self, id: Uuid, role_ok: fn(ProfileRole) -> bool, what: &str) -> Result<Profile, ServiceError> {
        self.profiles
            .get(id)
            .await?
            .filter(|profile| role_ok(profile.role))
            .ok_or_else(|| ServiceError::NotFound(format!("{what} {id}")))
    }

    /// Explicit fee, else the fee for the seller-to-buyer distance, else nothing.
    fn delivery_fee(&self, input: &NewOrder, seller: &Profile) -> i64 {
        if let Some(fee) = input.delivery_fee {
            return fee;
        }
        match (input.coordinates, seller.location) {
            (Some(to), Some(from)) => self
                .fees
                .fee_between(from.latitude, from.longitude, to.latitude, to.longitude),
            _ => 0,
        }
    }

    /// Places a new order on behalf of `buyer_id`.
    ///
    /// # Errors
    /// [`ServiceError::Validation`] for malformed input, [`ServiceError::NotFound`] if the
    /// seller does not resolve to a pharmacy or wholesaler.
    #[instrument(skip(self, input), fields(seller_id = %input.seller_id))]
    pub async fn create_order(&self, buyer_id: Uuid, input: NewOrder) -> Result<Order, ServiceError> {
        validate_new_order(&input)?;
        let seller = self.resolve_profile(input.seller_id, ProfileRole::is_seller, "seller").await?;

        let subtotal = input
            .items
            .iter()
            .try_fold(0i64, |acc, item| {
                i64::from(item.quantity)
                    .checked_mul(item.unit_price)
                    .and_then(|line| acc.checked_add(line))
            })
            .ok_or_else(|| ServiceError::Validation("order total is too large".into()))?;
        let delivery_fee = self.delivery_fee(&input, &seller);
        let total_amount = subtotal
            .checked_add(delivery_fee)
            .ok_or_else(|| ServiceError::Validation("order total is too large".into()))?;

        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            order_number: self.numbers.next(now),
            buyer_id,
            seller_id: seller.id,
            rider_id: None,
            items: input
                .items
                .iter()
                .map(|item| OrderItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
            delivery_fee,
            total_amount,
            delivery_address: input.delivery_address.trim().to_string(),
            delivery_phone: input.delivery_phone.trim().to_string(),
            notes: input.notes.filter(|notes| !notes.trim().is_empty()),
            coordinates: input.coordinates,
            status: OrderStatus::PendingPharmacyConfirmation,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            rider_assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            cash_collected_at: None,
        };

        let mut attempt = 1;
        loop {
            debug_assert!(self.numbers.is_well_formed(&order.order_number), "{}", order.order_number);
            match self.orders.insert(&order).await {
                Ok(()) => break,
                Err(RepositoryError::Conflict(detail)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    warn!(order_number = %order.order_number, %detail, "Order number taken, regenerating");
                    order.order_number = self.numbers.next(Utc::now());
                    attempt += 1;
                }
                Err(err) => return Err(ServiceError::Db(err)),
            }
        }

        self.effects
            .record_status(&order, Some(buyer_id), Some("Order placed".into()), "create")
            .await;
        self.effects
            .audit(
                order.id,
                "create",
                Some(buyer_id),
                AuditAction::OrderCreated,
                "order",
                order.id,
                json!({
                    "order_number": order.order_number,
                    "seller_id": order.seller_id,
                    "items": order.items.len(),
                    "delivery_fee": order.delivery_fee,
                    "total_amount": order.total_amount,
                }),
            )
            .await;
        let payload = json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "total_amount": order.total_amount,
        });
        self.effects
            .notify(order.id, "create", order.seller_id, NotificationEvent::NewOrder, payload.clone())
            .await;
        self.effects
            .notify(order.id, "create", buyer_id, NotificationEvent::OrderPlaced, payload)
            .await;

        info!(order_id = %order.id, order_number = %order.order_number, total = order.total_amount, "Order created");
        Ok(order)
    }

    /// Seller confirms the order; stock for every line is reserved.
    ///
    /// A reservation failure is logged and tolerated: the order still moves to `preparing_order`.
    ///
    /// # Errors
    /// [`ServiceError::InvalidState`] if the order was cancelled while its stock was being
    /// reserved; the late holds are released first.
    #[instrument(skip(self))]
    pub async fn accept_order(&self, order_id: Uuid, actor_id: Uuid) -> Result<Order, ServiceError> {
        let mut order = self.load(order_id).await?;
        authorize_seller(&order, actor_id)?;
        let previous = order.status;
        order.accept(Utc::now())?;
        self.store(&order, previous).await?;

        let report = self.stock.reserve(&order).await;
        for (product_id, err) in &report.failed {
            self.effects
                .guard()
                .tolerate(order.id, "accept", "stock_reserve", &format!("product {product_id}: {err}"));
        }

        // A reject or cancel that landed between the status write and the reservations
        // released nothing; give the late holds back.
        match self.orders.get_by_id(order.id).await {
            Ok(current) if current.status == OrderStatus::Cancelled => {
                warn!(order_id = %order.id, "Order cancelled while stock was being reserved, releasing");
                self.stock.release(order.id).await?;
                return Err(ServiceError::InvalidState(format!(
                    "order {} was cancelled while it was being accepted",
                    order.id
                )));
            }
            Ok(_) => {}
            Err(err) => warn!(order_id = %order.id, error = %err, "Could not re-read order after reserving stock"),
        }

        self.effects
            .record_status(&order, Some(actor_id), Some("Accepted by seller".into()), "accept")
            .await;
        self.effects
            .audit(
                order.id,
                "accept",
                Some(actor_id),
                AuditAction::OrderAccepted,
                "order",
                order.id,
                json!({
                    "reserved": report.reserved + report.already_held,
                    "reservation_failures": report.failed.len(),
                }),
            )
            .await;
        self.effects.notify_status(&order, "accept").await;

        info!(order_id = %order.id, "Order accepted");
        Ok(order)
    }

    /// Seller declines the order before a rider is assigned.
    #[instrument(skip(self))]
    pub async fn reject_order(&self, order_id: Uuid, actor_id: Uuid, reason: &str) -> Result<Order, ServiceError> {
        let reason = require_reason(reason)?;
        let order = self.load(order_id).await?;
        authorize_seller(&order, actor_id)?;
        self.close_before_assignment(order, actor_id, reason, AuditAction::OrderRejected, "reject")
            .await
    }

    /// Buyer or seller withdraws the order before a rider is assigned.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: Uuid, actor_id: Uuid, reason: &str) -> Result<Order, ServiceError> {
        let reason = require_reason(reason)?;
        let order = self.load(order_id).await?;
        if actor_id != order.buyer_id && actor_id != order.seller_id {
            return Err(ServiceError::Authorization(format!(
                "{actor_id} is neither buyer nor seller of order {}",
                order.id
            )));
        }
        self.close_before_assignment(order, actor_id, reason, AuditAction::OrderCancelled, "cancel")
            .await
    }

    async fn close_before_assignment(
        &self,
        mut order: Order,
        actor_id: Uuid,
        reason: &str,
        action: AuditAction,
        transition: &'static str,
    ) -> Result<Order, ServiceError> {
        let previous = order.status;
        if !previous.is_pre_assignment() {
            return Err(ServiceError::InvalidState(format!(
                "order {} is {previous}; it can only be closed before a rider is assigned",
                order.id
            )));
        }
        order.cancel(reason, Utc::now())?;
        self.store(&order, previous).await?;

        let released = self.stock.release(order.id).await;

        self.effects
            .record_status(&order, Some(actor_id), Some(reason.to_string()), transition)
            .await;
        self.effects
            .audit(
                order.id,
                transition,
                Some(actor_id),
                action,
                "order",
                order.id,
                json!({ "reason": reason, "previous_status": previous }),
            )
            .await;
        self.effects.notify_status(&order, transition).await;

        released?;
        info!(order_id = %order.id, %reason, "Order closed");
        Ok(order)
    }

    /// Seller has packed the order; it now waits for a rider.
    #[instrument(skip(self))]
    pub async fn mark_ready(&self, order_id: Uuid, actor_id: Uuid) -> Result<Order, ServiceError> {
        let mut order = self.load(order_id).await?;
        authorize_seller(&order, actor_id)?;
        let previous = order.status;
        order.mark_ready(Utc::now())?;
        self.store(&order, previous).await?;

        self.effects
            .record_status(&order, Some(actor_id), Some("Ready for pickup".into()), "mark_ready")
            .await;
        self.effects
            .audit(order.id, "mark_ready", Some(actor_id), AuditAction::OrderReady, "order", order.id, json!({}))
            .await;
        Ok(order)
    }

    /// Seller hands a ready order to a rider. Opens exactly one delivery assignment.
    ///
    /// # Errors
    /// [`ServiceError::NotFound`] if `rider_id` is not a rider, [`ServiceError::InvalidState`]
    /// unless the order is `awaiting_rider` with no open assignment.
    #[instrument(skip(self))]
    pub async fn request_rider(
        &self,
        order_id: Uuid,
        actor_id: Uuid,
        rider_id: Uuid,
    ) -> Result<DeliveryAssignment, ServiceError> {
        let mut order = self.load(order_id).await?;
        authorize_seller(&order, actor_id)?;
        if order.status != OrderStatus::AwaitingRider {
            return Err(ServiceError::InvalidState(format!(
                "order {} is {}; a rider can only be requested once it is awaiting_rider",
                order.id, order.status
            )));
        }
        let rider = self
            .resolve_profile(rider_id, |role| role == ProfileRole::Rider, "rider")
            .await?;
        if let Some(active) = self.assignments.find_active_by_order(order.id).await? {
            return Err(ServiceError::InvalidState(format!(
                "order {} already has open assignment {}",
                order.id, active.id
            )));
        }
        let pickup_address = self
            .profiles
            .get(order.seller_id)
            .await?
            .and_then(|seller| seller.address)
            .unwrap_or_default();

        let now = Utc::now();
        let previous = order.status;
        order.assign_rider(rider.id, now)?;
        let assignment = DeliveryAssignment::open(&order, rider.id, pickup_address, now);
        self.assignments
            .insert(&assignment)
            .await
            .map_err(|err| ServiceError::from_write(err, format!("order {}", order.id)))?;

        if let Err(err) = self.store(&order, previous).await {
            // The order moved underneath us; retire the assignment we just opened.
            let mut orphan = assignment.clone();
            if orphan.cancel(Utc::now()).is_ok() {
                self.effects
                    .guard()
                    .run(
                        order.id,
                        "request_rider",
                        "assignment_rollback",
                        self.assignments.update_if_status(&orphan, assignment.status),
                    )
                    .await;
            }
            return Err(err);
        }

        self.effects
            .record_status(&order, Some(actor_id), Some(format!("Rider {} assigned", rider.display_name)), "request_rider")
            .await;
        self.effects
            .audit(
                order.id,
                "request_rider",
                Some(actor_id),
                AuditAction::RiderRequested,
                "delivery_assignment",
                assignment.id,
                json!({
                    "order_id": order.id,
                    "rider_id": rider.id,
                    "cash_amount": assignment.cash_amount,
                }),
            )
            .await;
        self.effects
            .notify(
                order.id,
                "request_rider",
                rider.id,
                NotificationEvent::DeliveryAssigned,
                json!({
                    "assignment_id": assignment.id,
                    "order_number": order.order_number,
                    "pickup_address": assignment.pickup_address,
                    "delivery_address": assignment.delivery_address,
                    "cash_amount": assignment.cash_amount,
                }),
            )
            .await;
        self.effects.notify_status(&order, "request_rider").await;

        info!(order_id = %order.id, assignment_id = %assignment.id, rider_id = %rider.id, "Rider requested");
        Ok(assignment)
    }

    /// Re-runs stock resolution for a terminal order whose release or fulfilment failed.
    /// Only rows still `reserved` are touched.
    #[instrument(skip(self))]
    pub async fn resolve_reservations(&self, order_id: Uuid) -> Result<Vec<StockReservation>, ServiceError> {
        let order = self.load(order_id).await?;
        match order.status {
            OrderStatus::DeliveredAndPaid => {
                let fulfilled = self.stock.fulfill(order.id).await?;
                self.effects
                    .guard()
                    .run(order.id, "resolve_reservations", "pos_sale", self.sales.record(&order))
                    .await;
                Ok(fulfilled)
            }
            OrderStatus::DeliveryFailed | OrderStatus::Cancelled => self.stock.release(order.id).await,
            status => Err(ServiceError::InvalidState(format!(
                "order {} is {status}; reservations resolve only once it is terminal",
                order.id
            ))),
        }
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.load(order_id).await
    }

    pub async fn status_history(&self, order_id: Uuid) -> Result<Vec<StatusHistoryEntry>, ServiceError> {
        self.load(order_id).await?;
        Ok(self.history.list_by_order(order_id).await?)
    }

    pub async fn audit_trail(&self, resource_id: Uuid) -> Result<Vec<AuditRecord>, ServiceError> {
        Ok(self.audit_log.list_by_resource(resource_id).await?)
    }

    pub async fn reservations(&self, order_id: Uuid) -> Result<Vec<StockReservation>, ServiceError> {
        self.load(order_id).await?;
        self.stock.reservations(order_id).await
    }

    pub async fn assignments(&self, order_id: Uuid) -> Result<Vec<DeliveryAssignment>, ServiceError> {
        self.load(order_id).await?;
        Ok(self.assignments.list_by_order(order_id).await?)
    }

    pub async fn sale(&self, order_id: Uuid) -> Result<Option<Sale>, ServiceError> {
        let order = self.load(order_id).await?;
        Ok(self.sales.for_order(&order).await?)
    }

    pub async fn orders_for_seller(
        &self,
        seller_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.list_by_seller(seller_id, status).await?)
    }

    /// Side-effect failures swallowed so far.
    pub fn tolerated_failures(&self) -> u64 {
        self.effects.guard().tolerated_failures()
    }

    async fn mirror_pickup(&self, assignment: &DeliveryAssignment, actor_id: Uuid) -> Result<(), ServiceError> {
        let mut order = self.load(assignment.order_id).await?;
        let previous = order.status;
        order.pick_up(assignment.actual_pickup_time.unwrap_or_else(Utc::now))?;
        self.store(&order, previous).await?;

        self.effects
            .record_status(&order, Some(actor_id), Some("Picked up by rider".into()), "pick_up")
            .await;
        self.effects
            .audit(
                order.id,
                "pick_up",
                Some(actor_id),
                AuditAction::OrderPickedUp,
                "order",
                order.id,
                json!({ "assignment_id": assignment.id }),
            )
            .await;
        self.effects.notify_status(&order, "pick_up").await;
        Ok(())
    }

    /// Completes the order, then fulfils stock and books the sale.
    ///
    /// The delivered status stands even if fulfilment fails; the error is returned so the
    /// caller knows stock needs [`resolve_reservations`](Self::resolve_reservations).
    async fn mirror_delivery(&self, assignment: &DeliveryAssignment, actor_id: Uuid) -> Result<(), ServiceError> {
        let mut order = self.load(assignment.order_id).await?;
        let previous = order.status;
        order.deliver(assignment.actual_delivery_time.unwrap_or_else(Utc::now))?;
        self.store(&order, previous).await?;

        let fulfilled = self.stock.fulfill(order.id).await;
        if fulfilled.is_ok() {
            self.effects
                .guard()
                .run(order.id, "deliver", "pos_sale", self.sales.record(&order))
                .await;
        }

        let collected = assignment.collected_amount.unwrap_or(assignment.cash_amount);
        self.effects
            .record_status(&order, Some(actor_id), Some(format!("Delivered, {collected} collected")), "deliver")
            .await;
        self.effects
            .audit(
                order.id,
                "deliver",
                Some(actor_id),
                AuditAction::OrderDelivered,
                "order",
                order.id,
                json!({
                    "assignment_id": assignment.id,
                    "cash_amount": assignment.cash_amount,
                    "collected_amount": collected,
                }),
            )
            .await;
        if let Some(discrepancy) = assignment.cash_discrepancy.filter(|d| *d != 0) {
            warn!(
                order_id = %order.id,
                assignment_id = %assignment.id,
                expected = assignment.cash_amount,
                collected,
                discrepancy,
                "Cash collected differs from amount due"
            );
            self.effects
                .audit(
                    order.id,
                    "deliver",
                    Some(actor_id),
                    AuditAction::CashDiscrepancy,
                    "delivery_assignment",
                    assignment.id,
                    json!({
                        "order_id": order.id,
                        "expected": assignment.cash_amount,
                        "collected": collected,
                        "discrepancy": discrepancy,
                    }),
                )
                .await;
        }
        self.effects.notify_status(&order, "deliver").await;

        fulfilled.map(|_| ())
    }

    async fn mirror_failure(&self, assignment: &DeliveryAssignment, actor_id: Uuid) -> Result<(), ServiceError> {
        let mut order = self.load(assignment.order_id).await?;
        let previous = order.status;
        order.fail_delivery(Utc::now())?;
        self.store(&order, previous).await?;

        let released = self.stock.release(order.id).await;

        let reason = assignment.failure_reason.clone().unwrap_or_default();
        self.effects
            .record_status(&order, Some(actor_id), Some(reason.clone()), "fail")
            .await;
        self.effects
            .audit(
                order.id,
                "fail",
                Some(actor_id),
                AuditAction::DeliveryFailed,
                "order",
                order.id,
                json!({ "assignment_id": assignment.id, "reason": reason }),
            )
            .await;
        self.effects.notify_status(&order, "fail").await;

        released.map(|_| ())
    }

    /// The assignment was withdrawn before pickup; the order waits for a new rider.
    async fn mirror_unassignment(
        &self,
        assignment: &DeliveryAssignment,
        actor_id: Uuid,
        reason: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut order = self.load(assignment.order_id).await?;
        let previous = order.status;
        order.release_rider(Utc::now())?;
        self.store(&order, previous).await?;

        let note = reason.map_or_else(|| "Rider unassigned".to_string(), |r| format!("Rider unassigned: {r}"));
        self.effects
            .record_status(&order, Some(actor_id), Some(note), "cancel_assignment")
            .await;
        self.effects
            .audit(
                order.id,
                "cancel_assignment",
                Some(actor_id),
                AuditAction::AssignmentCancelled,
                "delivery_assignment",
                assignment.id,
                json!({ "order_id": order.id, "rider_id": assignment.rider_id, "reason": reason }),
            )
            .await;
        let counterpart = if actor_id == assignment.rider_id {
            order.seller_id
        } else {
            assignment.rider_id
        };
        self.effects
            .notify(
                order.id,
                "cancel_assignment",
                counterpart,
                NotificationEvent::OrderStatusChanged,
                json!({
                    "order_id": order.id,
                    "assignment_id": assignment.id,
                    "status": order.status,
                    "reason": reason,
                }),
            )
            .await;
        Ok(())
    }
}

#[async_trait]
impl DeliveryEventHandler for OrderLifecycleEngine {
    async fn on_delivery_event(&self, event: &DeliveryEvent) -> Result<(), ServiceError> {
        match event {
            DeliveryEvent::PickedUp { assignment, actor_id } => self.mirror_pickup(assignment, *actor_id).await,
            DeliveryEvent::Delivered { assignment, actor_id } => self.mirror_delivery(assignment, *actor_id).await,
            DeliveryEvent::Failed { assignment, actor_id } => self.mirror_failure(assignment, *actor_id).await,
            DeliveryEvent::Cancelled { assignment, actor_id, reason } => {
                self.mirror_unassignment(assignment, *actor_id, reason.as_deref()).await
            }
        }
    }
}

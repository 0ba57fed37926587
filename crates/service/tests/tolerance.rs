mod common;

use std::sync::Arc;

use common::{world, world_with, FailingNotifier, FlakyLedger, FlakyOrders, RecordingNotifier};
use model::{AssignmentStatus, NotificationEvent, OrderStatus, ReservationStatus};
use service::ServiceError;

#[tokio::test]
async fn test_notifier_outage_never_blocks_the_flow() {
    let (w, _) = world_with(|_, collaborators| collaborators.notifier = Arc::new(FailingNotifier)).await;
    let (order, assignment) = w.picked_up_order().await;
    w.services
        .deliveries
        .mark_delivered(assignment.id, w.rider, 9500)
        .await
        .unwrap();

    assert_eq!(w.order(order.id).await.status, OrderStatus::DeliveredAndPaid);
    assert!(w.services.orders.tolerated_failures() > 0);
}

#[tokio::test]
async fn test_notifications_reach_each_party() {
    let (w, notifier) = world_with(|_, collaborators| {
        let notifier = Arc::new(RecordingNotifier::default());
        collaborators.notifier = notifier.clone();
        notifier
    })
    .await;
    let (_, assignment) = w.assigned_order().await;

    let sent = notifier.sent.lock().unwrap();
    assert!(sent
        .iter()
        .any(|n| n.recipient_id == w.seller && n.event_type == NotificationEvent::NewOrder));
    assert!(sent
        .iter()
        .any(|n| n.recipient_id == w.buyer && n.event_type == NotificationEvent::OrderPlaced));
    let assigned = sent
        .iter()
        .find(|n| n.event_type == NotificationEvent::DeliveryAssigned)
        .unwrap();
    assert_eq!(assigned.recipient_id, w.rider);
    assert_eq!(assigned.email.as_deref(), Some("femi.rider@example.com"));
    assert_eq!(assigned.payload["assignment_id"], assignment.id.to_string());
    assert_eq!(w.services.orders.tolerated_failures(), 0);
}

#[tokio::test]
async fn test_short_stock_does_not_block_accept() {
    let w = world().await;
    w.store.set_stock(w.seller, w.bandages, 0).await;

    let order = w.accepted_order().await;
    assert_eq!(order.status, OrderStatus::PreparingOrder);

    let reservations = w.services.orders.reservations(order.id).await.unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].product_id, w.paracetamol);
    assert_eq!(w.services.orders.tolerated_failures(), 1);
}

#[tokio::test]
async fn test_release_failure_surfaces_after_cancel_commits() {
    let (w, ledger) = world_with(|store, collaborators| {
        let ledger = Arc::new(FlakyLedger::new(store.clone()));
        collaborators.ledger = ledger.clone();
        ledger
    })
    .await;
    let order = w.accepted_order().await;

    ledger.set(true, false);
    let result = w.services.orders.cancel_order(order.id, w.buyer, "found it cheaper").await;
    assert!(matches!(result, Err(ServiceError::Dependency { .. })));
    assert_eq!(w.order(order.id).await.status, OrderStatus::Cancelled);

    ledger.set(false, false);
    let released = w.services.orders.resolve_reservations(order.id).await.unwrap();
    assert_eq!(released.len(), 2);
    let paracetamol = w.store.stock_level(w.seller, w.paracetamol).await.unwrap();
    assert_eq!(paracetamol.reserved, 0);
}

#[tokio::test]
async fn test_fulfil_failure_keeps_delivery_and_can_be_retried() {
    let (w, ledger) = world_with(|store, collaborators| {
        let ledger = Arc::new(FlakyLedger::new(store.clone()));
        collaborators.ledger = ledger.clone();
        ledger
    })
    .await;
    let (order, assignment) = w.picked_up_order().await;

    ledger.set(false, true);
    let result = w.services.deliveries.mark_delivered(assignment.id, w.rider, 9500).await;
    assert!(matches!(result, Err(ServiceError::Dependency { .. })));
    assert_eq!(w.order(order.id).await.status, OrderStatus::DeliveredAndPaid);
    assert!(w.services.orders.sale(order.id).await.unwrap().is_none());

    ledger.set(false, false);
    let fulfilled = w.services.orders.resolve_reservations(order.id).await.unwrap();
    assert_eq!(fulfilled.len(), 2);
    assert!(fulfilled.iter().all(|r| r.status == ReservationStatus::Fulfilled));
    assert!(w.services.orders.sale(order.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_resolve_reservations_waits_for_a_terminal_order() {
    let w = world().await;
    let order = w.accepted_order().await;
    let result = w.services.orders.resolve_reservations(order.id).await;
    assert!(matches!(result, Err(ServiceError::InvalidState(_))));
}

#[tokio::test]
async fn test_assignment_rolls_back_when_the_order_write_fails() {
    let (w, orders) = world_with(|store, collaborators| {
        let orders = Arc::new(FlakyOrders::new(store.clone()));
        collaborators.orders = orders.clone();
        orders
    })
    .await;
    let (order, assignment) = w.assigned_order().await;
    let deliveries = &w.services.deliveries;
    deliveries.accept(assignment.id, w.rider).await.unwrap();

    orders.set(true);
    let result = deliveries.mark_picked_up(assignment.id, w.rider).await;
    assert!(matches!(result, Err(ServiceError::Db(_))));
    assert_eq!(deliveries.get(assignment.id).await.unwrap().status, AssignmentStatus::Accepted);
    assert_eq!(w.order(order.id).await.status, OrderStatus::RiderAssigned);

    orders.set(false);
    let assignment = deliveries.mark_picked_up(assignment.id, w.rider).await.unwrap();
    assert_eq!(assignment.status, AssignmentStatus::PickedUp);
    assert_eq!(w.order(order.id).await.status, OrderStatus::OutForDelivery);

    orders.set(true);
    let result = deliveries.mark_delivered(assignment.id, w.rider, 9500).await;
    assert!(matches!(result, Err(ServiceError::Db(_))));
    assert_eq!(deliveries.get(assignment.id).await.unwrap().status, AssignmentStatus::PickedUp);
    let stored = w.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::OutForDelivery);
    let reservations = w.services.orders.reservations(order.id).await.unwrap();
    assert!(reservations.iter().all(|r| r.status == ReservationStatus::Reserved));
}

mod common;

use common::{world, SELLER_LOCATION};
use model::{
    AssignmentStatus, AuditAction, GeoPoint, NewOrderItem, OrderStatus, PaymentMethod, PaymentStatus,
    ReservationStatus,
};
use service::{OrderNumberGenerator, ServiceError};

#[tokio::test]
async fn test_create_order_totals_lines_and_fee() {
    let w = world().await;
    let order = w.place_order().await;

    assert_eq!(order.total_amount, 9500);
    assert_eq!(order.delivery_fee, 1500);
    assert_eq!(order.status, OrderStatus::PendingPharmacyConfirmation);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.rider_id.is_none());
    assert!(OrderNumberGenerator::new("COD").is_well_formed(&order.order_number));

    let history = w.services.orders.status_history(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::PendingPharmacyConfirmation);
    assert_eq!(history[0].actor_id, Some(w.buyer));
}

#[tokio::test]
async fn test_order_numbers_are_distinct() {
    let w = world().await;
    let first = w.place_order().await;
    let second = w.place_order().await;
    assert_ne!(first.order_number, second.order_number);
}

#[tokio::test]
async fn test_fee_is_derived_from_distance_when_not_given() {
    let w = world().await;
    let mut input = w.new_order();
    input.delivery_fee = None;
    // Roughly 3 km north of the seller.
    input.coordinates = Some(GeoPoint {
        latitude: SELLER_LOCATION.latitude + 0.027,
        longitude: SELLER_LOCATION.longitude,
    });
    let order = w.services.orders.create_order(w.buyer, input).await.unwrap();
    assert_eq!(order.delivery_fee, 1500);
    assert_eq!(order.total_amount, 9500);
}

#[tokio::test]
async fn test_fee_defaults_to_zero_without_coordinates() {
    let w = world().await;
    let mut input = w.new_order();
    input.delivery_fee = None;
    let order = w.services.orders.create_order(w.buyer, input).await.unwrap();
    assert_eq!(order.delivery_fee, 0);
    assert_eq!(order.total_amount, 8000);
}

#[tokio::test]
async fn test_create_order_validates_input() {
    let w = world().await;
    let orders = &w.services.orders;

    let mut empty = w.new_order();
    empty.items.clear();
    assert!(matches!(orders.create_order(w.buyer, empty).await, Err(ServiceError::Validation(_))));

    let mut zero = w.new_order();
    zero.items[0].quantity = 0;
    assert!(matches!(orders.create_order(w.buyer, zero).await, Err(ServiceError::Validation(_))));

    let mut no_address = w.new_order();
    no_address.delivery_address = "   ".to_string();
    assert!(matches!(orders.create_order(w.buyer, no_address).await, Err(ServiceError::Validation(_))));

    let mut negative_fee = w.new_order();
    negative_fee.delivery_fee = Some(-1);
    assert!(matches!(orders.create_order(w.buyer, negative_fee).await, Err(ServiceError::Validation(_))));

    let mut unknown_seller = w.new_order();
    unknown_seller.seller_id = uuid::Uuid::new_v4();
    assert!(matches!(orders.create_order(w.buyer, unknown_seller).await, Err(ServiceError::NotFound(_))));

    let mut rider_as_seller = w.new_order();
    rider_as_seller.seller_id = w.rider;
    assert!(matches!(orders.create_order(w.buyer, rider_as_seller).await, Err(ServiceError::NotFound(_))));

    assert!(orders.orders_for_seller(w.seller, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_accept_reserves_every_line() {
    let w = world().await;
    let order = w.accepted_order().await;
    assert_eq!(order.status, OrderStatus::PreparingOrder);

    let reservations = w.services.orders.reservations(order.id).await.unwrap();
    assert_eq!(reservations.len(), 2);
    assert!(reservations.iter().all(|r| r.status == ReservationStatus::Reserved));

    let paracetamol = w.store.stock_level(w.seller, w.paracetamol).await.unwrap();
    assert_eq!(paracetamol.reserved, 3);
    assert_eq!(paracetamol.available(), 7);
}

#[tokio::test]
async fn test_repeated_product_lines_hold_and_deduct_the_full_quantity() {
    let w = world().await;
    let mut input = w.new_order();
    input.items = vec![
        NewOrderItem {
            product_id: w.paracetamol,
            quantity: 3,
            unit_price: 1000,
        },
        NewOrderItem {
            product_id: w.paracetamol,
            quantity: 2,
            unit_price: 1000,
        },
    ];
    let orders = &w.services.orders;
    let order = orders.create_order(w.buyer, input).await.unwrap();
    assert_eq!(order.total_amount, 6500);

    orders.accept_order(order.id, w.seller).await.unwrap();
    let reservations = orders.reservations(order.id).await.unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].quantity, 5);
    assert_eq!(w.store.stock_level(w.seller, w.paracetamol).await.unwrap().reserved, 5);
    assert_eq!(orders.tolerated_failures(), 0);

    orders.mark_ready(order.id, w.seller).await.unwrap();
    let assignment = orders.request_rider(order.id, w.seller, w.rider).await.unwrap();
    let deliveries = &w.services.deliveries;
    deliveries.accept(assignment.id, w.rider).await.unwrap();
    deliveries.mark_picked_up(assignment.id, w.rider).await.unwrap();
    deliveries.mark_delivered(assignment.id, w.rider, 6500).await.unwrap();

    let paracetamol = w.store.stock_level(w.seller, w.paracetamol).await.unwrap();
    assert_eq!((paracetamol.on_hand, paracetamol.reserved), (5, 0));
    let sale = orders.sale(order.id).await.unwrap().unwrap();
    assert_eq!(sale.items.iter().map(|item| item.quantity).sum::<i32>(), 5);
}

#[tokio::test]
async fn test_second_accept_is_rejected_without_new_reservations() {
    let w = world().await;
    let order = w.accepted_order().await;

    let again = w.services.orders.accept_order(order.id, w.seller).await;
    assert!(matches!(again, Err(ServiceError::InvalidState(_))));

    assert_eq!(w.services.orders.reservations(order.id).await.unwrap().len(), 2);
    let paracetamol = w.store.stock_level(w.seller, w.paracetamol).await.unwrap();
    assert_eq!(paracetamol.reserved, 3);
}

#[tokio::test]
async fn test_request_rider_opens_one_assignment() {
    let w = world().await;
    let (order, assignment) = w.assigned_order().await;

    assert_eq!(assignment.status, AssignmentStatus::Assigned);
    assert_eq!(assignment.rider_id, w.rider);
    assert_eq!(assignment.cash_amount, 9500);
    assert_eq!(assignment.pickup_address, "12 Marina Road");
    assert_eq!(assignment.delivery_address, "4 Allen Avenue");

    let stored = w.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::RiderAssigned);
    assert_eq!(stored.rider_id, Some(w.rider));
    assert!(stored.rider_assigned_at.is_some());

    let second = w
        .services
        .orders
        .request_rider(order.id, w.seller, w.other_rider)
        .await;
    assert!(matches!(second, Err(ServiceError::InvalidState(_))));
    assert_eq!(w.services.orders.assignments(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_request_rider_needs_a_ready_order_and_a_rider() {
    let w = world().await;
    let order = w.accepted_order().await;
    let early = w.services.orders.request_rider(order.id, w.seller, w.rider).await;
    assert!(matches!(early, Err(ServiceError::InvalidState(_))));

    let order = w.services.orders.mark_ready(order.id, w.seller).await.unwrap();
    let not_a_rider = w.services.orders.request_rider(order.id, w.seller, w.buyer).await;
    assert!(matches!(not_a_rider, Err(ServiceError::NotFound(_))));
    assert_eq!(w.order(order.id).await.status, OrderStatus::AwaitingRider);
}

#[tokio::test]
async fn test_pickup_moves_order_out_for_delivery() {
    let w = world().await;
    let (order, assignment) = w.picked_up_order().await;

    assert_eq!(assignment.status, AssignmentStatus::PickedUp);
    assert!(assignment.actual_pickup_time.is_some());

    let stored = w.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::OutForDelivery);
    assert!(stored.picked_up_at.is_some());
}

#[tokio::test]
async fn test_pickup_requires_acceptance_first() {
    let w = world().await;
    let (order, assignment) = w.assigned_order().await;
    let result = w.services.deliveries.mark_picked_up(assignment.id, w.rider).await;
    assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    assert_eq!(w.order(order.id).await.status, OrderStatus::RiderAssigned);
}

#[tokio::test]
async fn test_delivery_completes_order_and_books_sale() {
    let w = world().await;
    let (order, assignment) = w.picked_up_order().await;

    let assignment = w
        .services
        .deliveries
        .mark_delivered(assignment.id, w.rider, 9500)
        .await
        .unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Delivered);
    assert!(assignment.cash_collected);
    assert_eq!(assignment.cash_discrepancy, Some(0));

    let stored = w.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::DeliveredAndPaid);
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
    assert!(stored.delivered_at.is_some());

    let reservations = w.services.orders.reservations(order.id).await.unwrap();
    assert!(reservations.iter().all(|r| r.status == ReservationStatus::Fulfilled));
    let paracetamol = w.store.stock_level(w.seller, w.paracetamol).await.unwrap();
    assert_eq!((paracetamol.on_hand, paracetamol.reserved), (7, 0));
    let bandages = w.store.stock_level(w.seller, w.bandages).await.unwrap();
    assert_eq!((bandages.on_hand, bandages.reserved), (9, 0));

    let sale = w.services.orders.sale(order.id).await.unwrap().unwrap();
    assert_eq!(sale.seller_id, w.seller);
    assert_eq!(sale.total_amount, 9500);
    assert_eq!(sale.payment_method, PaymentMethod::Cod);
    assert_eq!(sale.items.len(), 2);

    let statuses: Vec<OrderStatus> = w
        .services
        .orders
        .status_history(order.id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::PendingPharmacyConfirmation,
            OrderStatus::PreparingOrder,
            OrderStatus::AwaitingRider,
            OrderStatus::RiderAssigned,
            OrderStatus::OutForDelivery,
            OrderStatus::DeliveredAndPaid,
        ]
    );
}

#[tokio::test]
async fn test_cash_shortfall_is_recorded_without_blocking() {
    let w = world().await;
    let (order, assignment) = w.picked_up_order().await;

    let assignment = w
        .services
        .deliveries
        .mark_delivered(assignment.id, w.rider, 9000)
        .await
        .unwrap();
    assert_eq!(assignment.collected_amount, Some(9000));
    assert_eq!(assignment.cash_discrepancy, Some(-500));
    assert_eq!(w.order(order.id).await.status, OrderStatus::DeliveredAndPaid);

    let trail = w.services.orders.audit_trail(assignment.id).await.unwrap();
    assert!(trail.iter().any(|record| record.action == AuditAction::CashDiscrepancy));
}

#[tokio::test]
async fn test_negative_cash_is_rejected() {
    let w = world().await;
    let (order, assignment) = w.picked_up_order().await;
    let result = w.services.deliveries.mark_delivered(assignment.id, w.rider, -1).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert_eq!(
        w.services.deliveries.get(assignment.id).await.unwrap().status,
        AssignmentStatus::PickedUp
    );
    assert_eq!(w.order(order.id).await.status, OrderStatus::OutForDelivery);
}

#[tokio::test]
async fn test_failed_delivery_releases_stock() {
    let w = world().await;
    let (order, assignment) = w.picked_up_order().await;

    let assignment = w
        .services
        .deliveries
        .mark_failed(assignment.id, w.rider, "customer unreachable")
        .await
        .unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Failed);
    assert_eq!(assignment.failure_reason.as_deref(), Some("customer unreachable"));

    let stored = w.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::DeliveryFailed);
    assert_eq!(stored.payment_status, PaymentStatus::Pending);

    let reservations = w.services.orders.reservations(order.id).await.unwrap();
    assert_eq!(reservations.len(), 2);
    assert!(reservations.iter().all(|r| r.status == ReservationStatus::Released));
    let paracetamol = w.store.stock_level(w.seller, w.paracetamol).await.unwrap();
    assert_eq!((paracetamol.on_hand, paracetamol.reserved), (10, 0));
    assert!(w.services.orders.sale(order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failure_needs_a_reason() {
    let w = world().await;
    let (_, assignment) = w.picked_up_order().await;
    let result = w.services.deliveries.mark_failed(assignment.id, w.rider, " ").await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_terminal_orders_accept_no_further_transitions() {
    let w = world().await;
    let (order, assignment) = w.picked_up_order().await;
    w.services
        .deliveries
        .mark_delivered(assignment.id, w.rider, 9500)
        .await
        .unwrap();

    let cancel = w.services.orders.cancel_order(order.id, w.buyer, "too late").await;
    assert!(matches!(cancel, Err(ServiceError::InvalidState(_))));
    let fail = w.services.deliveries.mark_failed(assignment.id, w.rider, "oops").await;
    assert!(matches!(fail, Err(ServiceError::InvalidState(_))));
    assert_eq!(w.order(order.id).await.status, OrderStatus::DeliveredAndPaid);
}

#[tokio::test]
async fn test_seller_order_listing_filters_by_status() {
    let w = world().await;
    let pending = w.place_order().await;
    let accepted = w.accepted_order().await;

    let orders = &w.services.orders;
    assert_eq!(orders.orders_for_seller(w.seller, None).await.unwrap().len(), 2);

    let preparing = orders
        .orders_for_seller(w.seller, Some(OrderStatus::PreparingOrder))
        .await
        .unwrap();
    assert_eq!(preparing.len(), 1);
    assert_eq!(preparing[0].id, accepted.id);

    let waiting = orders
        .orders_for_seller(w.seller, Some(OrderStatus::PendingPharmacyConfirmation))
        .await
        .unwrap();
    assert_eq!(waiting[0].id, pending.id);
}

//! Request handlers. The acting party travels in the request body as `actor_id`;
//! authentication is expected in front of this service.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use model::{
    AuditRecord, DeliveryAssignment, NewOrder, Order, OrderStatus, Sale, StatusHistoryEntry, StockReservation,
};
use pricing::haversine_distance;
use serde::{Deserialize, Serialize};
use service::ServiceError;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub buyer_id: Uuid,
    #[serde(flatten)]
    pub order: NewOrder,
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub actor_id: Uuid,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RiderRequest {
    pub actor_id: Uuid,
    pub rider_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DeliverRequest {
    pub actor_id: Uuid,
    pub collected_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CancelAssignmentRequest {
    pub actor_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SellerOrdersQuery {
    pub status: Option<String>,
}

/// Either `km` or both coordinate pairs.
#[derive(Debug, Deserialize)]
pub struct DeliveryFeeQuery {
    pub km: Option<f64>,
    pub from_lat: Option<f64>,
    pub from_lon: Option<f64>,
    pub to_lat: Option<f64>,
    pub to_lon: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DeliveryFeeResponse {
    pub distance_km: f64,
    pub fee: i64,
}

/// Counts the transition outcome and converts the error.
fn track<T>(state: &AppState, operation: &str, result: Result<T, ServiceError>) -> Result<T, ApiError> {
    match &result {
        Ok(_) => state.metrics.record_transition(operation, "ok"),
        Err(err) => state.metrics.record_transition(operation, err.code()),
    }
    result.map_err(ApiError::from)
}

pub(crate) async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    let result = state.services.orders.create_order(request.buyer_id, request.order).await;
    let order = track(&state, "create_order", result)?;
    Ok((StatusCode::CREATED, Json(order)).into_response())
}

pub(crate) async fn get_order(State(state): State<AppState>, Path(order_id): Path<Uuid>) -> ApiResult<Order> {
    Ok(Json(state.services.orders.get_order(order_id).await?))
}

pub(crate) async fn order_history(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Vec<StatusHistoryEntry>> {
    Ok(Json(state.services.orders.status_history(order_id).await?))
}

pub(crate) async fn order_reservations(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Vec<StockReservation>> {
    Ok(Json(state.services.orders.reservations(order_id).await?))
}

pub(crate) async fn order_assignments(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Vec<DeliveryAssignment>> {
    Ok(Json(state.services.orders.assignments(order_id).await?))
}

pub(crate) async fn order_sale(State(state): State<AppState>, Path(order_id): Path<Uuid>) -> ApiResult<Sale> {
    state
        .services
        .orders
        .sale(order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound(format!("sale for order {order_id}")).into())
}

pub(crate) async fn audit_trail(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
) -> ApiResult<Vec<AuditRecord>> {
    Ok(Json(state.services.orders.audit_trail(resource_id).await?))
}

pub(crate) async fn accept_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Order> {
    let result = state.services.orders.accept_order(order_id, request.actor_id).await;
    Ok(Json(track(&state, "accept_order", result)?))
}

pub(crate) async fn reject_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> ApiResult<Order> {
    let result = state
        .services
        .orders
        .reject_order(order_id, request.actor_id, &request.reason)
        .await;
    Ok(Json(track(&state, "reject_order", result)?))
}

pub(crate) async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> ApiResult<Order> {
    let result = state
        .services
        .orders
        .cancel_order(order_id, request.actor_id, &request.reason)
        .await;
    Ok(Json(track(&state, "cancel_order", result)?))
}

pub(crate) async fn mark_ready(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Order> {
    let result = state.services.orders.mark_ready(order_id, request.actor_id).await;
    Ok(Json(track(&state, "mark_ready", result)?))
}

pub(crate) async fn request_rider(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<RiderRequest>,
) -> Result<Response, ApiError> {
    let result = state
        .services
        .orders
        .request_rider(order_id, request.actor_id, request.rider_id)
        .await;
    let assignment = track(&state, "request_rider", result)?;
    Ok((StatusCode::CREATED, Json(assignment)).into_response())
}

pub(crate) async fn resolve_stock(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Vec<StockReservation>> {
    let result = state.services.orders.resolve_reservations(order_id).await;
    let resolved = track(&state, "resolve_stock", result)?;
    info!(order_id = %order_id, resolved = resolved.len(), "Reservations resolved");
    Ok(Json(resolved))
}

pub(crate) async fn seller_orders(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
    Query(query): Query<SellerOrdersQuery>,
) -> ApiResult<Vec<Order>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    Ok(Json(state.services.orders.orders_for_seller(seller_id, status).await?))
}

pub(crate) async fn get_assignment(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<DeliveryAssignment> {
    Ok(Json(state.services.deliveries.get(assignment_id).await?))
}

pub(crate) async fn accept_assignment(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<DeliveryAssignment> {
    let result = state.services.deliveries.accept(assignment_id, request.actor_id).await;
    Ok(Json(track(&state, "accept_assignment", result)?))
}

pub(crate) async fn pick_up(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<DeliveryAssignment> {
    let result = state
        .services
        .deliveries
        .mark_picked_up(assignment_id, request.actor_id)
        .await;
    Ok(Json(track(&state, "pick_up", result)?))
}

pub(crate) async fn deliver(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    Json(request): Json<DeliverRequest>,
) -> ApiResult<DeliveryAssignment> {
    let result = state
        .services
        .deliveries
        .mark_delivered(assignment_id, request.actor_id, request.collected_amount)
        .await;
    Ok(Json(track(&state, "deliver", result)?))
}

pub(crate) async fn fail_delivery(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> ApiResult<DeliveryAssignment> {
    let result = state
        .services
        .deliveries
        .mark_failed(assignment_id, request.actor_id, &request.reason)
        .await;
    Ok(Json(track(&state, "fail_delivery", result)?))
}

pub(crate) async fn cancel_assignment(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    Json(request): Json<CancelAssignmentRequest>,
) -> ApiResult<DeliveryAssignment> {
    let result = state
        .services
        .deliveries
        .cancel(assignment_id, request.actor_id, request.reason)
        .await;
    Ok(Json(track(&state, "cancel_assignment", result)?))
}

pub(crate) async fn rider_assignments(
    State(state): State<AppState>,
    Path(rider_id): Path<Uuid>,
) -> ApiResult<Vec<DeliveryAssignment>> {
    Ok(Json(state.services.deliveries.active_for_rider(rider_id).await?))
}

pub(crate) async fn delivery_fee(
    State(state): State<AppState>,
    Query(query): Query<DeliveryFeeQuery>,
) -> ApiResult<DeliveryFeeResponse> {
    let distance_km = match query {
        DeliveryFeeQuery { km: Some(km), .. } => km,
        DeliveryFeeQuery {
            from_lat: Some(from_lat),
            from_lon: Some(from_lon),
            to_lat: Some(to_lat),
            to_lon: Some(to_lon),
            ..
        } => haversine_distance(from_lat, from_lon, to_lat, to_lon),
        _ => {
            return Err(ApiError::BadRequest(
                "give either km or from_lat, from_lon, to_lat and to_lon".into(),
            ));
        }
    };
    Ok(Json(DeliveryFeeResponse {
        distance_km,
        fee: state.fees.fee_for_distance(distance_km),
    }))
}

pub(crate) async fn health() -> &'static str {
    "OK"
}

pub(crate) async fn metrics(State(state): State<AppState>) -> Response {
    state
        .metrics
        .set_tolerated_failures(state.services.orders.tolerated_failures());
    match state.metrics.render() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

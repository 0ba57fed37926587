//! In-memory backend.
//!
//! All tables sit behind one `RwLock`, so every call is atomic with respect to
//! every other call, which is stronger than the single-row guarantee the service expects.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    AssignmentStatus, AuditRecord, DeliveryAssignment, Order, OrderStatus, Profile,
    ReservationStatus, Sale, StatusHistoryEntry, StockReservation,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    AssignmentsRepository, AuditRepository, OrdersRepository, ProfileDirectory, RepositoryError,
    SalesRepository, StatusHistoryRepository, StockLedger,
};

/// On-hand and reserved quantity for one product of one seller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockLevel {
    pub on_hand: i64,
    pub reserved: i64,
}

impl StockLevel {
    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }
}

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    history: Vec<StatusHistoryEntry>,
    assignments: HashMap<Uuid, DeliveryAssignment>,
    reservations: Vec<StockReservation>,
    stock: HashMap<(Uuid, Uuid), StockLevel>,
    sales: HashMap<Uuid, Sale>,
    audit: Vec<AuditRecord>,
    profiles: HashMap<Uuid, Profile>,
}

/// Thread-safe in-memory store implementing every repository trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_profile(&self, profile: Profile) {
        self.inner.write().await.profiles.insert(profile.id, profile);
    }

    /// Set the on-hand quantity of a product, keeping any current reservations.
    pub async fn set_stock(&self, seller_id: Uuid, product_id: Uuid, on_hand: i64) {
        let mut tables = self.inner.write().await;
        tables.stock.entry((seller_id, product_id)).or_default().on_hand = on_hand;
    }

    pub async fn stock_level(&self, seller_id: Uuid, product_id: Uuid) -> Option<StockLevel> {
        self.inner.read().await.stock.get(&(seller_id, product_id)).copied()
    }
}

fn resolve_reserved(
    tables: &mut Tables,
    order_id: Uuid,
    to: ReservationStatus,
    at: DateTime<Utc>,
) -> Vec<StockReservation> {
    let mut resolved = Vec::new();
    for reservation in tables
        .reservations
        .iter_mut()
        .filter(|r| r.order_id == order_id && r.status == ReservationStatus::Reserved)
    {
        reservation.status = to;
        match to {
            ReservationStatus::Released => reservation.released_at = Some(at),
            ReservationStatus::Fulfilled => reservation.fulfilled_at = Some(at),
            ReservationStatus::Reserved => {}
        }
        resolved.push(reservation.clone());
    }
    for reservation in &resolved {
        let level = tables
            .stock
            .entry((reservation.seller_id, reservation.product_id))
            .or_default();
        let quantity = i64::from(reservation.quantity);
        level.reserved -= quantity;
        if to == ReservationStatus::Fulfilled {
            level.on_hand -= quantity;
        }
    }
    resolved
}

#[async_trait]
impl OrdersRepository for MemoryStore {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tables = self.inner.write().await;
        if tables.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(RepositoryError::Conflict(format!(
                "order number {} already exists",
                order.order_number
            )));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_by_id(&self, order_id: Uuid) -> Result<Order, RepositoryError> {
        self.inner
            .read()
            .await
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError> {
        let mut tables = self.inner.write().await;
        let stored = tables.orders.get_mut(&order.id).ok_or(RepositoryError::NotFound)?;
        if stored.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "order {} is {}, expected {}",
                order.id, stored.status, expected
            )));
        }
        *stored = order.clone();
        Ok(())
    }

    async fn list_by_seller(
        &self,
        seller_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.inner.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.seller_id == seller_id && status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl StatusHistoryRepository for MemoryStore {
    async fn append(&self, entry: &StatusHistoryEntry) -> Result<(), RepositoryError> {
        self.inner.write().await.history.push(entry.clone());
        Ok(())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        Ok(self
            .inner
            .read()
            .await
            .history
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AssignmentsRepository for MemoryStore {
    async fn insert(&self, assignment: &DeliveryAssignment) -> Result<(), RepositoryError> {
        let mut tables = self.inner.write().await;
        if tables
            .assignments
            .values()
            .any(|a| a.order_id == assignment.order_id && a.is_active())
        {
            return Err(RepositoryError::Conflict(format!(
                "order {} already has an active assignment",
                assignment.order_id
            )));
        }
        tables.assignments.insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn get_by_id(&self, assignment_id: Uuid) -> Result<DeliveryAssignment, RepositoryError> {
        self.inner
            .read()
            .await
            .assignments
            .get(&assignment_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_active_by_order(&self, order_id: Uuid) -> Result<Option<DeliveryAssignment>, RepositoryError> {
        Ok(self
            .inner
            .read()
            .await
            .assignments
            .values()
            .find(|a| a.order_id == order_id && a.is_active())
            .cloned())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<DeliveryAssignment>, RepositoryError> {
        let tables = self.inner.read().await;
        let mut assignments: Vec<DeliveryAssignment> = tables
            .assignments
            .values()
            .filter(|a| a.order_id == order_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.assigned_at);
        Ok(assignments)
    }

    async fn list_active_by_rider(&self, rider_id: Uuid) -> Result<Vec<DeliveryAssignment>, RepositoryError> {
        let tables = self.inner.read().await;
        let mut assignments: Vec<DeliveryAssignment> = tables
            .assignments
            .values()
            .filter(|a| a.rider_id == rider_id && a.is_active())
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.assigned_at);
        Ok(assignments)
    }

    async fn update_if_status(
        &self,
        assignment: &DeliveryAssignment,
        expected: AssignmentStatus,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.inner.write().await;
        let stored = tables
            .assignments
            .get_mut(&assignment.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "assignment {} is {}, expected {}",
                assignment.id, stored.status, expected
            )));
        }
        *stored = assignment.clone();
        Ok(())
    }
}

#[async_trait]
impl StockLedger for MemoryStore {
    async fn reserve(&self, reservation: &StockReservation) -> Result<bool, RepositoryError> {
        let mut tables = self.inner.write().await;
        if tables
            .reservations
            .iter()
            .any(|r| r.order_id == reservation.order_id && r.product_id == reservation.product_id)
        {
            return Ok(false);
        }
        let quantity = i64::from(reservation.quantity);
        let level = tables
            .stock
            .get_mut(&(reservation.seller_id, reservation.product_id))
            .filter(|level| level.available() >= quantity)
            .ok_or(RepositoryError::InsufficientStock {
                product_id: reservation.product_id,
            })?;
        level.reserved += quantity;
        tables.reservations.push(reservation.clone());
        Ok(true)
    }

    async fn release(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError> {
        let mut tables = self.inner.write().await;
        Ok(resolve_reserved(&mut tables, order_id, ReservationStatus::Released, at))
    }

    async fn fulfill(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError> {
        let mut tables = self.inner.write().await;
        Ok(resolve_reserved(&mut tables, order_id, ReservationStatus::Fulfilled, at))
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<StockReservation>, RepositoryError> {
        Ok(self
            .inner
            .read()
            .await
            .reservations
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SalesRepository for MemoryStore {
    async fn insert(&self, sale: &Sale) -> Result<(), RepositoryError> {
        let mut tables = self.inner.write().await;
        if tables.sales.contains_key(&sale.order_id) {
            return Err(RepositoryError::Conflict(format!(
                "order {} already has a sale",
                sale.order_id
            )));
        }
        tables.sales.insert(sale.order_id, sale.clone());
        Ok(())
    }

    async fn get_by_order(&self, order_id: Uuid) -> Result<Option<Sale>, RepositoryError> {
        Ok(self.inner.read().await.sales.get(&order_id).cloned())
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
        self.inner.write().await.audit.push(record.clone());
        Ok(())
    }

    async fn list_by_resource(&self, resource_id: Uuid) -> Result<Vec<AuditRecord>, RepositoryError> {
        Ok(self
            .inner
            .read()
            .await
            .audit
            .iter()
            .filter(|r| r.resource_id == resource_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileDirectory for MemoryStore {
    async fn get(&self, profile_id: Uuid) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.inner.read().await.profiles.get(&profile_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(order_id: Uuid, seller_id: Uuid, product_id: Uuid, quantity: i32) -> StockReservation {
        StockReservation {
            id: Uuid::new_v4(),
            order_id,
            seller_id,
            product_id,
            quantity,
            status: ReservationStatus::Reserved,
            reserved_at: Utc::now(),
            released_at: None,
            fulfilled_at: None,
        }
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent_per_product() {
        let store = MemoryStore::new();
        let (order, seller, product) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.set_stock(seller, product, 10).await;

        assert!(store.reserve(&reservation(order, seller, product, 3)).await.unwrap());
        assert!(!store.reserve(&reservation(order, seller, product, 3)).await.unwrap());

        let level = store.stock_level(seller, product).await.unwrap();
        assert_eq!(level, StockLevel { on_hand: 10, reserved: 3 });
        assert_eq!(level.available(), 7);
    }

    #[tokio::test]
    async fn test_reserve_refuses_oversell() {
        let store = MemoryStore::new();
        let (seller, product) = (Uuid::new_v4(), Uuid::new_v4());
        store.set_stock(seller, product, 2).await;

        let err = store
            .reserve(&reservation(Uuid::new_v4(), seller, product, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InsufficientStock { .. }));
        assert_eq!(store.stock_level(seller, product).await.unwrap().reserved, 0);
    }

    #[tokio::test]
    async fn test_release_then_fulfill_touches_nothing() {
        let store = MemoryStore::new();
        let (order, seller, product) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.set_stock(seller, product, 5).await;
        store.reserve(&reservation(order, seller, product, 2)).await.unwrap();

        assert_eq!(store.release(order, Utc::now()).await.unwrap().len(), 1);
        assert!(store.fulfill(order, Utc::now()).await.unwrap().is_empty());

        let level = store.stock_level(seller, product).await.unwrap();
        assert_eq!(level, StockLevel { on_hand: 5, reserved: 0 });
    }

    #[tokio::test]
    async fn test_fulfill_deducts_on_hand() {
        let store = MemoryStore::new();
        let (order, seller, product) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.set_stock(seller, product, 5).await;
        store.reserve(&reservation(order, seller, product, 2)).await.unwrap();

        let fulfilled = store.fulfill(order, Utc::now()).await.unwrap();
        assert_eq!(fulfilled[0].status, ReservationStatus::Fulfilled);
        assert_eq!(store.stock_level(seller, product).await.unwrap(), StockLevel { on_hand: 3, reserved: 0 });
    }
}

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    DeliveryAssignment, GeoPoint, NewOrder, NewOrderItem, Notification, Order, OrderStatus, Profile,
    ProfileRole, StockReservation,
};
use pricing::FeeSchedule;
use repository::{MemoryStore, OrdersRepository, RepositoryError, StockLedger};
use service::{CodServices, Collaborators, Notifier, TracingNotifier};
use uuid::Uuid;

pub const SELLER_LOCATION: GeoPoint = GeoPoint {
    latitude: 6.5244,
    longitude: 3.3792,
};

pub struct World {
    pub store: Arc<MemoryStore>,
    pub services: CodServices,
    pub buyer: Uuid,
    pub seller: Uuid,
    pub rider: Uuid,
    pub other_rider: Uuid,
    pub paracetamol: Uuid,
    pub bandages: Uuid,
}

fn profile(role: ProfileRole, name: &str) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        display_name: name.to_string(),
        role,
        address: None,
        phone: None,
        location: None,
    }
}

pub async fn world() -> World {
    world_with(|_, _| ()).await.0
}

/// Builds a seeded world; `customize` may swap collaborators before the services are wired.
pub async fn world_with<T>(customize: impl FnOnce(&Arc<MemoryStore>, &mut Collaborators) -> T) -> (World, T) {
    let store = Arc::new(MemoryStore::new());

    let buyer = profile(ProfileRole::Buyer, "Ada Buyer");
    let mut seller = profile(ProfileRole::Pharmacy, "Corner Pharmacy");
    seller.address = Some("12 Marina Road".to_string());
    seller.location = Some(SELLER_LOCATION);
    let rider = profile(ProfileRole::Rider, "Femi Rider");
    let other_rider = profile(ProfileRole::Rider, "Tunde Rider");

    let (paracetamol, bandages) = (Uuid::new_v4(), Uuid::new_v4());
    store.set_stock(seller.id, paracetamol, 10).await;
    store.set_stock(seller.id, bandages, 10).await;

    let ids = (buyer.id, seller.id, rider.id, other_rider.id);
    for p in [buyer, seller, rider, other_rider] {
        store.put_profile(p).await;
    }

    let mut collaborators = Collaborators::from_store(store.clone(), Arc::new(TracingNotifier));
    let extra = customize(&store, &mut collaborators);
    let services = CodServices::new(collaborators, FeeSchedule::default(), "COD");

    let world = World {
        store,
        services,
        buyer: ids.0,
        seller: ids.1,
        rider: ids.2,
        other_rider: ids.3,
        paracetamol,
        bandages,
    };
    (world, extra)
}

impl World {
    /// Three paracetamol at 1000 and one bandage pack at 5000, with a 1500 delivery fee.
    pub fn new_order(&self) -> NewOrder {
        NewOrder {
            seller_id: self.seller,
            items: vec![
                NewOrderItem {
                    product_id: self.paracetamol,
                    quantity: 3,
                    unit_price: 1000,
                },
                NewOrderItem {
                    product_id: self.bandages,
                    quantity: 1,
                    unit_price: 5000,
                },
            ],
            delivery_address: "4 Allen Avenue".to_string(),
            delivery_phone: "+2348000000000".to_string(),
            notes: None,
            coordinates: None,
            delivery_fee: Some(1500),
        }
    }

    pub async fn place_order(&self) -> Order {
        self.services
            .orders
            .create_order(self.buyer, self.new_order())
            .await
            .unwrap()
    }

    pub async fn accepted_order(&self) -> Order {
        let order = self.place_order().await;
        self.services.orders.accept_order(order.id, self.seller).await.unwrap()
    }

    pub async fn ready_order(&self) -> Order {
        let order = self.accepted_order().await;
        self.services.orders.mark_ready(order.id, self.seller).await.unwrap()
    }

    pub async fn assigned_order(&self) -> (Order, DeliveryAssignment) {
        let order = self.ready_order().await;
        let assignment = self
            .services
            .orders
            .request_rider(order.id, self.seller, self.rider)
            .await
            .unwrap();
        (order, assignment)
    }

    pub async fn picked_up_order(&self) -> (Order, DeliveryAssignment) {
        let (order, assignment) = self.assigned_order().await;
        let deliveries = &self.services.deliveries;
        deliveries.accept(assignment.id, self.rider).await.unwrap();
        let assignment = deliveries.mark_picked_up(assignment.id, self.rider).await.unwrap();
        (order, assignment)
    }

    pub async fn order(&self, order_id: Uuid) -> Order {
        self.services.orders.get_order(order_id).await.unwrap()
    }
}

/// Notifier that is always down.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: &Notification) -> anyhow::Result<()> {
        Err(anyhow!("smtp relay unavailable"))
    }
}

/// Notifier that keeps everything it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Ledger over the memory store whose release and fulfil calls can be switched off.
pub struct FlakyLedger {
    inner: Arc<MemoryStore>,
    pub fail_release: AtomicBool,
    pub fail_fulfill: AtomicBool,
}

impl FlakyLedger {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_release: AtomicBool::new(false),
            fail_fulfill: AtomicBool::new(false),
        }
    }

    pub fn set(&self, release: bool, fulfill: bool) {
        self.fail_release.store(release, Ordering::SeqCst);
        self.fail_fulfill.store(fulfill, Ordering::SeqCst);
    }
}

#[async_trait]
impl StockLedger for FlakyLedger {
    async fn reserve(&self, reservation: &StockReservation) -> Result<bool, RepositoryError> {
        self.inner.reserve(reservation).await
    }

    async fn release(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError> {
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("ledger offline".into()));
        }
        self.inner.release(order_id, at).await
    }

    async fn fulfill(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError> {
        if self.fail_fulfill.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("ledger offline".into()));
        }
        self.inner.fulfill(order_id, at).await
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<StockReservation>, RepositoryError> {
        StockLedger::list_by_order(self.inner.as_ref(), order_id).await
    }
}

/// Orders store over the memory store whose status writes can be switched off.
pub struct FlakyOrders {
    inner: Arc<MemoryStore>,
    pub fail_writes: AtomicBool,
}

impl FlakyOrders {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set(&self, fail_writes: bool) {
        self.fail_writes.store(fail_writes, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrdersRepository for FlakyOrders {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        OrdersRepository::insert(self.inner.as_ref(), order).await
    }

    async fn get_by_id(&self, order_id: Uuid) -> Result<Order, RepositoryError> {
        OrdersRepository::get_by_id(self.inner.as_ref(), order_id).await
    }

    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("connection reset".into()));
        }
        OrdersRepository::update_if_status(self.inner.as_ref(), order, expected).await
    }

    async fn list_by_seller(
        &self,
        seller_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        self.inner.list_by_seller(seller_id, status).await
    }
}

/// Ledger that cancels the order right before its first hold, the way a reject racing an
/// accept would.
pub struct CancellingLedger {
    inner: Arc<MemoryStore>,
    fired: AtomicBool,
}

impl CancellingLedger {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StockLedger for CancellingLedger {
    async fn reserve(&self, reservation: &StockReservation) -> Result<bool, RepositoryError> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let mut order = OrdersRepository::get_by_id(self.inner.as_ref(), reservation.order_id).await?;
            let previous = order.status;
            order.cancel("closing early", Utc::now()).unwrap();
            OrdersRepository::update_if_status(self.inner.as_ref(), &order, previous).await?;
        }
        self.inner.reserve(reservation).await
    }

    async fn release(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError> {
        self.inner.release(order_id, at).await
    }

    async fn fulfill(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError> {
        self.inner.fulfill(order_id, at).await
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<StockReservation>, RepositoryError> {
        StockLedger::list_by_order(self.inner.as_ref(), order_id).await
    }
}

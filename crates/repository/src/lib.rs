//! # Data Repository Layer
//!
//! Repository traits for every table the COD core touches, with two backends:
//! [`pg`] (tokio-postgres over a deadpool pool) and [`memory`] (process-local maps).
//!
//! Every status write is a check-and-set on the expected prior status, so two
//! racing transitions on the same row cannot both win.

use async_trait::async_trait;
use model::{
    AssignmentStatus, AuditRecord, DeliveryAssignment, Order, OrderStatus, Profile, Sale,
    StatusHistoryEntry, StockReservation, UnknownStatus,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// # RepositoryError
///
/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    /// No result found.
    #[error("Not found")]
    NotFound,
    /// A uniqueness rule or an expected-status check did not hold.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Not enough available-to-sell stock for the product.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: Uuid },
    /// A stored value could not be mapped back into the model.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    /// The backend refused or failed the call for another reason.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl From<UnknownStatus> for RepositoryError {
    fn from(err: UnknownStatus) -> Self {
        RepositoryError::Corrupt(err.to_string())
    }
}

/// # OrdersRepository
///
/// Orders are never deleted; terminal orders stay as audit records.
#[async_trait]
pub trait OrdersRepository: Send + Sync {
    /// Insert an order with its items.
    ///
    /// Returns [`RepositoryError::Conflict`] if the order number is already taken.
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, order_id: Uuid) -> Result<Order, RepositoryError>;

    /// Persist the mutable fields of `order`, but only if the stored status is still `expected`.
    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError>;

    async fn list_by_seller(
        &self,
        seller_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError>;
}

/// Append-only order status trail.
#[async_trait]
pub trait StatusHistoryRepository: Send + Sync {
    async fn append(&self, entry: &StatusHistoryEntry) -> Result<(), RepositoryError>;

    /// Entries for an order, oldest first.
    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<StatusHistoryEntry>, RepositoryError>;
}

/// # AssignmentsRepository
///
/// At most one non-terminal assignment may exist per order; `insert` enforces it.
#[async_trait]
pub trait AssignmentsRepository: Send + Sync {
    async fn insert(&self, assignment: &DeliveryAssignment) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, assignment_id: Uuid) -> Result<DeliveryAssignment, RepositoryError>;

    async fn find_active_by_order(&self, order_id: Uuid) -> Result<Option<DeliveryAssignment>, RepositoryError>;

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<DeliveryAssignment>, RepositoryError>;

    async fn list_active_by_rider(&self, rider_id: Uuid) -> Result<Vec<DeliveryAssignment>, RepositoryError>;

    async fn update_if_status(
        &self,
        assignment: &DeliveryAssignment,
        expected: AssignmentStatus,
    ) -> Result<(), RepositoryError>;
}

/// # StockLedger
///
/// Inventory holds per (seller, product). Available-to-sell is on-hand minus reserved.
/// Release and fulfil only touch rows still `reserved`, so re-running them is harmless.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Hold `reservation.quantity` of one product.
    ///
    /// Returns `false` without touching stock when the order already holds this product.
    async fn reserve(&self, reservation: &StockReservation) -> Result<bool, RepositoryError>;

    /// Return every still-reserved quantity of the order to available stock.
    async fn release(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError>;

    /// Permanently deduct every still-reserved quantity of the order from on-hand stock.
    async fn fulfill(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError>;

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<StockReservation>, RepositoryError>;
}

/// Point-of-sale books.
#[async_trait]
pub trait SalesRepository: Send + Sync {
    /// Insert a sale with its lines. One sale per order; a second insert is a conflict.
    async fn insert(&self, sale: &Sale) -> Result<(), RepositoryError>;

    async fn get_by_order(&self, order_id: Uuid) -> Result<Option<Sale>, RepositoryError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), RepositoryError>;

    async fn list_by_resource(&self, resource_id: Uuid) -> Result<Vec<AuditRecord>, RepositoryError>;
}

/// Identity lookup owned by the auth/profile system.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn get(&self, profile_id: Uuid) -> Result<Option<Profile>, RepositoryError>;
}

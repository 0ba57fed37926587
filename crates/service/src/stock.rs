//! Stock Reservation Manager.
//!
//! Sole mutator of reservations. Serialization per product is left to the ledger
//! (row-level locks or the in-memory store's single lock).

use std::sync::Arc;

use chrono::Utc;
use model::{Order, ReservationStatus, StockReservation};
use repository::{RepositoryError, StockLedger};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ServiceError;

/// Outcome of reserving an order's products. Reservation never fails outward.
#[derive(Debug, Default)]
pub struct ReservationReport {
    pub reserved: usize,
    /// Products already held for this order by an earlier call.
    pub already_held: usize,
    pub failed: Vec<(Uuid, RepositoryError)>,
}

/// Sums line quantities per product, in first-seen order. Bad lines go straight to `report`
/// and poison their product so it is never partially held.
fn quantities_by_product(order: &Order, report: &mut ReservationReport) -> Vec<(Uuid, i32)> {
    let mut totals: Vec<(Uuid, Option<i32>)> = Vec::new();
    for item in &order.items {
        let index = match totals.iter().position(|(product_id, _)| *product_id == item.product_id) {
            Some(index) => index,
            None => {
                totals.push((item.product_id, Some(0)));
                totals.len() - 1
            }
        };
        let Some(held) = totals[index].1 else { continue };
        totals[index].1 = if item.quantity <= 0 {
            report.failed.push((
                item.product_id,
                RepositoryError::Corrupt(format!("non-positive quantity {}", item.quantity)),
            ));
            None
        } else if let Some(sum) = held.checked_add(item.quantity) {
            Some(sum)
        } else {
            report.failed.push((
                item.product_id,
                RepositoryError::Corrupt(format!("quantity overflow for product {}", item.product_id)),
            ));
            None
        };
    }
    totals
        .into_iter()
        .filter_map(|(product_id, quantity)| quantity.map(|quantity| (product_id, quantity)))
        .collect()
}

pub struct StockReservationManager {
    ledger: Arc<dyn StockLedger>,
}

impl StockReservationManager {
    pub fn new(ledger: Arc<dyn StockLedger>) -> Self {
        Self { ledger }
    }

    /// Holds stock for every product of `order`.
    ///
    /// Lines naming the same product are summed into one reservation. A failing product is
    /// reported and skipped; the rest are still reserved. Products already held for the
    /// order are left alone, so calling this again after a partial failure retries only
    /// what is missing.
    pub async fn reserve(&self, order: &Order) -> ReservationReport {
        let mut report = ReservationReport::default();
        let now = Utc::now();
        for (product_id, quantity) in quantities_by_product(order, &mut report) {
            let reservation = StockReservation {
                id: Uuid::new_v4(),
                order_id: order.id,
                seller_id: order.seller_id,
                product_id,
                quantity,
                status: ReservationStatus::Reserved,
                reserved_at: now,
                released_at: None,
                fulfilled_at: None,
            };
            match self.ledger.reserve(&reservation).await {
                Ok(true) => report.reserved += 1,
                Ok(false) => report.already_held += 1,
                Err(err) => report.failed.push((product_id, err)),
            }
        }
        debug!(
            order_id = %order.id,
            reserved = report.reserved,
            already_held = report.already_held,
            failed = report.failed.len(),
            "Stock reserved"
        );
        report
    }

    /// Returns every held quantity of the order to available stock.
    pub async fn release(&self, order_id: Uuid) -> Result<Vec<StockReservation>, ServiceError> {
        self.ledger.release(order_id, Utc::now()).await.map_err(|source| {
            error!(order_id = %order_id, error = %source, "Stock release failed; inventory needs reconciliation");
            ServiceError::Dependency { component: "stock release", source }
        })
    }

    /// Permanently deducts every held quantity of the order from on-hand stock.
    pub async fn fulfill(&self, order_id: Uuid) -> Result<Vec<StockReservation>, ServiceError> {
        self.ledger.fulfill(order_id, Utc::now()).await.map_err(|source| {
            error!(order_id = %order_id, error = %source, "Stock fulfilment failed; inventory needs reconciliation");
            ServiceError::Dependency { component: "stock fulfilment", source }
        })
    }

    pub async fn reservations(&self, order_id: Uuid) -> Result<Vec<StockReservation>, ServiceError> {
        Ok(self.ledger.list_by_order(order_id).await?)
    }
}

use std::sync::Arc;

use chrono::Utc;
use model::{Order, Sale};
use repository::{RepositoryError, SalesRepository};
use tracing::info;

/// Books a completed COD sale against the fulfilling seller.
pub struct SaleRecorder {
    sales: Arc<dyn SalesRepository>,
}

impl SaleRecorder {
    pub fn new(sales: Arc<dyn SalesRepository>) -> Self {
        Self { sales }
    }

    /// One sale plus one line per order item. A second call for the same order
    /// returns the sale already on the books.
    pub async fn record(&self, order: &Order) -> Result<Sale, RepositoryError> {
        if let Some(existing) = self.sales.get_by_order(order.id).await? {
            return Ok(existing);
        }
        let sale = Sale::from_delivered_order(order, Utc::now());
        self.sales.insert(&sale).await?;
        info!(order_id = %order.id, sale_id = %sale.id, total = sale.total_amount, "POS sale recorded");
        Ok(sale)
    }

    pub async fn for_order(&self, order: &Order) -> Result<Option<Sale>, RepositoryError> {
        self.sales.get_by_order(order.id).await
    }
}

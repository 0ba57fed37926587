use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
}

impl PaymentMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

/// Completed point-of-sale record booked against the fulfilling seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub order_id: Uuid,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub sold_at: DateTime<Utc>,
    pub items: Vec<SaleItem>,
}

impl Sale {
    pub fn from_delivered_order(order: &Order, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            seller_id: order.seller_id,
            order_id: order.id,
            total_amount: order.total_amount,
            payment_method: PaymentMethod::Cod,
            sold_at: at,
            items: order
                .items
                .iter()
                .map(|item| SaleItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total(),
                })
                .collect(),
        }
    }
}

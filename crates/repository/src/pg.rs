//! PostgreSQL backend.
//!
//! Schema lives in `migrations/`. Statuses are stored as their snake_case strings.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use model::{
    AssignmentStatus, AuditRecord, DeliveryAssignment, GeoPoint, Order, OrderItem, OrderStatus,
    PaymentMethod, Profile, ReservationStatus, Sale, SaleItem, StatusHistoryEntry,
    StockReservation,
};
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use tracing::debug;
use uuid::Uuid;

use crate::{
    AssignmentsRepository, AuditRepository, OrdersRepository, ProfileDirectory, RepositoryError,
    SalesRepository, StatusHistoryRepository, StockLedger,
};

const ORDER_COLUMNS: &str = r#"
    id, order_number, buyer_id, seller_id, rider_id, delivery_fee, total_amount,
    delivery_address, delivery_phone, notes, latitude, longitude, status, payment_status,
    created_at, updated_at, rider_assigned_at, picked_up_at, delivered_at, cash_collected_at
"#;

const ASSIGNMENT_COLUMNS: &str = r#"
    id, order_id, rider_id, seller_id, pickup_address, delivery_address, delivery_phone,
    cash_amount, cash_collected, collected_amount, cash_discrepancy, status, failure_reason,
    assigned_at, accepted_at, actual_pickup_time, actual_delivery_time, updated_at
"#;

const RESERVATION_COLUMNS: &str = r#"
    id, order_id, seller_id, product_id, quantity, status, reserved_at, released_at, fulfilled_at
"#;

/// PostgreSQL implementation of every repository trait, sharing one pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Unique violations become [`RepositoryError::Conflict`].
fn classify(err: tokio_postgres::Error) -> RepositoryError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        RepositoryError::Conflict(err.to_string())
    } else {
        RepositoryError::Db(err)
    }
}

fn coordinates(row: &Row) -> Option<GeoPoint> {
    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    latitude
        .zip(longitude)
        .map(|(latitude, longitude)| GeoPoint { latitude, longitude })
}

fn order_from_row(row: &Row, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let status: String = row.get("status");
    let payment_status: String = row.get("payment_status");
    Ok(Order {
        id: row.get("id"),
        order_number: row.get("order_number"),
        buyer_id: row.get("buyer_id"),
        seller_id: row.get("seller_id"),
        rider_id: row.get("rider_id"),
        items,
        delivery_fee: row.get("delivery_fee"),
        total_amount: row.get("total_amount"),
        delivery_address: row.get("delivery_address"),
        delivery_phone: row.get("delivery_phone"),
        notes: row.get("notes"),
        coordinates: coordinates(row),
        status: status.parse()?,
        payment_status: payment_status.parse()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        rider_assigned_at: row.get("rider_assigned_at"),
        picked_up_at: row.get("picked_up_at"),
        delivered_at: row.get("delivered_at"),
        cash_collected_at: row.get("cash_collected_at"),
    })
}

fn item_from_row(row: &Row) -> OrderItem {
    OrderItem {
        product_id: row.get("product_id"),
        quantity: row.get("quantity"),
        unit_price: row.get("unit_price"),
    }
}

fn assignment_from_row(row: &Row) -> Result<DeliveryAssignment, RepositoryError> {
    let status: String = row.get("status");
    Ok(DeliveryAssignment {
        id: row.get("id"),
        order_id: row.get("order_id"),
        rider_id: row.get("rider_id"),
        seller_id: row.get("seller_id"),
        pickup_address: row.get("pickup_address"),
        delivery_address: row.get("delivery_address"),
        delivery_phone: row.get("delivery_phone"),
        cash_amount: row.get("cash_amount"),
        cash_collected: row.get("cash_collected"),
        collected_amount: row.get("collected_amount"),
        cash_discrepancy: row.get("cash_discrepancy"),
        status: status.parse()?,
        failure_reason: row.get("failure_reason"),
        assigned_at: row.get("assigned_at"),
        accepted_at: row.get("accepted_at"),
        actual_pickup_time: row.get("actual_pickup_time"),
        actual_delivery_time: row.get("actual_delivery_time"),
        updated_at: row.get("updated_at"),
    })
}

fn reservation_from_row(row: &Row) -> Result<StockReservation, RepositoryError> {
    let status: String = row.get("status");
    Ok(StockReservation {
        id: row.get("id"),
        order_id: row.get("order_id"),
        seller_id: row.get("seller_id"),
        product_id: row.get("product_id"),
        quantity: row.get("quantity"),
        status: status.parse()?,
        reserved_at: row.get("reserved_at"),
        released_at: row.get("released_at"),
        fulfilled_at: row.get("fulfilled_at"),
    })
}

impl PgStore {
    async fn items_for(&self, order_ids: &[Uuid]) -> Result<Vec<(Uuid, OrderItem)>, RepositoryError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT order_id, product_id, quantity, unit_price
                FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position
                "#,
                &[&order_ids],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("order_id"), item_from_row(row)))
            .collect())
    }

    /// Moves every still-reserved row of an order to `to` and adjusts stock levels,
    /// all inside one transaction.
    async fn resolve_reserved(
        &self,
        order_id: Uuid,
        to: ReservationStatus,
        at: DateTime<Utc>,
    ) -> Result<Vec<StockReservation>, RepositoryError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let timestamp_column = match to {
            ReservationStatus::Fulfilled => "fulfilled_at",
            _ => "released_at",
        };
        let query = format!(
            "UPDATE stock_reservations SET status = $2, {timestamp_column} = $3 \
             WHERE order_id = $1 AND status = 'reserved' RETURNING {RESERVATION_COLUMNS}"
        );
        let rows = tx.query(query.as_str(), &[&order_id, &to.as_str(), &at]).await?;
        let resolved = rows
            .iter()
            .map(reservation_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let stock_update = match to {
            ReservationStatus::Fulfilled => {
                r#"
                UPDATE product_stock
                SET quantity_reserved = quantity_reserved - $3,
                    quantity_on_hand = quantity_on_hand - $3
                WHERE seller_id = $1 AND product_id = $2
                "#
            }
            _ => {
                r#"
                UPDATE product_stock SET quantity_reserved = quantity_reserved - $3
                WHERE seller_id = $1 AND product_id = $2
                "#
            }
        };
        for reservation in &resolved {
            let quantity = i64::from(reservation.quantity);
            tx.execute(
                stock_update,
                &[&reservation.seller_id, &reservation.product_id, &quantity],
            )
            .await?;
        }

        tx.commit().await?;
        debug!(order_id = %order_id, count = resolved.len(), status = %to, "reservations resolved");
        Ok(resolved)
    }
}

#[async_trait]
impl OrdersRepository for PgStore {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let latitude = order.coordinates.map(|c| c.latitude);
        let longitude = order.coordinates.map(|c| c.longitude);
        tx.execute(
            r#"
            INSERT INTO orders (
                id, order_number, buyer_id, seller_id, rider_id, delivery_fee, total_amount,
                delivery_address, delivery_phone, notes, latitude, longitude, status, payment_status,
                created_at, updated_at, rider_assigned_at, picked_up_at, delivered_at, cash_collected_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20)
            "#,
            &[
                &order.id,
                &order.order_number,
                &order.buyer_id,
                &order.seller_id,
                &order.rider_id,
                &order.delivery_fee,
                &order.total_amount,
                &order.delivery_address,
                &order.delivery_phone,
                &order.notes,
                &latitude,
                &longitude,
                &order.status.as_str(),
                &order.payment_status.as_str(),
                &order.created_at,
                &order.updated_at,
                &order.rider_assigned_at,
                &order.picked_up_at,
                &order.delivered_at,
                &order.cash_collected_at,
            ],
        )
        .await
        .map_err(classify)?;

        for (position, item) in order.items.iter().enumerate() {
            let position = position as i32;
            tx.execute(
                r#"
                INSERT INTO order_items (order_id, position, product_id, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[
                    &order.id,
                    &position,
                    &item.product_id,
                    &item.quantity,
                    &item.unit_price,
                    &item.line_total(),
                ],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_by_id(&self, order_id: Uuid) -> Result<Order, RepositoryError> {
        let row = {
            let client = self.pool.get().await?;
            let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
            client.query_opt(query.as_str(), &[&order_id]).await?
        };
        match row {
            Some(row) => {
                let items = self
                    .items_for(&[order_id])
                    .await?
                    .into_iter()
                    .map(|(_, item)| item)
                    .collect();
                order_from_row(&row, items)
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE orders SET
                    rider_id = $3, status = $4, payment_status = $5, notes = $6, updated_at = $7,
                    rider_assigned_at = $8, picked_up_at = $9, delivered_at = $10, cash_collected_at = $11
                WHERE id = $1 AND status = $2
                "#,
                &[
                    &order.id,
                    &expected.as_str(),
                    &order.rider_id,
                    &order.status.as_str(),
                    &order.payment_status.as_str(),
                    &order.notes,
                    &order.updated_at,
                    &order.rider_assigned_at,
                    &order.picked_up_at,
                    &order.delivered_at,
                    &order.cash_collected_at,
                ],
            )
            .await?;
        if updated == 1 {
            return Ok(());
        }
        let current = client
            .query_opt("SELECT status FROM orders WHERE id = $1", &[&order.id])
            .await?;
        match current {
            Some(row) => {
                let status: String = row.get("status");
                Err(RepositoryError::Conflict(format!(
                    "order {} is {status}, expected {expected}",
                    order.id
                )))
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list_by_seller(
        &self,
        seller_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = {
            let client = self.pool.get().await?;
            let query = format!(
                "SELECT {ORDER_COLUMNS} FROM orders \
                 WHERE seller_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
                 ORDER BY created_at DESC"
            );
            let status = status.map(OrderStatus::as_str);
            client.query(query.as_str(), &[&seller_id, &status]).await?
        };
        let ids: Vec<Uuid> = rows.iter().map(|row| row.get("id")).collect();
        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for (order_id, item) in self.items_for(&ids).await? {
            items.entry(order_id).or_default().push(item);
        }
        rows.iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                order_from_row(row, items.remove(&id).unwrap_or_default())
            })
            .collect()
    }
}

#[async_trait]
impl StatusHistoryRepository for PgStore {
    async fn append(&self, entry: &StatusHistoryEntry) -> Result<(), RepositoryError> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO order_status_history (id, order_id, status, actor_id, note, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[
                    &entry.id,
                    &entry.order_id,
                    &entry.status.as_str(),
                    &entry.actor_id,
                    &entry.note,
                    &entry.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT id, order_id, status, actor_id, note, created_at
                FROM order_status_history WHERE order_id = $1 ORDER BY created_at, seq
                "#,
                &[&order_id],
            )
            .await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                let status: String = row.get("status");
                Ok(StatusHistoryEntry {
                    id: row.get("id"),
                    order_id: row.get("order_id"),
                    status: status.parse()?,
                    actor_id: row.get("actor_id"),
                    note: row.get("note"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl AssignmentsRepository for PgStore {
    async fn insert(&self, assignment: &DeliveryAssignment) -> Result<(), RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!(
            "INSERT INTO delivery_assignments ({ASSIGNMENT_COLUMNS}) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)"
        );
        client
            .execute(
                query.as_str(),
                &[
                    &assignment.id,
                    &assignment.order_id,
                    &assignment.rider_id,
                    &assignment.seller_id,
                    &assignment.pickup_address,
                    &assignment.delivery_address,
                    &assignment.delivery_phone,
                    &assignment.cash_amount,
                    &assignment.cash_collected,
                    &assignment.collected_amount,
                    &assignment.cash_discrepancy,
                    &assignment.status.as_str(),
                    &assignment.failure_reason,
                    &assignment.assigned_at,
                    &assignment.accepted_at,
                    &assignment.actual_pickup_time,
                    &assignment.actual_delivery_time,
                    &assignment.updated_at,
                ],
            )
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn get_by_id(&self, assignment_id: Uuid) -> Result<DeliveryAssignment, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {ASSIGNMENT_COLUMNS} FROM delivery_assignments WHERE id = $1");
        match client.query_opt(query.as_str(), &[&assignment_id]).await? {
            Some(row) => assignment_from_row(&row),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn find_active_by_order(&self, order_id: Uuid) -> Result<Option<DeliveryAssignment>, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM delivery_assignments \
             WHERE order_id = $1 AND status IN ('assigned', 'accepted', 'picked_up')"
        );
        client
            .query_opt(query.as_str(), &[&order_id])
            .await?
            .map(|row| assignment_from_row(&row))
            .transpose()
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<DeliveryAssignment>, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM delivery_assignments WHERE order_id = $1 ORDER BY assigned_at"
        );
        let rows = client.query(query.as_str(), &[&order_id]).await?;
        rows.iter().map(assignment_from_row).collect()
    }

    async fn list_active_by_rider(&self, rider_id: Uuid) -> Result<Vec<DeliveryAssignment>, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM delivery_assignments \
             WHERE rider_id = $1 AND status IN ('assigned', 'accepted', 'picked_up') ORDER BY assigned_at"
        );
        let rows = client.query(query.as_str(), &[&rider_id]).await?;
        rows.iter().map(assignment_from_row).collect()
    }

    async fn update_if_status(
        &self,
        assignment: &DeliveryAssignment,
        expected: AssignmentStatus,
    ) -> Result<(), RepositoryError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE delivery_assignments SET
                    status = $3, cash_collected = $4, collected_amount = $5, cash_discrepancy = $6,
                    failure_reason = $7, accepted_at = $8, actual_pickup_time = $9,
                    actual_delivery_time = $10, updated_at = $11
                WHERE id = $1 AND status = $2
                "#,
                &[
                    &assignment.id,
                    &expected.as_str(),
                    &assignment.status.as_str(),
                    &assignment.cash_collected,
                    &assignment.collected_amount,
                    &assignment.cash_discrepancy,
                    &assignment.failure_reason,
                    &assignment.accepted_at,
                    &assignment.actual_pickup_time,
                    &assignment.actual_delivery_time,
                    &assignment.updated_at,
                ],
            )
            .await?;
        match updated {
            1 => Ok(()),
            _ => match client
                .query_opt("SELECT status FROM delivery_assignments WHERE id = $1", &[&assignment.id])
                .await?
            {
                Some(row) => {
                    let status: String = row.get("status");
                    Err(RepositoryError::Conflict(format!(
                        "assignment {} is {status}, expected {expected}",
                        assignment.id
                    )))
                }
                None => Err(RepositoryError::NotFound),
            },
        }
    }
}

#[async_trait]
impl StockLedger for PgStore {
    async fn reserve(&self, reservation: &StockReservation) -> Result<bool, RepositoryError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let inserted = tx
            .execute(
                r#"
                INSERT INTO stock_reservations (id, order_id, seller_id, product_id, quantity, status, reserved_at)
                VALUES ($1, $2, $3, $4, $5, 'reserved', $6)
                ON CONFLICT (order_id, product_id) DO NOTHING
                "#,
                &[
                    &reservation.id,
                    &reservation.order_id,
                    &reservation.seller_id,
                    &reservation.product_id,
                    &reservation.quantity,
                    &reservation.reserved_at,
                ],
            )
            .await?;
        if inserted == 0 {
            tx.commit().await?;
            return Ok(false);
        }

        // Conditional increment: the row lock serializes concurrent reservations of one product.
        let quantity = i64::from(reservation.quantity);
        let held = tx
            .execute(
                r#"
                UPDATE product_stock SET quantity_reserved = quantity_reserved + $3
                WHERE seller_id = $1 AND product_id = $2
                  AND quantity_on_hand - quantity_reserved >= $3
                "#,
                &[&reservation.seller_id, &reservation.product_id, &quantity],
            )
            .await?;
        if held == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::InsufficientStock {
                product_id: reservation.product_id,
            });
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn release(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError> {
        self.resolve_reserved(order_id, ReservationStatus::Released, at).await
    }

    async fn fulfill(&self, order_id: Uuid, at: DateTime<Utc>) -> Result<Vec<StockReservation>, RepositoryError> {
        self.resolve_reserved(order_id, ReservationStatus::Fulfilled, at).await
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<StockReservation>, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {RESERVATION_COLUMNS} FROM stock_reservations WHERE order_id = $1 ORDER BY reserved_at"
        );
        let rows = client.query(query.as_str(), &[&order_id]).await?;
        rows.iter().map(reservation_from_row).collect()
    }
}

#[async_trait]
impl SalesRepository for PgStore {
    async fn insert(&self, sale: &Sale) -> Result<(), RepositoryError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        tx.execute(
            r#"
            INSERT INTO sales (id, seller_id, order_id, total_amount, payment_method, sold_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            &[
                &sale.id,
                &sale.seller_id,
                &sale.order_id,
                &sale.total_amount,
                &sale.payment_method.as_str(),
                &sale.sold_at,
            ],
        )
        .await
        .map_err(classify)?;
        for (position, item) in sale.items.iter().enumerate() {
            let position = position as i32;
            tx.execute(
                r#"
                INSERT INTO sale_items (sale_id, position, product_id, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[
                    &sale.id,
                    &position,
                    &item.product_id,
                    &item.quantity,
                    &item.unit_price,
                    &item.line_total,
                ],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_by_order(&self, order_id: Uuid) -> Result<Option<Sale>, RepositoryError> {
        let client = self.pool.get().await?;
        let Some(row) = client
            .query_opt(
                "SELECT id, seller_id, order_id, total_amount, payment_method, sold_at FROM sales WHERE order_id = $1",
                &[&order_id],
            )
            .await?
        else {
            return Ok(None);
        };
        let sale_id: Uuid = row.get("id");
        let method: String = row.get("payment_method");
        if method != PaymentMethod::Cod.as_str() {
            return Err(RepositoryError::Corrupt(format!("unknown payment method {method}")));
        }
        let items = client
            .query(
                r#"
                SELECT product_id, quantity, unit_price, line_total
                FROM sale_items WHERE sale_id = $1 ORDER BY position
                "#,
                &[&sale_id],
            )
            .await?
            .iter()
            .map(|item| SaleItem {
                product_id: item.get("product_id"),
                quantity: item.get("quantity"),
                unit_price: item.get("unit_price"),
                line_total: item.get("line_total"),
            })
            .collect();
        Ok(Some(Sale {
            id: sale_id,
            seller_id: row.get("seller_id"),
            order_id: row.get("order_id"),
            total_amount: row.get("total_amount"),
            payment_method: PaymentMethod::Cod,
            sold_at: row.get("sold_at"),
            items,
        }))
    }
}

#[async_trait]
impl AuditRepository for PgStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO audit_logs (actor_id, action, resource_type, resource_id, details, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[
                    &record.actor_id,
                    &record.action.as_str(),
                    &record.resource_type,
                    &record.resource_id,
                    &record.details,
                    &record.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_by_resource(&self, resource_id: Uuid) -> Result<Vec<AuditRecord>, RepositoryError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT actor_id, action, resource_type, resource_id, details, created_at
                FROM audit_logs WHERE resource_id = $1 ORDER BY id
                "#,
                &[&resource_id],
            )
            .await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                let action: String = row.get("action");
                Ok(AuditRecord {
                    actor_id: row.get("actor_id"),
                    action: action.parse()?,
                    resource_type: row.get("resource_type"),
                    resource_id: row.get("resource_id"),
                    details: row.get("details"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProfileDirectory for PgStore {
    async fn get(&self, profile_id: Uuid) -> Result<Option<Profile>, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, email, display_name, role, address, phone, latitude, longitude
                FROM profiles WHERE id = $1
                "#,
                &[&profile_id],
            )
            .await?;
        row.map(|row| -> Result<_, RepositoryError> {
            let role: String = row.get("role");
            Ok(Profile {
                id: row.get("id"),
                email: row.get("email"),
                display_name: row.get("display_name"),
                role: role.parse()?,
                address: row.get("address"),
                phone: row.get("phone"),
                location: coordinates(&row),
            })
        })
        .transpose()
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::repository::{increment_stock, refresh_total_stock, try_decrement_stock};
use crate::coupons::repository::{release_usage, try_record_usage};
use crate::error::StoreError;
use crate::orders::store::OrderStore;
use crate::orders::{
    AppliedCoupon, InventoryEffect, Order, OrderError, OrderLine, OrderStatus, PaymentInfo, PaymentMethod,
    PaymentStatus, ShippingAddress, StatusMachine, StatusTimestamps, Transition, TransitionOutcome,
};

const ORDER_COLUMNS: &str = r#"
    id, order_number, user_id, items, shipping_address, subtotal, delivery_charge, discount,
    discount_on_delivery, total, coupon, status, payment_method, payment_status, gateway_order_id,
    gateway_payment_id, gateway_signature, failure_reason, refund_id, inventory_committed,
    tracking_number, notes, cancellation_reason, confirmed_at, shipped_at, delivered_at,
    cancelled_at, paid_at, created_at, updated_at
"#;

/// Order as stored: snapshots in JSONB, payment and timestamps flattened
#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: i32,
    items: Json<Vec<OrderLine>>,
    shipping_address: Json<ShippingAddress>,
    subtotal: Decimal,
    delivery_charge: Decimal,
    discount: Decimal,
    discount_on_delivery: Decimal,
    total: Decimal,
    coupon: Option<Json<AppliedCoupon>>,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    failure_reason: Option<String>,
    refund_id: Option<String>,
    inventory_committed: bool,
    tracking_number: Option<String>,
    notes: Option<String>,
    cancellation_reason: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            subtotal: row.subtotal,
            delivery_charge: row.delivery_charge,
            discount: row.discount,
            discount_on_delivery: row.discount_on_delivery,
            total: row.total,
            coupon: row.coupon.map(|c| c.0),
            status: row.status,
            payment: PaymentInfo {
                method: row.payment_method,
                status: row.payment_status,
                gateway_order_id: row.gateway_order_id,
                gateway_payment_id: row.gateway_payment_id,
                gateway_signature: row.gateway_signature,
                failure_reason: row.failure_reason,
                refund_id: row.refund_id,
            },
            tracking_number: row.tracking_number,
            notes: row.notes,
            cancellation_reason: row.cancellation_reason,
            timestamps: StatusTimestamps {
                confirmed_at: row.confirmed_at,
                shipped_at: row.shipped_at,
                delivered_at: row.delivered_at,
                cancelled_at: row.cancelled_at,
                paid_at: row.paid_at,
            },
            inventory_committed: row.inventory_committed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed order store
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new PgOrderStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<Order>, OrderError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE {}", ORDER_COLUMNS, clause))
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn order_number_exists(&self, order_number: &str) -> Result<bool, OrderError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_number = $1)")
            .bind(order_number)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn insert(&self, order: &Order) -> Result<(), OrderError> {
        let mut tx = self.pool.begin().await?;

        if order.inventory_committed {
            reserve(&mut *tx, order).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, user_id, items, shipping_address, subtotal, delivery_charge, discount,
                discount_on_delivery, total, coupon, status, payment_method, payment_status, gateway_order_id,
                gateway_payment_id, gateway_signature, failure_reason, refund_id, inventory_committed,
                tracking_number, notes, cancellation_reason, confirmed_at, shipped_at, delivered_at,
                cancelled_at, paid_at, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30
            )
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(order.subtotal)
        .bind(order.delivery_charge)
        .bind(order.discount)
        .bind(order.discount_on_delivery)
        .bind(order.total)
        .bind(order.coupon.as_ref().map(Json))
        .bind(order.status)
        .bind(order.payment.method)
        .bind(order.payment.status)
        .bind(&order.payment.gateway_order_id)
        .bind(&order.payment.gateway_payment_id)
        .bind(&order.payment.gateway_signature)
        .bind(&order.payment.failure_reason)
        .bind(&order.payment.refund_id)
        .bind(order.inventory_committed)
        .bind(&order.tracking_number)
        .bind(&order.notes)
        .bind(&order.cancellation_reason)
        .bind(order.timestamps.confirmed_at)
        .bind(order.timestamps.shipped_at)
        .bind(order.timestamps.delivered_at)
        .bind(order.timestamps.cancelled_at)
        .bind(order.timestamps.paid_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::from_insert(e, &format!("Order {}", order.order_number)))?;

        tx.commit().await?;

        info!("Order {} stored ({}, payment {})", order.order_number, order.status, order.payment.status);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>, OrderError> {
        self.fetch_one_where("gateway_order_id = $1", gateway_order_id).await
    }

    async fn list_for_user(&self, user_id: i32, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError> {
        let rows = match status {
            Some(status_filter) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    r#"
                    SELECT {}
                    FROM orders
                    WHERE user_id = $1 AND status = $2
                    ORDER BY created_at DESC
                    "#,
                    ORDER_COLUMNS
                ))
                .bind(user_id)
                .bind(status_filter)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    r#"
                    SELECT {}
                    FROM orders
                    WHERE user_id = $1
                    ORDER BY created_at DESC
                    "#,
                    ORDER_COLUMNS
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn find_abandoned(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE payment_method = 'gateway' AND payment_status = 'pending' AND status = 'pending'
              AND created_at < $1
            ORDER BY created_at ASC
            "#,
            ORDER_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn apply(&self, id: Uuid, transition: &Transition, now: DateTime<Utc>) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let current: Order = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Order::from)
        .ok_or(OrderError::NotFound)?;

        let (order, inventory) = match StatusMachine::plan(&current, transition, now)? {
            TransitionOutcome::Unchanged => {
                debug!("{} on order {} changed nothing", transition.name(), current.order_number);
                return Ok(current);
            }
            TransitionOutcome::Changed { order, inventory } => (order, inventory),
        };

        match inventory {
            InventoryEffect::Reserve => reserve(&mut *tx, &order).await?,
            InventoryEffect::Release => release(&mut *tx, &order).await?,
            InventoryEffect::None => {}
        }
        update(&mut *tx, &order).await?;

        tx.commit().await?;

        info!(
            "{} on order {}: {} -> {} (payment {})",
            transition.name(),
            order.order_number,
            current.status,
            order.status,
            order.payment.status
        );
        Ok(order)
    }
}

/// Decrement every line and count the coupon use; any shortfall aborts
async fn reserve(conn: &mut PgConnection, order: &Order) -> Result<(), OrderError> {
    for line in &order.items {
        if !try_decrement_stock(&mut *conn, line.variant_id, line.quantity).await? {
            warn!(
                "Order {}: {} ({} / {}) no longer has {} in stock",
                order.order_number, line.name, line.size, line.color, line.quantity
            );
            return Err(OrderError::ReservationFailed(format!(
                "{} ({} / {}) is no longer available in the requested quantity",
                line.name, line.size, line.color
            )));
        }
        refresh_total_stock(&mut *conn, line.product_id).await?;
    }

    if let Some(coupon) = &order.coupon {
        if !try_record_usage(&mut *conn, coupon.coupon_id, order.user_id).await? {
            return Err(OrderError::ReservationFailed(format!(
                "Coupon {} has reached its usage limit",
                coupon.code
            )));
        }
    }

    Ok(())
}

async fn release(conn: &mut PgConnection, order: &Order) -> Result<(), OrderError> {
    for line in &order.items {
        if !increment_stock(&mut *conn, line.variant_id, line.quantity).await? {
            // Variant deleted since the order was placed
            warn!("Order {}: variant {} no longer exists, stock not restored", order.order_number, line.variant_id);
            continue;
        }
        refresh_total_stock(&mut *conn, line.product_id).await?;
    }

    if let Some(coupon) = &order.coupon {
        release_usage(&mut *conn, coupon.coupon_id, order.user_id).await?;
    }

    Ok(())
}

async fn update(conn: &mut PgConnection, order: &Order) -> Result<(), OrderError> {
    sqlx::query(
        r#"
        UPDATE orders
        SET status = $2,
            payment_status = $3,
            gateway_payment_id = $4,
            gateway_signature = $5,
            failure_reason = $6,
            refund_id = $7,
            inventory_committed = $8,
            tracking_number = $9,
            notes = $10,
            cancellation_reason = $11,
            confirmed_at = $12,
            shipped_at = $13,
            delivered_at = $14,
            cancelled_at = $15,
            paid_at = $16,
            updated_at = $17
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.status)
    .bind(order.payment.status)
    .bind(&order.payment.gateway_payment_id)
    .bind(&order.payment.gateway_signature)
    .bind(&order.payment.failure_reason)
    .bind(&order.payment.refund_id)
    .bind(order.inventory_committed)
    .bind(&order.tracking_number)
    .bind(&order.notes)
    .bind(&order.cancellation_reason)
    .bind(order.timestamps.confirmed_at)
    .bind(order.timestamps.shipped_at)
    .bind(order.timestamps.delivered_at)
    .bind(order.timestamps.cancelled_at)
    .bind(order.timestamps.paid_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::orders::{Order, OrderError, OrderStatus, Transition};

/// Persistence for orders.
///
/// Every write that changes stock or coupon counters goes through `insert`
/// or `apply`, which run the order row update and the inventory effect as
/// one atomic unit.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn order_number_exists(&self, order_number: &str) -> Result<bool, OrderError>;

    /// Persist a new order. When the order already holds its inventory
    /// (`inventory_committed`), stock is decremented and the coupon use is
    /// counted in the same transaction; a shortfall fails the whole insert
    /// with `ReservationFailed`.
    async fn insert(&self, order: &Order) -> Result<(), OrderError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError>;

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>, OrderError>;

    /// Orders of one user, newest first
    async fn list_for_user(&self, user_id: i32, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError>;

    /// Unpaid gateway orders created before `cutoff`
    async fn find_abandoned(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderError>;

    /// Lock the order, plan `transition` against its stored state and write
    /// the result together with its inventory effect. Returns the order as
    /// stored afterwards (unchanged when the transition was a no-op).
    async fn apply(&self, id: Uuid, transition: &Transition, now: DateTime<Utc>) -> Result<Order, OrderError>;
}

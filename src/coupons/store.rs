use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::coupons::models::Coupon;
use crate::error::StoreError;

/// Coupon definitions and their usage records.
///
/// Usage counters are not changed through this trait; they move together
/// with the order that holds the coupon (see `OrderStore`).
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Look up a coupon by its (already upper-cased) code, usages included
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError>;

    /// Insert a new coupon; a duplicate code is a `StoreError::Conflict`
    async fn create(&self, coupon: &Coupon) -> Result<(), StoreError>;

    /// Active, public coupons whose validity window contains `now`
    async fn list_public(&self, now: DateTime<Utc>) -> Result<Vec<Coupon>, StoreError>;
}

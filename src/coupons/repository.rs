use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::coupons::models::{Coupon, CouponRow, CouponUsage};
use crate::coupons::store::CouponStore;
use crate::error::StoreError;

const COUPON_COLUMNS: &str = r#"
    id, code, description, discount_type, discount_value, maximum_discount_amount,
    minimum_order_amount, usage_limit, usage_count, user_usage_limit,
    valid_from, valid_until, is_active, is_public
"#;

/// PostgreSQL-backed coupon store
#[derive(Clone)]
pub struct PgCouponStore {
    pool: PgPool,
}

impl PgCouponStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn usages(&self, coupon_id: Uuid) -> Result<Vec<CouponUsage>, StoreError> {
        let usages = sqlx::query_as::<_, CouponUsage>(
            "SELECT user_id, usage_count, last_used_at FROM coupon_usages WHERE coupon_id = $1",
        )
        .bind(coupon_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(usages)
    }
}

#[async_trait]
impl CouponStore for PgCouponStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!("SELECT {} FROM coupons WHERE code = $1", COUPON_COLUMNS))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let usages = self.usages(row.id).await?;
                Ok(Some(row.into_coupon(usages)))
            }
            None => {
                debug!("Coupon {} not found", code);
                Ok(None)
            }
        }
    }

    async fn create(&self, coupon: &Coupon) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, description, discount_type, discount_value, maximum_discount_amount,
                minimum_order_amount, usage_limit, usage_count, user_usage_limit,
                valid_from, valid_until, is_active, is_public
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(&coupon.description)
        .bind(coupon.kind.coupon_type())
        .bind(coupon.kind.value())
        .bind(coupon.kind.maximum_discount_amount())
        .bind(coupon.minimum_order_amount)
        .bind(coupon.usage_limit)
        .bind(coupon.user_usage_limit)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.is_active)
        .bind(coupon.is_public)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, &format!("Coupon {}", coupon.code)))?;

        Ok(())
    }

    async fn list_public(&self, now: DateTime<Utc>) -> Result<Vec<Coupon>, StoreError> {
        // Listing never needs per-user usages
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            r#"
            SELECT {}
            FROM coupons
            WHERE is_active = TRUE AND is_public = TRUE AND valid_from <= $1 AND valid_until >= $1
            ORDER BY valid_until ASC
            "#,
            COUPON_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.into_coupon(Vec::new())).collect())
    }
}

/// Count one use of a coupon by `user_id`, honouring both the global and the
/// per-user limit. Both counters change on the caller's connection, so they
/// commit or roll back together. Returns false when either limit is reached.
pub(crate) async fn try_record_usage(
    conn: &mut PgConnection,
    coupon_id: Uuid,
    user_id: i32,
) -> Result<bool, sqlx::Error> {
    let user_limit: Option<Option<i32>> = sqlx::query_scalar(
        r#"
        UPDATE coupons
        SET usage_count = usage_count + 1
        WHERE id = $1 AND (usage_limit IS NULL OR usage_count < usage_limit)
        RETURNING user_usage_limit
        "#,
    )
    .bind(coupon_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(user_limit) = user_limit else {
        return Ok(false);
    };

    let result = sqlx::query(
        r#"
        INSERT INTO coupon_usages (coupon_id, user_id, usage_count, last_used_at)
        VALUES ($1, $2, 1, NOW())
        ON CONFLICT (coupon_id, user_id) DO UPDATE
        SET usage_count = coupon_usages.usage_count + 1,
            last_used_at = NOW()
        WHERE $3::INTEGER IS NULL OR coupon_usages.usage_count < $3::INTEGER
        "#,
    )
    .bind(coupon_id)
    .bind(user_id)
    .bind(user_limit)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Give back one use of a coupon by `user_id`. Counters never drop below zero.
pub(crate) async fn release_usage(
    conn: &mut PgConnection,
    coupon_id: Uuid,
    user_id: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE coupons SET usage_count = GREATEST(usage_count - 1, 0) WHERE id = $1")
        .bind(coupon_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "UPDATE coupon_usages SET usage_count = GREATEST(usage_count - 1, 0) WHERE coupon_id = $1 AND user_id = $2",
    )
    .bind(coupon_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

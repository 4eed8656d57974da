use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::catalog::models::{Category, DeliveryCharge, Product, ProductRow, ProductVariant};
use crate::catalog::store::{normalize_location, CatalogStore, DeliveryChargeStore};
use crate::error::StoreError;

/// PostgreSQL-backed catalog
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, slug, price, image, category_id, total_stock, is_active
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!("Product {} not found", id);
            return Ok(None);
        };

        let variants = sqlx::query_as::<_, ProductVariant>(
            "SELECT id, size, color, stock, sku FROM product_variants WHERE product_id = $1 ORDER BY size, color",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.with_variants(variants)))
    }

    async fn set_variant_stock(&self, product_id: Uuid, size: &str, color: &str, stock: i32) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE product_variants
            SET stock = $4
            WHERE product_id = $1 AND lower(size) = lower($2) AND lower(color) = lower($3)
            "#,
        )
        .bind(product_id)
        .bind(size.trim())
        .bind(color.trim())
        .bind(stock)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        refresh_total_stock(&mut *tx, product_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, parent_id, path, level FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn find_categories(&self, ids: &[Uuid]) -> Result<Vec<Category>, StoreError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, parent_id, path, level FROM categories WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }
}

/// PostgreSQL-backed delivery charge table
#[derive(Clone)]
pub struct PgDeliveryChargeStore {
    pool: PgPool,
}

impl PgDeliveryChargeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryChargeStore for PgDeliveryChargeStore {
    async fn find_charge(&self, city: &str, state: &str) -> Result<Option<DeliveryCharge>, StoreError> {
        let charge = sqlx::query_as::<_, DeliveryCharge>(
            r#"
            SELECT state, city, charge, minimum_order_value, free_delivery_threshold, estimated_days, is_active
            FROM delivery_charges
            WHERE city = $1 AND state = $2 AND is_active = TRUE
            "#,
        )
        .bind(normalize_location(city))
        .bind(normalize_location(state))
        .fetch_optional(&self.pool)
        .await?;

        Ok(charge)
    }
}

/// Take `quantity` units from a variant only if that many are available.
/// Returns false when the variant is missing or short.
pub(crate) async fn try_decrement_stock(
    conn: &mut PgConnection,
    variant_id: Uuid,
    quantity: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE product_variants SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
    )
    .bind(variant_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Return `quantity` units to a variant
pub(crate) async fn increment_stock(
    conn: &mut PgConnection,
    variant_id: Uuid,
    quantity: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE product_variants SET stock = stock + $2 WHERE id = $1")
        .bind(variant_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Re-derive `products.total_stock` from the variant rows
pub(crate) async fn refresh_total_stock(conn: &mut PgConnection, product_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE products
        SET total_stock = COALESCE((SELECT SUM(stock) FROM product_variants WHERE product_id = $1), 0),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

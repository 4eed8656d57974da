// Collaborator contracts the order core uses to read the catalog

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::models::{Category, DeliveryCharge, Product};
use crate::error::StoreError;

/// Product and category lookups
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Load a product together with all of its variants
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    /// Overwrite one variant's stock in place and refresh the product total.
    /// Other variants are left as they are. Returns false when no variant matches.
    async fn set_variant_stock(&self, product_id: Uuid, size: &str, color: &str, stock: i32) -> Result<bool, StoreError>;

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, StoreError>;

    async fn find_categories(&self, ids: &[Uuid]) -> Result<Vec<Category>, StoreError>;
}

/// Location-keyed delivery fees
#[async_trait]
pub trait DeliveryChargeStore: Send + Sync {
    /// Active entry for the (city, state) pair, matched case-insensitively
    async fn find_charge(&self, city: &str, state: &str) -> Result<Option<DeliveryCharge>, StoreError>;
}

/// Normalise a location key the way entries are stored
pub fn normalize_location(value: &str) -> String {
    value.trim().to_lowercase()
}

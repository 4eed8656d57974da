use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A sellable (size, color) combination of a product with its own stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProductVariant {
    pub id: Uuid,
    pub size: String,
    pub color: String,
    pub stock: i32,
    pub sku: String,
}

impl ProductVariant {
    /// Create a variant with a freshly generated id and SKU
    pub fn new(product_slug: &str, size: &str, color: &str, stock: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            size: size.trim().to_string(),
            color: color.trim().to_string(),
            stock,
            sku: generate_sku(product_slug, size, color),
        }
    }

    /// Case-insensitive match on size and color
    pub fn matches(&self, size: &str, color: &str) -> bool {
        self.size.eq_ignore_ascii_case(size.trim()) && self.color.eq_ignore_ascii_case(color.trim())
    }
}

/// SKU of the form `SLUG-SIZE-COLOR`, upper-cased with spaces collapsed to dashes
pub fn generate_sku(product_slug: &str, size: &str, color: &str) -> String {
    [product_slug, size, color]
        .iter()
        .map(|part| part.trim().split_whitespace().collect::<Vec<_>>().join("-"))
        .collect::<Vec<_>>()
        .join("-")
        .to_uppercase()
}

/// Catalog product with its variant stock ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub category_id: Option<Uuid>,
    pub variants: Vec<ProductVariant>,
    /// Always the sum of variant stocks; see `recompute_total_stock`
    pub total_stock: i32,
    pub is_active: bool,
}

impl Product {
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    pub fn find_variant(&self, size: &str, color: &str) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.matches(size, color))
    }

    /// Stock of the (size, color) variant, zero when the variant does not exist
    pub fn stock_for(&self, size: &str, color: &str) -> i32 {
        self.find_variant(size, color).map(|v| v.stock).unwrap_or(0)
    }

    pub fn recompute_total_stock(&mut self) {
        self.total_stock = self.variants.iter().map(|v| v.stock).sum();
    }
}

/// Product row as stored, without its variants
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub category_id: Option<Uuid>,
    pub total_stock: i32,
    pub is_active: bool,
}

impl ProductRow {
    pub fn with_variants(self, variants: Vec<ProductVariant>) -> Product {
        Product {
            id: self.id,
            name: self.name,
            slug: self.slug,
            price: self.price,
            image: self.image,
            category_id: self.category_id,
            variants,
            total_stock: self.total_stock,
            is_active: self.is_active,
        }
    }
}

/// Location-keyed flat delivery fee
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryCharge {
    pub state: String,
    pub city: String,
    pub charge: Decimal,
    pub minimum_order_value: Decimal,
    pub free_delivery_threshold: Option<Decimal>,
    pub estimated_days: Option<i32>,
    pub is_active: bool,
}

impl DeliveryCharge {
    /// Charge for an order of the given subtotal, waived at or above the free-delivery threshold
    pub fn charge_for(&self, subtotal: Decimal) -> Decimal {
        match self.free_delivery_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.charge,
        }
    }
}

/// Node of the category tree with its materialised ancestor path (root first)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub path: Vec<Uuid>,
    pub level: i32,
}

/// One link in a breadcrumb trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Crumb {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

// Catalog collaborators: products with variant stock, delivery charges and the category tree

pub mod breadcrumb;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod store;

pub use models::{Category, Crumb, DeliveryCharge, Product, ProductVariant};
pub use repository::{PgCatalogStore, PgDeliveryChargeStore};
pub use store::{CatalogStore, DeliveryChargeStore};

// Coupon definitions, the pure evaluator and coupon endpoints

pub mod evaluator;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod store;

pub use evaluator::{evaluate, round_money, CouponDiscount, CouponRejection};
pub use models::{Coupon, CouponKind, CouponType, CouponUsage};
pub use repository::PgCouponStore;
pub use store::CouponStore;

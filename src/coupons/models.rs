use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::validation::{normalize_coupon_code, validate_coupon_code};

/// Discount type as stored in the `coupons.discount_type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    Percentage,
    FixedAmount,
    FreeShipping,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Percentage => "percentage",
            CouponType::FixedAmount => "fixed_amount",
            CouponType::FreeShipping => "free_shipping",
        }
    }
}

impl std::fmt::Display for CouponType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a coupon takes off an order; each kind carries only the fields it needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponKind {
    Percentage {
        percent: Decimal,
        maximum_discount_amount: Option<Decimal>,
    },
    FixedAmount {
        amount: Decimal,
    },
    FreeShipping,
}

impl CouponKind {
    /// Rebuild the kind from its flat column representation
    pub fn from_columns(discount_type: CouponType, value: Decimal, maximum_discount_amount: Option<Decimal>) -> Self {
        match discount_type {
            CouponType::Percentage => CouponKind::Percentage {
                percent: value,
                maximum_discount_amount,
            },
            CouponType::FixedAmount => CouponKind::FixedAmount { amount: value },
            CouponType::FreeShipping => CouponKind::FreeShipping,
        }
    }

    pub fn coupon_type(&self) -> CouponType {
        match self {
            CouponKind::Percentage { .. } => CouponType::Percentage,
            CouponKind::FixedAmount { .. } => CouponType::FixedAmount,
            CouponKind::FreeShipping => CouponType::FreeShipping,
        }
    }

    /// Headline value: the percentage, the fixed amount, or zero for free shipping
    pub fn value(&self) -> Decimal {
        match self {
            CouponKind::Percentage { percent, .. } => *percent,
            CouponKind::FixedAmount { amount } => *amount,
            CouponKind::FreeShipping => Decimal::ZERO,
        }
    }

    pub fn maximum_discount_amount(&self) -> Option<Decimal> {
        match self {
            CouponKind::Percentage { maximum_discount_amount, .. } => *maximum_discount_amount,
            _ => None,
        }
    }
}

/// How many times one user has redeemed a coupon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CouponUsage {
    pub user_id: i32,
    pub usage_count: i32,
    pub last_used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    /// Always upper-cased
    pub code: String,
    pub description: Option<String>,
    pub kind: CouponKind,
    pub minimum_order_amount: Decimal,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub user_usage_limit: Option<i32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub is_public: bool,
    pub usages: Vec<CouponUsage>,
}

impl Coupon {
    /// Number of times `user_id` has used this coupon
    pub fn usage_for(&self, user_id: i32) -> i32 {
        self.usages
            .iter()
            .find(|u| u.user_id == user_id)
            .map(|u| u.usage_count)
            .unwrap_or(0)
    }

    /// Inclusive validity window check
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    pub fn is_listed(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.is_public && self.is_within_window(now)
    }
}

/// Coupon row as stored; usages live in `coupon_usages`
#[derive(Debug, Clone, FromRow)]
pub struct CouponRow {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: CouponType,
    pub discount_value: Decimal,
    pub maximum_discount_amount: Option<Decimal>,
    pub minimum_order_amount: Decimal,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub user_usage_limit: Option<i32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub is_public: bool,
}

impl CouponRow {
    pub fn into_coupon(self, usages: Vec<CouponUsage>) -> Coupon {
        Coupon {
            id: self.id,
            code: self.code,
            description: self.description,
            kind: CouponKind::from_columns(self.discount_type, self.discount_value, self.maximum_discount_amount),
            minimum_order_amount: self.minimum_order_amount,
            usage_limit: self.usage_limit,
            usage_count: self.usage_count,
            user_usage_limit: self.user_usage_limit,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            is_active: self.is_active,
            is_public: self.is_public,
            usages,
        }
    }
}

/// Request body for POST /api/admin/coupons
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCouponRequest {
    #[validate(custom = "validate_coupon_code")]
    pub code: String,

    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,

    pub discount_type: CouponType,

    /// Percentage (1-100) or fixed amount; ignored for free shipping
    #[serde(default)]
    pub discount_value: Decimal,

    pub maximum_discount_amount: Option<Decimal>,

    #[serde(default)]
    pub minimum_order_amount: Decimal,

    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: Option<i32>,

    #[validate(range(min = 1, message = "Per-user usage limit must be at least 1"))]
    pub user_usage_limit: Option<i32>,

    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

impl CreateCouponRequest {
    /// Cross-field checks that `validator` attributes cannot express.
    /// Returns the coupon ready to be inserted.
    pub fn into_coupon(self) -> Result<Coupon, String> {
        if self.valid_from > self.valid_until {
            return Err("valid_from must not be after valid_until".to_string());
        }
        if self.minimum_order_amount < Decimal::ZERO {
            return Err("Minimum order amount cannot be negative".to_string());
        }
        if let Some(cap) = self.maximum_discount_amount {
            if cap <= Decimal::ZERO {
                return Err("Maximum discount amount must be positive".to_string());
            }
        }
        match self.discount_type {
            CouponType::Percentage if self.discount_value <= Decimal::ZERO || self.discount_value > Decimal::ONE_HUNDRED => {
                return Err("Percentage discount must be between 0 and 100".to_string());
            }
            CouponType::FixedAmount if self.discount_value <= Decimal::ZERO => {
                return Err("Fixed discount amount must be positive".to_string());
            }
            _ => {}
        }

        Ok(Coupon {
            id: Uuid::new_v4(),
            code: normalize_coupon_code(&self.code),
            description: self.description,
            kind: CouponKind::from_columns(self.discount_type, self.discount_value, self.maximum_discount_amount),
            minimum_order_amount: self.minimum_order_amount,
            usage_limit: self.usage_limit,
            usage_count: 0,
            user_usage_limit: self.user_usage_limit,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            is_active: self.is_active,
            is_public: self.is_public,
            usages: Vec::new(),
        })
    }
}

/// Coupon as shown to clients; usage counters stay internal
#[derive(Debug, Serialize, ToSchema)]
pub struct CouponResponse {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: CouponType,
    pub discount_value: Decimal,
    pub maximum_discount_amount: Option<Decimal>,
    pub minimum_order_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_public: bool,
}

impl From<&Coupon> for CouponResponse {
    fn from(coupon: &Coupon) -> Self {
        Self {
            id: coupon.id,
            code: coupon.code.clone(),
            description: coupon.description.clone(),
            discount_type: coupon.kind.coupon_type(),
            discount_value: coupon.kind.value(),
            maximum_discount_amount: coupon.kind.maximum_discount_amount(),
            minimum_order_amount: coupon.minimum_order_amount,
            valid_from: coupon.valid_from,
            valid_until: coupon.valid_until,
            is_public: coupon.is_public,
        }
    }
}

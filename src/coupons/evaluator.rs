// Coupon applicability and discount computation
//
// Pure: no I/O and no counter updates. The caller commits usage when an
// order actually holds the coupon.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::coupons::models::{Coupon, CouponKind};

/// Amounts a coupon takes off an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct CouponDiscount {
    /// Taken off the item subtotal
    pub discount: Decimal,
    /// Taken off the delivery charge
    pub discount_on_delivery: Decimal,
}

/// Why a coupon cannot be applied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponRejection {
    #[error("Coupon {0} not found")]
    NotFound(String),

    #[error("Coupon {0} is not active")]
    Inactive(String),

    #[error("Coupon {0} is not valid at this time")]
    OutsideValidityWindow(String),

    #[error("Coupon {code} requires a minimum purchase of {minimum}")]
    MinimumNotMet { code: String, minimum: Decimal },

    #[error("Coupon {0} has reached its usage limit")]
    UsageLimitReached(String),

    #[error("You have already used coupon {0} the maximum number of times")]
    UserLimitReached(String),
}

/// Round a money amount to 2 decimal places, halves away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Decide whether `coupon` applies to an order and compute its discounts.
///
/// Checks run in a fixed order so the first failing constraint is the one reported.
pub fn evaluate(
    coupon: &Coupon,
    order_amount: Decimal,
    delivery_charge: Decimal,
    user_id: i32,
    now: DateTime<Utc>,
) -> Result<CouponDiscount, CouponRejection> {
    let code = || coupon.code.clone();

    if !coupon.is_active {
        return Err(CouponRejection::Inactive(code()));
    }
    if !coupon.is_within_window(now) {
        return Err(CouponRejection::OutsideValidityWindow(code()));
    }
    if order_amount < coupon.minimum_order_amount {
        return Err(CouponRejection::MinimumNotMet {
            code: code(),
            minimum: coupon.minimum_order_amount,
        });
    }
    if let Some(limit) = coupon.usage_limit {
        if coupon.usage_count >= limit {
            return Err(CouponRejection::UsageLimitReached(code()));
        }
    }
    if let Some(limit) = coupon.user_usage_limit {
        if coupon.usage_for(user_id) >= limit {
            return Err(CouponRejection::UserLimitReached(code()));
        }
    }

    let order_amount = order_amount.max(Decimal::ZERO);
    let discount = match &coupon.kind {
        CouponKind::Percentage {
            percent,
            maximum_discount_amount,
        } => {
            let raw = order_amount * *percent / Decimal::ONE_HUNDRED;
            let capped = match maximum_discount_amount {
                Some(cap) => raw.min(*cap),
                None => raw,
            };
            CouponDiscount {
                discount: capped.min(order_amount),
                discount_on_delivery: Decimal::ZERO,
            }
        }
        CouponKind::FixedAmount { amount } => CouponDiscount {
            discount: (*amount).min(order_amount),
            discount_on_delivery: Decimal::ZERO,
        },
        CouponKind::FreeShipping => CouponDiscount {
            discount: Decimal::ZERO,
            discount_on_delivery: delivery_charge.max(Decimal::ZERO),
        },
    };

    Ok(CouponDiscount {
        discount: round_money(discount.discount.max(Decimal::ZERO)),
        discount_on_delivery: round_money(discount.discount_on_delivery),
    })
}

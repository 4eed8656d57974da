use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::catalog::{CatalogStore, DeliveryChargeStore};
use crate::coupons::{evaluate, round_money, CouponDiscount, CouponRejection, CouponStore};
use crate::orders::{
    AppliedCoupon, OrderCalculation, OrderError, OrderItemRequest, OrderLine, ShippingAddress, StockMovement,
};
use crate::settings::{SettingsStore, DELIVERY_DEFAULT_CHARGE};
use crate::validation::normalize_coupon_code;

/// Delivery charge used when neither a delivery entry nor the setting applies
pub const FALLBACK_DELIVERY_CHARGE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Delivery fee resolved for an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryQuote {
    pub charge: Decimal,
    pub estimated_days: Option<i32>,
}

/// Service for pricing carts into order calculations
#[derive(Clone)]
pub struct PriceCalculator {
    catalog: Arc<dyn CatalogStore>,
    delivery: Arc<dyn DeliveryChargeStore>,
    coupons: Arc<dyn CouponStore>,
    settings: Arc<dyn SettingsStore>,
}

impl PriceCalculator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        delivery: Arc<dyn DeliveryChargeStore>,
        coupons: Arc<dyn CouponStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            catalog,
            delivery,
            coupons,
            settings,
        }
    }

    /// Price a cart for `user_id`.
    ///
    /// Validates every line against the current catalog, resolves the
    /// delivery charge and applies the optional coupon. Nothing is written:
    /// the returned stock movements are applied later, when the order holds
    /// its inventory.
    pub async fn calculate(
        &self,
        items: &[OrderItemRequest],
        address: &ShippingAddress,
        coupon_code: Option<&str>,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<OrderCalculation, OrderError> {
        if items.is_empty() {
            return Err(OrderError::ValidationError("Order must contain at least one item".to_string()));
        }

        let mut lines: Vec<OrderLine> = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let line = self.price_line(index, item).await?;

            // The same variant requested twice is checked as one line
            match lines.iter_mut().find(|l| l.variant_id == line.variant_id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(line.quantity)
                        .ok_or_else(|| OrderError::ValidationError(format!("Item {}: quantity is too large", index + 1)))?;
                    existing.line_total = Self::calculate_line_total(existing.quantity, existing.unit_price)?;
                }
                None => lines.push(line),
            }
        }
        for line in &lines {
            self.ensure_available(line).await?;
        }

        let line_totals: Vec<Decimal> = lines.iter().map(|l| l.line_total).collect();
        let subtotal = Self::calculate_subtotal(&line_totals)?;

        let delivery = self.resolve_delivery(address, subtotal).await?;

        let (applied, discount) = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                let code = normalize_coupon_code(code);
                let coupon = self
                    .coupons
                    .find_by_code(&code)
                    .await?
                    .ok_or_else(|| CouponRejection::NotFound(code.clone()))?;
                let discount = evaluate(&coupon, subtotal, delivery.charge, user_id, now)?;
                debug!("Coupon {} applied: {:?}", coupon.code, discount);
                let applied = AppliedCoupon {
                    coupon_id: coupon.id,
                    code: coupon.code.clone(),
                    discount_type: coupon.kind.coupon_type(),
                    value: coupon.kind.value(),
                    discount: discount.discount,
                    discount_on_delivery: discount.discount_on_delivery,
                };
                (Some(applied), discount)
            }
            None => (None, CouponDiscount::default()),
        };

        let total = Self::calculate_total(subtotal, discount.discount, delivery.charge, discount.discount_on_delivery)?;
        let stock_movements = lines.iter().map(StockMovement::from).collect();

        Ok(OrderCalculation {
            items: lines,
            subtotal,
            delivery_charge: delivery.charge,
            discount: discount.discount,
            discount_on_delivery: discount.discount_on_delivery,
            total,
            coupon: applied,
            estimated_delivery_days: delivery.estimated_days,
            stock_movements,
        })
    }

    /// Validate one requested item and snapshot it with the current price
    async fn price_line(&self, index: usize, item: &OrderItemRequest) -> Result<OrderLine, OrderError> {
        let position = index + 1;
        let product_id = item
            .product_id
            .ok_or_else(|| OrderError::ValidationError(format!("Item {}: product id is required", position)))?;
        let quantity = match item.quantity {
            Some(q) if q > 0 => q,
            Some(q) => {
                return Err(OrderError::ValidationError(format!(
                    "Item {}: quantity must be positive, got {}",
                    position, q
                )))
            }
            None => return Err(OrderError::ValidationError(format!("Item {}: quantity is required", position))),
        };
        let size = required_text(&item.size, position, "size")?;
        let color = required_text(&item.color, position, "color")?;

        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| OrderError::ValidationError(format!("Item {}: product not found", position)))?;

        if !product.has_variants() {
            return Err(OrderError::ValidationError(format!(
                "Item {}: {} has no size/color variants and cannot be ordered",
                position, product.name
            )));
        }
        let variant = product.find_variant(size, color).ok_or_else(|| {
            OrderError::ValidationError(format!(
                "Item {}: {} is not available in size {} / color {}",
                position, product.name, size, color
            ))
        })?;

        Ok(OrderLine {
            product_id: product.id,
            variant_id: variant.id,
            name: product.name.clone(),
            sku: variant.sku.clone(),
            unit_price: product.price,
            quantity,
            size: variant.size.clone(),
            color: variant.color.clone(),
            image: product.image.clone(),
            line_total: Self::calculate_line_total(quantity, product.price)?,
        })
    }

    /// Re-read the variant and compare its stock with the (aggregated) line quantity
    async fn ensure_available(&self, line: &OrderLine) -> Result<(), OrderError> {
        let available = self
            .catalog
            .find_product(line.product_id)
            .await?
            .map(|p| p.stock_for(&line.size, &line.color))
            .unwrap_or(0);

        if available < line.quantity {
            return Err(OrderError::InsufficientStock {
                product: line.name.clone(),
                size: line.size.clone(),
                color: line.color.clone(),
                requested: line.quantity,
                available,
            });
        }
        Ok(())
    }

    /// Delivery charge for the address: an active (city, state) entry,
    /// otherwise the configured default, otherwise 50
    pub async fn resolve_delivery(&self, address: &ShippingAddress, subtotal: Decimal) -> Result<DeliveryQuote, OrderError> {
        if let Some(entry) = self
            .delivery
            .find_charge(&address.city, &address.state)
            .await?
            .filter(|e| e.is_active)
        {
            if subtotal < entry.minimum_order_value {
                return Err(OrderError::ValidationError(format!(
                    "Orders delivered to {} must be at least {}",
                    address.city.trim(),
                    entry.minimum_order_value
                )));
            }
            return Ok(DeliveryQuote {
                charge: round_money(entry.charge_for(subtotal)),
                estimated_days: entry.estimated_days,
            });
        }

        let charge = self
            .settings
            .get_decimal(DELIVERY_DEFAULT_CHARGE)
            .await?
            .unwrap_or(FALLBACK_DELIVERY_CHARGE);
        debug!("No delivery entry for {}, {}; using default {}", address.city, address.state, charge);

        Ok(DeliveryQuote {
            charge: round_money(charge),
            estimated_days: None,
        })
    }

    /// Calculate the price of one line (quantity * unit price)
    pub fn calculate_line_total(quantity: i32, unit_price: Decimal) -> Result<Decimal, OrderError> {
        Decimal::from(quantity).checked_mul(unit_price).ok_or_else(invalid_total)
    }

    /// Sum of line totals
    pub fn calculate_subtotal(line_totals: &[Decimal]) -> Result<Decimal, OrderError> {
        line_totals
            .iter()
            .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(*t))
            .ok_or_else(invalid_total)
    }

    /// `max(0, subtotal - discount + delivery - discount_on_delivery)`
    pub fn calculate_total(
        subtotal: Decimal,
        discount: Decimal,
        delivery_charge: Decimal,
        discount_on_delivery: Decimal,
    ) -> Result<Decimal, OrderError> {
        let total = subtotal
            .checked_sub(discount)
            .and_then(|t| t.checked_add(delivery_charge))
            .and_then(|t| t.checked_sub(discount_on_delivery))
            .ok_or_else(invalid_total)?;

        Ok(round_money(total.max(Decimal::ZERO)))
    }
}

fn invalid_total() -> OrderError {
    OrderError::ValidationError("Computed order total is invalid".to_string())
}

fn required_text<'a>(value: &'a Option<String>, position: usize, field: &str) -> Result<&'a str, OrderError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OrderError::ValidationError(format!("Item {}: {} is required", position, field)))
}

// In-memory stores and a scripted payment gateway for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::store::normalize_location;
use crate::catalog::{CatalogStore, Category, DeliveryCharge, DeliveryChargeStore, Product, ProductVariant};
use crate::coupons::{Coupon, CouponKind, CouponStore, CouponUsage};
use crate::error::StoreError;
use crate::orders::store::OrderStore;
use crate::orders::{
    InventoryEffect, Order, OrderError, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, StatusMachine,
    Transition, TransitionOutcome,
};
use crate::payments::gateway::checked_minor_amount;
use crate::payments::signature::{self, payment_message};
use crate::payments::{GatewayError, PaymentDetails, PaymentGateway, PaymentIntent, Refund};
use crate::settings::SettingsStore;

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<Uuid, Product>,
    categories: HashMap<Uuid, Category>,
    delivery: Vec<DeliveryCharge>,
    coupons: HashMap<String, Coupon>,
    settings: HashMap<String, Value>,
    orders: HashMap<Uuid, Order>,
}

/// Every store contract over one mutex, so inventory effects are atomic
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Address with no delivery entry unless a test seeds one
    pub fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".to_string(),
            phone: "+919876543210".to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            postal_code: "411001".to_string(),
            country: "India".to_string(),
        }
    }

    pub fn seed_product(&self, name: &str, price: Decimal, variants: &[(&str, &str, i32)]) -> Uuid {
        let slug = name.to_lowercase().replace(' ', "-");
        let mut product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.clone(),
            price,
            image: None,
            category_id: None,
            variants: variants
                .iter()
                .map(|(size, color, stock)| ProductVariant::new(&slug, size, color, *stock))
                .collect(),
            total_stock: 0,
            is_active: true,
        };
        product.recompute_total_stock();
        let id = product.id;
        self.lock().products.insert(id, product);
        id
    }

    pub fn seed_category(&self, category: Category) {
        self.lock().categories.insert(category.id, category);
    }

    pub fn seed_coupon(&self, code: &str, kind: CouponKind) -> Uuid {
        self.update_coupon(code, kind, |_| {})
    }

    /// Seed a coupon after letting `customize` adjust the defaults
    pub fn update_coupon<F>(&self, code: &str, kind: CouponKind, customize: F) -> Uuid
    where
        F: FnOnce(&mut Coupon),
    {
        let now = Utc::now();
        let mut coupon = Coupon {
            id: Uuid::new_v4(),
            code: code.to_uppercase(),
            description: None,
            kind,
            minimum_order_amount: Decimal::ZERO,
            usage_limit: None,
            usage_count: 0,
            user_usage_limit: None,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(30),
            is_active: true,
            is_public: true,
            usages: Vec::new(),
        };
        customize(&mut coupon);
        let id = coupon.id;
        self.lock().coupons.insert(coupon.code.clone(), coupon);
        id
    }

    pub fn seed_delivery(
        &self,
        state: &str,
        city: &str,
        charge: Decimal,
        free_delivery_threshold: Option<Decimal>,
        is_active: bool,
    ) {
        self.lock().delivery.push(DeliveryCharge {
            state: normalize_location(state),
            city: normalize_location(city),
            charge,
            minimum_order_value: Decimal::ZERO,
            free_delivery_threshold,
            estimated_days: Some(3),
            is_active,
        });
    }

    pub fn seed_setting(&self, key: &str, value: Value) {
        self.lock().settings.insert(key.to_string(), value);
    }

    pub fn order(&self, id: Uuid) -> Order {
        self.lock().orders.get(&id).cloned().unwrap()
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    pub fn stock(&self, product_id: Uuid, size: &str, color: &str) -> i32 {
        self.lock().products[&product_id].stock_for(size, color)
    }

    pub fn product_total_stock(&self, product_id: Uuid) -> i32 {
        self.lock().products[&product_id].total_stock
    }

    /// (global usage count, usage count of `user_id`)
    pub fn coupon_usage(&self, code: &str, user_id: i32) -> (i32, i32) {
        let state = self.lock();
        let coupon = &state.coupons[code];
        (coupon.usage_count, coupon.usage_for(user_id))
    }

    /// Move an order's creation time into the past
    pub fn backdate(&self, id: Uuid, age: Duration) {
        if let Some(order) = self.lock().orders.get_mut(&id) {
            order.created_at = order.created_at - age;
        }
    }
}

/// Apply an inventory effect to a scratch copy; nothing changes on failure
fn apply_effect(state: &mut State, order: &Order, effect: InventoryEffect, now: DateTime<Utc>) -> Result<(), OrderError> {
    let mut scratch = state.clone();
    match effect {
        InventoryEffect::None => return Ok(()),
        InventoryEffect::Reserve => {
            for line in &order.items {
                let reserved = scratch
                    .products
                    .get_mut(&line.product_id)
                    .map(|p| adjust_stock(p, line.variant_id, -line.quantity))
                    .unwrap_or(false);
                if !reserved {
                    return Err(OrderError::ReservationFailed(format!(
                        "{} / {} is no longer available in the requested quantity",
                        line.size, line.color
                    )));
                }
            }
            if let Some(applied) = &order.coupon {
                let coupon = scratch
                    .coupons
                    .values_mut()
                    .find(|c| c.id == applied.coupon_id)
                    .ok_or_else(|| OrderError::ReservationFailed(format!("Coupon {} no longer exists", applied.code)))?;
                if !record_usage(coupon, order.user_id, now) {
                    return Err(OrderError::ReservationFailed(format!(
                        "Coupon {} has reached its usage limit",
                        applied.code
                    )));
                }
            }
        }
        InventoryEffect::Release => {
            for line in &order.items {
                if let Some(product) = scratch.products.get_mut(&line.product_id) {
                    adjust_stock(product, line.variant_id, line.quantity);
                }
            }
            if let Some(applied) = &order.coupon {
                if let Some(coupon) = scratch.coupons.values_mut().find(|c| c.id == applied.coupon_id) {
                    coupon.usage_count = (coupon.usage_count - 1).max(0);
                    if let Some(usage) = coupon.usages.iter_mut().find(|u| u.user_id == order.user_id) {
                        usage.usage_count = (usage.usage_count - 1).max(0);
                    }
                }
            }
        }
    }
    state.products = scratch.products;
    state.coupons = scratch.coupons;
    Ok(())
}

/// Add `delta` to a variant's stock, refusing to go below zero
fn adjust_stock(product: &mut Product, variant_id: Uuid, delta: i32) -> bool {
    let applied = match product.variants.iter_mut().find(|v| v.id == variant_id) {
        Some(variant) if variant.stock + delta >= 0 => {
            variant.stock += delta;
            true
        }
        _ => false,
    };
    product.recompute_total_stock();
    applied
}

fn record_usage(coupon: &mut Coupon, user_id: i32, now: DateTime<Utc>) -> bool {
    if coupon.usage_limit.is_some_and(|limit| coupon.usage_count >= limit) {
        return false;
    }
    let user_limit = coupon.user_usage_limit;
    match coupon.usages.iter_mut().find(|u| u.user_id == user_id) {
        Some(usage) => {
            if user_limit.is_some_and(|limit| usage.usage_count >= limit) {
                return false;
            }
            usage.usage_count += 1;
            usage.last_used_at = now;
        }
        None => {
            if user_limit.is_some_and(|limit| limit < 1) {
                return false;
            }
            coupon.usages.push(CouponUsage {
                user_id,
                usage_count: 1,
                last_used_at: now,
            });
        }
    }
    coupon.usage_count += 1;
    true
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.lock().products.get(&id).cloned())
    }

    async fn set_variant_stock(&self, product_id: Uuid, size: &str, color: &str, stock: i32) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(product) = state.products.get_mut(&product_id) else {
            return Ok(false);
        };
        let updated = match product.variants.iter_mut().find(|v| v.matches(size, color)) {
            Some(variant) => {
                variant.stock = stock;
                true
            }
            None => false,
        };
        product.recompute_total_stock();
        Ok(updated)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        Ok(self.lock().categories.get(&id).cloned())
    }

    async fn find_categories(&self, ids: &[Uuid]) -> Result<Vec<Category>, StoreError> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.categories.get(id).cloned()).collect())
    }
}

#[async_trait]
impl DeliveryChargeStore for MemoryStore {
    async fn find_charge(&self, city: &str, state: &str) -> Result<Option<DeliveryCharge>, StoreError> {
        let (city, state_key) = (normalize_location(city), normalize_location(state));
        Ok(self
            .lock()
            .delivery
            .iter()
            .find(|d| d.city == city && d.state == state_key && d.is_active)
            .cloned())
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        Ok(self.lock().coupons.get(code).cloned())
    }

    async fn create(&self, coupon: &Coupon) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.coupons.contains_key(&coupon.code) {
            return Err(StoreError::Conflict(format!("Coupon {} already exists", coupon.code)));
        }
        state.coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn list_public(&self, now: DateTime<Utc>) -> Result<Vec<Coupon>, StoreError> {
        let mut listed: Vec<Coupon> = self.lock().coupons.values().filter(|c| c.is_listed(now)).cloned().collect();
        listed.sort_by_key(|c| c.valid_until);
        Ok(listed)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock().settings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.lock().settings.insert(key.to_string(), value);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn order_number_exists(&self, order_number: &str) -> Result<bool, OrderError> {
        Ok(self.lock().orders.values().any(|o| o.order_number == order_number))
    }

    async fn insert(&self, order: &Order) -> Result<(), OrderError> {
        let mut state = self.lock();
        if state.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Conflict(format!("Order {} already exists", order.order_number)).into());
        }
        if order.inventory_committed {
            apply_effect(&mut state, order, InventoryEffect::Reserve, order.created_at)?;
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>, OrderError> {
        Ok(self
            .lock()
            .orders
            .values()
            .find(|o| o.payment.gateway_order_id.as_deref() == Some(gateway_order_id))
            .cloned())
    }

    async fn list_for_user(&self, user_id: i32, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .values()
            .filter(|o| o.user_id == user_id && status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn find_abandoned(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .values()
            .filter(|o| {
                o.payment.method == PaymentMethod::Gateway
                    && o.payment.status == PaymentStatus::Pending
                    && o.status == OrderStatus::Pending
                    && o.created_at < cutoff
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn apply(&self, id: Uuid, transition: &Transition, now: DateTime<Utc>) -> Result<Order, OrderError> {
        let mut state = self.lock();
        let current = state.orders.get(&id).cloned().ok_or(OrderError::NotFound)?;

        match StatusMachine::plan(&current, transition, now)? {
            TransitionOutcome::Unchanged => Ok(current),
            TransitionOutcome::Changed { order, inventory } => {
                apply_effect(&mut state, &order, inventory, now)?;
                state.orders.insert(id, order.clone());
                Ok(order)
            }
        }
    }
}

/// Gateway double: signs with real HMAC, records refunds, fails on request
pub struct MockGateway {
    key_secret: String,
    webhook_secret: String,
    fail_intents: AtomicBool,
    fail_refunds: AtomicBool,
    intents: AtomicUsize,
    refunds: Mutex<Vec<(String, Decimal)>>,
}

impl MockGateway {
    pub fn new(key_secret: &str, webhook_secret: &str) -> Self {
        Self {
            key_secret: key_secret.to_string(),
            webhook_secret: webhook_secret.to_string(),
            fail_intents: AtomicBool::new(false),
            fail_refunds: AtomicBool::new(false),
            intents: AtomicUsize::new(0),
            refunds: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_intents(&self, fail: bool) {
        self.fail_intents.store(fail, Ordering::SeqCst);
    }

    pub fn fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn intents_created(&self) -> usize {
        self.intents.load(Ordering::SeqCst)
    }

    /// (payment id, amount) of every refund issued
    pub fn refunds(&self) -> Vec<(String, Decimal)> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(
        &self,
        amount_minor: Decimal,
        _receipt: &str,
        _payer_email: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let amount = checked_minor_amount(amount_minor)?;
        if self.fail_intents.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        let n = self.intents.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentIntent {
            intent_id: format!("order_test_{}", n),
            amount,
            currency: "INR".to_string(),
        })
    }

    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature_hex: &str) -> bool {
        signature::verify(
            &self.key_secret,
            payment_message(intent_id, payment_id).as_bytes(),
            signature_hex,
        )
    }

    fn verify_webhook(&self, body: &[u8], signature_hex: &str) -> bool {
        signature::verify(&self.webhook_secret, body, signature_hex)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentDetails, GatewayError> {
        Ok(PaymentDetails {
            payment_id: payment_id.to_string(),
            order_id: None,
            amount: 0,
            currency: "INR".to_string(),
            status: "captured".to_string(),
            method: Some("upi".to_string()),
            error_description: None,
        })
    }

    async fn refund(&self, payment_id: &str, amount: Decimal, _reason: &str) -> Result<Refund, GatewayError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(GatewayError::Declined {
                code: "BAD_REQUEST_ERROR".to_string(),
                message: "Refund could not be processed".to_string(),
            });
        }
        let mut refunds = self.refunds.lock().unwrap();
        refunds.push((payment_id.to_string(), amount));
        Ok(Refund {
            refund_id: format!("rfnd_test_{}", refunds.len()),
            status: "processed".to_string(),
        })
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::coupons::CouponType;
use crate::payments::PaymentIntent;
use crate::validation::{validate_not_blank, validate_phone};

/// Order status enum representing the lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment status enum representing the payment state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    /// A refund has been claimed and is in flight at the gateway
    Refunding,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunding => "refunding",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery
    Cod,
    /// Online payment through the gateway
    Gateway,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Gateway => "gateway",
        }
    }
}

/// One requested cart line. Fields are optional so that missing values
/// surface as item-level validation errors rather than JSON errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 100, message = "Full name must be between 1 and 100 characters"))]
    pub full_name: String,

    #[validate(custom = "validate_phone")]
    pub phone: String,

    #[validate(length(min = 1, max = 200, message = "Address line must be between 1 and 200 characters"))]
    pub line1: String,

    #[validate(length(max = 200, message = "Address line cannot exceed 200 characters"))]
    pub line2: Option<String>,

    #[validate(custom = "validate_not_blank")]
    pub city: String,

    #[validate(custom = "validate_not_blank")]
    pub state: String,

    #[validate(length(min = 3, max = 12, message = "Postal code must be between 3 and 12 characters"))]
    pub postal_code: String,

    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "India".to_string()
}

/// Request to create a new order
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,

    #[validate]
    pub shipping_address: ShippingAddress,

    pub payment_method: PaymentMethod,

    pub coupon_code: Option<String>,

    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,
}

/// Request to preview a coupon against a cart
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,

    #[validate]
    pub shipping_address: ShippingAddress,

    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub coupon_code: String,
}

/// Identifiers returned by the gateway checkout
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 1, message = "Gateway order id is required"))]
    pub gateway_order_id: String,

    #[validate(length(min = 1, message = "Gateway payment id is required"))]
    pub gateway_payment_id: String,

    #[validate(length(min = 1, message = "Gateway signature is required"))]
    pub gateway_signature: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CancelOrderRequest {
    #[validate(length(max = 500, message = "Reason cannot exceed 500 characters"))]
    pub reason: Option<String>,
}

/// Request to update order status (admin)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,

    #[validate(length(min = 1, max = 100, message = "Tracking number must be between 1 and 100 characters"))]
    pub tracking_number: Option<String>,

    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,
}

/// Immutable snapshot of a purchased line, taken at order time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub name: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub size: String,
    pub color: String,
    pub image: Option<String>,
    pub line_total: Decimal,
}

/// Snapshot of the coupon an order used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AppliedCoupon {
    pub coupon_id: Uuid,
    pub code: String,
    pub discount_type: CouponType,
    pub value: Decimal,
    pub discount: Decimal,
    pub discount_on_delivery: Decimal,
}

/// Planned change to one variant's stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMovement {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub size: String,
    pub color: String,
    pub quantity: i32,
}

impl From<&OrderLine> for StockMovement {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product_id,
            variant_id: line.variant_id,
            size: line.size.clone(),
            color: line.color.clone(),
            quantity: line.quantity,
        }
    }
}

/// Result of pricing a cart; nothing has been reserved yet
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderCalculation {
    pub items: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub delivery_charge: Decimal,
    pub discount: Decimal,
    pub discount_on_delivery: Decimal,
    pub total: Decimal,
    pub coupon: Option<AppliedCoupon>,
    pub estimated_delivery_days: Option<i32>,
    #[serde(skip)]
    pub stock_movements: Vec<StockMovement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    #[serde(skip_serializing)]
    pub gateway_signature: Option<String>,
    pub failure_reason: Option<String>,
    pub refund_id: Option<String>,
}

impl PaymentInfo {
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            gateway_order_id: None,
            gateway_payment_id: None,
            gateway_signature: None,
            failure_reason: None,
            refund_id: None,
        }
    }
}

/// Lifecycle timestamps; each is written at most once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusTimestamps {
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    /// Stamp the slot belonging to `status`, keeping any earlier value
    pub fn stamp(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        let slot = match status {
            OrderStatus::Confirmed => &mut self.confirmed_at,
            OrderStatus::Shipped => &mut self.shipped_at,
            OrderStatus::Delivered => &mut self.delivered_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
            _ => return,
        };
        set_once(slot, now);
    }

    pub fn stamp_paid(&mut self, now: DateTime<Utc>) {
        set_once(&mut self.paid_at, now);
    }
}

fn set_once(slot: &mut Option<DateTime<Utc>>, now: DateTime<Utc>) {
    if slot.is_none() {
        *slot = Some(now);
    }
}

/// Order aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: i32,
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub subtotal: Decimal,
    pub delivery_charge: Decimal,
    pub discount: Decimal,
    pub discount_on_delivery: Decimal,
    pub total: Decimal,
    pub coupon: Option<AppliedCoupon>,
    pub status: OrderStatus,
    pub payment: PaymentInfo,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub timestamps: StatusTimestamps,
    /// True while the order holds its stock reservation and coupon usage
    pub inventory_committed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending order from a priced cart
    pub fn from_calculation(
        order_number: String,
        user_id: i32,
        calculation: OrderCalculation,
        shipping_address: ShippingAddress,
        method: PaymentMethod,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number,
            user_id,
            items: calculation.items,
            shipping_address,
            subtotal: calculation.subtotal,
            delivery_charge: calculation.delivery_charge,
            discount: calculation.discount,
            discount_on_delivery: calculation.discount_on_delivery,
            total: calculation.total,
            coupon: calculation.coupon,
            status: OrderStatus::Pending,
            payment: PaymentInfo::new(method),
            tracking_number: None,
            notes,
            cancellation_reason: None,
            timestamps: StatusTimestamps::default(),
            inventory_committed: false,
            created_at: now,
            updated_at: now,
        }
    }

}

/// Order as returned to clients
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: i32,
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub subtotal: Decimal,
    pub delivery_charge: Decimal,
    pub discount: Decimal,
    pub discount_on_delivery: Decimal,
    pub total: Decimal,
    pub coupon: Option<AppliedCoupon>,
    pub status: OrderStatus,
    pub payment: PaymentInfo,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub timestamps: StatusTimestamps,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            user_id: order.user_id,
            items: order.items,
            shipping_address: order.shipping_address,
            subtotal: order.subtotal,
            delivery_charge: order.delivery_charge,
            discount: order.discount,
            discount_on_delivery: order.discount_on_delivery,
            total: order.total,
            coupon: order.coupon,
            status: order.status,
            payment: order.payment,
            tracking_number: order.tracking_number,
            notes: order.notes,
            cancellation_reason: order.cancellation_reason,
            timestamps: order.timestamps,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Result of order creation: the order, plus the intent to pay for gateway orders
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order: OrderResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<PaymentIntent>,
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::catalog::{CatalogStore, DeliveryChargeStore};
use crate::coupons::CouponStore;
use crate::orders::order_number;
use crate::orders::store::OrderStore;
use crate::orders::{
    ApplyCouponRequest, CreateOrderRequest, CreateOrderResponse, Order, OrderCalculation, OrderError,
    OrderStatus, PaymentMethod, PaymentStatus, PriceCalculator, Transition, UpdateStatusRequest,
};
use crate::payments::{to_minor_units, PaymentDetails, PaymentGateway, WebhookAck, WebhookEvent};
use crate::settings::SettingsStore;

/// Reason recorded when a paid order can no longer get its stock
pub const STOCK_UNAVAILABLE_REASON: &str = "stock unavailable at confirmation";

/// Reason recorded by the abandoned-order sweep
pub const TIMEOUT_REASON: &str = "timeout";

const LATE_PAYMENT_REASON: &str = "payment received after the order was cancelled";
const SIGNATURE_FAILURE_REASON: &str = "Payment signature verification failed";

/// Outcome of one abandoned-order sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    pub failed: usize,
}

/// Service for order business logic: pricing, the payment handshake and
/// the lifecycle transitions
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    calculator: PriceCalculator,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogStore>,
        delivery: Arc<dyn DeliveryChargeStore>,
        coupons: Arc<dyn CouponStore>,
        settings: Arc<dyn SettingsStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orders,
            gateway,
            calculator: PriceCalculator::new(catalog, delivery, coupons, settings),
        }
    }

    /// Price a cart with a coupon without creating anything
    pub async fn preview(
        &self,
        user: &AuthenticatedUser,
        request: &ApplyCouponRequest,
    ) -> Result<OrderCalculation, OrderError> {
        self.calculator
            .calculate(
                &request.items,
                &request.shipping_address,
                Some(&request.coupon_code),
                user.user_id,
                Utc::now(),
            )
            .await
    }

    /// Create a new order
    ///
    /// # Behaviour
    /// - The cart is priced from the current catalog; client prices are never used
    /// - Cash on delivery: stored `confirmed`, stock and coupon usage committed
    ///   in the same transaction
    /// - Gateway: a payment intent is created first; if that fails nothing is
    ///   stored. The order is stored `pending` and holds no inventory until the
    ///   payment is confirmed
    /// - Gateway with a zero total: stored `confirmed` and paid, inventory
    ///   committed, no intent
    pub async fn create_order(
        &self,
        user: &AuthenticatedUser,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, OrderError> {
        let now = Utc::now();
        let calculation = self
            .calculator
            .calculate(
                &request.items,
                &request.shipping_address,
                request.coupon_code.as_deref(),
                user.user_id,
                now,
            )
            .await?;

        let number = order_number::next_unique(self.orders.as_ref(), now).await?;
        let mut order = Order::from_calculation(
            number,
            user.user_id,
            calculation,
            request.shipping_address,
            request.payment_method,
            request.notes,
            now,
        );

        let payment_intent = match request.payment_method {
            PaymentMethod::Cod => {
                order.status = OrderStatus::Confirmed;
                order.timestamps.stamp(OrderStatus::Confirmed, now);
                order.inventory_committed = true;
                None
            }
            PaymentMethod::Gateway if order.total.is_zero() => {
                // Fully discounted: nothing to collect, so no intent
                order.status = OrderStatus::Confirmed;
                order.payment.status = PaymentStatus::Paid;
                order.timestamps.stamp(OrderStatus::Confirmed, now);
                order.timestamps.stamp_paid(now);
                order.inventory_committed = true;
                None
            }
            PaymentMethod::Gateway => {
                let intent = self
                    .gateway
                    .create_intent(to_minor_units(order.total), &order.order_number, &user.email)
                    .await?;
                order.payment.gateway_order_id = Some(intent.intent_id.clone());
                Some(intent)
            }
        };

        self.orders.insert(&order).await?;
        info!(
            "User {} placed order {} ({}, total {})",
            user.user_id,
            order.order_number,
            order.payment.method.as_str(),
            order.total
        );

        Ok(CreateOrderResponse {
            order: order.into(),
            payment_intent,
        })
    }

    /// Confirm a gateway payment from the checkout callback
    ///
    /// A bad signature records the failed attempt and is rejected; it never
    /// touches stock, coupons or an order that is already paid.
    pub async fn confirm_payment(
        &self,
        user: &AuthenticatedUser,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        gateway_signature: &str,
    ) -> Result<Order, OrderError> {
        let order = self.find_by_gateway_order_id(gateway_order_id).await?;
        ensure_access(user, &order)?;

        if !self
            .gateway
            .verify_signature(gateway_order_id, gateway_payment_id, gateway_signature)
        {
            warn!(
                "Signature mismatch confirming order {} (payment {})",
                order.order_number, gateway_payment_id
            );
            let failure = Transition::RecordPaymentFailure {
                reason: SIGNATURE_FAILURE_REASON.to_string(),
            };
            self.orders.apply(order.id, &failure, Utc::now()).await?;
            return Err(OrderError::SignatureInvalid);
        }

        self.settle_payment(order, gateway_payment_id, Some(gateway_signature.to_string()))
            .await
    }

    /// Handle a gateway webhook delivery. The body must carry a valid
    /// signature; confirmed captures run the same transition as the
    /// checkout callback.
    pub async fn handle_webhook(&self, body: &[u8], signature: &str) -> Result<WebhookAck, OrderError> {
        if !self.gateway.verify_webhook(body, signature) {
            warn!("Rejected webhook delivery with an invalid signature");
            return Err(OrderError::SignatureInvalid);
        }

        let event = WebhookEvent::parse(body).map_err(OrderError::ValidationError)?;
        let name = event.name().to_string();
        debug!("Webhook event {}", name);

        let handled = match event {
            WebhookEvent::Captured {
                gateway_order_id,
                gateway_payment_id,
            } => {
                let Some(order) = self.orders.find_by_gateway_order_id(&gateway_order_id).await? else {
                    warn!("Webhook capture for unknown gateway order {}", gateway_order_id);
                    return Ok(WebhookAck { event: name, handled: false });
                };
                match self.settle_payment(order, &gateway_payment_id, None).await {
                    Ok(_) => true,
                    // Already resolved; retrying the delivery would not change anything
                    Err(e @ (OrderError::ReservationFailed(_) | OrderError::InvalidTransition(_))) => {
                        warn!("Webhook capture for {} not applied: {}", gateway_order_id, e);
                        false
                    }
                    Err(e) => return Err(e),
                }
            }
            WebhookEvent::Failed {
                gateway_order_id,
                reason,
            } => {
                let Some(order) = self.orders.find_by_gateway_order_id(&gateway_order_id).await? else {
                    warn!("Webhook failure for unknown gateway order {}", gateway_order_id);
                    return Ok(WebhookAck { event: name, handled: false });
                };
                let updated = self
                    .orders
                    .apply(order.id, &Transition::RecordPaymentFailure { reason }, Utc::now())
                    .await?;
                updated.payment.status == PaymentStatus::Failed
            }
            WebhookEvent::Ignored(event) => {
                info!("Ignoring webhook event {}", event);
                false
            }
        };

        Ok(WebhookAck { event: name, handled })
    }

    /// Apply a proven payment. If the order can no longer take its stock, or
    /// was cancelled before the payment arrived, the payment is refunded.
    async fn settle_payment(
        &self,
        order: Order,
        gateway_payment_id: &str,
        gateway_signature: Option<String>,
    ) -> Result<Order, OrderError> {
        let confirm = Transition::ConfirmPayment {
            gateway_payment_id: gateway_payment_id.to_string(),
            gateway_signature,
        };

        match self.orders.apply(order.id, &confirm, Utc::now()).await {
            Ok(confirmed) => Ok(confirmed),
            Err(OrderError::ReservationFailed(reason)) => {
                warn!("Order {} paid but cannot be fulfilled: {}", order.order_number, reason);
                self.void_payment(&order, gateway_payment_id, STOCK_UNAVAILABLE_REASON).await?;
                Err(OrderError::ReservationFailed(format!(
                    "{}; the payment has been refunded",
                    reason
                )))
            }
            Err(OrderError::InvalidTransition(message)) => {
                let current = self.orders.find_by_id(order.id).await?.ok_or(OrderError::NotFound)?;
                let unsettled = matches!(current.payment.status, PaymentStatus::Pending | PaymentStatus::Failed);
                if current.status == OrderStatus::Cancelled && unsettled {
                    warn!("Payment {} arrived for cancelled order {}", gateway_payment_id, order.order_number);
                    self.void_payment(&current, gateway_payment_id, LATE_PAYMENT_REASON).await?;
                    return Err(OrderError::InvalidTransition(format!(
                        "{}; the payment has been refunded",
                        message
                    )));
                }
                Err(OrderError::InvalidTransition(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Refund a captured payment the order cannot keep and cancel the order.
    /// The refund is claimed on the locked row first, so concurrent deliveries
    /// of the same payment refund it once. A failed refund marks the payment
    /// failed with the gateway's message.
    async fn void_payment(&self, order: &Order, gateway_payment_id: &str, reason: &str) -> Result<Order, OrderError> {
        let claim = Transition::ClaimVoid {
            gateway_payment_id: gateway_payment_id.to_string(),
        };
        let claimed = self.orders.apply(order.id, &claim, Utc::now()).await?;
        if claimed.payment.status != PaymentStatus::Refunding {
            return Ok(claimed);
        }

        match self.gateway.refund(gateway_payment_id, claimed.total, reason).await {
            Ok(refund) => {
                let void = Transition::VoidPayment {
                    gateway_payment_id: gateway_payment_id.to_string(),
                    refund_id: Some(refund.refund_id),
                    reason: reason.to_string(),
                };
                self.orders.apply(order.id, &void, Utc::now()).await
            }
            Err(gateway_error) => {
                error!(
                    "Refund of payment {} for order {} failed: {}",
                    gateway_payment_id, order.order_number, gateway_error
                );
                let void = Transition::VoidPayment {
                    gateway_payment_id: gateway_payment_id.to_string(),
                    refund_id: None,
                    reason: gateway_error.to_string(),
                };
                self.orders.apply(order.id, &void, Utc::now()).await?;
                Err(gateway_error.into())
            }
        }
    }

    /// Cancel an order on behalf of its owner or an admin.
    /// Cancelling an already cancelled order returns it unchanged.
    pub async fn cancel_order(
        &self,
        user: &AuthenticatedUser,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<Order, OrderError> {
        let order = self.find_by_id(order_id).await?;
        ensure_access(user, &order)?;
        self.cancel(order.id, reason).await
    }

    /// Refund first (when paid), then cancel. The refund is claimed on the
    /// locked row before the gateway is called, so two cancellations of the
    /// same paid order refund it once. A failed refund releases the claim and
    /// leaves the order as it was.
    async fn cancel(&self, order_id: Uuid, reason: Option<String>) -> Result<Order, OrderError> {
        let claimed = self.orders.apply(order_id, &Transition::ClaimRefund, Utc::now()).await?;
        if claimed.status == OrderStatus::Cancelled {
            return Ok(claimed);
        }

        let refund_id = if claimed.payment.status == PaymentStatus::Refunding {
            Some(self.refund_claimed(&claimed, reason.as_deref()).await?)
        } else {
            None
        };

        let cancel = Transition::Cancel {
            reason,
            refund_id: refund_id.clone(),
        };
        match self.orders.apply(order_id, &cancel, Utc::now()).await {
            Ok(cancelled) => Ok(cancelled),
            Err(e) => {
                if let Some(refund_id) = refund_id {
                    // The money is gone either way; make sure the order says so
                    error!("Order {} refunded ({}) but not cancelled: {}", claimed.order_number, refund_id, e);
                    if let Err(record_error) = self
                        .orders
                        .apply(order_id, &Transition::RecordRefund { refund_id }, Utc::now())
                        .await
                    {
                        error!("Could not record refund on order {}: {}", claimed.order_number, record_error);
                    }
                }
                Err(e)
            }
        }
    }

    /// Refund a payment this caller holds the claim for; on failure the claim is released
    async fn refund_claimed(&self, claimed: &Order, reason: Option<&str>) -> Result<String, OrderError> {
        let refund = match claimed.payment.gateway_payment_id.as_deref() {
            Some(payment_id) => self
                .gateway
                .refund(payment_id, claimed.total, reason.unwrap_or("order cancelled"))
                .await
                .map_err(OrderError::from),
            None => Err(OrderError::InvalidTransition(format!(
                "Order {} is paid but has no gateway payment to refund",
                claimed.order_number
            ))),
        };

        match refund {
            Ok(refund) => Ok(refund.refund_id),
            Err(e) => {
                warn!("Refund for order {} not issued: {}", claimed.order_number, e);
                if let Err(release_error) = self
                    .orders
                    .apply(claimed.id, &Transition::ReleaseRefundClaim, Utc::now())
                    .await
                {
                    error!("Could not release refund claim on order {}: {}", claimed.order_number, release_error);
                }
                Err(e)
            }
        }
    }

    /// Admin status change. `cancelled` runs the full cancellation (refund,
    /// stock and coupon release); `refunded` only normalises the payment.
    pub async fn admin_update_status(&self, order_id: Uuid, request: UpdateStatusRequest) -> Result<Order, OrderError> {
        match request.status {
            OrderStatus::Cancelled => self.cancel(order_id, request.notes).await,
            OrderStatus::Refunded => self.orders.apply(order_id, &Transition::MarkRefunded, Utc::now()).await,
            target => {
                let advance = Transition::Advance {
                    target,
                    tracking_number: request.tracking_number,
                    notes: request.notes,
                };
                self.orders.apply(order_id, &advance, Utc::now()).await
            }
        }
    }

    /// Get an order visible to `user`
    pub async fn get_order(&self, user: &AuthenticatedUser, order_id: Uuid) -> Result<Order, OrderError> {
        let order = self.find_by_id(order_id).await?;
        ensure_access(user, &order)?;
        Ok(order)
    }

    /// The caller's orders, newest first
    pub async fn list_orders(
        &self,
        user: &AuthenticatedUser,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        self.orders.list_for_user(user.user_id, status).await
    }

    /// Gateway-side view of a payment (admin)
    pub async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentDetails, OrderError> {
        Ok(self.gateway.fetch_payment(payment_id).await?)
    }

    /// Cancel gateway orders left unpaid for longer than `timeout`.
    /// One failing order does not stop the sweep.
    pub async fn expire_abandoned(&self, timeout: Duration) -> Result<SweepReport, OrderError> {
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(timeout)
            .map_err(|e| OrderError::ValidationError(format!("Invalid abandoned-order timeout: {}", e)))?;
        let stale = self.orders.find_abandoned(now - timeout).await?;

        let mut report = SweepReport {
            examined: stale.len(),
            ..SweepReport::default()
        };
        let expire = Transition::Expire {
            reason: TIMEOUT_REASON.to_string(),
        };
        for order in stale {
            match self.orders.apply(order.id, &expire, now).await {
                Ok(updated) if updated.status == OrderStatus::Cancelled => {
                    debug!("Expired abandoned order {}", updated.order_number);
                    report.expired += 1;
                }
                Ok(updated) => debug!("Order {} was settled before it expired", updated.order_number),
                Err(e) => {
                    error!("Failed to expire order {}: {}", order.order_number, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders.find_by_id(order_id).await?.ok_or(OrderError::NotFound)
    }

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Order, OrderError> {
        self.orders
            .find_by_gateway_order_id(gateway_order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }
}

fn ensure_access(user: &AuthenticatedUser, order: &Order) -> Result<(), OrderError> {
    if user.can_access(order.user_id) {
        Ok(())
    } else {
        Err(OrderError::Forbidden(
            "You do not have permission to access this order".to_string(),
        ))
    }
}

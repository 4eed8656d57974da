// Order lifecycle transitions
//
// `plan` is pure: it takes the current order and a requested transition and
// returns the order as it should be stored plus the inventory effect the
// store must apply in the same transaction. `inventory_committed` is the
// at-most-once guard for reserving and releasing stock and coupon usage.

use chrono::{DateTime, Utc};

use crate::orders::{Order, OrderError, OrderStatus, PaymentMethod, PaymentStatus};

/// A requested change to an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Payment captured and proven (checkout signature or signed webhook)
    ConfirmPayment {
        gateway_payment_id: String,
        gateway_signature: Option<String>,
    },
    /// A payment attempt failed or could not be verified
    RecordPaymentFailure { reason: String },
    /// Take the right to refund a paid order before asking the gateway.
    /// Only one caller can hold it, so a payment is refunded at most once.
    ClaimRefund,
    /// The gateway refused the refund; the order is paid again
    ReleaseRefundClaim,
    /// User or admin cancellation; a paid order carries the refund already issued
    Cancel {
        reason: Option<String>,
        refund_id: Option<String>,
    },
    /// Admin moves the order forward
    Advance {
        target: OrderStatus,
        tracking_number: Option<String>,
        notes: Option<String>,
    },
    /// Admin marks a cancelled or delivered order refunded
    MarkRefunded,
    /// Refund issued outside a status change
    RecordRefund { refund_id: String },
    /// Take the right to refund a captured payment the order cannot keep
    ClaimVoid { gateway_payment_id: String },
    /// A captured payment that can no longer be honoured (stock gone, order expired)
    VoidPayment {
        gateway_payment_id: String,
        refund_id: Option<String>,
        reason: String,
    },
    /// Abandoned-order sweep
    Expire { reason: String },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::ConfirmPayment { .. } => "confirm_payment",
            Transition::RecordPaymentFailure { .. } => "record_payment_failure",
            Transition::ClaimRefund => "claim_refund",
            Transition::ReleaseRefundClaim => "release_refund_claim",
            Transition::Cancel { .. } => "cancel",
            Transition::Advance { .. } => "advance",
            Transition::MarkRefunded => "mark_refunded",
            Transition::RecordRefund { .. } => "record_refund",
            Transition::ClaimVoid { .. } => "claim_void",
            Transition::VoidPayment { .. } => "void_payment",
            Transition::Expire { .. } => "expire",
        }
    }
}

/// What must happen to stock and coupon counters alongside the status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryEffect {
    None,
    /// Decrement every line's variant stock and count the coupon use
    Reserve,
    /// Give the stock and the coupon use back
    Release,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Nothing to write; the order already reflects the transition
    Unchanged,
    Changed { order: Order, inventory: InventoryEffect },
}

/// Service for managing order status transitions
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition is valid
    ///
    /// # Valid Transitions
    /// - Pending → any later fulfilment state, Cancelled
    /// - Confirmed → Processing, Shipped, Delivered, Cancelled
    /// - Processing → Shipped, Delivered
    /// - Shipped → Delivered
    /// - Delivered, Cancelled → Refunded
    /// - Refunded → (terminal)
    /// - Any status → Same status (idempotent)
    pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        if from == to {
            return true;
        }

        match (from, to) {
            (_, OrderStatus::Pending) => false,
            (OrderStatus::Refunded, _) => false,
            (OrderStatus::Pending | OrderStatus::Confirmed, OrderStatus::Cancelled) => true,
            (OrderStatus::Cancelled | OrderStatus::Delivered, OrderStatus::Refunded) => true,
            (OrderStatus::Cancelled, _) | (_, OrderStatus::Cancelled | OrderStatus::Refunded) => false,
            (from, to) => fulfilment_rank(to) > fulfilment_rank(from),
        }
    }

    /// Attempt to transition from one status to another
    pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<OrderStatus, OrderError> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(OrderError::InvalidTransition(format!(
                "Cannot transition from '{}' to '{}'",
                from, to
            )))
        }
    }

    /// Decide how `transition` changes `current`
    pub fn plan(current: &Order, transition: &Transition, now: DateTime<Utc>) -> Result<TransitionOutcome, OrderError> {
        let mut next = current.clone();
        let mut inventory = InventoryEffect::None;

        match transition {
            Transition::ConfirmPayment {
                gateway_payment_id,
                gateway_signature,
            } => {
                match current.payment.status {
                    PaymentStatus::Paid => return Ok(TransitionOutcome::Unchanged),
                    PaymentStatus::Refunding | PaymentStatus::Refunded => {
                        return Err(OrderError::InvalidTransition(format!(
                            "Order {} has been refunded and can no longer be paid",
                            current.order_number
                        )))
                    }
                    PaymentStatus::Pending | PaymentStatus::Failed => {}
                }
                // An admin may move a gateway order forward before its payment lands
                let payable = match current.status {
                    OrderStatus::Pending => true,
                    OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered => {
                        current.payment.method == PaymentMethod::Gateway
                    }
                    OrderStatus::Cancelled | OrderStatus::Refunded => false,
                };
                if !payable {
                    return Err(OrderError::InvalidTransition(format!(
                        "Order {} is {} and can no longer be paid",
                        current.order_number, current.status
                    )));
                }
                next.payment.status = PaymentStatus::Paid;
                next.payment.gateway_payment_id = Some(gateway_payment_id.clone());
                if gateway_signature.is_some() {
                    next.payment.gateway_signature = gateway_signature.clone();
                }
                next.payment.failure_reason = None;
                next.timestamps.stamp_paid(now);
                if current.status == OrderStatus::Pending {
                    next.status = OrderStatus::Confirmed;
                    next.timestamps.stamp(OrderStatus::Confirmed, now);
                }
                inventory = reserve_once(&mut next);
            }

            Transition::RecordPaymentFailure { reason } => {
                let recordable = current.status == OrderStatus::Pending
                    && matches!(current.payment.status, PaymentStatus::Pending | PaymentStatus::Failed);
                if !recordable {
                    return Ok(TransitionOutcome::Unchanged);
                }
                next.payment.status = PaymentStatus::Failed;
                next.payment.failure_reason = Some(reason.clone());
            }

            Transition::ClaimRefund => {
                if current.status == OrderStatus::Cancelled {
                    return Ok(TransitionOutcome::Unchanged);
                }
                ensure_no_refund_in_flight(current)?;
                ensure_cancellable(current)?;
                if current.payment.status != PaymentStatus::Paid || current.total.is_zero() {
                    return Ok(TransitionOutcome::Unchanged);
                }
                next.payment.status = PaymentStatus::Refunding;
            }

            Transition::ReleaseRefundClaim => {
                if current.payment.status != PaymentStatus::Refunding {
                    return Ok(TransitionOutcome::Unchanged);
                }
                next.payment.status = PaymentStatus::Paid;
            }

            Transition::Cancel { reason, refund_id } => {
                if current.status == OrderStatus::Cancelled {
                    return Ok(TransitionOutcome::Unchanged);
                }
                ensure_cancellable(current)?;
                if matches!(current.payment.status, PaymentStatus::Paid | PaymentStatus::Refunding) {
                    match refund_id {
                        Some(id) => next.payment.refund_id = Some(id.clone()),
                        // Nothing was collected, so nothing goes back
                        None if current.total.is_zero() => {}
                        None => {
                            return Err(OrderError::InvalidTransition(format!(
                                "Order {} is paid and must be refunded before it is cancelled",
                                current.order_number
                            )))
                        }
                    }
                    next.payment.status = PaymentStatus::Refunded;
                }
                next.status = OrderStatus::Cancelled;
                next.cancellation_reason = reason.clone();
                next.timestamps.stamp(OrderStatus::Cancelled, now);
                inventory = release_once(&mut next);
            }

            Transition::Advance {
                target,
                tracking_number,
                notes,
            } => {
                if matches!(target, OrderStatus::Cancelled | OrderStatus::Refunded) {
                    return Err(OrderError::InvalidTransition(format!(
                        "'{}' has its own transition",
                        target
                    )));
                }
                ensure_no_refund_in_flight(current)?;
                next.status = Self::transition(current.status, *target)?;
                if tracking_number.is_some() {
                    next.tracking_number = tracking_number.clone();
                }
                if notes.is_some() {
                    next.notes = notes.clone();
                }
                next.timestamps.stamp(*target, now);
                if *target == OrderStatus::Delivered && current.payment.method == PaymentMethod::Cod {
                    // Cash is collected on delivery
                    next.payment.status = PaymentStatus::Paid;
                    next.timestamps.stamp_paid(now);
                }
                if *target != OrderStatus::Pending {
                    inventory = reserve_once(&mut next);
                }
            }

            Transition::MarkRefunded => {
                ensure_no_refund_in_flight(current)?;
                next.status = Self::transition(current.status, OrderStatus::Refunded)?;
                next.payment.status = PaymentStatus::Refunded;
            }

            Transition::RecordRefund { refund_id } => {
                if current.payment.status == PaymentStatus::Refunded && current.payment.refund_id.is_some() {
                    return Ok(TransitionOutcome::Unchanged);
                }
                next.payment.status = PaymentStatus::Refunded;
                next.payment.refund_id = Some(refund_id.clone());
            }

            Transition::ClaimVoid { gateway_payment_id } => {
                ensure_no_refund_in_flight(current)?;
                ensure_voidable(current)?;
                if current.payment.status == PaymentStatus::Refunded {
                    return Ok(TransitionOutcome::Unchanged);
                }
                next.payment.status = PaymentStatus::Refunding;
                next.payment.gateway_payment_id = Some(gateway_payment_id.clone());
            }

            Transition::VoidPayment {
                gateway_payment_id,
                refund_id,
                reason,
            } => {
                ensure_voidable(current)?;
                next.status = OrderStatus::Cancelled;
                if next.cancellation_reason.is_none() {
                    next.cancellation_reason = Some(reason.clone());
                }
                next.timestamps.stamp(OrderStatus::Cancelled, now);
                next.payment.gateway_payment_id = Some(gateway_payment_id.clone());
                next.payment.failure_reason = Some(reason.clone());
                match refund_id {
                    Some(id) => {
                        next.payment.status = PaymentStatus::Refunded;
                        next.payment.refund_id = Some(id.clone());
                    }
                    None => next.payment.status = PaymentStatus::Failed,
                }
            }

            Transition::Expire { reason } => {
                let stale = current.status == OrderStatus::Pending
                    && current.payment.status == PaymentStatus::Pending
                    && current.payment.method == PaymentMethod::Gateway;
                if !stale {
                    return Ok(TransitionOutcome::Unchanged);
                }
                next.status = OrderStatus::Cancelled;
                next.payment.status = PaymentStatus::Failed;
                next.payment.failure_reason = Some(reason.clone());
                next.cancellation_reason = Some(reason.clone());
                next.timestamps.stamp(OrderStatus::Cancelled, now);
                inventory = release_once(&mut next);
            }
        }

        if next == *current {
            return Ok(TransitionOutcome::Unchanged);
        }
        next.updated_at = now;
        Ok(TransitionOutcome::Changed { order: next, inventory })
    }
}

fn ensure_cancellable(current: &Order) -> Result<(), OrderError> {
    if matches!(current.status, OrderStatus::Pending | OrderStatus::Confirmed) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition(format!(
            "Order {} is {} and can no longer be cancelled",
            current.order_number, current.status
        )))
    }
}

fn ensure_no_refund_in_flight(current: &Order) -> Result<(), OrderError> {
    if current.payment.status == PaymentStatus::Refunding {
        Err(OrderError::InvalidTransition(format!(
            "A refund for order {} is already in progress",
            current.order_number
        )))
    } else {
        Ok(())
    }
}

/// A captured payment can be voided only while the order holds neither it nor any stock
fn ensure_voidable(current: &Order) -> Result<(), OrderError> {
    if current.payment.status == PaymentStatus::Paid || current.inventory_committed {
        return Err(OrderError::InvalidTransition(format!(
            "Order {} already holds its payment",
            current.order_number
        )));
    }
    if !matches!(current.status, OrderStatus::Pending | OrderStatus::Cancelled) {
        return Err(OrderError::InvalidTransition(format!(
            "Order {} is {}",
            current.order_number, current.status
        )));
    }
    Ok(())
}

/// Position along the fulfilment path; cancellation states sit outside it
fn fulfilment_rank(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Confirmed => 1,
        OrderStatus::Processing => 2,
        OrderStatus::Shipped => 3,
        OrderStatus::Delivered => 4,
        OrderStatus::Cancelled | OrderStatus::Refunded => u8::MAX,
    }
}

fn reserve_once(order: &mut Order) -> InventoryEffect {
    if order.inventory_committed {
        InventoryEffect::None
    } else {
        order.inventory_committed = true;
        InventoryEffect::Reserve
    }
}

fn release_once(order: &mut Order) -> InventoryEffect {
    if order.inventory_committed {
        order.inventory_committed = false;
        InventoryEffect::Release
    } else {
        InventoryEffect::None
    }
}

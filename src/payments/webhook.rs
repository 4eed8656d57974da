// Gateway webhook payloads

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Event kinds the order lifecycle reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Payment captured (`payment.captured` or `order.paid`)
    Captured {
        gateway_order_id: String,
        gateway_payment_id: String,
    },
    /// Payment attempt failed (`payment.failed`)
    Failed {
        gateway_order_id: String,
        reason: String,
    },
    /// Anything else; acknowledged and ignored
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    payment: Option<Entity<PaymentEntity>>,
    order: Option<Entity<OrderEntity>>,
}

#[derive(Debug, Deserialize)]
struct Entity<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderEntity {
    id: String,
}

/// Response body for an accepted delivery
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub event: String,
    pub handled: bool,
}

impl WebhookEvent {
    /// Decode a (signature-verified) webhook body
    pub fn parse(body: &[u8]) -> Result<Self, String> {
        let envelope: Envelope = serde_json::from_slice(body).map_err(|e| format!("Invalid webhook payload: {}", e))?;
        let payment = envelope.payload.payment.map(|p| p.entity);
        let order_id = envelope
            .payload
            .order
            .map(|o| o.entity.id)
            .or_else(|| payment.as_ref().and_then(|p| p.order_id.clone()));

        match envelope.event.as_str() {
            "payment.captured" | "order.paid" => match (order_id, payment) {
                (Some(gateway_order_id), Some(payment)) => Ok(WebhookEvent::Captured {
                    gateway_order_id,
                    gateway_payment_id: payment.id,
                }),
                _ => Err(format!("{} event without order and payment ids", envelope.event)),
            },
            "payment.failed" => {
                let gateway_order_id = order_id.ok_or_else(|| "payment.failed event without an order id".to_string())?;
                let reason = payment
                    .and_then(|p| p.error_description)
                    .unwrap_or_else(|| "Payment failed".to_string());
                Ok(WebhookEvent::Failed { gateway_order_id, reason })
            }
            _ => Ok(WebhookEvent::Ignored(envelope.event)),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            WebhookEvent::Captured { .. } => "payment.captured",
            WebhookEvent::Failed { .. } => "payment.failed",
            WebhookEvent::Ignored(event) => event,
        }
    }
}

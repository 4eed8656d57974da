// Payment gateway boundary: intents, signature checks, payment lookups and refunds

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Longest receipt identifier the gateway accepts
pub const MAX_RECEIPT_LEN: usize = 40;

/// Expected failures reported by the gateway adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Rejected locally before any network call
    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),

    /// The gateway answered with an error
    #[error("Payment gateway declined the request: {message}")]
    Declined { code: String, message: String },

    /// The gateway could not be reached or timed out
    #[error("Payment gateway unreachable: {0}")]
    Transport(String),

    /// The gateway answered with something we cannot interpret
    #[error("Unexpected payment gateway response: {0}")]
    Unexpected(String),
}

/// Gateway-side record of an expected charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntent {
    pub intent_id: String,
    /// Amount in minor currency units (paise, cents)
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentDetails {
    pub payment_id: String,
    pub order_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    /// Gateway status, e.g. "captured", "failed", "refunded"
    pub status: String,
    pub method: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Refund {
    pub refund_id: String,
    pub status: String,
}

/// Contract the order lifecycle relies on.
/// Implementations report expected failures as `GatewayError`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount_minor` minor units.
    /// The amount must be a positive integer; the receipt is truncated to the gateway's limit.
    async fn create_intent(
        &self,
        amount_minor: Decimal,
        receipt: &str,
        payer_email: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Check the checkout signature over `intent_id|payment_id`
    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool;

    /// Check the signature header of a webhook delivery against its raw body
    fn verify_webhook(&self, body: &[u8], signature: &str) -> bool;

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentDetails, GatewayError>;

    /// Refund `amount` (major units) of a captured payment
    async fn refund(&self, payment_id: &str, amount: Decimal, reason: &str) -> Result<Refund, GatewayError>;
}

/// Convert a major-unit amount to minor units, halves rounded away from zero
pub fn to_minor_units(amount: Decimal) -> Decimal {
    (amount * Decimal::ONE_HUNDRED).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate a minor-unit amount before it is sent anywhere
pub fn checked_minor_amount(amount_minor: Decimal) -> Result<i64, GatewayError> {
    if amount_minor <= Decimal::ZERO {
        return Err(GatewayError::InvalidAmount(format!("{} must be positive", amount_minor)));
    }
    if !amount_minor.fract().is_zero() {
        return Err(GatewayError::InvalidAmount(format!(
            "{} is not a whole number of minor units",
            amount_minor
        )));
    }
    i64::try_from(amount_minor).map_err(|_| GatewayError::InvalidAmount(format!("{} is too large", amount_minor)))
}

/// Receipt id cut to the gateway's length limit on a character boundary
pub fn truncate_receipt(receipt: &str) -> String {
    receipt.chars().take(MAX_RECEIPT_LEN).collect()
}

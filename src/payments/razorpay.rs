// HTTP adapter for a Razorpay-compatible payment gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::config::GatewayConfig;
use crate::payments::gateway::{
    checked_minor_amount, to_minor_units, truncate_receipt, GatewayError, PaymentDetails, PaymentGateway,
    PaymentIntent, Refund,
};
use crate::payments::signature::{self, payment_message};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct OrderBody {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct PaymentBody {
    id: String,
    order_id: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    method: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundBody {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

/// Gateway client authenticated with the merchant key pair
pub struct HttpPaymentGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Decode a success body, or turn the gateway's error envelope into `Declined`
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| GatewayError::Unexpected(e.to_string()));
        }

        match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => Err(GatewayError::Declined {
                code: envelope.error.code,
                message: envelope.error.description,
            }),
            Err(_) => Err(GatewayError::Unexpected(format!("HTTP {}: {}", status, text))),
        }
    }

    fn transport(err: reqwest::Error) -> GatewayError {
        error!("Payment gateway request failed: {}", err);
        GatewayError::Transport(err.to_string())
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(
        &self,
        amount_minor: Decimal,
        receipt: &str,
        payer_email: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let amount = checked_minor_amount(amount_minor)?;
        let receipt = truncate_receipt(receipt);

        let response = self
            .client
            .post(self.url("orders"))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&json!({
                "amount": amount,
                "currency": self.config.currency,
                "receipt": receipt,
                "notes": { "email": payer_email },
            }))
            .send()
            .await
            .map_err(Self::transport)?;

        let body: OrderBody = Self::decode(response).await?;
        info!("Created payment intent {} for receipt {}", body.id, receipt);

        Ok(PaymentIntent {
            intent_id: body.id,
            amount: body.amount,
            currency: body.currency,
        })
    }

    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool {
        signature::verify(
            &self.config.key_secret,
            payment_message(intent_id, payment_id).as_bytes(),
            signature,
        )
    }

    fn verify_webhook(&self, body: &[u8], signature: &str) -> bool {
        signature::verify(&self.config.webhook_secret, body, signature)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentDetails, GatewayError> {
        debug!("Fetching payment {}", payment_id);
        let response = self
            .client
            .get(self.url(&format!("payments/{}", payment_id)))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .map_err(Self::transport)?;

        let body: PaymentBody = Self::decode(response).await?;
        Ok(PaymentDetails {
            payment_id: body.id,
            order_id: body.order_id,
            amount: body.amount,
            currency: body.currency,
            status: body.status,
            method: body.method,
            error_description: body.error_description,
        })
    }

    async fn refund(&self, payment_id: &str, amount: Decimal, reason: &str) -> Result<Refund, GatewayError> {
        let amount = checked_minor_amount(to_minor_units(amount))?;

        let response = self
            .client
            .post(self.url(&format!("payments/{}/refund", payment_id)))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&json!({
                "amount": amount,
                "notes": { "reason": reason },
            }))
            .send()
            .await
            .map_err(Self::transport)?;

        let body: RefundBody = Self::decode(response).await?;
        info!("Refund {} issued for payment {} ({})", body.id, payment_id, body.status);

        Ok(Refund {
            refund_id: body.id,
            status: body.status,
        })
    }
}

// Payment gateway adapter, signature checks and payment endpoints

pub mod gateway;
pub mod handlers;
pub mod razorpay;
pub mod signature;
pub mod webhook;

pub use gateway::{to_minor_units, GatewayError, PaymentDetails, PaymentGateway, PaymentIntent, Refund};
pub use razorpay::HttpPaymentGateway;
pub use webhook::{WebhookAck, WebhookEvent};

// HMAC-SHA256 signatures used by the payment gateway

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `message` under `secret`
pub fn sign(secret: &str, message: &[u8]) -> String {
    let mut mac = mac_for(secret);
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex-encoded signature in constant time.
/// Malformed hex is simply a mismatch.
pub fn verify(secret: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let mut mac = mac_for(secret);
    mac.update(message);
    mac.verify_slice(&signature).is_ok()
}

/// Message signed by the gateway when a checkout completes
pub fn payment_message(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{}|{}", gateway_order_id, gateway_payment_id)
}

fn mac_for(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any size"),
    }
}

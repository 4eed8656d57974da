use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::orders::store::OrderStore;
use crate::orders::OrderError;

const SUFFIX_LEN: usize = 6;
const MAX_ATTEMPTS: usize = 5;

/// `ORD-<yyyymmddHHMMSS>-<6 upper-case alphanumerics>`
pub fn generate(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();

    format!("ORD-{}-{}", now.format("%Y%m%d%H%M%S"), suffix)
}

/// Generate an order number not yet used by any stored order
pub async fn next_unique(store: &dyn OrderStore, now: DateTime<Utc>) -> Result<String, OrderError> {
    for _ in 0..MAX_ATTEMPTS {
        let candidate = generate(now);
        if !store.order_number_exists(&candidate).await? {
            return Ok(candidate);
        }
        tracing::warn!("Order number {} already taken, retrying", candidate);
    }

    Err(OrderError::Store(crate::error::StoreError::Conflict(
        "Could not allocate a unique order number".to_string(),
    )))
}

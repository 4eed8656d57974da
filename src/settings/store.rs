// Named configuration values with a short-lived read cache
//
// Entries are cached for 60 seconds; `set` invalidates the key it writes.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;

/// Time-to-live for cached settings (60 seconds)
const CACHE_TTL: Duration = Duration::from_secs(60);

/// Fallback delivery charge used when no delivery entry matches an address
pub const DELIVERY_DEFAULT_CHARGE: &str = "delivery.default_charge";

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Read a setting stored either as a JSON number or a numeric string
    async fn get_decimal(&self, key: &str) -> Result<Option<Decimal>, StoreError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(value) => decimal_from_value(&value)
                .map(Some)
                .ok_or_else(|| StoreError::Corrupt(format!("setting {} is not a number", key))),
        }
    }
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

/// Check a value before it is written under `key`.
/// Keys are lower-case dotted names; known keys get type checks.
pub fn validate_setting(key: &str, value: &Value) -> Result<(), String> {
    let key_ok = !key.is_empty()
        && key.len() <= 100
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '_');
    if !key_ok {
        return Err(format!("Invalid setting key '{}'", key));
    }

    if key == DELIVERY_DEFAULT_CHARGE {
        match decimal_from_value(value) {
            Some(charge) if charge >= Decimal::ZERO => {}
            _ => return Err(format!("{} must be a non-negative amount", key)),
        }
    }
    Ok(())
}

/// Cached entry; `None` records a key known to be absent
#[derive(Debug, Clone)]
struct CachedSetting {
    value: Option<Value>,
    loaded_at: Instant,
}

/// PostgreSQL-backed settings with an in-process cache
pub struct PgSettingsStore {
    pool: PgPool,
    cache: RwLock<HashMap<String, CachedSetting>>,
    ttl: Duration,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: RwLock::new(HashMap::new()),
            ttl: CACHE_TTL,
        }
    }

    async fn cached(&self, key: &str) -> Option<Option<Value>> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|entry| entry.loaded_at.elapsed() <= self.ttl)
            .map(|entry| entry.value.clone())
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        if let Some(value) = self.cached(key).await {
            return Ok(value);
        }

        debug!("Loading setting {} from database", key);
        let value: Option<Value> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        self.cache.write().await.insert(
            key.to_string(),
            CachedSetting {
                value: value.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(&value)
        .execute(&self.pool)
        .await?;

        self.cache.write().await.remove(key);
        Ok(())
    }
}

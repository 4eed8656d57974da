// Process configuration read from the environment (after `.env` is loaded)

use std::time::Duration;

/// Configuration errors raised at start-up
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Payment gateway credentials and endpoint
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    /// Shared secret used for both API auth and payment signatures
    pub key_secret: String,
    pub webhook_secret: String,
    pub currency: String,
}

/// Abandoned-order sweep settings
#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            interval: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub gateway: GatewayConfig,
    pub reaper: ReaperConfig,
}

impl AppConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).filter(|v| !v.is_empty()).ok_or(ConfigError::Missing(key));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = parse_number::<u16>("PORT", or_default("PORT", "8080"))?;
        let max_connections = parse_number::<u32>("DATABASE_MAX_CONNECTIONS", or_default("DATABASE_MAX_CONNECTIONS", "10"))?;
        let timeout_minutes = parse_number::<u64>(
            "ABANDONED_ORDER_TIMEOUT_MINUTES",
            or_default("ABANDONED_ORDER_TIMEOUT_MINUTES", "30"),
        )?;
        let interval_minutes = parse_number::<u64>(
            "ABANDONED_SWEEP_INTERVAL_MINUTES",
            or_default("ABANDONED_SWEEP_INTERVAL_MINUTES", "15"),
        )?;
        if interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "ABANDONED_SWEEP_INTERVAL_MINUTES",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            max_connections,
            host: or_default("HOST", "0.0.0.0"),
            port,
            jwt_secret: required("JWT_SECRET")?,
            gateway: GatewayConfig {
                base_url: or_default("PAYMENT_GATEWAY_URL", "https://api.razorpay.com"),
                key_id: required("PAYMENT_KEY_ID")?,
                key_secret: required("PAYMENT_KEY_SECRET")?,
                webhook_secret: required("PAYMENT_WEBHOOK_SECRET")?,
                currency: or_default("PAYMENT_CURRENCY", "INR"),
            },
            reaper: ReaperConfig {
                timeout: Duration::from_secs(timeout_minutes * 60),
                interval: Duration::from_secs(interval_minutes * 60),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { key, value })
}

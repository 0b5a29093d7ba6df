use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub checkout: CheckoutRules,
    #[serde(default)]
    pub delivery: DeliveryRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutRules {
    /// Tax in basis points of the subtotal (1000 = 10%).
    pub tax_rate_bps: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: i64,
    #[serde(default = "default_menu_cache_ttl")]
    pub menu_cache_ttl_seconds: u64,
    /// Largest quantity accepted on a single cart line.
    #[serde(default = "default_max_line_quantity")]
    pub max_line_quantity: u32,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_session_ttl() -> i64 {
    1800
}

fn default_menu_cache_ttl() -> u64 {
    300
}

fn default_max_line_quantity() -> u32 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryRules {
    pub base_fee_cents: i32,
    #[serde(default)]
    pub zone_fees: HashMap<String, i32>,
    #[serde(default)]
    pub excluded_prefixes: Vec<String>,
    pub quote_validity_seconds: i64,
    pub estimated_minutes: u32,
    pub max_batch_size: usize,
}

impl Default for DeliveryRules {
    fn default() -> Self {
        Self {
            base_fee_cents: 500,
            zone_fees: HashMap::new(),
            excluded_prefixes: Vec::new(),
            quote_validity_seconds: 600,
            estimated_minutes: 40,
            max_batch_size: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    /// Shared key exchanged for an owner token; owner login is off when unset.
    #[serde(default)]
    pub owner_access_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Menu cache lives in Redis when set, in process memory otherwise.
    pub url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `HALAEATS__DATABASE__BACKEND=postgres`
            .add_source(config::Environment::with_prefix("HALAEATS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let raw = r#"
            [server]
            port = 3000

            [database]
            backend = "memory"

            [auth]
            jwt_secret = "dev-secret"
            jwt_expiration_seconds = 3600

            [checkout]
            tax_rate_bps = 1000
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert!(config.database.url.is_none());
        assert!(config.redis.url.is_none());
        assert_eq!(config.checkout.session_ttl_seconds, 1800);
        assert_eq!(config.checkout.max_line_quantity, 50);
        assert_eq!(config.delivery.base_fee_cents, 500);
        assert_eq!(config.delivery.max_batch_size, 8);
        assert!(config.auth.owner_access_key.is_none());
    }
}

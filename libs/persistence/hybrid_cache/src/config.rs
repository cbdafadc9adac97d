use std::time::Duration;

use serde::Deserialize;

use crate::codec::SerializationFormat;

pub trait DbConnectConfig: serde::de::DeserializeOwned {
    fn password(&self) -> Option<&str> { None }
    fn host(&self) -> &str;
    fn port(&self) -> u16;
    fn db(&self) -> u8;
    fn pool_size(&self) -> usize;
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisDbConfig {
    #[serde(default = "host_default")]
    pub host: String,
    #[serde(default = "port_default")]
    pub port: u16,
    #[serde(default = "db_default")]
    pub db: u8,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "pool_size_default")]
    pub pool_size: usize,
}

impl DbConnectConfig for RedisDbConfig {
    fn password(&self) -> Option<&str> { self.password.as_deref() }

    fn host(&self) -> &str { &self.host }

    fn port(&self) -> u16 { self.port }

    fn db(&self) -> u8 { self.db }

    fn pool_size(&self) -> usize { self.pool_size }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CacheConfigError {
    #[error("cache version must be non-empty ASCII without `:`, got `{0}`")]
    Version(String),
    #[error("local_ttl_ratio must be in (0, 1], got {0}")]
    LocalTtlRatio(f64),
    #[error("page_size must be greater than zero")]
    PageSize,
    #[error("max_key_length must be greater than zero")]
    MaxKeyLength,
    #[error("ttl of {0} minutes exceeds the limit of {max} minutes", max = MAX_TTL_MINUTES)]
    Ttl(u64),
}

/// One year.
pub const MAX_TTL_MINUTES: u64 = 365 * 24 * 60;

/// Minutes an entity's list and item reads stay cached.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct EntityTtl {
    pub list_minutes: u64,
    pub item_minutes: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TtlTable {
    #[serde(default = "product_ttl_default")]
    pub product: EntityTtl,
    #[serde(default = "customer_ttl_default")]
    pub customer: EntityTtl,
    #[serde(default = "order_ttl_default")]
    pub order: EntityTtl,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            product: product_ttl_default(),
            customer: customer_ttl_default(),
            order: order_ttl_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "failure_threshold_default")]
    pub failure_threshold: u32,
    #[serde(default = "cooldown_secs_default")]
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: failure_threshold_default(),
            cooldown_secs: cooldown_secs_default(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration { Duration::from_secs(self.cooldown_secs) }
}

/// Immutable snapshot the cache engine is built from.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default = "version_default")]
    pub version: String,
    #[serde(default)]
    pub ttl: TtlTable,
    #[serde(default = "local_ttl_ratio_default")]
    pub local_ttl_ratio: f64,
    #[serde(default = "max_payload_bytes_default")]
    pub max_payload_bytes: usize,
    #[serde(default = "max_key_length_default")]
    pub max_key_length: usize,
    #[serde(default = "max_cached_pages_default")]
    pub max_cached_pages: u32,
    #[serde(default = "page_size_default")]
    pub page_size: u32,
    #[serde(default = "l1_capacity_default")]
    pub l1_capacity: u64,
    #[serde(default)]
    pub serialization: SerializationFormat,
    #[serde(default = "l2_timeout_ms_default")]
    pub l2_timeout_ms: u64,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: enabled_default(),
            version: version_default(),
            ttl: TtlTable::default(),
            local_ttl_ratio: local_ttl_ratio_default(),
            max_payload_bytes: max_payload_bytes_default(),
            max_key_length: max_key_length_default(),
            max_cached_pages: max_cached_pages_default(),
            page_size: page_size_default(),
            l1_capacity: l1_capacity_default(),
            serialization: SerializationFormat::default(),
            l2_timeout_ms: l2_timeout_ms_default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.version.is_empty()
            || !self.version.is_ascii()
            || self.version.contains(crate::key::DELIMITER)
        {
            return Err(CacheConfigError::Version(self.version.clone()));
        }
        if !(self.local_ttl_ratio > 0.0 && self.local_ttl_ratio <= 1.0) {
            return Err(CacheConfigError::LocalTtlRatio(self.local_ttl_ratio));
        }
        if self.page_size == 0 {
            return Err(CacheConfigError::PageSize);
        }
        if self.max_key_length == 0 {
            return Err(CacheConfigError::MaxKeyLength);
        }
        let ttl = &self.ttl;
        for entity in [ttl.product, ttl.customer, ttl.order] {
            for minutes in [entity.list_minutes, entity.item_minutes] {
                if minutes > MAX_TTL_MINUTES {
                    return Err(CacheConfigError::Ttl(minutes));
                }
            }
        }
        Ok(())
    }

    pub fn l2_timeout(&self) -> Duration {
        Duration::from_millis(self.l2_timeout_ms)
    }
}

fn host_default() -> String { "127.0.0.1".into() }
fn port_default() -> u16 { 6379 }
fn db_default() -> u8 { 0 }
fn pool_size_default() -> usize { 16 }
fn enabled_default() -> bool { true }
fn version_default() -> String { "v1".into() }
fn local_ttl_ratio_default() -> f64 { 0.5 }
fn max_payload_bytes_default() -> usize { 1024 * 1024 }
fn max_key_length_default() -> usize { 256 }
fn max_cached_pages_default() -> u32 { 10 }
fn page_size_default() -> u32 { 20 }
fn l1_capacity_default() -> u64 { 10_000 }
fn l2_timeout_ms_default() -> u64 { 250 }
fn failure_threshold_default() -> u32 { 5 }
fn cooldown_secs_default() -> u64 { 30 }
fn product_ttl_default() -> EntityTtl {
    EntityTtl {
        list_minutes: 10,
        item_minutes: 30,
    }
}
fn customer_ttl_default() -> EntityTtl {
    EntityTtl {
        list_minutes: 10,
        item_minutes: 30,
    }
}
fn order_ttl_default() -> EntityTtl {
    EntityTtl {
        list_minutes: 2,
        item_minutes: 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_db_config_default() {
        let config: RedisDbConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6379);
        assert_eq!(config.db, 0);
        assert_eq!(config.password, None);
    }

    #[test]
    fn test_cache_config_defaults_from_empty_document() {
        let config: CacheConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, CacheConfig::default());
        assert!(config.enabled);
        assert_eq!(config.version, "v1");
        assert!(config.ttl.order.item_minutes < config.ttl.product.item_minutes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ttl_override_keeps_other_entities() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"ttl": {"order": {"list_minutes": 1, "item_minutes": 3}}, "serialization": "bincode"}"#,
        )
        .unwrap();

        assert_eq!(config.ttl.order.item_minutes, 3);
        assert_eq!(config.ttl.product, product_ttl_default());
        assert_eq!(config.serialization, SerializationFormat::Bincode);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CacheConfig::default();
        config.local_ttl_ratio = 1.5;
        assert_eq!(
            config.validate(),
            Err(CacheConfigError::LocalTtlRatio(1.5))
        );

        let mut config = CacheConfig::default();
        config.version = "v:2".into();
        assert!(matches!(
            config.validate(),
            Err(CacheConfigError::Version(_))
        ));

        let mut config = CacheConfig::default();
        config.page_size = 0;
        assert_eq!(config.validate(), Err(CacheConfigError::PageSize));

        let mut config = CacheConfig::default();
        config.ttl.order.item_minutes = u64::MAX;
        assert_eq!(config.validate(), Err(CacheConfigError::Ttl(u64::MAX)));
    }
}

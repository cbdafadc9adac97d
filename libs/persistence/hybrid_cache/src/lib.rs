use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use tracing::{info, instrument};
use url::Url;

pub mod codec;
pub mod config;
pub mod engine;
pub mod flight;
pub mod invalidation;
pub mod key;
pub mod tier;
pub mod ttl;

pub use codec::{Codec, CodecError, SerializationFormat};
pub use config::{CacheConfig, CacheConfigError, DbConnectConfig, RedisDbConfig};
pub use engine::{HybridCache, Probe, RemovalReport};
pub use invalidation::{InvalidationEvent, InvalidationPolicy, WriteOperation};
pub use key::{CacheKey, EntityKind, KeyBuilder, KeyError, KeyOperation};
pub use tier::{RemoteTier, TierError};
pub use ttl::TtlPolicy;

#[derive(Debug, thiserror::Error)]
pub enum RedisConnectError {
    #[error("Invalid Redis address: {0}")]
    Address(String),
    #[error(transparent)]
    Pool(#[from] deadpool_redis::CreatePoolError),
}

/// `redis://[:password@]host:port/db` for `config`.
pub fn redis_url<C>(config: &C) -> Result<Url, RedisConnectError>
where
    C: DbConnectConfig,
{
    let invalid = |what: &str| RedisConnectError::Address(what.to_string());
    let mut url = Url::parse("redis://localhost")
        .map_err(|e| RedisConnectError::Address(e.to_string()))?;

    url.set_host(Some(config.host()))
        .map_err(|e| RedisConnectError::Address(e.to_string()))?;
    url.set_port(Some(config.port()))
        .map_err(|_| invalid("port"))?;
    if let Some(password) = config.password() {
        url.set_password(Some(password))
            .map_err(|_| invalid("password"))?;
    }
    url.path_segments_mut()
        .map_err(|_| invalid("database"))?
        .clear()
        .push(&config.db().to_string());

    Ok(url)
}

#[instrument(skip_all, name = "connect-redis")]
pub async fn connect_redis_db<C>(config: &C) -> Result<Pool, RedisConnectError>
where
    C: DbConnectConfig,
{
    let url = redis_url(config)?;

    info!(redis.host = config.host(), redis.db = config.db(), redis.connect = true);

    let cfg = Config {
        url: Some(url.to_string()),
        pool: Some(PoolConfig::new(config.pool_size())),
        connection: None,
    };

    Ok(cfg.create_pool(Some(Runtime::Tokio1))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_construction() {
        let config: RedisDbConfig =
            serde_json::from_str(r#"{"host": "localhost", "db": 2}"#).unwrap();

        assert_eq!(redis_url(&config).unwrap().as_str(), "redis://localhost:6379/2");
    }

    #[test]
    fn test_url_carries_password() {
        let config: RedisDbConfig =
            serde_json::from_str(r#"{"host": "cache", "password": "s3cret"}"#)
                .unwrap();

        assert_eq!(
            redis_url(&config).unwrap().as_str(),
            "redis://:s3cret@cache:6379/0"
        );
    }
}

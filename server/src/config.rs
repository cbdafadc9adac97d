use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use hybrid_cache::{CacheConfig, CacheConfigError, RedisDbConfig};
use serde::Deserialize;
use sql_connection::PostgresDbConfig;

/// Prefix of environment overrides, e.g. `STOREFRONT__CACHE__VERSION=v2`.
pub const ENV_PREFIX: &str = "STOREFRONT";
const DEFAULT_FILE: &str = "storefront.toml";

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("config error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid cache config: {0}")]
    Cache(#[from] CacheConfigError),
    #[error("invalid listen address `{0}`")]
    Address(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "host_default")]
    pub host: String,
    #[serde(default = "port_default")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: host_default(),
            port: port_default(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AppConfigError> {
        let ip = self
            .host
            .parse::<IpAddr>()
            .map_err(|_| AppConfigError::Address(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Everything the binary needs. A missing `redis` section means the cache
/// runs with the local tier only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: PostgresDbConfig,
    #[serde(default)]
    pub redis: Option<RedisDbConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Layers `path` (or `storefront.toml` when present) under
    /// `STOREFRONT__*` variables. `DATABASE_URL` wins over both for the
    /// database URI.
    pub fn load(path: Option<&str>) -> Result<Self, AppConfigError> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );

        let mut config = Self::from_builder(builder)?;
        if let Ok(uri) = std::env::var("DATABASE_URL") {
            config.database.uri = uri;
        }
        Ok(config)
    }

    pub fn from_builder(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<Self, AppConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppConfigError> {
        self.cache.validate()?;
        self.server.socket_addr()?;
        Ok(())
    }
}

fn host_default() -> String { "0.0.0.0".into() }
fn port_default() -> u16 { 8880 }

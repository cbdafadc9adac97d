use std::sync::Arc;

use hybrid_cache::{
    HybridCache, RemoteTier, connect_redis_db,
    tier::{RedisTier, guarded},
};
use storefront::{AppServices, app, config::AppConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config =
        AppConfig::load(std::env::var("STOREFRONT_CONFIG").ok().as_deref())?;

    info!("Initializing connection pools...");
    let db = sql_connection::connect_postgres_db(&config.database).await?;
    if config.database.bootstrap_schema {
        db.ensure_schema().await?;
    }
    info!("PostgreSQL connection pool initialized");

    let remote: Option<Arc<dyn RemoteTier>> = match &config.redis {
        Some(redis_config) => {
            let pool = connect_redis_db(redis_config).await?;
            let tier = RedisTier::new(pool, config.cache.l2_timeout());
            info!("Redis L2 tier initialized");
            Some(guarded(tier, &config.cache.circuit_breaker))
        }
        None => {
            warn!("No Redis configured, caching in process memory only");
            None
        }
    };

    let cache = HybridCache::new(config.cache.clone(), remote)?;
    info!(
        version = cache.keys().version(),
        enabled = cache.is_enabled(),
        "Cache ready"
    );

    let app = app(AppServices::new(db, cache));

    let addr = config.server.socket_addr()?;
    info!("Storefront server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

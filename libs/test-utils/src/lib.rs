pub mod fixtures;
pub mod memory;

use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::Pool as PostgresPool;
use deadpool_redis::{Config as RedisConfig, Pool as RedisPool, Runtime};
pub use fixtures::*;
pub use memory::{MemoryDao, MemoryRecord};
use sql_connection::SqlConnect;
use testcontainers_modules::{
    postgres::Postgres,
    redis::Redis,
    testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner},
};

const READY_ATTEMPTS: u32 = 20;

/// Throwaway PostgreSQL with the storefront schema applied.
pub struct TestPostgresContainer {
    pub pool: PostgresPool,
    pub connection_string: String,
    // Keep the container alive for the lifetime of this struct
    _container: ContainerAsync<Postgres>,
}

impl TestPostgresContainer {
    pub async fn new() -> Result<Self> {
        let container = Postgres::default()
            .with_env_var("POSTGRES_DB", "testdb")
            .with_env_var("POSTGRES_USER", "testuser")
            .with_env_var("POSTGRES_PASSWORD", "testpass")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let connection_string = format!(
            "postgresql://testuser:testpass@{host}:{port}/testdb"
        );

        let pool = sql_connection::build_pool(&connection_string, Some(10))?;
        wait_for_postgres(&pool).await?;

        SqlConnect::new(pool.clone())
            .ensure_schema()
            .await
            .context("Failed to apply schema")?;

        Ok(Self {
            pool,
            connection_string,
            _container: container,
        })
    }

    pub async fn execute_sql(&self, sql: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .batch_execute(sql)
            .await
            .context("Failed to execute SQL")?;
        Ok(())
    }
}

async fn wait_for_postgres(pool: &PostgresPool) -> Result<()> {
    let mut attempts = 0;
    loop {
        let ready = match pool.get().await {
            Ok(client) => client.query_one("SELECT 1", &[]).await.is_ok(),
            Err(_) => false,
        };
        if ready {
            return Ok(());
        }
        attempts += 1;
        if attempts >= READY_ATTEMPTS {
            anyhow::bail!("PostgreSQL not ready after {attempts} attempts");
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

/// Throwaway Redis for exercising the shared cache tier.
pub struct TestRedisContainer {
    pub pool: RedisPool,
    pub connection_string: String,
    // Keep the container alive for the lifetime of this struct
    _container: ContainerAsync<Redis>,
}

impl TestRedisContainer {
    pub async fn new() -> Result<Self> {
        let container = Redis::default()
            .start()
            .await
            .context("Failed to start Redis container")?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(6379).await?;
        let connection_string = format!("redis://{host}:{port}");

        let mut cfg = RedisConfig::from_url(connection_string.as_str());
        cfg.pool = Some(deadpool_redis::PoolConfig::new(10));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .context("Failed to create Redis pool")?;

        let mut attempts = 0;
        loop {
            let ready = match pool.get().await {
                Ok(mut conn) => {
                    deadpool_redis::redis::cmd("PING")
                        .query_async::<()>(&mut conn)
                        .await
                        .is_ok()
                }
                Err(_) => false,
            };
            if ready {
                break;
            }
            attempts += 1;
            if attempts >= READY_ATTEMPTS {
                anyhow::bail!("Redis not ready after {attempts} attempts");
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        Ok(Self {
            pool,
            connection_string,
            _container: container,
        })
    }

    pub async fn flush_all_keys(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        deadpool_redis::redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

/// Create a SQL connection from a test container for use with DAOs and
/// handlers
pub fn create_sql_connect(container: &TestPostgresContainer) -> SqlConnect {
    SqlConnect::new(container.pool.clone())
}

use deadpool_postgres::{Object, Pool};
pub use deadpool_postgres::PoolError;
pub use tokio_postgres::{Error as PgError, Row, error::SqlState};
use tracing::{info, instrument};

pub use config::{DbConnectConfig, DbOptionsConfig, PostgresDbConfig};
pub use connect::{build_pool, connect_postgres_db};

pub mod config;
mod connect;

/// Idempotent DDL for the storefront tables.
pub const SCHEMA: &str = include_str!("schema.sql");

#[derive(Debug, Clone)]
pub struct SqlConnect {
    pool: Pool,
}

impl SqlConnect {
    pub fn new(pool: Pool) -> Self { Self { pool } }

    /// Connection for writes.
    pub async fn get_client(&self) -> Result<Object, PoolError> {
        self.pool.get().await
    }

    /// Connection for reads. Same pool today; kept separate so reads can be
    /// pointed at a replica without touching the stores.
    pub async fn get_read_client(&self) -> Result<Object, PoolError> {
        self.pool.get().await
    }

    /// `(available, size)` of the pool.
    pub fn pool_status(&self) -> (usize, usize) {
        let status = self.pool.status();
        (status.available, status.size)
    }

    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<(), anyhow::Error> {
        let client = self.get_client().await?;
        client.batch_execute(SCHEMA).await?;
        info!("Storefront schema is in place");
        Ok(())
    }
}

/// Whether `err` is Postgres refusing a write over a foreign key.
pub fn is_foreign_key_violation(err: &PgError) -> bool {
    err.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION)
}

pub fn is_unique_violation(err: &PgError) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_config_defaults() {
        let config: PostgresDbConfig = serde_json::from_str("{}").unwrap();

        assert!(config.uri.starts_with("postgresql://"));
        assert!(config.bootstrap_schema);
        assert!(!config.sql_logger());
    }

    #[tokio::test]
    async fn test_build_pool_is_lazy() {
        let pool = build_pool("postgresql://nobody@127.0.0.1:1/none", Some(2))
            .unwrap();

        assert_eq!(pool.status().max_size, 2);
        assert_eq!(pool.status().size, 0);
    }

    #[test]
    fn test_schema_declares_every_table() {
        for table in ["products", "customers", "orders"] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
        }
    }
}

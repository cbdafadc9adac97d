use std::sync::Arc;

use common_errors::AppError;
use hybrid_cache::KeyError;
use sql_connection::{PgError, PoolError};
use thiserror::Error;

/// Clone so one failed load can be handed to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ProductError {
    #[error("Product not found: {product_id}")]
    NotFound { product_id: i64 },
    #[error("Invalid page {page}, pages start at 1")]
    InvalidPage { page: u32 },
    #[error("Invalid product key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("Database error: {0}")]
    Database(Arc<PgError>),
    #[error("Database Pool error: {0}")]
    DatabasePool(Arc<PoolError>),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<PgError> for ProductError {
    fn from(err: PgError) -> Self { Self::Database(Arc::new(err)) }
}

impl From<PoolError> for ProductError {
    fn from(err: PoolError) -> Self { Self::DatabasePool(Arc::new(err)) }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound { product_id } => {
                AppError::not_found(
                    "PRODUCT_NOT_FOUND",
                    &format!("Product with ID {product_id} not found"),
                )
            }
            ProductError::InvalidPage { page } => {
                AppError::bad_request(
                    "INVALID_PAGE",
                    &format!("Page {page} is out of range, pages start at 1"),
                )
            }
            ProductError::InvalidKey(key_err) => {
                AppError::bad_request("INVALID_PRODUCT_ID", &key_err.to_string())
            }
            ProductError::Database(db_err) => {
                AppError::internal_server_error(&format!(
                    "Database error: {db_err}"
                ))
            }
            ProductError::DatabasePool(pool_err) => {
                AppError::internal_server_error(&format!(
                    "Database connection error: {pool_err}"
                ))
            }
            ProductError::InternalError(msg) => {
                AppError::internal_server_error(&format!(
                    "Internal error: {msg}"
                ))
            }
        }
    }
}

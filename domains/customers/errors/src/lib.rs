use std::sync::Arc;

use common_errors::AppError;
use hybrid_cache::KeyError;
use sql_connection::{PgError, PoolError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CustomerError {
    #[error("Customer not found: {customer_id}")]
    NotFound { customer_id: i64 },
    #[error("Email already registered: {email}")]
    EmailExists { email: String },
    #[error("Customer {customer_id} still has orders")]
    HasOrders { customer_id: i64 },
    #[error("Invalid page {page}, pages start at 1")]
    InvalidPage { page: u32 },
    #[error("Invalid customer key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("Database error: {0}")]
    Database(Arc<PgError>),
    #[error("Database Pool error: {0}")]
    DatabasePool(Arc<PoolError>),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<PgError> for CustomerError {
    fn from(err: PgError) -> Self { Self::Database(Arc::new(err)) }
}

impl From<PoolError> for CustomerError {
    fn from(err: PoolError) -> Self { Self::DatabasePool(Arc::new(err)) }
}

impl From<CustomerError> for AppError {
    fn from(err: CustomerError) -> Self {
        match err {
            CustomerError::NotFound { customer_id } => {
                AppError::not_found(
                    "CUSTOMER_NOT_FOUND",
                    &format!("Customer with ID {customer_id} not found"),
                )
            }
            CustomerError::EmailExists { email } => {
                AppError::unprocessable_entity(
                    "CUSTOMER_EMAIL_EXISTS",
                    &format!("A customer with email '{email}' already exists"),
                )
            }
            CustomerError::HasOrders { customer_id } => {
                AppError::unprocessable_entity(
                    "CUSTOMER_HAS_ORDERS",
                    &format!(
                        "Customer {customer_id} cannot be deleted while it has orders"
                    ),
                )
            }
            CustomerError::InvalidPage { page } => {
                AppError::bad_request(
                    "INVALID_PAGE",
                    &format!("Page {page} is out of range, pages start at 1"),
                )
            }
            CustomerError::InvalidKey(key_err) => {
                AppError::bad_request("INVALID_CUSTOMER_ID", &key_err.to_string())
            }
            CustomerError::Database(db_err) => {
                AppError::internal_server_error(&format!(
                    "Database error: {db_err}"
                ))
            }
            CustomerError::DatabasePool(pool_err) => {
                AppError::internal_server_error(&format!(
                    "Database connection error: {pool_err}"
                ))
            }
            CustomerError::InternalError(msg) => {
                AppError::internal_server_error(&format!(
                    "Internal error: {msg}"
                ))
            }
        }
    }
}

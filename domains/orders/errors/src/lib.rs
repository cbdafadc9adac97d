use std::sync::Arc;

use common_errors::AppError;
use hybrid_cache::KeyError;
use sql_connection::{PgError, PoolError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("Order not found: {order_id}")]
    NotFound { order_id: i64 },
    #[error("Customer not found: {customer_id}")]
    UnknownCustomer { customer_id: i64 },
    #[error("Invalid order status stored: {0}")]
    CorruptStatus(String),
    #[error("Invalid page {page}, pages start at 1")]
    InvalidPage { page: u32 },
    #[error("Invalid order key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("Database error: {0}")]
    Database(Arc<PgError>),
    #[error("Database Pool error: {0}")]
    DatabasePool(Arc<PoolError>),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<PgError> for OrderError {
    fn from(err: PgError) -> Self { Self::Database(Arc::new(err)) }
}

impl From<PoolError> for OrderError {
    fn from(err: PoolError) -> Self { Self::DatabasePool(Arc::new(err)) }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound { order_id } => {
                AppError::not_found(
                    "ORDER_NOT_FOUND",
                    &format!("Order with ID {order_id} not found"),
                )
            }
            OrderError::UnknownCustomer { customer_id } => {
                AppError::unprocessable_entity(
                    "ORDER_UNKNOWN_CUSTOMER",
                    &format!("Customer with ID {customer_id} does not exist"),
                )
            }
            OrderError::InvalidPage { page } => {
                AppError::bad_request(
                    "INVALID_PAGE",
                    &format!("Page {page} is out of range, pages start at 1"),
                )
            }
            OrderError::InvalidKey(key_err) => {
                AppError::bad_request("INVALID_ORDER_ID", &key_err.to_string())
            }
            OrderError::CorruptStatus(status) => {
                AppError::internal_server_error(&format!(
                    "Stored order has unknown status `{status}`"
                ))
            }
            OrderError::Database(db_err) => {
                AppError::internal_server_error(&format!(
                    "Database error: {db_err}"
                ))
            }
            OrderError::DatabasePool(pool_err) => {
                AppError::internal_server_error(&format!(
                    "Database connection error: {pool_err}"
                ))
            }
            OrderError::InternalError(msg) => {
                AppError::internal_server_error(&format!(
                    "Internal error: {msg}"
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use common_errors::ErrorKind;

    use super::*;

    #[test]
    fn test_unknown_customer_is_unprocessable() {
        let err: AppError = OrderError::UnknownCustomer { customer_id: 4 }.into();

        assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
        assert_eq!(err.code(), "ORDER_UNKNOWN_CUSTOMER");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod commands;
pub mod queries;
pub mod responses;

pub use commands::{CreateCustomerCommand, UpdateCustomerCommand};
pub use queries::{GetCustomerQuery, ListCustomersQuery};
pub use responses::CustomerResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

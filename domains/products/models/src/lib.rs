use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod commands;
pub mod queries;
pub mod responses;

pub use commands::{CreateProductCommand, UpdateProductCommand};
pub use queries::{GetProductQuery, ListProductsQuery};
pub use responses::ProductResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

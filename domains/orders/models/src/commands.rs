use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::OrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderCommand {
    pub customer_id: i64,
    #[serde(default)]
    pub status: OrderStatus,
    pub total_cents: i64,
}

/// Moving an order to another customer is allowed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderCommand {
    pub customer_id: Option<i64>,
    pub status: Option<OrderStatus>,
    pub total_cents: Option<i64>,
}

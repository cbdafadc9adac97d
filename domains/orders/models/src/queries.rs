use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GetOrderQuery {
    pub order_id: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersQuery {
    /// 1-based page number; omit for the full list.
    pub page: Option<u32>,
}

/// Orders placed by one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByCustomer(pub i64);

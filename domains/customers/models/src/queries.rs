use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GetCustomerQuery {
    pub customer_id: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCustomersQuery {
    /// 1-based page number; omit for the full list.
    pub page: Option<u32>,
}

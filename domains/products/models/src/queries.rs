use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GetProductQuery {
    pub product_id: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListProductsQuery {
    /// 1-based page number; omit for the full list.
    pub page: Option<u32>,
}

use axum::{
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
};
use common_errors::AppError;
use hybrid_cache::HybridCache;
use order_command_handlers::OrderCommandHandler;
use order_models::{
    CreateOrderCommand, GetOrderQuery, ListOrdersQuery, OrderResponse,
    UpdateOrderCommand,
};
use order_query_handlers::OrderQueryHandler;
use sql_connection::SqlConnect;
use tracing::instrument;

#[derive(Clone)]
pub struct OrderServices {
    pub queries: OrderQueryHandler,
    pub commands: OrderCommandHandler,
}

impl OrderServices {
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self {
            queries: OrderQueryHandler::new(db.clone(), cache.clone()),
            commands: OrderCommandHandler::new(db, cache),
        }
    }
}

#[utoipa::path(
    get,
    path = "/orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders, optionally one page", body = Vec<OrderResponse>),
        (status = 400, description = "Invalid page", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn list_orders(
    State(services): State<OrderServices>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let Query(query) = query?;
    let orders = services.queries.list(query).await?;

    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/order/{id}",
    params(
        ("id" = i64, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 400, description = "Invalid order ID", body = common_errors::ApiErrorResponse),
        (status = 404, description = "Order not found", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn get_order(
    State(services): State<OrderServices>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<OrderResponse>, AppError> {
    let Path(order_id) = path?;
    let order = services.queries.get(GetOrderQuery { order_id }).await?;

    Ok(Json(order.into()))
}

#[utoipa::path(
    get,
    path = "/customer/{id}/orders",
    params(
        ("id" = i64, Path, description = "Customer ID")
    ),
    responses(
        (status = 200, description = "Orders placed by the customer", body = Vec<OrderResponse>),
        (status = 400, description = "Invalid customer ID", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn get_customer_orders(
    State(services): State<OrderServices>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let Path(customer_id) = path?;
    let orders = services.queries.get_by_customer(customer_id).await?;

    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/order",
    request_body = CreateOrderCommand,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 422, description = "Invalid body or unknown customer", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn create_order(
    State(services): State<OrderServices>,
    body: Result<Json<CreateOrderCommand>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let Json(command) = body?;
    let order = services.commands.create(command).await?;

    tracing::info!("Order created: {} for customer {}", order.id, order.customer_id);

    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    put,
    path = "/order/{id}",
    request_body = UpdateOrderCommand,
    params(
        ("id" = i64, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 404, description = "Order not found", body = common_errors::ApiErrorResponse),
        (status = 422, description = "Invalid body or unknown customer", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn update_order(
    State(services): State<OrderServices>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateOrderCommand>, JsonRejection>,
) -> Result<Json<OrderResponse>, AppError> {
    let Path(id) = path?;
    let Json(command) = body?;
    let order = services.commands.update(id, command).await?;

    tracing::info!("Order updated: {}", id);

    Ok(Json(order))
}

#[utoipa::path(
    delete,
    path = "/order/{id}",
    params(
        ("id" = i64, Path, description = "Order ID")
    ),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "orders"
)]
#[instrument(skip_all)]
pub async fn delete_order(
    State(services): State<OrderServices>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    services.commands.delete(id).await?;

    tracing::info!("Order deleted: {}", id);

    Ok(StatusCode::NO_CONTENT)
}

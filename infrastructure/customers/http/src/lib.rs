use axum::{
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
};
use common_errors::AppError;
use customer_command_handlers::CustomerCommandHandler;
use customer_models::{
    CreateCustomerCommand, CustomerResponse, GetCustomerQuery,
    ListCustomersQuery, UpdateCustomerCommand,
};
use customer_query_handlers::CustomerQueryHandler;
use hybrid_cache::HybridCache;
use sql_connection::SqlConnect;
use tracing::instrument;

#[derive(Clone)]
pub struct CustomerServices {
    pub queries: CustomerQueryHandler,
    pub commands: CustomerCommandHandler,
}

impl CustomerServices {
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self {
            queries: CustomerQueryHandler::new(db.clone(), cache.clone()),
            commands: CustomerCommandHandler::new(db, cache),
        }
    }
}

#[utoipa::path(
    get,
    path = "/customers",
    params(ListCustomersQuery),
    responses(
        (status = 200, description = "Customers, optionally one page", body = Vec<CustomerResponse>),
        (status = 400, description = "Invalid page", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "customers"
)]
#[instrument(skip_all)]
pub async fn list_customers(
    State(services): State<CustomerServices>,
    query: Result<Query<ListCustomersQuery>, QueryRejection>,
) -> Result<Json<Vec<CustomerResponse>>, AppError> {
    let Query(query) = query?;
    let customers = services.queries.list(query).await?;

    Ok(Json(customers.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/customer/{id}",
    params(
        ("id" = i64, Path, description = "Customer ID")
    ),
    responses(
        (status = 200, description = "Customer found", body = CustomerResponse),
        (status = 400, description = "Invalid customer ID", body = common_errors::ApiErrorResponse),
        (status = 404, description = "Customer not found", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "customers"
)]
#[instrument(skip_all)]
pub async fn get_customer(
    State(services): State<CustomerServices>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<CustomerResponse>, AppError> {
    let Path(customer_id) = path?;
    let customer = services
        .queries
        .get(GetCustomerQuery { customer_id })
        .await?;

    Ok(Json(customer.into()))
}

#[utoipa::path(
    post,
    path = "/customer",
    request_body = CreateCustomerCommand,
    responses(
        (status = 201, description = "Customer created", body = CustomerResponse),
        (status = 422, description = "Invalid body or email already registered", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "customers"
)]
#[instrument(skip_all)]
pub async fn create_customer(
    State(services): State<CustomerServices>,
    body: Result<Json<CreateCustomerCommand>, JsonRejection>,
) -> Result<(StatusCode, Json<CustomerResponse>), AppError> {
    let Json(command) = body?;
    let customer = services.commands.create(command).await?;

    tracing::info!("Customer created: {}", customer.id);

    Ok((StatusCode::CREATED, Json(customer)))
}

#[utoipa::path(
    put,
    path = "/customer/{id}",
    request_body = UpdateCustomerCommand,
    params(
        ("id" = i64, Path, description = "Customer ID")
    ),
    responses(
        (status = 200, description = "Customer updated", body = CustomerResponse),
        (status = 404, description = "Customer not found", body = common_errors::ApiErrorResponse),
        (status = 422, description = "Invalid body or email already registered", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "customers"
)]
#[instrument(skip_all)]
pub async fn update_customer(
    State(services): State<CustomerServices>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateCustomerCommand>, JsonRejection>,
) -> Result<Json<CustomerResponse>, AppError> {
    let Path(id) = path?;
    let Json(command) = body?;
    let customer = services.commands.update(id, command).await?;

    tracing::info!("Customer updated: {}", id);

    Ok(Json(customer))
}

#[utoipa::path(
    delete,
    path = "/customer/{id}",
    params(
        ("id" = i64, Path, description = "Customer ID")
    ),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Customer not found", body = common_errors::ApiErrorResponse),
        (status = 422, description = "Customer still has orders", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "customers"
)]
#[instrument(skip_all)]
pub async fn delete_customer(
    State(services): State<CustomerServices>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    services.commands.delete(id).await?;

    tracing::info!("Customer deleted: {}", id);

    Ok(StatusCode::NO_CONTENT)
}

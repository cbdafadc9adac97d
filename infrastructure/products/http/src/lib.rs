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
use product_command_handlers::ProductCommandHandler;
use product_models::{
    CreateProductCommand, GetProductQuery, ListProductsQuery, ProductResponse,
    UpdateProductCommand,
};
use product_query_handlers::ProductQueryHandler;
use sql_connection::SqlConnect;
use tracing::instrument;

#[derive(Clone)]
pub struct ProductServices {
    pub queries: ProductQueryHandler,
    pub commands: ProductCommandHandler,
}

impl ProductServices {
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self {
            queries: ProductQueryHandler::new(db.clone(), cache.clone()),
            commands: ProductCommandHandler::new(db, cache),
        }
    }
}

#[utoipa::path(
    get,
    path = "/products",
    params(ListProductsQuery),
    responses(
        (status = 200, description = "Products, optionally one page", body = Vec<ProductResponse>),
        (status = 400, description = "Invalid page", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "products"
)]
#[instrument(skip_all)]
pub async fn list_products(
    State(services): State<ProductServices>,
    query: Result<Query<ListProductsQuery>, QueryRejection>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let Query(query) = query?;
    let products = services.queries.list(query).await?;

    Ok(Json(products.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/product/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product found", body = ProductResponse),
        (status = 400, description = "Invalid product ID", body = common_errors::ApiErrorResponse),
        (status = 404, description = "Product not found", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "products"
)]
#[instrument(skip_all)]
pub async fn get_product(
    State(services): State<ProductServices>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ProductResponse>, AppError> {
    let Path(product_id) = path?;
    let product = services.queries.get(GetProductQuery { product_id }).await?;

    Ok(Json(product.into()))
}

#[utoipa::path(
    post,
    path = "/product",
    request_body = CreateProductCommand,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 422, description = "Invalid request body", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "products"
)]
#[instrument(skip_all)]
pub async fn create_product(
    State(services): State<ProductServices>,
    body: Result<Json<CreateProductCommand>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    let Json(command) = body?;
    let product = services.commands.create(command).await?;

    tracing::info!("Product created: {}", product.id);

    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    put,
    path = "/product/{id}",
    request_body = UpdateProductCommand,
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 404, description = "Product not found", body = common_errors::ApiErrorResponse),
        (status = 422, description = "Invalid request body", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "products"
)]
#[instrument(skip_all)]
pub async fn update_product(
    State(services): State<ProductServices>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateProductCommand>, JsonRejection>,
) -> Result<Json<ProductResponse>, AppError> {
    let Path(id) = path?;
    let Json(command) = body?;
    let product = services.commands.update(id, command).await?;

    tracing::info!("Product updated: {}", id);

    Ok(Json(product))
}

#[utoipa::path(
    delete,
    path = "/product/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = common_errors::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = common_errors::ApiErrorResponse)
    ),
    tag = "products"
)]
#[instrument(skip_all)]
pub async fn delete_product(
    State(services): State<ProductServices>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    services.commands.delete(id).await?;

    tracing::info!("Product deleted: {}", id);

    Ok(StatusCode::NO_CONTENT)
}

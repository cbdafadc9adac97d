use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use customer_http::CustomerServices;
use hybrid_cache::HybridCache;
use order_http::OrderServices;
use product_http::ProductServices;
use serde::Serialize;
use sql_connection::SqlConnect;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{OpenApi, ToSchema};
use utoipa_rapidoc::RapiDoc;

pub mod config;

/// State behind `/health`. `db` is absent when the stores are not Postgres.
#[derive(Clone)]
pub struct HealthState {
    pub db: Option<SqlConnect>,
    pub cache: HybridCache,
}

#[derive(Clone)]
pub struct AppServices {
    pub products: ProductServices,
    pub customers: CustomerServices,
    pub orders: OrderServices,
    pub health: HealthState,
}

impl AppServices {
    /// Postgres-backed services sharing one cache.
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self {
            products: ProductServices::new(db.clone(), cache.clone()),
            customers: CustomerServices::new(db.clone(), cache.clone()),
            orders: OrderServices::new(db.clone(), cache.clone()),
            health: HealthState {
                db: Some(db),
                cache,
            },
        }
    }
}

pub fn app(services: AppServices) -> Router {
    let products = Router::new()
        .route("/products", get(product_http::list_products))
        .route("/product", post(product_http::create_product))
        .route(
            "/product/{id}",
            get(product_http::get_product)
                .put(product_http::update_product)
                .delete(product_http::delete_product),
        )
        .with_state(services.products);

    let customers = Router::new()
        .route("/customers", get(customer_http::list_customers))
        .route("/customer", post(customer_http::create_customer))
        .route(
            "/customer/{id}",
            get(customer_http::get_customer)
                .put(customer_http::update_customer)
                .delete(customer_http::delete_customer),
        )
        .with_state(services.customers);

    let orders = Router::new()
        .route("/orders", get(order_http::list_orders))
        .route("/order", post(order_http::create_order))
        .route(
            "/order/{id}",
            get(order_http::get_order)
                .put(order_http::update_order)
                .delete(order_http::delete_order),
        )
        .route("/customer/{id}/orders", get(order_http::get_customer_orders))
        .with_state(services.orders);

    Router::new()
        .route("/health", get(health_check))
        .with_state(services.health)
        .merge(products)
        .merge(customers)
        .merge(orders)
        .merge(RapiDoc::new("/api-docs/openapi.json").path("/docs"))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        product_http::list_products,
        product_http::get_product,
        product_http::create_product,
        product_http::update_product,
        product_http::delete_product,
        customer_http::list_customers,
        customer_http::get_customer,
        customer_http::create_customer,
        customer_http::update_customer,
        customer_http::delete_customer,
        order_http::list_orders,
        order_http::get_order,
        order_http::get_customer_orders,
        order_http::create_order,
        order_http::update_order,
        order_http::delete_order
    ),
    components(
        schemas(
            product_models::ProductResponse,
            product_models::CreateProductCommand,
            product_models::UpdateProductCommand,
            customer_models::CustomerResponse,
            customer_models::CreateCustomerCommand,
            customer_models::UpdateCustomerCommand,
            order_models::OrderResponse,
            order_models::OrderStatus,
            order_models::CreateOrderCommand,
            order_models::UpdateOrderCommand,
            common_errors::ApiErrorResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "products", description = "Product catalogue"),
        (name = "customers", description = "Customer accounts"),
        (name = "orders", description = "Orders and per-customer order lists")
    ),
    info(
        title = "Storefront API",
        description = "Product, customer and order API behind a two-tier read cache",
        version = "1.0.0"
    )
)]
pub struct ApiDoc;

#[derive(Debug, Serialize, ToSchema)]
pub struct PoolHealth {
    pub available: usize,
    pub size: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheHealth {
    pub enabled: bool,
    pub version: String,
    pub remote: bool,
    pub in_flight: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: Option<PoolHealth>,
    pub cache: CacheHealth,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up, with pool and cache status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(health): State<HealthState>) -> Json<HealthResponse> {
    let database = health.db.as_ref().map(|db| {
        let (available, size) = db.pool_status();
        PoolHealth { available, size }
    });
    let cache = &health.cache;

    Json(HealthResponse {
        status: "ok".into(),
        database,
        cache: CacheHealth {
            enabled: cache.is_enabled(),
            version: cache.keys().version().to_string(),
            remote: cache.has_remote(),
            in_flight: cache.in_flight(),
        },
    })
}

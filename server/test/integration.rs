use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use customer_command_handlers::CustomerCommandHandler;
use customer_http::CustomerServices;
use customer_models::Customer;
use customer_query_handlers::CustomerQueryHandler;
use http_body_util::BodyExt;
use hybrid_cache::{CacheConfig, HybridCache, tier::MemoryRemote};
use order_command_handlers::OrderCommandHandler;
use order_http::OrderServices;
use order_models::Order;
use order_query_handlers::OrderQueryHandler;
use product_command_handlers::ProductCommandHandler;
use product_http::ProductServices;
use product_models::Product;
use product_query_handlers::ProductQueryHandler;
use serde_json::{Value, json};
use storefront::{AppServices, HealthState, app};
use test_utils::*;
use tower::ServiceExt;

/// Router over in-memory stores with a shared in-memory L2.
pub struct TestApp {
    pub router: Router,
    pub products: Arc<MemoryDao<Product>>,
    pub customers: Arc<MemoryDao<Customer>>,
    pub orders: Arc<MemoryDao<Order>>,
    pub remote: Arc<MemoryRemote>,
    pub cache: HybridCache,
}

impl TestApp {
    pub fn new() -> Self { Self::with_config(CacheConfig::default()) }

    pub fn with_config(config: CacheConfig) -> Self {
        let remote = Arc::new(MemoryRemote::new());
        let cache = HybridCache::new(config, Some(remote.clone())).unwrap();
        Self::with_remote(cache, remote)
    }

    /// A second instance sharing `remote` but with its own L1.
    pub fn sibling(&self) -> Self {
        let cache = HybridCache::new(
            self.cache.config().clone(),
            Some(self.remote.clone()),
        )
        .unwrap();
        let mut sibling = Self::with_remote(cache, self.remote.clone());
        sibling.products = self.products.clone();
        sibling.customers = self.customers.clone();
        sibling.orders = self.orders.clone();
        sibling.router = Self::router(&sibling);
        sibling
    }

    fn with_remote(cache: HybridCache, remote: Arc<MemoryRemote>) -> Self {
        let mut test_app = Self {
            router: Router::new(),
            products: Arc::new(MemoryDao::new()),
            customers: Arc::new(MemoryDao::new()),
            orders: Arc::new(MemoryDao::new()),
            remote,
            cache,
        };
        test_app.router = Self::router(&test_app);
        test_app
    }

    fn router(test_app: &Self) -> Router {
        let cache = test_app.cache.clone();
        app(AppServices {
            products: ProductServices {
                queries: ProductQueryHandler::with_store(
                    test_app.products.clone(),
                    cache.clone(),
                ),
                commands: ProductCommandHandler::with_store(
                    test_app.products.clone(),
                    cache.clone(),
                ),
            },
            customers: CustomerServices {
                queries: CustomerQueryHandler::with_store(
                    test_app.customers.clone(),
                    cache.clone(),
                ),
                commands: CustomerCommandHandler::with_store(
                    test_app.customers.clone(),
                    cache.clone(),
                ),
            },
            orders: OrderServices {
                queries: OrderQueryHandler::with_store(
                    test_app.orders.clone(),
                    cache.clone(),
                ),
                commands: OrderCommandHandler::with_store(
                    test_app.orders.clone(),
                    cache.clone(),
                ),
            },
            health: HealthState { db: None, cache },
        })
    }

    pub async fn send(
        &self, method: Method, uri: &str, body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => {
                request
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap()
            }
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        }
        else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }
}

#[tokio::test]
async fn test_health_reports_cache_without_database() {
    let test_app = TestApp::new();

    let (status, body) = test_app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["database"].is_null());
    assert_eq!(body["cache"]["version"], "v1");
    assert_eq!(body["cache"]["remote"], true);
}

#[tokio::test]
async fn test_product_crud_round_trip() {
    let test_app = TestApp::new();

    let (status, created) = test_app
        .send(
            Method::POST,
            "/product",
            Some(json!({"name": "Lamp", "price_cents": 2500, "stock": 3})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = test_app.get(&format!("/product/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Lamp");

    let (status, updated) = test_app
        .send(
            Method::PUT,
            &format!("/product/{id}"),
            Some(json!({"price_cents": 1999})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price_cents"], 1999);
    assert_eq!(updated["stock"], 3);

    let (_, fetched) = test_app.get(&format!("/product/{id}")).await;
    assert_eq!(fetched["price_cents"], 1999);

    let (status, _) = test_app
        .send(Method::DELETE, &format!("/product/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = test_app.get(&format!("/product/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "PRODUCT_NOT_FOUND");
}

#[tokio::test]
async fn test_product_5_update_reaches_every_listing() {
    let test_app = TestApp::new();
    test_app
        .products
        .seed((1..=5).map(|i| product_command(&format!("p{i}"), 100 * i)));

    test_app.get("/product/5").await;
    test_app.get("/products").await;
    test_app.get("/products?page=1").await;
    let reads = test_app.products.reads();

    test_app
        .send(
            Method::PUT,
            "/product/5",
            Some(json!({"name": "renamed"})),
        )
        .await;

    let (_, item) = test_app.get("/product/5").await;
    let (_, all) = test_app.get("/products").await;
    let (_, page) = test_app.get("/products?page=1").await;
    assert_eq!(item["name"], "renamed");
    assert_eq!(all[4]["name"], "renamed");
    assert_eq!(page[4]["name"], "renamed");
    assert_eq!(test_app.products.reads(), reads + 3);
}

#[tokio::test]
async fn test_reads_are_served_from_cache() {
    let test_app = TestApp::new();
    test_app.customers.seed([customer_command("Ann", "ann@example.com")]);

    for _ in 0..5 {
        let (status, _) = test_app.get("/customer/1").await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(test_app.customers.reads(), 1);
}

#[tokio::test]
async fn test_second_instance_reads_from_shared_tier() {
    let first = TestApp::new();
    first.products.seed([product_command("Lamp", 2500)]);
    let second = first.sibling();

    first.get("/product/1").await;
    let (status, body) = second.get("/product/1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Lamp");
    assert_eq!(first.products.reads(), 1);
}

#[tokio::test]
async fn test_order_moves_between_customer_listings() {
    let test_app = TestApp::new();
    test_app.customers.seed([
        customer_command("Ann", "ann@example.com"),
        customer_command("Bob", "bob@example.com"),
    ]);
    test_app
        .orders
        .seed((0..10).map(|_| order_command(1, 500)));

    let (_, before) = test_app.get("/customer/1/orders").await;
    assert_eq!(before.as_array().unwrap().len(), 10);
    let (_, empty) = test_app.get("/customer/2/orders").await;
    assert!(empty.as_array().unwrap().is_empty());

    let (status, moved) = test_app
        .send(
            Method::PUT,
            "/order/10",
            Some(json!({"customer_id": 2, "status": "shipped"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["status"], "shipped");

    let (_, first) = test_app.get("/customer/1/orders").await;
    let (_, second) = test_app.get("/customer/2/orders").await;
    assert_eq!(first.as_array().unwrap().len(), 9);
    assert_eq!(second[0]["id"], 10);
}

#[tokio::test]
async fn test_bad_input_uses_error_envelope() {
    let test_app = TestApp::new();

    let (status, body) = test_app.get("/product/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PATH");

    let (status, body) = test_app.get("/products?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PAGE");

    let (status, body) = test_app.get("/order/-4").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ORDER_ID");

    let (status, body) = test_app
        .send(Method::POST, "/customer", Some(json!({"name": "no email"})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_store_outage_is_a_server_error_and_not_cached() {
    let test_app = TestApp::new();
    test_app.products.seed([product_command("Lamp", 2500)]);
    test_app.products.set_failing(true);

    let (status, body) = test_app.get("/product/1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");

    test_app.products.set_failing(false);
    let (status, _) = test_app.get("/product/1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_cache_still_serves_requests() {
    let test_app = TestApp::with_config(CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    });
    test_app.orders.seed([order_command(1, 100)]);

    test_app.get("/orders").await;
    let (status, body) = test_app.get("/orders").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(test_app.orders.reads(), 2);
    assert!(test_app.remote.is_empty());
}

#[tokio::test]
#[ignore = "needs docker"]
async fn test_postgres_and_redis_end_to_end() {
    use hybrid_cache::tier::RedisTier;
    use std::time::Duration;

    let postgres = TestPostgresContainer::new().await.unwrap();
    let redis = TestRedisContainer::new().await.unwrap();
    let tier = RedisTier::new(redis.pool.clone(), Duration::from_millis(500));
    let cache =
        HybridCache::new(CacheConfig::default(), Some(Arc::new(tier))).unwrap();
    let router = app(AppServices::new(create_sql_connect(&postgres), cache));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/customer")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"name": "Ann", "email": "ann@example.com"}).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/order")
        .header("content-type", "application/json")
        .body(Body::from(json!({"customer_id": 999, "total_cents": 1}).to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let request = Request::builder()
        .uri("/customer/1")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cached_not_found_is_cleared_by_create() {
    let test_app = TestApp::new();

    let (status, _) = test_app.get("/customer/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = test_app
        .send(
            Method::POST,
            "/customer",
            Some(json!({"name": "Ann", "email": "ann@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = test_app.get("/customer/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ann@example.com");
}

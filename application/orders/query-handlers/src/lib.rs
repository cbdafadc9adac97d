use std::sync::Arc;

use database_traits::dao::{FindByDao, GenericDao};
use hybrid_cache::{EntityKind, HybridCache, KeyOperation};
use order_dao::{OrderDao, OrderStore};
use order_errors::OrderError;
use order_models::{ByCustomer, GetOrderQuery, ListOrdersQuery, Order};
use sql_connection::SqlConnect;
use tracing::{debug, instrument};

const ENTITY: EntityKind = EntityKind::Order;

/// Cached order reads, including the per-customer listing.
#[derive(Clone)]
pub struct OrderQueryHandler {
    store: Arc<dyn OrderStore>,
    cache: HybridCache,
}

impl OrderQueryHandler {
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self::with_store(Arc::new(OrderDao::new(db)), cache)
    }

    pub fn with_store(store: Arc<dyn OrderStore>, cache: HybridCache) -> Self {
        Self { store, cache }
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<Order>, OrderError> {
        let key = self.cache.keys().all(ENTITY)?;
        let store = self.store.clone();

        self.cache
            .get_or_create(&key, self.cache.ttl().list(ENTITY), move || {
                async move { store.all().await }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_page(&self, page: u32) -> Result<Vec<Order>, OrderError> {
        if page == 0 {
            return Err(OrderError::InvalidPage { page });
        }
        let size = self.cache.config().page_size;
        let store = self.store.clone();
        let load = move || async move { store.page(page, size).await };

        if !self.cache.caches_page(page) {
            debug!("Page {page} is past the cached range, reading store");
            return load().await;
        }
        let key = self.cache.keys().page(ENTITY, page)?;
        self.cache
            .get_or_create(&key, self.cache.ttl().list(ENTITY), load)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, order_id: i64) -> Result<Order, OrderError> {
        let key = self.cache.keys().item(ENTITY, order_id)?;
        let store = self.store.clone();

        self.cache
            .get_or_create(&key, self.cache.ttl().item(ENTITY), move || {
                async move { store.find_by_id(order_id).await }
            })
            .await?
            .ok_or(OrderError::NotFound { order_id })
    }

    /// Orders placed by `customer_id`. An unknown customer has no orders.
    #[instrument(skip(self))]
    pub async fn get_by_customer(
        &self, customer_id: i64,
    ) -> Result<Vec<Order>, OrderError> {
        let key = self
            .cache
            .keys()
            .related(ENTITY, EntityKind::Customer, customer_id)?;
        let ttl = self
            .cache
            .ttl()
            .for_operation(ENTITY, KeyOperation::By(EntityKind::Customer));
        let store = self.store.clone();

        self.cache
            .get_or_create(&key, ttl, move || {
                async move { store.find_by(ByCustomer(customer_id)).await }
            })
            .await
    }

    pub async fn get(&self, query: GetOrderQuery) -> Result<Order, OrderError> {
        self.get_by_id(query.order_id).await
    }

    pub async fn list(
        &self, query: ListOrdersQuery,
    ) -> Result<Vec<Order>, OrderError> {
        match query.page {
            Some(page) => self.get_page(page).await,
            None => self.get_all().await,
        }
    }
}

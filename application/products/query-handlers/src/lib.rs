use std::sync::Arc;

use database_traits::dao::GenericDao;
use hybrid_cache::{EntityKind, HybridCache};
use product_dao::{ProductDao, ProductStore};
use product_errors::ProductError;
use product_models::{GetProductQuery, ListProductsQuery, Product};
use sql_connection::SqlConnect;
use tracing::{debug, instrument};

const ENTITY: EntityKind = EntityKind::Product;

/// Cached product reads.
#[derive(Clone)]
pub struct ProductQueryHandler {
    store: Arc<dyn ProductStore>,
    cache: HybridCache,
}

impl ProductQueryHandler {
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self::with_store(Arc::new(ProductDao::new(db)), cache)
    }

    pub fn with_store(store: Arc<dyn ProductStore>, cache: HybridCache) -> Self {
        Self { store, cache }
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<Product>, ProductError> {
        let key = self.cache.keys().all(ENTITY)?;
        let store = self.store.clone();

        self.cache
            .get_or_create(&key, self.cache.ttl().list(ENTITY), move || {
                async move { store.all().await }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_page(&self, page: u32) -> Result<Vec<Product>, ProductError> {
        if page == 0 {
            return Err(ProductError::InvalidPage { page });
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
    pub async fn get_by_id(&self, product_id: i64) -> Result<Product, ProductError> {
        let key = self.cache.keys().item(ENTITY, product_id)?;
        let store = self.store.clone();

        self.cache
            .get_or_create(&key, self.cache.ttl().item(ENTITY), move || {
                async move { store.find_by_id(product_id).await }
            })
            .await?
            .ok_or(ProductError::NotFound { product_id })
    }

    pub async fn get(&self, query: GetProductQuery) -> Result<Product, ProductError> {
        self.get_by_id(query.product_id).await
    }

    /// Full list, or one page when `page` is set.
    pub async fn list(
        &self, query: ListProductsQuery,
    ) -> Result<Vec<Product>, ProductError> {
        match query.page {
            Some(page) => self.get_page(page).await,
            None => self.get_all().await,
        }
    }
}

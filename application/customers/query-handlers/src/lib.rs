use std::sync::Arc;

use customer_dao::{CustomerDao, CustomerStore};
use customer_errors::CustomerError;
use customer_models::{Customer, GetCustomerQuery, ListCustomersQuery};
use database_traits::dao::GenericDao;
use hybrid_cache::{EntityKind, HybridCache};
use sql_connection::SqlConnect;
use tracing::{debug, instrument};

const ENTITY: EntityKind = EntityKind::Customer;

#[derive(Clone)]
pub struct CustomerQueryHandler {
    store: Arc<dyn CustomerStore>,
    cache: HybridCache,
}

impl CustomerQueryHandler {
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self::with_store(Arc::new(CustomerDao::new(db)), cache)
    }

    pub fn with_store(store: Arc<dyn CustomerStore>, cache: HybridCache) -> Self {
        Self { store, cache }
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<Customer>, CustomerError> {
        let key = self.cache.keys().all(ENTITY)?;
        let store = self.store.clone();

        self.cache
            .get_or_create(&key, self.cache.ttl().list(ENTITY), move || {
                async move { store.all().await }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_page(&self, page: u32) -> Result<Vec<Customer>, CustomerError> {
        if page == 0 {
            return Err(CustomerError::InvalidPage { page });
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
    pub async fn get_by_id(
        &self, customer_id: i64,
    ) -> Result<Customer, CustomerError> {
        let key = self.cache.keys().item(ENTITY, customer_id)?;
        let store = self.store.clone();

        self.cache
            .get_or_create(&key, self.cache.ttl().item(ENTITY), move || {
                async move { store.find_by_id(customer_id).await }
            })
            .await?
            .ok_or(CustomerError::NotFound { customer_id })
    }

    pub async fn get(
        &self, query: GetCustomerQuery,
    ) -> Result<Customer, CustomerError> {
        self.get_by_id(query.customer_id).await
    }

    pub async fn list(
        &self, query: ListCustomersQuery,
    ) -> Result<Vec<Customer>, CustomerError> {
        match query.page {
            Some(page) => self.get_page(page).await,
            None => self.get_all().await,
        }
    }
}

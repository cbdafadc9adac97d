use std::sync::Arc;

use customer_dao::{CustomerDao, CustomerStore};
use customer_errors::CustomerError;
use customer_models::{
    CreateCustomerCommand, CustomerResponse, UpdateCustomerCommand,
};
use database_traits::dao::GenericDao;
use hybrid_cache::{EntityKind, HybridCache, InvalidationEvent};
use sql_connection::SqlConnect;
use tracing::{instrument, warn};

const ENTITY: EntityKind = EntityKind::Customer;

#[derive(Clone)]
pub struct CustomerCommandHandler {
    store: Arc<dyn CustomerStore>,
    cache: HybridCache,
}

impl CustomerCommandHandler {
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self::with_store(Arc::new(CustomerDao::new(db)), cache)
    }

    pub fn with_store(store: Arc<dyn CustomerStore>, cache: HybridCache) -> Self {
        Self { store, cache }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self, command: CreateCustomerCommand,
    ) -> Result<CustomerResponse, CustomerError> {
        let customer = self.store.create(command).await?;

        self.invalidate(InvalidationEvent::created(ENTITY, customer.id))
            .await;
        Ok(customer.into())
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self, customer_id: i64, command: UpdateCustomerCommand,
    ) -> Result<CustomerResponse, CustomerError> {
        let change = self
            .store
            .update(customer_id, command)
            .await?
            .ok_or(CustomerError::NotFound { customer_id })?;

        self.invalidate(InvalidationEvent::updated(ENTITY, customer_id))
            .await;
        Ok(change.after.into())
    }

    /// Refused with `HasOrders` while the customer still owns orders.
    #[instrument(skip(self))]
    pub async fn delete(&self, customer_id: i64) -> Result<(), CustomerError> {
        self.store
            .delete(customer_id)
            .await?
            .ok_or(CustomerError::NotFound { customer_id })?;

        self.invalidate(InvalidationEvent::deleted(ENTITY, customer_id))
            .await;
        Ok(())
    }

    async fn invalidate(&self, event: InvalidationEvent) {
        let report = self.cache.invalidate(&event).await;
        if !report.is_clean() {
            warn!(
                failed = report.failures.len(),
                "Customer invalidation incomplete"
            );
        }
    }
}

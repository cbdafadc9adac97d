use std::sync::Arc;

use database_traits::dao::GenericDao;
use hybrid_cache::{EntityKind, HybridCache, InvalidationEvent};
use order_dao::{OrderDao, OrderStore};
use order_errors::OrderError;
use order_models::{CreateOrderCommand, OrderResponse, UpdateOrderCommand};
use sql_connection::SqlConnect;
use tracing::{instrument, warn};

const ENTITY: EntityKind = EntityKind::Order;

/// Order writes. Events carry the owning customer on both sides of the
/// write so the per-customer listings of the old and new owner are dropped.
#[derive(Clone)]
pub struct OrderCommandHandler {
    store: Arc<dyn OrderStore>,
    cache: HybridCache,
}

impl OrderCommandHandler {
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self::with_store(Arc::new(OrderDao::new(db)), cache)
    }

    pub fn with_store(store: Arc<dyn OrderStore>, cache: HybridCache) -> Self {
        Self { store, cache }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self, command: CreateOrderCommand,
    ) -> Result<OrderResponse, OrderError> {
        let order = self.store.create(command).await?;

        let event = InvalidationEvent::created(ENTITY, order.id)
            .with_related(EntityKind::Customer, order.customer_id);
        self.invalidate(event).await;
        Ok(order.into())
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self, order_id: i64, command: UpdateOrderCommand,
    ) -> Result<OrderResponse, OrderError> {
        let change = self
            .store
            .update(order_id, command)
            .await?
            .ok_or(OrderError::NotFound { order_id })?;

        let event = InvalidationEvent::updated(ENTITY, order_id)
            .with_related(EntityKind::Customer, change.before.customer_id)
            .with_related(EntityKind::Customer, change.after.customer_id);
        self.invalidate(event).await;
        Ok(change.after.into())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, order_id: i64) -> Result<(), OrderError> {
        let removed = self
            .store
            .delete(order_id)
            .await?
            .ok_or(OrderError::NotFound { order_id })?;

        let event = InvalidationEvent::deleted(ENTITY, order_id)
            .with_related(EntityKind::Customer, removed.customer_id);
        self.invalidate(event).await;
        Ok(())
    }

    async fn invalidate(&self, event: InvalidationEvent) {
        let report = self.cache.invalidate(&event).await;
        if !report.is_clean() {
            warn!(failed = report.failures.len(), "Order invalidation incomplete");
        }
    }
}

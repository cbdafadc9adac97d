use std::sync::Arc;

use database_traits::dao::GenericDao;
use hybrid_cache::{EntityKind, HybridCache, InvalidationEvent};
use product_dao::{ProductDao, ProductStore};
use product_errors::ProductError;
use product_models::{CreateProductCommand, ProductResponse, UpdateProductCommand};
use sql_connection::SqlConnect;
use tracing::{instrument, warn};

const ENTITY: EntityKind = EntityKind::Product;

/// Product writes. Each committed write invalidates the keys it made stale
/// before returning.
#[derive(Clone)]
pub struct ProductCommandHandler {
    store: Arc<dyn ProductStore>,
    cache: HybridCache,
}

impl ProductCommandHandler {
    pub fn new(db: SqlConnect, cache: HybridCache) -> Self {
        Self::with_store(Arc::new(ProductDao::new(db)), cache)
    }

    pub fn with_store(store: Arc<dyn ProductStore>, cache: HybridCache) -> Self {
        Self { store, cache }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self, command: CreateProductCommand,
    ) -> Result<ProductResponse, ProductError> {
        let product = self.store.create(command).await?;

        self.invalidate(InvalidationEvent::created(ENTITY, product.id)).await;
        Ok(product.into())
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self, product_id: i64, command: UpdateProductCommand,
    ) -> Result<ProductResponse, ProductError> {
        let change = self
            .store
            .update(product_id, command)
            .await?
            .ok_or(ProductError::NotFound { product_id })?;

        self.invalidate(InvalidationEvent::updated(ENTITY, product_id)).await;
        Ok(change.after.into())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: i64) -> Result<(), ProductError> {
        self.store
            .delete(product_id)
            .await?
            .ok_or(ProductError::NotFound { product_id })?;

        self.invalidate(InvalidationEvent::deleted(ENTITY, product_id)).await;
        Ok(())
    }

    async fn invalidate(&self, event: InvalidationEvent) {
        let report = self.cache.invalidate(&event).await;
        if !report.is_clean() {
            warn!(
                failed = report.failures.len(),
                attempted = report.attempted,
                "Product invalidation incomplete, stale entries expire by TTL"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use hybrid_cache::{CacheConfig, tier::MemoryRemote};
    use product_models::Product;
    use product_query_handlers::ProductQueryHandler;
    use test_utils::*;

    use super::*;

    struct Harness {
        dao: Arc<MemoryDao<Product>>,
        queries: ProductQueryHandler,
        commands: ProductCommandHandler,
    }

    fn harness() -> Harness {
        let dao = Arc::new(MemoryDao::<Product>::new());
        let cache = HybridCache::new(
            CacheConfig::default(),
            Some(Arc::new(MemoryRemote::new())),
        )
        .unwrap();
        Harness {
            queries: ProductQueryHandler::with_store(dao.clone(), cache.clone()),
            commands: ProductCommandHandler::with_store(dao.clone(), cache),
            dao,
        }
    }

    #[tokio::test]
    async fn test_update_is_visible_on_every_read_path() {
        let Harness {
            dao,
            queries,
            commands,
        } = harness();
        dao.seed((1..=5).map(|i| product_command(&format!("p{i}"), 100 * i)));

        queries.get_by_id(5).await.unwrap();
        queries.get_all().await.unwrap();
        queries.get_page(1).await.unwrap();

        commands
            .update(
                5,
                UpdateProductCommand {
                    price_cents: Some(999),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(queries.get_by_id(5).await.unwrap().price_cents, 999);
        let all = queries.get_all().await.unwrap();
        assert_eq!(all.iter().find(|p| p.id == 5).unwrap().price_cents, 999);
        let page = queries.get_page(1).await.unwrap();
        assert_eq!(page.iter().find(|p| p.id == 5).unwrap().price_cents, 999);
    }

    #[tokio::test]
    async fn test_create_refreshes_list() {
        let Harness {
            queries, commands, ..
        } = harness();
        assert!(queries.get_all().await.unwrap().is_empty());

        let created = commands.create(product_command("Lamp", 2500)).await.unwrap();

        assert_eq!(created.name, "Lamp");
        assert_eq!(queries.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_turns_cached_item_into_not_found() {
        let Harness {
            dao,
            queries,
            commands,
        } = harness();
        dao.seed([product_command("Lamp", 2500)]);
        queries.get_by_id(1).await.unwrap();

        commands.delete(1).await.unwrap();

        assert!(matches!(
            queries.get_by_id(1).await,
            Err(ProductError::NotFound { product_id: 1 })
        ));
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let Harness { commands, .. } = harness();

        assert!(matches!(
            commands.update(9, UpdateProductCommand::default()).await,
            Err(ProductError::NotFound { product_id: 9 })
        ));
        assert!(matches!(
            commands.delete(9).await,
            Err(ProductError::NotFound { product_id: 9 })
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let Harness {
            dao,
            queries,
            commands,
        } = harness();
        dao.seed([product_command("Lamp", 2500)]);
        queries.get_all().await.unwrap();
        dao.set_failing(true);

        assert!(commands.create(product_command("Desk", 9000)).await.is_err());

        assert_eq!(queries.get_all().await.unwrap().len(), 1);
        assert_eq!(dao.reads(), 1);
    }
}

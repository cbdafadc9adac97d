use async_trait::async_trait;

/// State of a row on both sides of a committed update.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<M> {
    pub before: M,
    pub after: M,
}

/// Backing-store contract every entity store fulfils.
///
/// Mutations hand back the state the caller needs to work out what a write
/// touched: `update` yields before and after, `delete` the removed row.
/// `None` means no row had that id.
#[async_trait]
pub trait GenericDao: Send + Sync {
    type Model: Send + Sync + 'static;
    type CreateRequest: Send + Sync + 'static;
    type UpdateRequest: Send + Sync + 'static;
    type Error: Send + 'static;
    type ID: Copy + Send + Sync + 'static;

    async fn find_by_id(
        &self, id: Self::ID,
    ) -> Result<Option<Self::Model>, Self::Error>;

    async fn all(&self) -> Result<Vec<Self::Model>, Self::Error>;

    /// 1-based page of `size` rows in id order.
    async fn page(
        &self, page: u32, size: u32,
    ) -> Result<Vec<Self::Model>, Self::Error>;

    async fn create(
        &self, req: Self::CreateRequest,
    ) -> Result<Self::Model, Self::Error>;

    async fn update(
        &self, id: Self::ID, req: Self::UpdateRequest,
    ) -> Result<Option<Change<Self::Model>>, Self::Error>;

    async fn delete(
        &self, id: Self::ID,
    ) -> Result<Option<Self::Model>, Self::Error>;
}

/// Secondary lookup by a typed filter, e.g. orders of one customer.
#[async_trait]
pub trait FindByDao<F>: GenericDao
where
    F: Send + Sync + 'static,
{
    async fn find_by(&self, filter: F) -> Result<Vec<Self::Model>, Self::Error>;
}

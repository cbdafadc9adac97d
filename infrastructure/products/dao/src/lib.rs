use async_trait::async_trait;
use database_traits::{
    dao::{Change, GenericDao},
    page_offset,
};
use product_errors::ProductError;
use product_models::{CreateProductCommand, Product, UpdateProductCommand};
use sql_connection::{Row, SqlConnect};
use tracing::instrument;

/// Anything that stores products, Postgres or otherwise.
pub trait ProductStore:
    GenericDao<
        Model = Product,
        CreateRequest = CreateProductCommand,
        UpdateRequest = UpdateProductCommand,
        Error = ProductError,
        ID = i64,
    >
{
}

impl<T> ProductStore for T where
    T: GenericDao<
            Model = Product,
            CreateRequest = CreateProductCommand,
            UpdateRequest = UpdateProductCommand,
            Error = ProductError,
            ID = i64,
        >
{
}

const COLUMNS: &str =
    "id, name, description, price_cents, stock, created_at, updated_at";

#[derive(Clone)]
pub struct ProductDao {
    db: SqlConnect,
}

impl ProductDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    pub fn db(&self) -> &SqlConnect { &self.db }

    fn map_row(row: &Row, offset: usize) -> Product {
        Product {
            id: row.get(offset),
            name: row.get(offset + 1),
            description: row.get(offset + 2),
            price_cents: row.get(offset + 3),
            stock: row.get(offset + 4),
            created_at: row.get(offset + 5),
            updated_at: row.get(offset + 6),
        }
    }
}

#[async_trait]
impl GenericDao for ProductDao {
    type CreateRequest = CreateProductCommand;
    type Error = ProductError;
    type ID = i64;
    type Model = Product;
    type UpdateRequest = UpdateProductCommand;

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, ProductError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!("SELECT {COLUMNS} FROM products WHERE id = $1"))
            .await?;
        let rows = client.query(&stmt, &[&id]).await?;

        Ok(rows.first().map(|row| Self::map_row(row, 0)))
    }

    #[instrument(skip(self))]
    async fn all(&self) -> Result<Vec<Product>, ProductError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!("SELECT {COLUMNS} FROM products ORDER BY id ASC"))
            .await?;
        let rows = client.query(&stmt, &[]).await?;

        Ok(rows.iter().map(|row| Self::map_row(row, 0)).collect())
    }

    #[instrument(skip(self))]
    async fn page(&self, page: u32, size: u32) -> Result<Vec<Product>, ProductError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "SELECT {COLUMNS} FROM products ORDER BY id ASC LIMIT $1 OFFSET $2"
            ))
            .await?;
        let limit = i64::from(size);
        let offset = page_offset(page, size);
        let rows = client.query(&stmt, &[&limit, &offset]).await?;

        Ok(rows.iter().map(|row| Self::map_row(row, 0)).collect())
    }

    #[instrument(skip(self))]
    async fn create(&self, req: CreateProductCommand) -> Result<Product, ProductError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "INSERT INTO products (name, description, price_cents, stock)
                 VALUES ($1, $2, $3, $4)
                 RETURNING {COLUMNS}"
            ))
            .await?;
        let row = client
            .query_one(
                &stmt,
                &[&req.name, &req.description, &req.price_cents, &req.stock],
            )
            .await?;

        Ok(Self::map_row(&row, 0))
    }

    #[instrument(skip(self))]
    async fn update(
        &self, id: i64, req: UpdateProductCommand,
    ) -> Result<Option<Change<Product>>, ProductError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "WITH old_row AS (
                     SELECT {COLUMNS} FROM products WHERE id = $1 FOR UPDATE
                 ),
                 new_row AS (
                     UPDATE products SET
                         name = COALESCE($2, name),
                         description = COALESCE($3, description),
                         price_cents = COALESCE($4, price_cents),
                         stock = COALESCE($5, stock),
                         updated_at = now()
                     WHERE id = $1
                     RETURNING {COLUMNS}
                 )
                 SELECT o.*, n.* FROM old_row o JOIN new_row n ON n.id = o.id"
            ))
            .await?;
        let rows = client
            .query(
                &stmt,
                &[
                    &id,
                    &req.name,
                    &req.description,
                    &req.price_cents,
                    &req.stock,
                ],
            )
            .await?;

        Ok(rows.first().map(|row| {
            Change {
                before: Self::map_row(row, 0),
                after: Self::map_row(row, 7),
            }
        }))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<Option<Product>, ProductError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "DELETE FROM products WHERE id = $1 RETURNING {COLUMNS}"
            ))
            .await?;
        let rows = client.query(&stmt, &[&id]).await?;

        Ok(rows.first().map(|row| Self::map_row(row, 0)))
    }
}

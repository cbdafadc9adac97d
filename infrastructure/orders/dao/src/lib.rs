use async_trait::async_trait;
use database_traits::{
    dao::{Change, FindByDao, GenericDao},
    page_offset,
};
use order_errors::OrderError;
use order_models::{
    ByCustomer, CreateOrderCommand, Order, OrderStatus, UpdateOrderCommand,
};
use sql_connection::{PgError, Row, SqlConnect, is_foreign_key_violation};
use tracing::instrument;

/// Order storage with the by-customer secondary lookup.
pub trait OrderStore:
    GenericDao<
        Model = Order,
        CreateRequest = CreateOrderCommand,
        UpdateRequest = UpdateOrderCommand,
        Error = OrderError,
        ID = i64,
    > + FindByDao<ByCustomer>
{
}

impl<T> OrderStore for T where
    T: GenericDao<
            Model = Order,
            CreateRequest = CreateOrderCommand,
            UpdateRequest = UpdateOrderCommand,
            Error = OrderError,
            ID = i64,
        > + FindByDao<ByCustomer>
{
}

const COLUMNS: &str =
    "id, customer_id, status, total_cents, created_at, updated_at";

#[derive(Clone)]
pub struct OrderDao {
    db: SqlConnect,
}

impl OrderDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    fn map_row(row: &Row, offset: usize) -> Result<Order, OrderError> {
        let status: String = row.get(offset + 2);
        Ok(Order {
            id: row.get(offset),
            customer_id: row.get(offset + 1),
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| OrderError::CorruptStatus(e.0))?,
            total_cents: row.get(offset + 3),
            created_at: row.get(offset + 4),
            updated_at: row.get(offset + 5),
        })
    }

    fn map_rows(rows: &[Row]) -> Result<Vec<Order>, OrderError> {
        rows.iter().map(|row| Self::map_row(row, 0)).collect()
    }
}

fn unknown_customer(err: PgError, customer_id: Option<i64>) -> OrderError {
    match customer_id {
        Some(customer_id) if is_foreign_key_violation(&err) => {
            OrderError::UnknownCustomer { customer_id }
        }
        _ => err.into(),
    }
}

#[async_trait]
impl GenericDao for OrderDao {
    type CreateRequest = CreateOrderCommand;
    type Error = OrderError;
    type ID = i64;
    type Model = Order;
    type UpdateRequest = UpdateOrderCommand;

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, OrderError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!("SELECT {COLUMNS} FROM orders WHERE id = $1"))
            .await?;
        let rows = client.query(&stmt, &[&id]).await?;

        rows.first().map(|row| Self::map_row(row, 0)).transpose()
    }

    #[instrument(skip(self))]
    async fn all(&self) -> Result<Vec<Order>, OrderError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!("SELECT {COLUMNS} FROM orders ORDER BY id ASC"))
            .await?;
        let rows = client.query(&stmt, &[]).await?;

        Self::map_rows(&rows)
    }

    #[instrument(skip(self))]
    async fn page(&self, page: u32, size: u32) -> Result<Vec<Order>, OrderError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "SELECT {COLUMNS} FROM orders ORDER BY id ASC LIMIT $1 OFFSET $2"
            ))
            .await?;
        let limit = i64::from(size);
        let offset = page_offset(page, size);
        let rows = client.query(&stmt, &[&limit, &offset]).await?;

        Self::map_rows(&rows)
    }

    #[instrument(skip(self))]
    async fn create(&self, req: CreateOrderCommand) -> Result<Order, OrderError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "INSERT INTO orders (customer_id, status, total_cents)
                 VALUES ($1, $2, $3)
                 RETURNING {COLUMNS}"
            ))
            .await?;
        let row = client
            .query_one(
                &stmt,
                &[&req.customer_id, &req.status.as_str(), &req.total_cents],
            )
            .await
            .map_err(|e| unknown_customer(e, Some(req.customer_id)))?;

        Self::map_row(&row, 0)
    }

    #[instrument(skip(self))]
    async fn update(
        &self, id: i64, req: UpdateOrderCommand,
    ) -> Result<Option<Change<Order>>, OrderError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "WITH old_row AS (
                     SELECT {COLUMNS} FROM orders WHERE id = $1 FOR UPDATE
                 ),
                 new_row AS (
                     UPDATE orders SET
                         customer_id = COALESCE($2, customer_id),
                         status = COALESCE($3, status),
                         total_cents = COALESCE($4, total_cents),
                         updated_at = now()
                     WHERE id = $1
                     RETURNING {COLUMNS}
                 )
                 SELECT o.*, n.* FROM old_row o JOIN new_row n ON n.id = o.id"
            ))
            .await?;
        let status = req.status.map(|status| status.as_str());
        let rows = client
            .query(&stmt, &[&id, &req.customer_id, &status, &req.total_cents])
            .await
            .map_err(|e| unknown_customer(e, req.customer_id))?;

        rows.first()
            .map(|row| {
                Ok(Change {
                    before: Self::map_row(row, 0)?,
                    after: Self::map_row(row, 6)?,
                })
            })
            .transpose()
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<Option<Order>, OrderError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "DELETE FROM orders WHERE id = $1 RETURNING {COLUMNS}"
            ))
            .await?;
        let rows = client.query(&stmt, &[&id]).await?;

        rows.first().map(|row| Self::map_row(row, 0)).transpose()
    }
}

#[async_trait]
impl FindByDao<ByCustomer> for OrderDao {
    #[instrument(skip(self))]
    async fn find_by(&self, filter: ByCustomer) -> Result<Vec<Order>, OrderError> {
        let ByCustomer(customer_id) = filter;
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "SELECT {COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY id ASC"
            ))
            .await?;
        let rows = client.query(&stmt, &[&customer_id]).await?;

        Self::map_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use customer_dao::CustomerDao;
    use database_traits::dao::{FindByDao, GenericDao};
    use test_utils::*;

    use super::*;

    async fn setup_test_db() -> (TestPostgresContainer, OrderDao, CustomerDao) {
        let container = TestPostgresContainer::new().await.unwrap();
        let db = create_sql_connect(&container);
        (container, OrderDao::new(db.clone()), CustomerDao::new(db))
    }

    #[tokio::test]
    #[ignore = "needs docker"]
    async fn test_orders_follow_their_customer() {
        let (_container, orders, customers) = setup_test_db().await;
        let ada = customers.create(customer_command("Ada", "ada@example.com")).await.unwrap();
        let bob = customers.create(customer_command("Bob", "bob@example.com")).await.unwrap();
        let order = orders.create(order_command(ada.id, 4200)).await.unwrap();

        let change = orders
            .update(
                order.id,
                UpdateOrderCommand {
                    customer_id: Some(bob.id),
                    status: Some(OrderStatus::Paid),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(change.before.customer_id, ada.id);
        assert_eq!(change.after.customer_id, bob.id);
        assert_eq!(change.after.status, OrderStatus::Paid);
        assert!(orders.find_by(ByCustomer(ada.id)).await.unwrap().is_empty());
        assert_eq!(orders.find_by(ByCustomer(bob.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore = "needs docker"]
    async fn test_unknown_customer_is_rejected() {
        let (_container, orders, _customers) = setup_test_db().await;

        let result = orders.create(order_command(404, 100)).await;

        assert!(matches!(
            result,
            Err(OrderError::UnknownCustomer { customer_id: 404 })
        ));
    }
}

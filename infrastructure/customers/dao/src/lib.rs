use async_trait::async_trait;
use customer_errors::CustomerError;
use customer_models::{CreateCustomerCommand, Customer, UpdateCustomerCommand};
use database_traits::{
    dao::{Change, GenericDao},
    page_offset,
};
use sql_connection::{
    PgError, Row, SqlConnect, is_foreign_key_violation, is_unique_violation,
};
use tracing::instrument;

pub trait CustomerStore:
    GenericDao<
        Model = Customer,
        CreateRequest = CreateCustomerCommand,
        UpdateRequest = UpdateCustomerCommand,
        Error = CustomerError,
        ID = i64,
    >
{
}

impl<T> CustomerStore for T where
    T: GenericDao<
            Model = Customer,
            CreateRequest = CreateCustomerCommand,
            UpdateRequest = UpdateCustomerCommand,
            Error = CustomerError,
            ID = i64,
        >
{
}

const COLUMNS: &str = "id, name, email, created_at, updated_at";

#[derive(Clone)]
pub struct CustomerDao {
    db: SqlConnect,
}

impl CustomerDao {
    pub fn new(db: SqlConnect) -> Self { Self { db } }

    fn map_row(row: &Row, offset: usize) -> Customer {
        Customer {
            id: row.get(offset),
            name: row.get(offset + 1),
            email: row.get(offset + 2),
            created_at: row.get(offset + 3),
            updated_at: row.get(offset + 4),
        }
    }
}

fn email_conflict(err: PgError, email: Option<&str>) -> CustomerError {
    match email {
        Some(email) if is_unique_violation(&err) => {
            CustomerError::EmailExists {
                email: email.to_string(),
            }
        }
        _ => err.into(),
    }
}

#[async_trait]
impl GenericDao for CustomerDao {
    type CreateRequest = CreateCustomerCommand;
    type Error = CustomerError;
    type ID = i64;
    type Model = Customer;
    type UpdateRequest = UpdateCustomerCommand;

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Customer>, CustomerError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!("SELECT {COLUMNS} FROM customers WHERE id = $1"))
            .await?;
        let rows = client.query(&stmt, &[&id]).await?;

        Ok(rows.first().map(|row| Self::map_row(row, 0)))
    }

    #[instrument(skip(self))]
    async fn all(&self) -> Result<Vec<Customer>, CustomerError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!("SELECT {COLUMNS} FROM customers ORDER BY id ASC"))
            .await?;
        let rows = client.query(&stmt, &[]).await?;

        Ok(rows.iter().map(|row| Self::map_row(row, 0)).collect())
    }

    #[instrument(skip(self))]
    async fn page(&self, page: u32, size: u32) -> Result<Vec<Customer>, CustomerError> {
        let client = self.db.get_read_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "SELECT {COLUMNS} FROM customers ORDER BY id ASC LIMIT $1 OFFSET $2"
            ))
            .await?;
        let limit = i64::from(size);
        let offset = page_offset(page, size);
        let rows = client.query(&stmt, &[&limit, &offset]).await?;

        Ok(rows.iter().map(|row| Self::map_row(row, 0)).collect())
    }

    #[instrument(skip(self))]
    async fn create(&self, req: CreateCustomerCommand) -> Result<Customer, CustomerError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "INSERT INTO customers (name, email) VALUES ($1, $2) RETURNING {COLUMNS}"
            ))
            .await?;
        let row = client
            .query_one(&stmt, &[&req.name, &req.email])
            .await
            .map_err(|e| email_conflict(e, Some(req.email.as_str())))?;

        Ok(Self::map_row(&row, 0))
    }

    #[instrument(skip(self))]
    async fn update(
        &self, id: i64, req: UpdateCustomerCommand,
    ) -> Result<Option<Change<Customer>>, CustomerError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "WITH old_row AS (
                     SELECT {COLUMNS} FROM customers WHERE id = $1 FOR UPDATE
                 ),
                 new_row AS (
                     UPDATE customers SET
                         name = COALESCE($2, name),
                         email = COALESCE($3, email),
                         updated_at = now()
                     WHERE id = $1
                     RETURNING {COLUMNS}
                 )
                 SELECT o.*, n.* FROM old_row o JOIN new_row n ON n.id = o.id"
            ))
            .await?;
        let rows = client
            .query(&stmt, &[&id, &req.name, &req.email])
            .await
            .map_err(|e| email_conflict(e, req.email.as_deref()))?;

        Ok(rows.first().map(|row| {
            Change {
                before: Self::map_row(row, 0),
                after: Self::map_row(row, 5),
            }
        }))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<Option<Customer>, CustomerError> {
        let client = self.db.get_client().await?;
        let stmt = client
            .prepare_cached(&format!(
                "DELETE FROM customers WHERE id = $1 RETURNING {COLUMNS}"
            ))
            .await?;
        let rows = client.query(&stmt, &[&id]).await.map_err(|e| {
            if is_foreign_key_violation(&e) {
                CustomerError::HasOrders { customer_id: id }
            }
            else {
                e.into()
            }
        })?;

        Ok(rows.first().map(|row| Self::map_row(row, 0)))
    }
}

#[cfg(test)]
mod tests {
    use database_traits::dao::GenericDao;
    use test_utils::*;

    use super::*;

    async fn setup_test_db() -> (TestPostgresContainer, CustomerDao) {
        let container = TestPostgresContainer::new().await.unwrap();
        let dao = CustomerDao::new(create_sql_connect(&container));
        (container, dao)
    }

    #[tokio::test]
    #[ignore = "needs docker"]
    async fn test_duplicate_email_is_reported() {
        let (_container, dao) = setup_test_db().await;
        dao.create(customer_command("Ada", "ada@example.com")).await.unwrap();

        let result = dao.create(customer_command("Ada 2", "ada@example.com")).await;

        assert!(matches!(
            result,
            Err(CustomerError::EmailExists { email }) if email == "ada@example.com"
        ));
    }

    #[tokio::test]
    #[ignore = "needs docker"]
    async fn test_update_keeps_untouched_fields() {
        let (_container, dao) = setup_test_db().await;
        let created = dao.create(customer_command("Ada", "ada@example.com")).await.unwrap();

        let change = dao
            .update(
                created.id,
                UpdateCustomerCommand {
                    name: Some("Ada Lovelace".into()),
                    email: None,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(change.before.name, "Ada");
        assert_eq!(change.after.name, "Ada Lovelace");
        assert_eq!(change.after.email, "ada@example.com");
    }
}

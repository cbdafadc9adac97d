use sql_connection::SqlConnect;
use test_utils::TestPostgresContainer;

#[tokio::test]
#[ignore = "needs docker"]
async fn test_schema_bootstrap_is_idempotent() {
    let container = TestPostgresContainer::new().await.unwrap();
    let db = SqlConnect::new(container.pool.clone());

    db.ensure_schema().await.unwrap();
    db.ensure_schema().await.unwrap();

    let client = db.get_read_client().await.unwrap();
    let row = client
        .query_one(
            "SELECT count(*) FROM information_schema.tables WHERE table_name IN ('products', 'customers', 'orders')",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<_, i64>(0), 3);
}

//! Executes generated SQLite scripts against an in-memory database and
//! compares the resulting table with the target snapshot.

mod common;

use common::*;
use schemashift::descriptor::{ColumnDescriptor, DatabaseDescriptor, TableDescriptor};
use schemashift::types::DataType;
use schemashift::{compute_alter_script, compute_database_script, AlterOptions, Dialect};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

type ColumnInfo = (String, String, i64, i64);

async fn create_test_pool() -> SqlitePool {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

async fn execute(pool: &SqlitePool, statements: &[String]) {
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .unwrap_or_else(|e| panic!("{statement}\nfailed: {e}"));
    }
}

/// Creates `t0` and `t1` and fills them with a few rows.
async fn fixture_pool() -> SqlitePool {
    let pool = create_test_pool().await;
    let script = compute_database_script(
        &DatabaseDescriptor::default(),
        &database(),
        &AlterOptions::default(),
        Dialect::Sqlite,
    )
    .unwrap();
    execute(&pool, &script.statements).await;
    execute(
        &pool,
        &[
            "INSERT INTO t0 (id) VALUES (1)".to_string(),
            "INSERT INTO t1 (id, col_std, col_def, col_fk, col_idx) VALUES (1, NULL, 5, 1, 7)"
                .to_string(),
            "INSERT INTO t1 (id, col_std, col_def, col_fk, col_idx) VALUES (2, 3, 12, NULL, 8)"
                .to_string(),
        ],
    )
    .await;
    pool
}

async fn table_info(pool: &SqlitePool, table: &str) -> Vec<ColumnInfo> {
    let sql =
        format!("SELECT name, type, \"notnull\", pk FROM pragma_table_info('{table}') ORDER BY cid");
    sqlx::query_as(&sql).fetch_all(pool).await.unwrap()
}

fn expected_info(table: &TableDescriptor) -> Vec<ColumnInfo> {
    let pk = table.primary_key();
    table
        .columns
        .iter()
        .map(|c| {
            let in_pk = pk.is_some_and(|pk| pk.columns.contains(&c.name));
            (
                c.name.clone(),
                Dialect::Sqlite.renderer().map_data_type(&c.data_type),
                i64::from(c.not_null),
                i64::from(in_pk),
            )
        })
        .collect()
}

async fn apply(after: &TableDescriptor, options: &AlterOptions) -> SqlitePool {
    let pool = fixture_pool().await;
    let context = database_with(after.clone());
    let script = compute_alter_script(&t1(), after, options, Some(&context), Dialect::Sqlite)
        .unwrap_or_else(|e| panic!("{e}"));
    execute(&pool, &script.statements).await;
    assert_eq!(table_info(&pool, "t1").await, expected_info(after));
    pool
}

async fn row_count(pool: &SqlitePool) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t1")
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

#[tokio::test]
async fn fixture_matches_snapshot() {
    let pool = fixture_pool().await;
    assert_eq!(table_info(&pool, "t1").await, expected_info(&t1()));
    assert_eq!(table_info(&pool, "t0").await, expected_info(&t0()));
}

#[tokio::test]
async fn add_column() {
    let after =
        t1().column(ColumnDescriptor::new("col_new", DataType::Text).paired("t1.col_new"));
    let pool = apply(&after, &AlterOptions::default()).await;
    assert_eq!(row_count(&pool).await, 2);
}

#[tokio::test]
async fn drop_each_column() {
    for name in ["col_std", "col_def", "col_fk", "col_idx"] {
        let after = t1_with(|t| drop_column(t, name));
        let pool = apply(&after, &AlterOptions::default()).await;
        assert_eq!(row_count(&pool).await, 2, "{name}");
    }
}

#[tokio::test]
async fn rename_column() {
    let after = t1_with(|t| column(t, "col_std").name = "col_renamed".into());
    let pool = apply(&after, &AlterOptions::default()).await;
    let (value,): (Option<i64>,) = sqlx::query_as("SELECT col_renamed FROM t1 WHERE id = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(value, Some(3));
}

#[tokio::test]
async fn set_not_null_fills_nulls() {
    let after = t1_with(|t| column(t, "col_std").not_null = true);
    let pool = apply(&after, &AlterOptions::default().with_permissive_actions()).await;
    let (value,): (i64,) = sqlx::query_as("SELECT col_std FROM t1 WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(value, 0);

    // The index survives the rebuild.
    let (indexes,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(indexes, 1);
}

#[tokio::test]
async fn retype_keeps_rows() {
    let after = t1_with(|t| column(t, "col_idx").data_type = DataType::Text);
    let pool = apply(&after, &AlterOptions::default()).await;
    let (value,): (String,) = sqlx::query_as("SELECT col_idx FROM t1 WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(value, "7");
}

use std::time::Duration;

use sondar_core::{ColumnType, ExecutionError, Scalar, StoreError};
use sondar_store::{CalculationConfig, Store};

async fn open_store(dir: &tempfile::TempDir) -> Store {
    let path = dir.path().join("workbench.db");
    Store::builder(&path).build().await.unwrap()
}

async fn seed_employees(store: &Store) {
    sqlx::query(
        "CREATE TABLE employees (\
         ID INTEGER, NAME TEXT, DEPARTMENT TEXT, SALARY REAL, \
         CREATED_AT TEXT, UPDATED_AT TEXT)",
    )
    .execute(store_pool(store))
    .await
    .unwrap();
    for (id, name, dept, salary) in [
        (1, "A", "Sales", 3000.0),
        (2, "B", "Sales", 5000.0),
        (3, "C", "Ops", 4000.0),
    ] {
        sqlx::query(
            "INSERT INTO employees VALUES (?1, ?2, ?3, ?4, '2024-01-01', '2024-01-01')",
        )
        .bind(id)
        .bind(name)
        .bind(dept)
        .bind(salary)
        .execute(store_pool(store))
        .await
        .unwrap();
    }
}

// Seeding goes through a scratch pool; the public surface stays read-only.
fn store_pool(store: &Store) -> &sqlx::SqlitePool {
    store.write_pool()
}

#[tokio::test]
async fn list_tables_hides_internal_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    let tables = store.list_tables().await.unwrap();
    assert_eq!(tables, vec!["employees".to_string()]);
}

#[tokio::test]
async fn describe_reports_columns_types_and_samples() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    let desc = store.describe("employees").await.unwrap();
    assert_eq!(desc.row_count, 3);
    assert_eq!(desc.columns.len(), 6);

    let salary = desc.column("SALARY").unwrap();
    assert_eq!(salary.column_type, ColumnType::Real);
    assert_eq!(salary.samples.len(), 3);

    let department = desc.column("DEPARTMENT").unwrap();
    assert_eq!(department.samples.len(), 2); // distinct values only

    let created = desc.column("CREATED_AT").unwrap();
    assert!(created.samples.is_empty()); // audit columns are not sampled
}

#[tokio::test]
async fn describe_is_case_insensitive_on_the_user_surface() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    let desc = store.describe("EMPLOYEES").await.unwrap();
    assert_eq!(desc.name, "employees");

    let missing = store.describe("payroll").await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn set_primary_key_rebuilds_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    store.set_primary_key("employees", Some("ID")).await.unwrap();
    assert_eq!(store.primary_key("employees").await.unwrap(), Some("ID".to_string()));

    // Same call again is a no-op with the same end state.
    store.set_primary_key("employees", Some("ID")).await.unwrap();
    let desc = store.describe("employees").await.unwrap();
    assert_eq!(desc.row_count, 3);
    assert_eq!(desc.columns.iter().filter(|c| c.primary_key).count(), 1);

    store.set_primary_key("employees", None).await.unwrap();
    assert_eq!(store.primary_key("employees").await.unwrap(), None);
}

#[tokio::test]
async fn set_primary_key_fails_atomically_on_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    let result = store.set_primary_key("employees", Some("DEPARTMENT")).await;
    assert!(matches!(result, Err(StoreError::Constraint(_))));

    // Old schema intact, data preserved.
    let desc = store.describe("employees").await.unwrap();
    assert_eq!(desc.row_count, 3);
    assert_eq!(store.primary_key("employees").await.unwrap(), None);
}

#[tokio::test]
async fn set_primary_key_rejects_audit_and_unknown_columns() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    assert!(matches!(
        store.set_primary_key("employees", Some("CREATED_AT")).await,
        Err(StoreError::Constraint(_))
    ));
    assert!(matches!(
        store.set_primary_key("employees", Some("NOPE")).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn executor_returns_typed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    let rows = store
        .executor()
        .execute(
            "SELECT \"DEPARTMENT\", AVG(\"SALARY\") AS avg_salary \
             FROM \"employees\" GROUP BY \"DEPARTMENT\" ORDER BY \"DEPARTMENT\"",
            100,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    assert_eq!(rows.row_count(), 2);
    assert_eq!(rows.rows[0][0], Scalar::Text("Ops".to_string()));
    assert_eq!(rows.rows[0][1], Scalar::Real(4000.0));
    assert_eq!(rows.rows[1][0], Scalar::Text("Sales".to_string()));
    assert_eq!(rows.rows[1][1], Scalar::Real(4000.0));
}

#[tokio::test]
async fn executor_enforces_the_row_cap() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    let result = store
        .executor()
        .execute("SELECT * FROM \"employees\"", 2, Duration::from_secs(5))
        .await;
    assert!(matches!(
        result,
        Err(ExecutionError::RowCapExceeded { limit: 2 })
    ));
}

#[tokio::test]
async fn executor_classifies_reference_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    let missing_column = store
        .executor()
        .execute(
            "SELECT \"AMONT\" FROM \"employees\"",
            100,
            Duration::from_secs(5),
        )
        .await;
    assert!(matches!(missing_column, Err(ExecutionError::Reference(_))));

    let bad_syntax = store
        .executor()
        .execute("SELEC 1", 100, Duration::from_secs(5))
        .await;
    assert!(matches!(
        bad_syntax,
        Err(ExecutionError::Syntax(_)) | Err(ExecutionError::EngineOther(_))
    ));
}

#[tokio::test]
async fn executor_cannot_write() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    seed_employees(&store).await;

    let result = store
        .executor()
        .execute("DELETE FROM \"employees\"", 100, Duration::from_secs(5))
        .await;
    assert!(result.is_err());
    assert_eq!(store.describe("employees").await.unwrap().row_count, 3);
}

#[tokio::test]
async fn saved_queries_upsert_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    store
        .save_query("avg_salary", "SELECT 1", "average?")
        .await
        .unwrap();
    store
        .save_query("avg_salary", "SELECT 2", "average again?")
        .await
        .unwrap();

    let queries = store.list_saved_queries().await.unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].sql, "SELECT 2");
    assert_eq!(queries[0].question, "average again?");
}

#[tokio::test]
async fn calculation_configs_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let mut config = CalculationConfig::new("meal-voucher", "apply the voucher rules");
    config.description = "payroll vouchers".to_string();
    store.save_calculation_config(&config).await.unwrap();

    config.max_iterations = 5;
    store.save_calculation_config(&config).await.unwrap();

    let configs = store.list_calculation_configs().await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].max_iterations, 5);
    assert_eq!(configs[0].description, "payroll vouchers");
    assert!(configs[0].active);

    store.delete_calculation_config("meal-voucher").await.unwrap();
    assert!(store.list_calculation_configs().await.unwrap().is_empty());
    assert!(matches!(
        store.delete_calculation_config("meal-voucher").await,
        Err(StoreError::NotFound(_))
    ));
}

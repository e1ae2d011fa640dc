use sqlx::SqlitePool;

use sondar_core::StoreError;

pub const IMPORTS_TABLE: &str = "imports";
pub const AGENT_LOGS_TABLE: &str = "agent_logs";
pub const CALCULATION_CONFIGS_TABLE: &str = "calculation_configs";
pub const SAVED_QUERIES_TABLE: &str = "saved_queries";

/// Internal tables, never listed as user tables.
pub const INTERNAL_TABLES: [&str; 4] = [
    IMPORTS_TABLE,
    AGENT_LOGS_TABLE,
    CALCULATION_CONFIGS_TABLE,
    SAVED_QUERIES_TABLE,
];

pub const CREATE_IMPORTS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS imports (\
    id INTEGER PRIMARY KEY AUTOINCREMENT,\
    filename TEXT NOT NULL,\
    format TEXT NOT NULL,\
    status TEXT NOT NULL,\
    total_rows INTEGER NOT NULL DEFAULT 0,\
    processed_rows INTEGER NOT NULL DEFAULT 0,\
    error_rows INTEGER NOT NULL DEFAULT 0,\
    column_mapping TEXT NOT NULL DEFAULT '{}',\
    processing_log TEXT NOT NULL DEFAULT '',\
    errors TEXT NOT NULL DEFAULT '[]',\
    processing_agent TEXT NOT NULL DEFAULT '',\
    created_at TEXT NOT NULL,\
    processed_at TEXT\
)";

pub const CREATE_AGENT_LOGS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS agent_logs (\
    id INTEGER PRIMARY KEY AUTOINCREMENT,\
    agent_name TEXT NOT NULL,\
    action TEXT NOT NULL,\
    input TEXT NOT NULL DEFAULT '',\
    output TEXT NOT NULL DEFAULT '',\
    tokens_used INTEGER,\
    latency_ms INTEGER NOT NULL DEFAULT 0,\
    status TEXT NOT NULL,\
    error_message TEXT,\
    created_at TEXT NOT NULL\
)";

pub const CREATE_CALCULATION_CONFIGS_TABLE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS calculation_configs (\
    name TEXT PRIMARY KEY,\
    description TEXT NOT NULL DEFAULT '',\
    prompt TEXT NOT NULL DEFAULT '',\
    available_tools TEXT NOT NULL DEFAULT '[]',\
    max_iterations INTEGER NOT NULL DEFAULT 10,\
    exploration_depth TEXT NOT NULL DEFAULT 'standard',\
    include_insights INTEGER NOT NULL DEFAULT 1,\
    show_reasoning INTEGER NOT NULL DEFAULT 0,\
    active INTEGER NOT NULL DEFAULT 1,\
    created_at TEXT NOT NULL,\
    updated_at TEXT NOT NULL\
)";

pub const CREATE_SAVED_QUERIES_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS saved_queries (\
    name TEXT PRIMARY KEY,\
    sql_text TEXT NOT NULL,\
    question TEXT NOT NULL DEFAULT '',\
    created_at TEXT NOT NULL,\
    updated_at TEXT NOT NULL\
)";

pub const MIGRATION_STATEMENTS_SQL: [&str; 4] = [
    CREATE_IMPORTS_TABLE_SQL,
    CREATE_AGENT_LOGS_TABLE_SQL,
    CREATE_CALCULATION_CONFIGS_TABLE_SQL,
    CREATE_SAVED_QUERIES_TABLE_SQL,
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    for statement in MIGRATION_STATEMENTS_SQL {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
    }
    Ok(())
}

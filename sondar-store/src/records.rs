use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use sondar_core::{StoreError, Value};

use crate::store::{map_sqlx_error, Store};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SavedQuery {
    pub name: String,
    pub sql: String,
    pub question: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExplorationDepth {
    Shallow,
    Standard,
    Deep,
}

impl ExplorationDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplorationDepth::Shallow => "shallow",
            ExplorationDepth::Standard => "standard",
            ExplorationDepth::Deep => "deep",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "shallow" => ExplorationDepth::Shallow,
            "deep" => ExplorationDepth::Deep,
            _ => ExplorationDepth::Standard,
        }
    }
}

/// Named rule set for domain calculations. The core stores and lists these;
/// interpreting the prompt is the agent's concern.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CalculationConfig {
    pub name: String,
    pub description: String,
    pub prompt: String,
    pub available_tools: Vec<String>,
    pub max_iterations: u32,
    pub exploration_depth: ExplorationDepth,
    pub include_insights: bool,
    pub show_reasoning: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalculationConfig {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: String::new(),
            prompt: prompt.into(),
            available_tools: vec!["sql".to_string(), "python".to_string()],
            max_iterations: 10,
            exploration_depth: ExplorationDepth::Standard,
            include_insights: true,
            show_reasoning: false,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ImportRecord {
    pub filename: String,
    pub format: String,
    pub status: String,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub error_rows: i64,
    pub column_mapping: Value,
    pub processing_log: String,
    pub errors: Value,
    pub processing_agent: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AgentLogRow {
    pub agent_name: String,
    pub action: String,
    pub input: String,
    pub output: String,
    pub tokens_used: Option<i64>,
    pub latency_ms: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// Upsert by name within one statement.
    pub async fn save_query(
        &self,
        name: &str,
        sql: &str,
        question: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.with_locked_retry(|| insert_saved_query(&self.pool, name, sql, question, &now))
            .await
    }

    pub async fn list_saved_queries(&self) -> Result<Vec<SavedQuery>, StoreError> {
        let rows = sqlx::query(
            "SELECT name, sql_text, question, created_at, updated_at \
             FROM saved_queries ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(SavedQuery {
                    name: row.try_get("name").map_err(map_sqlx_error)?,
                    sql: row.try_get("sql_text").map_err(map_sqlx_error)?,
                    question: row.try_get("question").map_err(map_sqlx_error)?,
                    created_at: parse_timestamp(row.try_get("created_at").map_err(map_sqlx_error)?)?,
                    updated_at: parse_timestamp(row.try_get("updated_at").map_err(map_sqlx_error)?)?,
                })
            })
            .collect()
    }

    pub async fn save_calculation_config(
        &self,
        config: &CalculationConfig,
    ) -> Result<(), StoreError> {
        let tools = serde_json::to_string(&config.available_tools)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        let created = config.created_at.to_rfc3339();
        self.with_locked_retry(|| {
            upsert_calculation_config(&self.pool, config, &tools, &created, &now)
        })
        .await
    }

    pub async fn list_calculation_configs(&self) -> Result<Vec<CalculationConfig>, StoreError> {
        let rows = sqlx::query(
            "SELECT name, description, prompt, available_tools, max_iterations, \
             exploration_depth, include_insights, show_reasoning, active, \
             created_at, updated_at FROM calculation_configs ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let tools: String = row.try_get("available_tools").map_err(map_sqlx_error)?;
                let depth: String = row.try_get("exploration_depth").map_err(map_sqlx_error)?;
                Ok(CalculationConfig {
                    name: row.try_get("name").map_err(map_sqlx_error)?,
                    description: row.try_get("description").map_err(map_sqlx_error)?,
                    prompt: row.try_get("prompt").map_err(map_sqlx_error)?,
                    available_tools: serde_json::from_str(&tools)
                        .map_err(|e| StoreError::Backend(e.to_string()))?,
                    max_iterations: row
                        .try_get::<i64, _>("max_iterations")
                        .map_err(map_sqlx_error)?
                        .max(1) as u32,
                    exploration_depth: ExplorationDepth::parse(&depth),
                    include_insights: row
                        .try_get::<i64, _>("include_insights")
                        .map_err(map_sqlx_error)?
                        != 0,
                    show_reasoning: row
                        .try_get::<i64, _>("show_reasoning")
                        .map_err(map_sqlx_error)?
                        != 0,
                    active: row.try_get::<i64, _>("active").map_err(map_sqlx_error)? != 0,
                    created_at: parse_timestamp(row.try_get("created_at").map_err(map_sqlx_error)?)?,
                    updated_at: parse_timestamp(row.try_get("updated_at").map_err(map_sqlx_error)?)?,
                })
            })
            .collect()
    }

    pub async fn delete_calculation_config(&self, name: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM calculation_configs WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("calculation config {name}")));
        }
        Ok(())
    }

    pub async fn record_import(&self, record: &ImportRecord) -> Result<(), StoreError> {
        let mapping = serde_json::to_string(&record.column_mapping)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let errors = serde_json::to_string(&record.errors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO imports \
             (filename, format, status, total_rows, processed_rows, error_rows, \
              column_mapping, processing_log, errors, processing_agent, \
              created_at, processed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&record.filename)
        .bind(&record.format)
        .bind(&record.status)
        .bind(record.total_rows)
        .bind(record.processed_rows)
        .bind(record.error_rows)
        .bind(&mapping)
        .bind(&record.processing_log)
        .bind(&errors)
        .bind(&record.processing_agent)
        .bind(record.created_at.to_rfc3339())
        .bind(record.processed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    pub async fn list_imports(&self) -> Result<Vec<ImportRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT filename, format, status, total_rows, processed_rows, error_rows, \
             column_mapping, processing_log, errors, processing_agent, \
             created_at, processed_at FROM imports ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let mapping: String = row.try_get("column_mapping").map_err(map_sqlx_error)?;
                let errors: String = row.try_get("errors").map_err(map_sqlx_error)?;
                let processed: Option<String> =
                    row.try_get("processed_at").map_err(map_sqlx_error)?;
                Ok(ImportRecord {
                    filename: row.try_get("filename").map_err(map_sqlx_error)?,
                    format: row.try_get("format").map_err(map_sqlx_error)?,
                    status: row.try_get("status").map_err(map_sqlx_error)?,
                    total_rows: row.try_get("total_rows").map_err(map_sqlx_error)?,
                    processed_rows: row.try_get("processed_rows").map_err(map_sqlx_error)?,
                    error_rows: row.try_get("error_rows").map_err(map_sqlx_error)?,
                    column_mapping: serde_json::from_str(&mapping)
                        .map_err(|e| StoreError::Backend(e.to_string()))?,
                    processing_log: row.try_get("processing_log").map_err(map_sqlx_error)?,
                    errors: serde_json::from_str(&errors)
                        .map_err(|e| StoreError::Backend(e.to_string()))?,
                    processing_agent: row.try_get("processing_agent").map_err(map_sqlx_error)?,
                    created_at: parse_timestamp(row.try_get("created_at").map_err(map_sqlx_error)?)?,
                    processed_at: processed.map(parse_timestamp).transpose()?,
                })
            })
            .collect()
    }

    pub async fn record_agent_log(&self, entry: &AgentLogRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO agent_logs \
             (agent_name, action, input, output, tokens_used, latency_ms, status, \
              error_message, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&entry.agent_name)
        .bind(&entry.action)
        .bind(&entry.input)
        .bind(&entry.output)
        .bind(entry.tokens_used)
        .bind(entry.latency_ms)
        .bind(&entry.status)
        .bind(entry.error_message.as_deref())
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

async fn insert_saved_query(
    pool: &sqlx::SqlitePool,
    name: &str,
    sql: &str,
    question: &str,
    now: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO saved_queries (name, sql_text, question, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?4) \
         ON CONFLICT(name) DO UPDATE SET \
         sql_text = excluded.sql_text, question = excluded.question, \
         updated_at = excluded.updated_at",
    )
    .bind(name)
    .bind(sql)
    .bind(question)
    .bind(now)
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn upsert_calculation_config(
    pool: &sqlx::SqlitePool,
    config: &CalculationConfig,
    tools: &str,
    created: &str,
    now: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO calculation_configs \
         (name, description, prompt, available_tools, max_iterations, \
          exploration_depth, include_insights, show_reasoning, active, \
          created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
         ON CONFLICT(name) DO UPDATE SET \
         description = excluded.description, prompt = excluded.prompt, \
         available_tools = excluded.available_tools, \
         max_iterations = excluded.max_iterations, \
         exploration_depth = excluded.exploration_depth, \
         include_insights = excluded.include_insights, \
         show_reasoning = excluded.show_reasoning, active = excluded.active, \
         updated_at = excluded.updated_at",
    )
    .bind(&config.name)
    .bind(&config.description)
    .bind(&config.prompt)
    .bind(tools)
    .bind(config.max_iterations as i64)
    .bind(config.exploration_depth.as_str())
    .bind(config.include_insights as i64)
    .bind(config.show_reasoning as i64)
    .bind(config.active as i64)
    .bind(created)
    .bind(now)
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp {raw}: {e}")))
}

use sqlx::Row;

use sondar_core::{
    ColumnDescriptor, ColumnType, Scalar, StoreError, TableDescriptor, AUDIT_COLUMNS,
    MAX_SAMPLE_VALUES,
};

use crate::migrations::INTERNAL_TABLES;
use crate::store::{map_sqlx_error, Store};

impl Store {
    /// User table names, sorted. Internal and `sqlite_*` tables are hidden.
    pub async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name").map_err(map_sqlx_error)?;
            if !INTERNAL_TABLES.contains(&name.as_str()) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Full descriptor: PRAGMA-level structure, row count, and up to
    /// `MAX_SAMPLE_VALUES` distinct samples per user column. No other scans.
    pub async fn describe(&self, name: &str) -> Result<TableDescriptor, StoreError> {
        let table = self.resolve_table(name).await?;
        let mut columns = self.table_columns(&table).await?;

        for column in &mut columns {
            if column.is_audit() {
                continue;
            }
            column.samples = self
                .sample_column(&table, &column.name, MAX_SAMPLE_VALUES)
                .await?;
        }

        let count_row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM \"{table}\""))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let row_count: i64 = count_row.try_get("n").map_err(map_sqlx_error)?;

        Ok(TableDescriptor {
            name: table,
            columns,
            row_count: row_count.max(0) as u64,
            created_at: None,
        })
    }

    /// Up to `k` distinct non-null values of one column.
    pub async fn sample_values(
        &self,
        table: &str,
        column: &str,
        k: usize,
    ) -> Result<Vec<Scalar>, StoreError> {
        let table = self.resolve_table(table).await?;
        self.sample_column(&table, column, k).await
    }

    async fn sample_column(
        &self,
        table: &str,
        column: &str,
        k: usize,
    ) -> Result<Vec<Scalar>, StoreError> {
        let sql = format!(
            "SELECT DISTINCT \"{column}\" AS v FROM \"{table}\" \
             WHERE \"{column}\" IS NOT NULL LIMIT {k}"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut samples = Vec::with_capacity(rows.len());
        for row in rows {
            samples.push(decode_scalar(&row, 0).map_err(map_sqlx_error)?);
        }
        Ok(samples)
    }

    pub async fn primary_key(&self, name: &str) -> Result<Option<String>, StoreError> {
        let table = self.resolve_table(name).await?;
        let columns = self.table_columns(&table).await?;
        Ok(columns
            .into_iter()
            .find(|c| c.primary_key)
            .map(|c| c.name))
    }

    /// Rebuilds the table with exactly one column flagged PK (or none),
    /// preserving all data. Runs inside one transaction: duplicate values in
    /// the chosen column fail the rebuild atomically and the old schema
    /// stays intact. Idempotent when the requested key is already set.
    pub async fn set_primary_key(
        &self,
        name: &str,
        column: Option<&str>,
    ) -> Result<(), StoreError> {
        let table = self.resolve_table(name).await?;
        let columns = self.table_columns(&table).await?;

        let target = match column {
            Some(raw) => {
                let normalized = sondar_core::normalize_column_name(raw);
                if AUDIT_COLUMNS.contains(&normalized.as_str()) {
                    return Err(StoreError::Constraint(format!(
                        "audit column {normalized} cannot be a primary key"
                    )));
                }
                let found = columns.iter().find(|c| c.name == normalized);
                match found {
                    Some(c) => Some(c.name.clone()),
                    None => {
                        return Err(StoreError::NotFound(format!(
                            "column {normalized} in table {table}"
                        )))
                    }
                }
            }
            None => None,
        };

        let current = columns.iter().find(|c| c.primary_key).map(|c| &c.name);
        if current == target.as_ref() {
            return Ok(());
        }

        self.with_locked_retry(|| self.rebuild_with_key(&table, &columns, target.as_deref()))
            .await
    }

    async fn rebuild_with_key(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        key: Option<&str>,
    ) -> Result<(), StoreError> {
        let staging = format!("{table}__rebuild");
        let column_list: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c.name)).collect();
        let column_list = column_list.join(", ");

        let mut defs = Vec::with_capacity(columns.len());
        for c in columns {
            let mut def = format!("\"{}\" {}", c.name, c.column_type.as_sql());
            if Some(c.name.as_str()) == key {
                def.push_str(" PRIMARY KEY");
            } else if !c.nullable {
                def.push_str(" NOT NULL");
            }
            defs.push(def);
        }
        let create = format!("CREATE TABLE \"{staging}\" ({})", defs.join(", "));

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query(&create)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query(&format!(
            "INSERT INTO \"{staging}\" ({column_list}) SELECT {column_list} FROM \"{table}\""
        ))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        sqlx::query(&format!("DROP TABLE \"{table}\""))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query(&format!(
            "ALTER TABLE \"{staging}\" RENAME TO \"{table}\""
        ))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::debug!(table, ?key, "primary key rebuilt");
        Ok(())
    }

    /// Case-insensitive lookup on the user surface, case-exact name on the
    /// wire.
    async fn resolve_table(&self, name: &str) -> Result<String, StoreError> {
        let tables = self.list_tables().await?;
        tables
            .into_iter()
            .find(|t| t.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| StoreError::NotFound(format!("table {name}")))
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, StoreError> {
        let rows = sqlx::query(&format!("PRAGMA table_info(\"{table}\")"))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name").map_err(map_sqlx_error)?;
            let declared: String = row.try_get("type").map_err(map_sqlx_error)?;
            let notnull: i64 = row.try_get("notnull").map_err(map_sqlx_error)?;
            let pk: i64 = row.try_get("pk").map_err(map_sqlx_error)?;
            columns.push(ColumnDescriptor {
                name,
                column_type: ColumnType::from_declared(&declared),
                nullable: notnull == 0,
                primary_key: pk > 0,
                samples: Vec::new(),
            });
        }
        if columns.is_empty() {
            return Err(StoreError::NotFound(format!("table {table}")));
        }
        Ok(columns)
    }
}

/// Decodes one cell by its runtime SQLite type.
pub(crate) fn decode_scalar(
    row: &sqlx::sqlite::SqliteRow,
    index: usize,
) -> Result<Scalar, sqlx::Error> {
    use sqlx::{TypeInfo, ValueRef};

    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Scalar::Null);
    }
    let scalar = match raw.type_info().name() {
        "INTEGER" => Scalar::Integer(row.try_get::<i64, _>(index)?),
        "REAL" => Scalar::Real(row.try_get::<f64, _>(index)?),
        "BLOB" => Scalar::Text("[blob]".to_string()),
        _ => Scalar::Text(row.try_get::<String, _>(index)?),
    };
    Ok(scalar)
}

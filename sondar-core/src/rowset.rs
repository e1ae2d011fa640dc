use serde::{Deserialize, Serialize};

use crate::schema::{ColumnType, Scalar};

/// An ordered result set with a fixed column order, carrying the SQL that
/// produced it.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RowSet {
    pub sql: String,
    pub columns: Vec<(String, ColumnType)>,
    pub rows: Vec<Vec<Scalar>>,
}

impl RowSet {
    pub fn new(sql: impl Into<String>, columns: Vec<(String, ColumnType)>) -> Self {
        Self {
            sql: sql.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// JSON array of row objects keyed by column name. Used for sandbox
    /// snapshots and narration input.
    pub fn to_records(&self) -> serde_json::Value {
        let records: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for ((name, _), cell) in self.columns.iter().zip(row.iter()) {
                    object.insert(name.clone(), cell.to_json());
                }
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(records)
    }

    /// Compact, byte-capped textual digest: header, row count, and leading
    /// rows until the cap is reached. Deterministic for identical inputs.
    pub fn digest(&self, max_bytes: usize) -> String {
        let header: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{} {}", name, ty.as_str()))
            .collect();
        let mut out = format!("{} rows | {}", self.rows.len(), header.join(", "));
        for row in &self.rows {
            let line: Vec<String> = row.iter().map(Scalar::render).collect();
            let line = format!("\n{}", line.join(" | "));
            if out.len() + line.len() > max_bytes {
                out.push_str("\n…");
                break;
            }
            out.push_str(&line);
        }
        out
    }
}

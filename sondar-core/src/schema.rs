use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit columns stamped by the ingest pipeline; reserved, never PK candidates.
pub const AUDIT_COLUMNS: [&str; 2] = ["CREATED_AT", "UPDATED_AT"];

/// Upper bound on sample values carried per column.
pub const MAX_SAMPLE_VALUES: usize = 5;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Datetime,
    Boolean,
}

impl ColumnType {
    /// Maps a declared SQLite type to the normalized taxonomy. Unknown
    /// declarations fall back to text, matching SQLite affinity rules.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else if upper.contains("BOOL") {
            ColumnType::Boolean
        } else if upper.contains("DATE") || upper.contains("TIME") {
            ColumnType::Datetime
        } else {
            ColumnType::Text
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Datetime => "DATETIME",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Datetime => "datetime",
            ColumnType::Boolean => "boolean",
        }
    }
}

/// A single cell value.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl Scalar {
    /// Null is compatible with every column type; integers widen into real
    /// and datetime/boolean columns accept their storage representations.
    pub fn is_compatible_with(&self, column_type: ColumnType) -> bool {
        match (self, column_type) {
            (Scalar::Null, _) => true,
            (Scalar::Integer(_), ColumnType::Integer)
            | (Scalar::Integer(_), ColumnType::Real)
            | (Scalar::Integer(_), ColumnType::Boolean)
            | (Scalar::Integer(_), ColumnType::Datetime) => true,
            (Scalar::Real(_), ColumnType::Real) => true,
            (Scalar::Text(_), ColumnType::Text) | (Scalar::Text(_), ColumnType::Datetime) => true,
            (Scalar::Boolean(_), ColumnType::Boolean) => true,
            _ => false,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Scalar::Null => "NULL".to_string(),
            Scalar::Integer(n) => n.to_string(),
            Scalar::Real(x) => x.to_string(),
            Scalar::Text(s) => s.clone(),
            Scalar::Boolean(b) => b.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Integer(n) => serde_json::Value::from(*n),
            Scalar::Real(x) => serde_json::Value::from(*x),
            Scalar::Text(s) => serde_json::Value::from(s.clone()),
            Scalar::Boolean(b) => serde_json::Value::from(*b),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<Scalar>,
}

impl ColumnDescriptor {
    pub fn is_audit(&self) -> bool {
        AUDIT_COLUMNS.contains(&self.name.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub row_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TableDescriptor {
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        let normalized = normalize_column_name(name);
        self.columns.iter().find(|c| c.name == normalized)
    }
}

/// Table names are lowercased and reduced to `[a-z0-9_]`, with a leading
/// underscore prepended when the first character is not `[a-z_]`.
pub fn normalize_table_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_lowercase() || lower.is_ascii_digit() {
            out.push(lower);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_').to_string();
    let mut name = if trimmed.is_empty() { "table".to_string() } else { trimmed };
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// User column names are uppercased alphanumerics plus underscore.
pub fn normalize_column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        let upper = ch.to_ascii_uppercase();
        if upper.is_ascii_uppercase() || upper.is_ascii_digit() {
            out.push(upper);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_').to_string();
    if trimmed.is_empty() {
        "COLUMN".to_string()
    } else {
        trimmed
    }
}

pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

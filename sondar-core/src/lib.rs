mod answer;
mod error;
mod llm;
mod log;
mod rowset;
mod schema;
mod session;
mod trace;
mod value;

#[cfg(test)]
mod schema_tests;

pub use answer::{Answer, AnswerKind, Intent, Question, SqlArtifact, Verdict};
pub use error::{EngineError, ExecutionError, LlmError, SandboxErrorKind, StoreError};
pub use llm::{ChatCompletion, CompletionRequest, Message, Role};
pub use log::{ActivityLog, LogEvent, DEFAULT_LOG_CAPACITY};
pub use rowset::RowSet;
pub use schema::{
    is_valid_table_name, normalize_column_name, normalize_table_name, ColumnDescriptor,
    ColumnType, Scalar, TableDescriptor, AUDIT_COLUMNS, MAX_SAMPLE_VALUES,
};
pub use session::Session;
pub use trace::{
    ActionKind, AnalysisStep, AnalysisTrace, Insight, PlotArtifact, StepArtifact, TraceStatus,
};
pub use value::Value;

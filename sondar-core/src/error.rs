use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
    #[error("LLM rate limited: {0}")]
    RateLimited(String),
    #[error("LLM endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("LLM response malformed: {0}")]
    Malformed(String),
    #[error("LLM retries exhausted after {max} attempts")]
    RetriesExhausted { max: usize },
}

impl LlmError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout(_) | LlmError::RateLimited(_) | LlmError::Unavailable(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("SQL syntax error: {0}")]
    Syntax(String),
    #[error("unknown table or column: {0}")]
    Reference(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error("result exceeded the row cap of {limit}")]
    RowCapExceeded { limit: usize },
    #[error("engine error: {0}")]
    EngineOther(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("database locked: {0}")]
    Locked(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failure class carried inside a sandbox outcome. The sandbox itself never
/// returns `Err`; these kinds travel in `SandboxOutcome::error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxErrorKind {
    Parse,
    GuardRejected,
    Runtime,
    CapExceeded,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("SQL rejected: {reason}")]
    GateRejected { reason: String },
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("question was cancelled")]
    Cancelled,
    #[error("invalid request: {0}")]
    Invalid(String),
}

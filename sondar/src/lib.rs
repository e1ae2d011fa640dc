//! Natural-language analysis engine for tabular business data.
//!
//! Upload-backed tables live in an embedded SQLite store; questions are
//! routed to a chat reply, a single gated SQL query, or a bounded autonomous
//! analysis loop mixing SQL exploration and sandboxed Python.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sondar::{Engine, HttpChatClient, Question, Session, Store};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::builder("workbench.db").build().await?;
//! let llm = Arc::new(
//!     HttpChatClient::builder("https://api.openai.com/v1")
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .build()?,
//! );
//! let engine = Engine::builder(store, llm).build();
//!
//! let mut session = Session::new();
//! let question = Question::new("Qual o salário médio por departamento?", &session.id);
//! let answer = engine.ask(&question, &mut session).await?;
//! println!("{}", answer.content);
//! # Ok(())
//! # }
//! ```

pub use sondar_agent::{AgentConfig, AgentOutcome, AgentRunner, PlanDirective, WorkingMemory};
pub use sondar_core::{
    ActionKind, ActivityLog, AnalysisStep, AnalysisTrace, Answer, AnswerKind, ChatCompletion,
    ColumnDescriptor, ColumnType, CompletionRequest, EngineError, ExecutionError, Insight,
    Intent, LlmError, LogEvent, Message, PlotArtifact, Question, Role, RowSet, SandboxErrorKind,
    Scalar, Session, SqlArtifact, StoreError, TableDescriptor, TraceStatus, Verdict,
};
pub use sondar_engine::{Engine, EngineBuilder, EngineConfig, QueryOutcome};
pub use sondar_gate::{check as check_sql, GateRejection};
pub use sondar_llm::{Backoff, HttpChatClient, ScriptedClient};
pub use sondar_prompt::{PromptBuilder, SchemaDigest};
pub use sondar_sandbox::{PythonSandbox, SandboxLimits, SandboxOutcome};
pub use sondar_store::{
    CalculationConfig, ExplorationDepth, ImportRecord, QueryExecutor, SavedQuery, Store,
};

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use sondar_agent::{AgentConfig, AgentRunner};
use sondar_core::{
    Answer, AnswerKind, ChatCompletion, CompletionRequest, EngineError, Intent, Question,
    Session, TableDescriptor, Verdict,
};
use sondar_prompt::PromptBuilder;
use sondar_sandbox::PythonSandbox;
use sondar_store::{CalculationConfig, ImportRecord, SavedQuery, Store};

const CHAT_SYSTEM: &str = "\
You are the assistant of a tabular-data workbench. Reply briefly and in the
user's language. You have no data access in this mode; for data questions,
say the user should ask about their tables.";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard cap on rows a fast-path query may return.
    pub row_cap: usize,
    pub sql_timeout: Duration,
    pub digest_budget: usize,
    pub agent: AgentConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            row_cap: 500,
            sql_timeout: Duration::from_secs(10),
            digest_budget: 8 * 1024,
            agent: AgentConfig::default(),
        }
    }
}

/// The core's public entry surface. Owns no session state: callers pass a
/// `Session` explicitly and one question is in flight per session at a time.
pub struct Engine {
    pub(crate) llm: Arc<dyn ChatCompletion>,
    pub(crate) store: Store,
    pub(crate) sandbox: PythonSandbox,
    pub(crate) prompts: PromptBuilder,
    pub(crate) config: EngineConfig,
}

pub struct EngineBuilder {
    llm: Arc<dyn ChatCompletion>,
    store: Store,
    sandbox: PythonSandbox,
    config: EngineConfig,
}

impl Engine {
    pub fn builder(store: Store, llm: Arc<dyn ChatCompletion>) -> EngineBuilder {
        EngineBuilder {
            llm,
            store,
            sandbox: PythonSandbox::new(),
            config: EngineConfig::default(),
        }
    }

    /// Answers one question: routes intent, then either replies directly or
    /// runs the fast NL→SQL path.
    pub async fn ask(
        &self,
        question: &Question,
        session: &mut Session,
    ) -> Result<Answer, EngineError> {
        if session.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let tables = self.load_schema().await?;
        let intent = self.route(&question.text, &tables, session).await?;

        match intent {
            Intent::Chat => self.chat_reply(&question.text, session).await,
            Intent::Query => {
                let outcome = self.translate(&question.text, &tables, session).await?;
                let content = match (&outcome.artifact.verdict, &outcome.narration) {
                    (Verdict::Rejected { reason }, _) => {
                        format!("SQL rejected: {reason}")
                    }
                    (Verdict::Accepted, Some(narration)) => narration.clone(),
                    (Verdict::Accepted, None) => outcome
                        .artifact
                        .error
                        .clone()
                        .map(|e| format!("Query failed: {e}"))
                        .unwrap_or_else(|| "The query returned no narration.".to_string()),
                };
                Ok(Answer {
                    kind: AnswerKind::Query,
                    content,
                    sql: Some(outcome.artifact.sql.clone()),
                    rows: outcome.artifact.rows.clone(),
                    plots: Vec::new(),
                    insights: Vec::new(),
                    trace: None,
                })
            }
        }
    }

    /// The deep path: a bounded autonomous analysis producing a trace,
    /// plots, and insights.
    pub async fn ask_analysis(
        &self,
        question: &Question,
        session: &mut Session,
    ) -> Result<Answer, EngineError> {
        if session.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let runner = AgentRunner::new(self.llm.clone(), self.store.clone(), self.sandbox.clone())
            .with_config(self.config.agent.clone())
            .with_prompts(self.prompts.clone());
        let outcome = runner.run(question, session).await;

        Ok(Answer {
            kind: AnswerKind::Analysis,
            content: outcome.summary,
            sql: None,
            rows: None,
            plots: outcome.plots,
            insights: outcome.trace.insights.clone(),
            trace: Some(outcome.trace),
        })
    }

    async fn chat_reply(
        &self,
        question: &str,
        session: &mut Session,
    ) -> Result<Answer, EngineError> {
        let text = if crate::router::is_blank(question) {
            "Olá! Como posso ajudar com seus dados?".to_string()
        } else {
            self.llm
                .complete(CompletionRequest::new(CHAT_SYSTEM, question))
                .await?
        };
        session.log.emit("engine", "chat_reply", json!({"bytes": text.len()}));
        Ok(Answer::chat(text))
    }

    pub(crate) async fn load_schema(&self) -> Result<Vec<TableDescriptor>, EngineError> {
        let names = self.store.list_tables().await?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(self.store.describe(&name).await?);
        }
        Ok(tables)
    }

    pub async fn list_tables(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.store.list_tables().await?)
    }

    pub async fn describe_table(&self, name: &str) -> Result<TableDescriptor, EngineError> {
        Ok(self.store.describe(name).await?)
    }

    pub async fn set_primary_key(
        &self,
        table: &str,
        column: Option<&str>,
    ) -> Result<(), EngineError> {
        Ok(self.store.set_primary_key(table, column).await?)
    }

    /// Saved queries are gate-checked: a query that would be refused at ask
    /// time cannot be stored.
    pub async fn save_query(
        &self,
        name: &str,
        sql: &str,
        question: &str,
    ) -> Result<(), EngineError> {
        sondar_gate::check(sql).map_err(|rejection| EngineError::GateRejected {
            reason: rejection.reason,
        })?;
        Ok(self.store.save_query(name, sql, question).await?)
    }

    pub async fn list_saved_queries(&self) -> Result<Vec<SavedQuery>, EngineError> {
        Ok(self.store.list_saved_queries().await?)
    }

    pub async fn save_calculation_config(
        &self,
        config: &CalculationConfig,
    ) -> Result<(), EngineError> {
        Ok(self.store.save_calculation_config(config).await?)
    }

    pub async fn list_calculation_configs(&self) -> Result<Vec<CalculationConfig>, EngineError> {
        Ok(self.store.list_calculation_configs().await?)
    }

    pub async fn delete_calculation_config(&self, name: &str) -> Result<(), EngineError> {
        Ok(self.store.delete_calculation_config(name).await?)
    }

    pub async fn record_import(&self, record: &ImportRecord) -> Result<(), EngineError> {
        Ok(self.store.record_import(record).await?)
    }

    pub async fn list_imports(&self) -> Result<Vec<ImportRecord>, EngineError> {
        Ok(self.store.list_imports().await?)
    }
}

impl EngineBuilder {
    pub fn sandbox(mut self, sandbox: PythonSandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Engine {
        let prompts = PromptBuilder::new().with_digest_budget(self.config.digest_budget);
        Engine {
            llm: self.llm,
            store: self.store,
            sandbox: self.sandbox,
            prompts,
            config: self.config,
        }
    }
}

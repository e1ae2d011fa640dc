use serde_json::json;

use sondar_core::{
    CompletionRequest, EngineError, ExecutionError, RowSet, Session, SqlArtifact,
    TableDescriptor,
};
use sondar_prompt::strip_code_fences;

use crate::engine::Engine;

/// What the fast path produced: the SQL artifact (verdict, rows or error)
/// plus the narration for accepted, executed queries.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub artifact: SqlArtifact,
    pub narration: Option<String>,
    pub repaired: bool,
}

impl Engine {
    /// Single-shot NL→SQL: prompt → complete → strip fences → gate →
    /// execute → narrate. At most one repair attempt, and only for
    /// reference errors; at most two executions ever.
    pub(crate) async fn translate(
        &self,
        question: &str,
        tables: &[TableDescriptor],
        session: &mut Session,
    ) -> Result<QueryOutcome, EngineError> {
        let prompt = self.prompts.sql_prompt(question, tables, Some(self.config.row_cap));
        if prompt.digest_truncated {
            session.log.emit(
                "prompt",
                "digest_truncated",
                json!({"template": prompt.template_id}),
            );
        }
        let raw = self
            .llm
            .complete(CompletionRequest::new(prompt.system, prompt.user))
            .await?;
        let sql = strip_code_fences(&raw);
        session.log.emit(
            "translator",
            "generated",
            json!({"sql": sql, "template": prompt.template_id}),
        );

        if let Err(rejection) = sondar_gate::check(&sql) {
            session.log.emit(
                "gate",
                "rejected",
                json!({"sql": sql, "reason": rejection.reason}),
            );
            return Ok(QueryOutcome {
                artifact: SqlArtifact::rejected(sql, rejection.reason),
                narration: None,
                repaired: false,
            });
        }

        match self.execute_capped(&sql).await {
            Ok(rows) => self.narrated_outcome(question, sql, rows, false, session).await,
            Err(ExecutionError::Reference(message)) => {
                self.repair(question, tables, &sql, &message, session).await
            }
            Err(error) => {
                session.log.emit(
                    "executor",
                    "failed",
                    json!({"sql": sql, "error": error.to_string()}),
                );
                let mut artifact = SqlArtifact::accepted(sql);
                artifact.error = Some(error.to_string());
                Ok(QueryOutcome {
                    artifact,
                    narration: None,
                    repaired: false,
                })
            }
        }
    }

    /// One re-prompt with the executor's message appended; a second failure
    /// of any kind is terminal.
    async fn repair(
        &self,
        question: &str,
        tables: &[TableDescriptor],
        failed_sql: &str,
        error: &str,
        session: &mut Session,
    ) -> Result<QueryOutcome, EngineError> {
        session.log.emit(
            "translator",
            "repair_attempt",
            json!({"failed_sql": failed_sql, "error": error}),
        );
        let prompt = self
            .prompts
            .sql_repair_prompt(question, tables, failed_sql, error);
        let raw = self
            .llm
            .complete(CompletionRequest::new(prompt.system, prompt.user))
            .await?;
        let sql = strip_code_fences(&raw);

        if let Err(rejection) = sondar_gate::check(&sql) {
            return Ok(QueryOutcome {
                artifact: SqlArtifact::rejected(sql, rejection.reason),
                narration: None,
                repaired: true,
            });
        }

        match self.execute_capped(&sql).await {
            Ok(rows) => self.narrated_outcome(question, sql, rows, true, session).await,
            Err(terminal) => {
                session.log.emit(
                    "executor",
                    "repair_failed",
                    json!({"sql": sql, "error": terminal.to_string()}),
                );
                let mut artifact = SqlArtifact::accepted(sql);
                artifact.error = Some(terminal.to_string());
                Ok(QueryOutcome {
                    artifact,
                    narration: None,
                    repaired: true,
                })
            }
        }
    }

    async fn execute_capped(&self, sql: &str) -> Result<RowSet, ExecutionError> {
        self.store
            .executor()
            .execute(sql, self.config.row_cap, self.config.sql_timeout)
            .await
    }

    async fn narrated_outcome(
        &self,
        question: &str,
        sql: String,
        rows: RowSet,
        repaired: bool,
        session: &mut Session,
    ) -> Result<QueryOutcome, EngineError> {
        let narration = self.narrate(question, &rows).await?;
        session.log.emit(
            "translator",
            "answered",
            json!({"rows": rows.row_count(), "repaired": repaired}),
        );
        let mut artifact = SqlArtifact::accepted(sql);
        artifact.rows = Some(rows);
        Ok(QueryOutcome {
            artifact,
            narration: Some(narration),
            repaired,
        })
    }

    /// The narrator only ever sees the serialized rows and a one-sentence
    /// restatement, never the schema or the full conversation.
    async fn narrate(&self, question: &str, rows: &RowSet) -> Result<String, EngineError> {
        let restatement = restate(question);
        let prompt = self.prompts.narration_prompt(
            &restatement,
            &rows.digest(4096),
            rows.row_count(),
        );
        Ok(self
            .llm
            .complete(CompletionRequest::new(prompt.system, prompt.user))
            .await?)
    }
}

fn restate(question: &str) -> String {
    let sentence = question
        .split_inclusive(['?', '.', '!'])
        .next()
        .unwrap_or(question);
    let mut out: String = sentence.trim().chars().take(160).collect();
    if out.len() < sentence.trim().len() {
        out.push('…');
    }
    out
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;

use sondar_core::{
    ActionKind, AnalysisTrace, ChatCompletion, CompletionRequest, PlotArtifact, Question,
    Session, StepArtifact, TableDescriptor, TraceStatus,
};
use sondar_prompt::{strip_code_fences, PromptBuilder};
use sondar_sandbox::PythonSandbox;
use sondar_store::{AgentLogRow, Store};

use crate::memory::WorkingMemory;
use crate::plan::PlanDirective;

const AGENT_NAME: &str = "analysis-agent";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hard bound on trace length; the loop terminates within it regardless
    /// of model behavior.
    pub max_steps: usize,
    pub max_consecutive_gate_rejections: u32,
    pub max_sandbox_failures: u32,
    /// Budget shared by unparseable plans and execution failures.
    pub max_step_errors: u32,
    pub sql_row_cap: usize,
    pub sql_timeout: Duration,
    /// Rows per table handed to the sandbox as dataframes.
    pub snapshot_rows: usize,
    pub finding_digest_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_consecutive_gate_rejections: 3,
            max_sandbox_failures: 3,
            max_step_errors: 3,
            sql_row_cap: 500,
            sql_timeout: Duration::from_secs(10),
            snapshot_rows: 1000,
            finding_digest_bytes: 1024,
        }
    }
}

pub struct AgentOutcome {
    pub trace: AnalysisTrace,
    pub plots: Vec<PlotArtifact>,
    /// The synthesis when one exists, otherwise a deterministic summary of
    /// whatever was collected.
    pub summary: String,
}

/// The deep path: a planner/executor alternating gated SQL exploration and
/// sandboxed Python analysis until the model signals completion, the step
/// budget runs out, or a failure budget trips.
pub struct AgentRunner {
    llm: Arc<dyn ChatCompletion>,
    store: Store,
    sandbox: PythonSandbox,
    prompts: PromptBuilder,
    config: AgentConfig,
}

enum LoopExit {
    Completed(String),
    Exhausted,
    Failed,
}

impl AgentRunner {
    pub fn new(llm: Arc<dyn ChatCompletion>, store: Store, sandbox: PythonSandbox) -> Self {
        Self {
            llm,
            store,
            sandbox,
            prompts: PromptBuilder::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub async fn run(&self, question: &Question, session: &mut Session) -> AgentOutcome {
        let mut trace = AnalysisTrace::begin(question.text.as_str());
        let mut memory = WorkingMemory::new(self.config.finding_digest_bytes);
        let mut plots = Vec::new();

        session.log.emit(
            "agent",
            "start",
            json!({"trace_id": trace.id, "question": question.text}),
        );

        let tables = match self.scan_schema(&mut trace, &mut memory).await {
            Ok(tables) => tables,
            Err(reason) => {
                trace.push_step(
                    ActionKind::Error,
                    "schema scan failed",
                    StepArtifact::default().with_diagnostics(reason),
                );
                return self.finish(trace, memory, plots, LoopExit::Failed, question, session)
                    .await;
            }
        };
        session.log.emit(
            "agent",
            "schema_scan",
            json!({"trace_id": trace.id, "tables": tables.len()}),
        );

        let exit = self
            .drive(&mut trace, &mut memory, &mut plots, &tables, question, session)
            .await;
        self.finish(trace, memory, plots, exit, question, session).await
    }

    async fn drive(
        &self,
        trace: &mut AnalysisTrace,
        memory: &mut WorkingMemory,
        plots: &mut Vec<PlotArtifact>,
        tables: &[TableDescriptor],
        question: &Question,
        session: &mut Session,
    ) -> LoopExit {
        let mut consecutive_rejections = 0u32;
        let mut sandbox_failures = 0u32;
        let mut step_errors = 0u32;

        loop {
            if session.is_cancelled() {
                trace.push_step(
                    ActionKind::Error,
                    "run cancelled",
                    StepArtifact::default().with_diagnostics("cancelled"),
                );
                return LoopExit::Failed;
            }

            // Room for a plan, its action, and a closing synthesis.
            if trace.step_count() + 3 > self.config.max_steps {
                return LoopExit::Exhausted;
            }

            let remaining = self.config.max_steps - trace.step_count();
            let prompt =
                self.prompts
                    .plan_prompt(&question.text, tables, &memory.render(), remaining);
            let started = Instant::now();
            let reply = match self
                .llm
                .complete(CompletionRequest::new(prompt.system, prompt.user))
                .await
            {
                Ok(reply) => reply,
                Err(error) => {
                    let message = error.to_string();
                    trace.push_step(
                        ActionKind::Error,
                        "planner unavailable",
                        StepArtifact::default().with_diagnostics(message.clone()),
                    );
                    self.record_log("plan", &question.text, "", started, "error", Some(&message))
                        .await;
                    return LoopExit::Failed;
                }
            };
            self.record_log("plan", prompt.template_id, &reply, started, "ok", None)
                .await;
            trace.push_step(
                ActionKind::Plan,
                "choose next action",
                StepArtifact::input(prompt.template_id.to_string())
                    .with_output(clip(&reply, 400)),
            );

            match PlanDirective::parse(&reply) {
                Err(reason) => {
                    trace.push_step(
                        ActionKind::Error,
                        "unparseable plan",
                        StepArtifact::default().with_diagnostics(reason),
                    );
                    step_errors += 1;
                    if step_errors >= self.config.max_step_errors {
                        return LoopExit::Failed;
                    }
                }
                Ok(PlanDirective::Done(synthesis)) => {
                    session.log.emit(
                        "agent",
                        "complete",
                        json!({"trace_id": trace.id, "steps": trace.step_count()}),
                    );
                    return LoopExit::Completed(synthesis);
                }
                Ok(PlanDirective::Sql(sql)) => {
                    let sql = strip_code_fences(&sql);
                    match sondar_gate::check(&sql) {
                        Err(rejection) => {
                            session.log.emit(
                                "gate",
                                "rejected",
                                json!({"trace_id": trace.id, "reason": rejection.reason}),
                            );
                            trace.push_step(
                                ActionKind::Error,
                                "sql rejected by the gate",
                                StepArtifact::input(sql.clone())
                                    .with_diagnostics(rejection.reason.clone()),
                            );
                            consecutive_rejections += 1;
                            if consecutive_rejections
                                >= self.config.max_consecutive_gate_rejections
                            {
                                return LoopExit::Failed;
                            }
                        }
                        Ok(()) => {
                            consecutive_rejections = 0;
                            self.explore_sql(trace, memory, &sql, &mut step_errors, session)
                                .await;
                            if step_errors >= self.config.max_step_errors {
                                return LoopExit::Failed;
                            }
                        }
                    }
                }
                Ok(PlanDirective::Python(code)) => {
                    let code = strip_code_fences(&code);
                    let accepted = self
                        .analyze_python(trace, memory, plots, tables, &code, session)
                        .await;
                    if !accepted {
                        sandbox_failures += 1;
                        if sandbox_failures >= self.config.max_sandbox_failures {
                            return LoopExit::Failed;
                        }
                    }
                }
            }
        }
    }

    async fn explore_sql(
        &self,
        trace: &mut AnalysisTrace,
        memory: &mut WorkingMemory,
        sql: &str,
        step_errors: &mut u32,
        session: &mut Session,
    ) {
        let started = Instant::now();
        match self
            .store
            .executor()
            .execute(sql, self.config.sql_row_cap, self.config.sql_timeout)
            .await
        {
            Ok(rows) => {
                let digest = rows.digest(self.config.finding_digest_bytes);
                let index = trace.push_step(
                    ActionKind::SqlExploration,
                    "sql exploration",
                    StepArtifact::input(sql.to_string()).with_output(digest.clone()),
                );
                memory.push(
                    index,
                    ActionKind::SqlExploration,
                    format!("{sql}\n{digest}"),
                );
                session.log.emit(
                    "executor",
                    "execute",
                    json!({"trace_id": trace.id, "rows": rows.row_count()}),
                );
                self.record_log("sql_exploration", sql, &digest, started, "ok", None)
                    .await;
            }
            Err(error) => {
                let message = error.to_string();
                trace.push_step(
                    ActionKind::Error,
                    "sql exploration failed",
                    StepArtifact::input(sql.to_string()).with_diagnostics(message.clone()),
                );
                *step_errors += 1;
                self.record_log("sql_exploration", sql, "", started, "error", Some(&message))
                    .await;
            }
        }
    }

    /// Returns false when the sandbox reported a failure.
    async fn analyze_python(
        &self,
        trace: &mut AnalysisTrace,
        memory: &mut WorkingMemory,
        plots: &mut Vec<PlotArtifact>,
        tables: &[TableDescriptor],
        code: &str,
        session: &mut Session,
    ) -> bool {
        let started = Instant::now();
        let snapshots = self.snapshot_tables(tables).await;
        let outcome = self.sandbox.run(code, &snapshots).await;

        session.log.emit(
            "sandbox",
            "run",
            json!({
                "trace_id": trace.id,
                "success": outcome.success,
                "plots": outcome.plots.len(),
                "insights": outcome.insights.len(),
            }),
        );

        if outcome.success {
            let mut summary = clip(outcome.stdout.trim(), self.config.finding_digest_bytes);
            if !outcome.insights.is_empty() {
                summary.push_str(&format!("\n{} insight(s) recorded", outcome.insights.len()));
            }
            if !outcome.execution_results.is_empty() {
                summary.push_str(&format!(
                    "\n{} result object(s) captured",
                    outcome.execution_results.len()
                ));
            }
            let index = trace.push_step(
                ActionKind::PythonAnalysis,
                "python analysis",
                StepArtifact::input(code.to_string()).with_output(summary.clone()),
            );
            memory.push(index, ActionKind::PythonAnalysis, summary.clone());
            trace.insights.extend(outcome.insights);
            plots.extend(outcome.plots);
            self.record_log("python_analysis", code, &summary, started, "ok", None)
                .await;
            true
        } else {
            let message = outcome
                .error
                .map(|failure| failure.message)
                .unwrap_or_else(|| "sandbox failure".to_string());
            trace.push_step(
                ActionKind::Error,
                "python analysis failed",
                StepArtifact::input(code.to_string()).with_diagnostics(message.clone()),
            );
            self.record_log("python_analysis", code, "", started, "error", Some(&message))
                .await;
            false
        }
    }

    async fn scan_schema(
        &self,
        trace: &mut AnalysisTrace,
        memory: &mut WorkingMemory,
    ) -> Result<Vec<TableDescriptor>, String> {
        let names = self
            .store
            .list_tables()
            .await
            .map_err(|e| e.to_string())?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(self.store.describe(&name).await.map_err(|e| e.to_string())?);
        }

        let overview: Vec<String> = tables
            .iter()
            .map(|t| format!("{} ({} rows, {} columns)", t.name, t.row_count, t.columns.len()))
            .collect();
        let overview = overview.join("; ");
        let index = trace.push_step(
            ActionKind::SchemaScan,
            "schema scan",
            StepArtifact::default().with_output(overview.clone()),
        );
        memory.push(index, ActionKind::SchemaScan, overview);
        Ok(tables)
    }

    async fn snapshot_tables(
        &self,
        tables: &[TableDescriptor],
    ) -> Vec<(String, sondar_core::RowSet)> {
        let executor = self.store.executor();
        let mut snapshots = Vec::with_capacity(tables.len());
        for table in tables {
            let sql = format!(
                "SELECT * FROM \"{}\" LIMIT {}",
                table.name, self.config.snapshot_rows
            );
            match executor
                .execute(&sql, self.config.snapshot_rows, self.config.sql_timeout)
                .await
            {
                Ok(rows) => snapshots.push((table.name.clone(), rows)),
                Err(error) => {
                    tracing::warn!(table = %table.name, %error, "snapshot skipped");
                }
            }
        }
        snapshots
    }

    async fn finish(
        &self,
        mut trace: AnalysisTrace,
        memory: WorkingMemory,
        plots: Vec<PlotArtifact>,
        exit: LoopExit,
        question: &Question,
        session: &mut Session,
    ) -> AgentOutcome {
        let summary = match exit {
            LoopExit::Completed(synthesis) => {
                trace.push_step(
                    ActionKind::Synthesis,
                    "final synthesis",
                    StepArtifact::default().with_output(synthesis.clone()),
                );
                trace.close(TraceStatus::Complete, Some(synthesis.clone()));
                synthesis
            }
            LoopExit::Exhausted => {
                let synthesis = self.synthesize(question, &memory).await;
                trace.push_step(
                    ActionKind::Synthesis,
                    "synthesis at the step budget",
                    StepArtifact::default().with_output(synthesis.clone()),
                );
                trace.close(TraceStatus::Exhausted, Some(synthesis.clone()));
                synthesis
            }
            LoopExit::Failed => {
                trace.close(TraceStatus::Failed, None);
                memory.fallback_summary(&question.text)
            }
        };

        session.log.emit(
            "agent",
            "finish",
            json!({
                "trace_id": trace.id,
                "status": trace.status,
                "steps": trace.step_count(),
            }),
        );
        AgentOutcome {
            trace,
            plots,
            summary,
        }
    }

    async fn synthesize(&self, question: &Question, memory: &WorkingMemory) -> String {
        let prompt = self
            .prompts
            .synthesis_prompt(&question.text, &memory.render());
        let started = Instant::now();
        match self
            .llm
            .complete(CompletionRequest::new(prompt.system, prompt.user))
            .await
        {
            Ok(synthesis) => {
                self.record_log("synthesis", &question.text, &synthesis, started, "ok", None)
                    .await;
                synthesis
            }
            Err(error) => {
                tracing::warn!(%error, "synthesis fell back to collected findings");
                memory.fallback_summary(&question.text)
            }
        }
    }

    /// Best-effort persistence; a full store never blocks the analysis.
    async fn record_log(
        &self,
        action: &str,
        input: &str,
        output: &str,
        started: Instant,
        status: &str,
        error: Option<&str>,
    ) {
        let row = AgentLogRow {
            agent_name: AGENT_NAME.to_string(),
            action: action.to_string(),
            input: clip(input, 2000),
            output: clip(output, 2000),
            tokens_used: None,
            latency_ms: started.elapsed().as_millis() as i64,
            status: status.to_string(),
            error_message: error.map(|e| e.to_string()),
            created_at: Utc::now(),
        };
        if let Err(error) = self.store.record_agent_log(&row).await {
            tracing::warn!(%error, "agent log row dropped");
        }
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

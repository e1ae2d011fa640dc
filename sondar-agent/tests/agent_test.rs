use std::sync::Arc;
use std::time::Duration;

use sondar_agent::{AgentConfig, AgentRunner};
use sondar_core::{ActionKind, Question, Session, TraceStatus};
use sondar_llm::ScriptedClient;
use sondar_sandbox::PythonSandbox;
use sondar_store::Store;

async fn seeded_store(dir: &tempfile::TempDir) -> Store {
    let store = Store::builder(dir.path().join("agent.db"))
        .build()
        .await
        .unwrap();
    sqlx::query("CREATE TABLE sales (ID INTEGER, TS TEXT, AMOUNT REAL)")
        .execute(store.write_pool())
        .await
        .unwrap();
    for i in 0..50 {
        sqlx::query("INSERT INTO sales VALUES (?1, '2024-01-01', ?2)")
            .bind(i)
            .bind(10.0 + i as f64)
            .execute(store.write_pool())
            .await
            .unwrap();
    }
    store
}

fn runner(store: Store, responses: Vec<&str>) -> AgentRunner {
    let llm = Arc::new(ScriptedClient::new(
        responses.into_iter().map(String::from).collect(),
    ));
    AgentRunner::new(llm, store, PythonSandbox::new()).with_config(AgentConfig {
        sql_timeout: Duration::from_secs(5),
        ..AgentConfig::default()
    })
}

fn question() -> Question {
    Question::new("Analise a distribuição de amount.", "session-1")
}

#[tokio::test]
async fn completes_with_sql_exploration_and_synthesis() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let runner = runner(
        store,
        vec![
            "SQL:\nSELECT COUNT(*) AS n, AVG(\"AMOUNT\") AS mean FROM \"sales\"",
            "DONE:\nThere are 50 sales averaging 34.5.",
        ],
    );

    let mut session = Session::new();
    let outcome = runner.run(&question(), &mut session).await;

    assert_eq!(outcome.trace.status, TraceStatus::Complete);
    assert_eq!(
        outcome.trace.synthesis.as_deref(),
        Some("There are 50 sales averaging 34.5.")
    );
    assert_eq!(outcome.summary, "There are 50 sales averaging 34.5.");

    let scans = outcome
        .trace
        .steps
        .iter()
        .filter(|s| s.kind == ActionKind::SchemaScan)
        .count();
    assert_eq!(scans, 1);
    assert!(outcome
        .trace
        .steps
        .iter()
        .any(|s| s.kind == ActionKind::SqlExploration));
    assert!(outcome
        .trace
        .steps
        .iter()
        .any(|s| s.kind == ActionKind::Synthesis));
    assert!(outcome.trace.step_count() <= 10);
}

#[tokio::test]
async fn exhausts_at_the_step_budget_with_a_synthesis() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    // The model never signals completion; the last response feeds the
    // synthesis prompt.
    let sql = "SQL:\nSELECT COUNT(*) FROM \"sales\"";
    let runner = runner(
        store,
        vec![sql, sql, sql, sql, "All findings point to 50 rows."],
    );

    let mut session = Session::new();
    let outcome = runner.run(&question(), &mut session).await;

    assert_eq!(outcome.trace.status, TraceStatus::Exhausted);
    assert_eq!(
        outcome.trace.synthesis.as_deref(),
        Some("All findings point to 50 rows.")
    );
    assert!(outcome.trace.step_count() <= 10);
}

#[tokio::test]
async fn consecutive_gate_rejections_fail_the_trace() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let drop_sql = "SQL:\nDROP TABLE \"sales\"";
    let runner = runner(store.clone(), vec![drop_sql, drop_sql, drop_sql]);

    let mut session = Session::new();
    let outcome = runner.run(&question(), &mut session).await;

    assert_eq!(outcome.trace.status, TraceStatus::Failed);
    assert!(outcome.trace.synthesis.is_none());
    // The fallback summary still reports what was collected.
    assert!(outcome.summary.contains("sales"));
    // Nothing was executed: the table survived.
    assert_eq!(store.describe("sales").await.unwrap().row_count, 50);
}

#[tokio::test]
async fn repeated_sandbox_failures_fail_the_trace() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    // The guard rejects the code each time, which counts as a sandbox
    // failure without ever spawning an interpreter.
    let bad = "PYTHON:\nopen('/etc/passwd').read()";
    let runner = runner(store, vec![bad, bad, bad]);

    let mut session = Session::new();
    let outcome = runner.run(&question(), &mut session).await;

    assert_eq!(outcome.trace.status, TraceStatus::Failed);
    assert!(outcome.trace.synthesis.is_none());
    assert!(outcome
        .trace
        .steps
        .iter()
        .any(|s| s.kind == ActionKind::Error));
}

#[tokio::test]
async fn unparseable_plans_consume_the_error_budget() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let runner = runner(
        store,
        vec!["hmm, not sure", "still thinking", "no directive here"],
    );

    let mut session = Session::new();
    let outcome = runner.run(&question(), &mut session).await;

    assert_eq!(outcome.trace.status, TraceStatus::Failed);
    assert!(outcome.trace.synthesis.is_none());
}

#[tokio::test]
async fn cancellation_closes_the_trace_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let runner = runner(store, vec!["DONE:\nnever reached"]);

    let mut session = Session::new();
    session.cancellation_token().cancel();
    let outcome = runner.run(&question(), &mut session).await;

    assert_eq!(outcome.trace.status, TraceStatus::Failed);
    let cancelled = outcome
        .trace
        .steps
        .iter()
        .any(|s| s.artifact.diagnostics.as_deref() == Some("cancelled"));
    assert!(cancelled);
}

#[tokio::test]
async fn agent_steps_are_persisted_to_agent_logs() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let runner = runner(
        store.clone(),
        vec![
            "SQL:\nSELECT COUNT(*) FROM \"sales\"",
            "DONE:\nDone counting.",
        ],
    );

    let mut session = Session::new();
    runner.run(&question(), &mut session).await;

    let logged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agent_logs")
        .fetch_one(store.write_pool())
        .await
        .unwrap();
    assert!(logged >= 2); // at least the plans and the exploration
}

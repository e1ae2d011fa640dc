use std::sync::Arc;

use sondar_core::{AnswerKind, EngineError, Question, Scalar, Session};
use sondar_engine::Engine;
use sondar_llm::ScriptedClient;
use sondar_store::Store;

async fn seeded_store(dir: &tempfile::TempDir) -> Store {
    let store = Store::builder(dir.path().join("engine.db"))
        .build()
        .await
        .unwrap();
    sqlx::query("CREATE TABLE employees (ID INTEGER, NAME TEXT, DEPARTMENT TEXT, SALARY REAL)")
        .execute(store.write_pool())
        .await
        .unwrap();
    for (id, name, dept, salary) in [
        (1, "A", "Sales", 3000.0),
        (2, "B", "Sales", 5000.0),
        (3, "C", "Ops", 4000.0),
    ] {
        sqlx::query("INSERT INTO employees VALUES (?1, ?2, ?3, ?4)")
            .bind(id)
            .bind(name)
            .bind(dept)
            .bind(salary)
            .execute(store.write_pool())
            .await
            .unwrap();
    }
    store
}

fn engine_with(store: Store, responses: Vec<&str>) -> (Engine, Arc<ScriptedClient>) {
    let llm = Arc::new(ScriptedClient::new(
        responses.into_iter().map(String::from).collect(),
    ));
    let engine = Engine::builder(store, llm.clone()).build();
    (engine, llm)
}

fn ask(text: &str, session: &Session) -> Question {
    Question::new(text, &session.id)
}

#[tokio::test]
async fn average_salary_by_department_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, llm) = engine_with(
        store,
        vec![
            "QUERY",
            "SELECT \"DEPARTMENT\", AVG(\"SALARY\") AS avg_salary FROM \"employees\" \
             GROUP BY \"DEPARTMENT\" ORDER BY \"DEPARTMENT\"",
            "Ops e Sales têm salário médio de 4000.",
        ],
    );

    let mut session = Session::new();
    let answer = engine
        .ask(&ask("Qual o salário médio por departamento?", &session), &mut session)
        .await
        .unwrap();

    assert_eq!(answer.kind, AnswerKind::Query);
    assert_eq!(answer.content, "Ops e Sales têm salário médio de 4000.");
    let rows = answer.rows.unwrap();
    assert_eq!(rows.rows.len(), 2);
    assert_eq!(rows.rows[0][0], Scalar::Text("Ops".to_string()));
    assert_eq!(rows.rows[0][1], Scalar::Real(4000.0));
    assert_eq!(rows.rows[1][0], Scalar::Text("Sales".to_string()));
    assert_eq!(rows.rows[1][1], Scalar::Real(4000.0));
    // intent + generation + narration, nothing more
    assert_eq!(llm.recorded_requests().len(), 3);
}

#[tokio::test]
async fn greetings_never_generate_sql() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, llm) = engine_with(store, vec!["CHAT", "Olá! Tudo bem por aqui."]);

    let mut session = Session::new();
    let answer = engine
        .ask(&ask("Olá, tudo bem?", &session), &mut session)
        .await
        .unwrap();

    assert_eq!(answer.kind, AnswerKind::Chat);
    assert_eq!(answer.content, "Olá! Tudo bem por aqui.");
    assert!(answer.sql.is_none());
    assert!(answer.rows.is_none());
    assert_eq!(llm.recorded_requests().len(), 2);
}

#[tokio::test]
async fn empty_questions_short_circuit_to_chat() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, llm) = engine_with(store, vec![]);

    let mut session = Session::new();
    let answer = engine.ask(&ask("  ?! ", &session), &mut session).await.unwrap();

    assert_eq!(answer.kind, AnswerKind::Chat);
    // No model call was made at all.
    assert!(llm.recorded_requests().is_empty());
}

#[tokio::test]
async fn unintelligible_intent_defaults_to_chat() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, _) = engine_with(store, vec!["perhaps??", "I can chat about that."]);

    let mut session = Session::new();
    let answer = engine
        .ask(&ask("tell me something", &session), &mut session)
        .await
        .unwrap();
    assert_eq!(answer.kind, AnswerKind::Chat);
}

#[tokio::test]
async fn malicious_drop_is_rejected_and_never_executed() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, llm) = engine_with(store.clone(), vec!["QUERY", "DROP TABLE \"employees\""]);

    let mut session = Session::new();
    let answer = engine
        .ask(&ask("Drop the employees table.", &session), &mut session)
        .await
        .unwrap();

    assert_eq!(answer.kind, AnswerKind::Query);
    assert!(answer.content.contains("forbidden_verb: DROP"));
    assert_eq!(answer.sql.as_deref(), Some("DROP TABLE \"employees\""));
    assert!(answer.rows.is_none());
    // No narration call happened after the rejection.
    assert_eq!(llm.recorded_requests().len(), 2);
    // The table survived untouched.
    assert_eq!(store.describe("employees").await.unwrap().row_count, 3);
}

#[tokio::test]
async fn misspelled_column_gets_exactly_one_repair() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, llm) = engine_with(
        store,
        vec![
            "QUERY",
            "SELECT \"AMONT\" FROM \"employees\"",
            "SELECT \"SALARY\" FROM \"employees\" ORDER BY \"SALARY\"",
            "Salários entre 3000 e 5000.",
        ],
    );

    let mut session = Session::new();
    let answer = engine
        .ask(&ask("Mostre os valores de AMONT", &session), &mut session)
        .await
        .unwrap();

    assert_eq!(answer.content, "Salários entre 3000 e 5000.");
    let rows = answer.rows.unwrap();
    assert_eq!(rows.rows.len(), 3);
    // intent + first attempt + repair + narration
    assert_eq!(llm.recorded_requests().len(), 4);
}

#[tokio::test]
async fn a_second_reference_failure_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, llm) = engine_with(
        store,
        vec![
            "QUERY",
            "SELECT \"AMONT\" FROM \"employees\"",
            "SELECT \"STILL_WRONG\" FROM \"employees\"",
        ],
    );

    let mut session = Session::new();
    let answer = engine
        .ask(&ask("Mostre os valores de AMONT", &session), &mut session)
        .await
        .unwrap();

    assert!(answer.content.starts_with("Query failed:"));
    assert!(answer.rows.is_none());
    // No third generation, no narration.
    assert_eq!(llm.recorded_requests().len(), 3);
}

#[tokio::test]
async fn saved_queries_are_gate_checked() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, _) = engine_with(store, vec![]);

    let rejected = engine
        .save_query("bad", "DELETE FROM \"employees\"", "cleanup?")
        .await;
    assert!(matches!(rejected, Err(EngineError::GateRejected { .. })));

    engine
        .save_query("avg", "SELECT AVG(\"SALARY\") FROM \"employees\"", "média?")
        .await
        .unwrap();
    let saved = engine.list_saved_queries().await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].name, "avg");
}

#[tokio::test]
async fn concurrent_rebuild_and_read_see_consistent_schemas() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, _) = engine_with(store.clone(), vec![]);

    let executor = store.executor();
    let rebuild = engine.set_primary_key("employees", Some("ID"));
    let read = executor.execute(
        "SELECT * FROM \"employees\"",
        100,
        std::time::Duration::from_secs(5),
    );

    let (rebuilt, rows) = tokio::join!(rebuild, read);
    rebuilt.unwrap();
    // The reader saw the table before or after the rebuild, never a partial
    // or missing one.
    assert_eq!(rows.unwrap().row_count(), 3);
    assert_eq!(
        store.primary_key("employees").await.unwrap(),
        Some("ID".to_string())
    );
}

#[tokio::test]
async fn session_logs_record_the_pipeline_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let (engine, _) = engine_with(
        store,
        vec![
            "QUERY",
            "SELECT COUNT(*) AS n FROM \"employees\"",
            "Há 3 funcionários.",
        ],
    );

    let mut session = Session::new();
    engine
        .ask(&ask("Quantos funcionários?", &session), &mut session)
        .await
        .unwrap();

    let events = session.log.recent(10);
    assert!(!events.is_empty());
    // Newest first, strictly descending seq.
    for pair in events.windows(2) {
        assert!(pair[0].seq > pair[1].seq);
    }
    assert!(events.iter().any(|e| e.component == "router"));
    assert!(events.iter().any(|e| e.component == "translator"));
}

use std::process::Stdio;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use sondar_core::{Insight, PlotArtifact, RowSet, SandboxErrorKind, Value};

use crate::guard::check_code;
use crate::harness::{build_script, OUTCOME_SENTINEL};
use crate::outcome::{SandboxLimits, SandboxOutcome};

/// Runs guarded Python against in-memory table snapshots in a separate
/// interpreter process. `run` never returns an error: every failure mode is
/// folded into the outcome.
///
/// The wall clock is enforced by killing the child; memory caps are
/// best-effort and depend on the host.
#[derive(Debug, Clone)]
pub struct PythonSandbox {
    python_bin: String,
    limits: SandboxLimits,
}

impl Default for PythonSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonSandbox {
    pub fn new() -> Self {
        Self {
            python_bin: "python3".to_string(),
            limits: SandboxLimits::default(),
        }
    }

    pub fn with_python(mut self, python_bin: impl Into<String>) -> Self {
        self.python_bin = python_bin.into();
        self
    }

    pub fn with_limits(mut self, limits: SandboxLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    pub async fn run(&self, code: &str, snapshots: &[(String, RowSet)]) -> SandboxOutcome {
        if let Err((kind, reason)) = check_code(code) {
            tracing::debug!(%reason, "sandbox guard rejected code");
            return SandboxOutcome::failure(kind, reason);
        }

        let script = match build_script(code, snapshots, self.limits.max_result_rows) {
            Ok(script) => script,
            Err(error) => {
                return SandboxOutcome::failure(
                    SandboxErrorKind::Runtime,
                    format!("failed to build harness: {error}"),
                )
            }
        };

        let mut child = match Command::new(&self.python_bin)
            // Isolated mode: no user site-packages path injection, no env
            // variable overrides.
            .arg("-I")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(error) => {
                return SandboxOutcome::failure(
                    SandboxErrorKind::Runtime,
                    format!("failed to start {}: {error}", self.python_bin),
                )
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(error) = stdin.write_all(script.as_bytes()).await {
                return SandboxOutcome::failure(
                    SandboxErrorKind::Runtime,
                    format!("failed to hand the script to the interpreter: {error}"),
                );
            }
        }

        let output = match tokio::time::timeout(self.limits.wall_clock, child.wait_with_output())
            .await
        {
            Err(_) => {
                // Dropping the timed-out child kills it.
                return SandboxOutcome::failure(
                    SandboxErrorKind::CapExceeded,
                    format!("wall clock cap of {:?} exceeded", self.limits.wall_clock),
                );
            }
            Ok(Err(error)) => {
                return SandboxOutcome::failure(
                    SandboxErrorKind::Runtime,
                    format!("interpreter failed: {error}"),
                )
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        match parse_outcome(&stdout) {
            Some(outcome) => outcome,
            None => SandboxOutcome::failure(
                SandboxErrorKind::Runtime,
                format!(
                    "interpreter exited ({}) without an outcome: {}",
                    output.status,
                    tail(&stderr, 400)
                ),
            ),
        }
    }
}

#[derive(Deserialize)]
struct RawOutcome {
    success: bool,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    plots: Vec<RawPlot>,
    #[serde(default)]
    insights: Vec<RawInsight>,
    #[serde(default)]
    execution_results: Vec<Value>,
    error: Option<String>,
    traceback: Option<String>,
}

#[derive(Deserialize)]
struct RawPlot {
    title: String,
    png_base64: String,
}

#[derive(Deserialize)]
struct RawInsight {
    text: String,
    category: String,
}

fn parse_outcome(stdout: &str) -> Option<SandboxOutcome> {
    let json = stdout.rsplit_once(OUTCOME_SENTINEL)?.1.trim();
    let raw: RawOutcome = serde_json::from_str(json).ok()?;

    let now = chrono::Utc::now();
    let error = if raw.success {
        None
    } else {
        Some(crate::outcome::SandboxFailure {
            kind: SandboxErrorKind::Runtime,
            message: raw
                .error
                .unwrap_or_else(|| "analysis failed".to_string()),
        })
    };

    Some(SandboxOutcome {
        success: raw.success,
        stdout: raw.stdout,
        stderr: raw.stderr,
        plots: raw
            .plots
            .into_iter()
            .map(|p| PlotArtifact {
                title: p.title,
                png_base64: p.png_base64,
                created_at: now,
            })
            .collect(),
        insights: raw
            .insights
            .into_iter()
            .map(|i| Insight {
                text: i.text,
                category: i.category,
                created_at: now,
            })
            .collect(),
        execution_results: raw.execution_results,
        error,
        traceback: raw.traceback,
    })
}

fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_rejection_surfaces_in_the_outcome() {
        let sandbox = PythonSandbox::new();
        let outcome = sandbox.run("open('/etc/passwd')", &[]).await;
        assert!(!outcome.success);
        let failure = outcome.error.unwrap();
        assert_eq!(failure.kind, SandboxErrorKind::GuardRejected);
        assert!(failure.message.contains("open"));
        assert!(outcome.plots.is_empty());
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_runtime_failure_not_a_panic() {
        let sandbox = PythonSandbox::new().with_python("definitely-not-a-python");
        let outcome = sandbox.run("x = 1", &[]).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().kind, SandboxErrorKind::Runtime);
    }

    #[test]
    fn outcome_parsing_reads_the_sentinel_tail() {
        let stdout = format!(
            "noise before\n{}\n{}",
            OUTCOME_SENTINEL,
            serde_json::json!({
                "success": true,
                "stdout": "hello",
                "stderr": "",
                "plots": [{"title": "Histogram", "png_base64": "aGk="}],
                "insights": [{"text": "3 outliers", "category": "distribution"}],
                "execution_results": [{"title": "Result", "value": 42}],
                "error": null,
                "traceback": null
            })
        );
        let outcome = parse_outcome(&stdout).unwrap();
        assert!(outcome.success);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.stdout, "hello");
        assert_eq!(outcome.plots[0].title, "Histogram");
        assert_eq!(outcome.insights[0].category, "distribution");
        assert_eq!(outcome.execution_results[0]["value"], 42);
    }

    #[test]
    fn failed_runs_always_carry_an_error() {
        let stdout = format!(
            "{}\n{}",
            OUTCOME_SENTINEL,
            serde_json::json!({
                "success": false,
                "stdout": "",
                "stderr": "",
                "plots": [],
                "insights": [],
                "execution_results": [],
                "error": "KeyError: 'AMONT'",
                "traceback": "Traceback (most recent call last): ..."
            })
        );
        let outcome = parse_outcome(&stdout).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().message, "KeyError: 'AMONT'");
        assert!(outcome.traceback.is_some());
    }
}

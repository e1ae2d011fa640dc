use std::time::Duration;

use serde::{Deserialize, Serialize};

use sondar_core::{Insight, PlotArtifact, SandboxErrorKind, Value};

#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    /// Hard wall-clock cap; the interpreter is killed when it elapses.
    pub wall_clock: Duration,
    /// Rows kept when a dataframe is pushed through `show_results`.
    pub max_result_rows: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            wall_clock: Duration::from_secs(30),
            max_result_rows: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxFailure {
    pub kind: SandboxErrorKind,
    pub message: String,
}

/// What a sandbox run produced. `success == false` always carries `error`;
/// a successful run never does. Missing plots are a normal outcome.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SandboxOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub plots: Vec<PlotArtifact>,
    pub insights: Vec<Insight>,
    pub execution_results: Vec<Value>,
    pub error: Option<SandboxFailure>,
    pub traceback: Option<String>,
}

impl SandboxOutcome {
    pub fn failure(kind: SandboxErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(SandboxFailure {
                kind,
                message: message.into(),
            }),
            ..Self::default()
        }
    }
}

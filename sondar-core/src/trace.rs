use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Plan,
    SchemaScan,
    SqlExploration,
    PythonAnalysis,
    Synthesis,
    Error,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Plan => "plan",
            ActionKind::SchemaScan => "schema_scan",
            ActionKind::SqlExploration => "sql_exploration",
            ActionKind::PythonAnalysis => "python_analysis",
            ActionKind::Synthesis => "synthesis",
            ActionKind::Error => "error",
        }
    }
}

/// Inputs, outputs, and diagnostics attached to one step.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct StepArtifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl StepArtifact {
    pub fn input(input: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AnalysisStep {
    pub index: usize,
    pub kind: ActionKind,
    pub description: String,
    pub artifact: StepArtifact,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Complete,
    Exhausted,
    Failed,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Insight {
    pub text: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PlotArtifact {
    pub title: String,
    pub png_base64: String,
    pub created_at: DateTime<Utc>,
}

/// The ordered record of steps taken to answer one question via the deep
/// path. Steps are append-only; `synthesis` is present iff the status is
/// `Complete` or `Exhausted`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AnalysisTrace {
    pub id: String,
    pub question: String,
    pub steps: Vec<AnalysisStep>,
    pub status: TraceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insights: Vec<Insight>,
}

impl AnalysisTrace {
    pub fn begin(question: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            steps: Vec::new(),
            status: TraceStatus::Failed,
            synthesis: None,
            insights: Vec::new(),
        }
    }

    pub fn push_step(
        &mut self,
        kind: ActionKind,
        description: impl Into<String>,
        artifact: StepArtifact,
    ) -> usize {
        let index = self.steps.len() + 1;
        self.steps.push(AnalysisStep {
            index,
            kind,
            description: description.into(),
            artifact,
        });
        index
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn close(&mut self, status: TraceStatus, synthesis: Option<String>) {
        debug_assert!(
            matches!(status, TraceStatus::Complete | TraceStatus::Exhausted)
                == synthesis.is_some()
        );
        self.status = status;
        self.synthesis = synthesis;
    }
}

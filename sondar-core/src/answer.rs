use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rowset::RowSet;
use crate::trace::{AnalysisTrace, Insight, PlotArtifact};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Question {
    pub text: String,
    pub session_id: String,
    pub asked_at: DateTime<Utc>,
}

impl Question {
    pub fn new(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            asked_at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Chat,
    Query,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "verdict")]
pub enum Verdict {
    Accepted,
    Rejected { reason: String },
}

/// Generated SQL together with its safety verdict and, when accepted and
/// executed, the result or the execution error message.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SqlArtifact {
    pub sql: String,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<RowSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SqlArtifact {
    pub fn rejected(sql: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            verdict: Verdict::Rejected {
                reason: reason.into(),
            },
            rows: None,
            error: None,
        }
    }

    pub fn accepted(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            verdict: Verdict::Accepted,
            rows: None,
            error: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKind {
    Chat,
    Query,
    Analysis,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Answer {
    pub kind: AnswerKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<RowSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plots: Vec<PlotArtifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insights: Vec<Insight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<AnalysisTrace>,
}

impl Answer {
    pub fn chat(content: impl Into<String>) -> Self {
        Self {
            kind: AnswerKind::Chat,
            content: content.into(),
            sql: None,
            rows: None,
            plots: Vec::new(),
            insights: Vec::new(),
            trace: None,
        }
    }
}

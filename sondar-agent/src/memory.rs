use sondar_core::ActionKind;

/// One remembered result: what ran and a byte-capped digest of what came
/// back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub step: usize,
    pub kind: ActionKind,
    pub summary: String,
}

/// The subset of the trace the planner sees on the next iteration. Findings
/// are append-only and each one is capped so a huge result cannot crowd the
/// plan prompt.
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    findings: Vec<Finding>,
    per_finding_bytes: usize,
}

impl WorkingMemory {
    pub fn new(per_finding_bytes: usize) -> Self {
        Self {
            findings: Vec::new(),
            per_finding_bytes: per_finding_bytes.max(64),
        }
    }

    pub fn push(&mut self, step: usize, kind: ActionKind, summary: impl Into<String>) {
        let mut summary: String = summary.into();
        if summary.len() > self.per_finding_bytes {
            let mut end = self.per_finding_bytes;
            while !summary.is_char_boundary(end) {
                end -= 1;
            }
            summary.truncate(end);
            summary.push('…');
        }
        self.findings.push(Finding {
            step,
            kind,
            summary,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Rendering used inside the plan prompt.
    pub fn render(&self) -> String {
        self.findings
            .iter()
            .map(|f| format!("[step {} · {}] {}", f.step, f.kind.as_str(), f.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Deterministic summary used when no model-written synthesis is
    /// available (failed runs, or synthesis-time LLM outage).
    pub fn fallback_summary(&self, question: &str) -> String {
        if self.findings.is_empty() {
            return format!("No findings were collected for: {question}");
        }
        let mut out = format!("Collected findings for: {question}");
        for finding in &self.findings {
            out.push_str(&format!("\n- ({}) {}", finding.kind.as_str(), finding.summary));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findings_are_capped_per_entry() {
        let mut memory = WorkingMemory::new(64);
        memory.push(2, ActionKind::SqlExploration, "x".repeat(500));
        let rendered = memory.render();
        assert!(rendered.len() < 120);
        assert!(rendered.ends_with('…'));
        assert!(rendered.starts_with("[step 2 · sql_exploration]"));
    }

    #[test]
    fn fallback_summary_lists_findings_in_order() {
        let mut memory = WorkingMemory::new(256);
        memory.push(1, ActionKind::SchemaScan, "2 tables");
        memory.push(2, ActionKind::SqlExploration, "3 rows");
        let summary = memory.fallback_summary("what happened?");
        assert!(summary.contains("what happened?"));
        let scan = summary.find("(schema_scan) 2 tables").unwrap();
        let sql = summary.find("(sql_exploration) 3 rows").unwrap();
        assert!(scan < sql);
    }
}

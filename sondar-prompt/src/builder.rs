use std::collections::HashMap;

use sondar_core::TableDescriptor;

use crate::digest::render_digest;
use crate::template::PromptTemplate;

pub const INTENT_TEMPLATE_ID: &str = "intent-v1";
pub const SQL_TEMPLATE_ID: &str = "sql-v1";
pub const SQL_REPAIR_TEMPLATE_ID: &str = "sql-repair-v1";
pub const PLAN_TEMPLATE_ID: &str = "plan-v1";
pub const NARRATION_TEMPLATE_ID: &str = "narration-v1";
pub const SYNTHESIS_TEMPLATE_ID: &str = "synthesis-v1";

const INTENT_SYSTEM: &str = "\
You classify one user message for a tabular-data workbench.
Answer with exactly one word and nothing else:
QUERY if answering requires reading data from the tables below.
CHAT for greetings, small talk, or anything answerable without data.

Tables:
{{digest}}";

const SQL_SYSTEM: &str = "\
You translate one question into exactly one SQLite SELECT statement.

Rules:
- Produce a single SELECT (or WITH ... SELECT) statement and nothing else.
- No INSERT, UPDATE, DELETE, DROP, ALTER, CREATE or any other write.
- Use exactly the table and column names below, double-quoted.
- Stick to standard aggregates, arithmetic, COALESCE, CASE, LIKE and
  strftime date parts; avoid engine-specific extensions.
{{row_cap_rule}}
Schema:
{{digest}}";

const SQL_REPAIR_SYSTEM: &str = "\
Your previous SQL failed. Produce one corrected SQLite SELECT statement and
nothing else, using exactly the quoted table and column names below.

Failed SQL:
{{failed_sql}}

Database error:
{{error}}

Schema:
{{digest}}";

const PLAN_SYSTEM: &str = "\
You are planning the next step of a data analysis. You may run exploratory
SQL, run Python against in-memory copies of the tables, or finish.

Answer in exactly one of these three forms:

SQL:
<one SELECT statement>

PYTHON:
<a short script; DataFrames are bound by table name, helpers save_plot(title),
add_insight(text, category) and show_results(value, title) are available>

DONE:
<final synthesis of the answer for the user>

You have {{remaining_steps}} steps left; finish before they run out.

Schema:
{{digest}}

Findings so far:
{{memory}}";

const NARRATION_SYSTEM: &str = "\
Summarize the result table below in two or three plain sentences for the
question restated as: {{restatement}}
Describe only what the rows show; do not invent numbers.

Result ({{row_count}} rows):
{{rows}}";

const SYNTHESIS_SYSTEM: &str = "\
Write the final answer for the question below from the collected findings.
Be concrete: cite the numbers found. Two short paragraphs at most.

Question: {{question}}

Findings:
{{memory}}";

/// A rendered prompt with the template id recorded so replays are
/// deterministic given the same model and seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub template_id: &'static str,
    pub system: String,
    pub user: String,
    pub digest_truncated: bool,
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    digest_budget: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            digest_budget: 8 * 1024,
        }
    }

    pub fn with_digest_budget(mut self, digest_budget: usize) -> Self {
        self.digest_budget = digest_budget;
        self
    }

    pub fn intent_prompt(&self, question: &str, tables: &[TableDescriptor]) -> BuiltPrompt {
        let digest = render_digest(tables, question, self.digest_budget);
        let system = PromptTemplate::new(INTENT_SYSTEM)
            .render(&HashMap::from([("digest", digest.rendered)]));
        BuiltPrompt {
            template_id: INTENT_TEMPLATE_ID,
            system,
            user: question.to_string(),
            digest_truncated: digest.truncated,
        }
    }

    pub fn sql_prompt(
        &self,
        question: &str,
        tables: &[TableDescriptor],
        row_cap: Option<usize>,
    ) -> BuiltPrompt {
        let digest = render_digest(tables, question, self.digest_budget);
        let row_cap_rule = match row_cap {
            Some(cap) => format!("- Limit the result to at most {cap} rows.\n"),
            None => String::new(),
        };
        let system = PromptTemplate::new(SQL_SYSTEM).render(&HashMap::from([
            ("digest", digest.rendered),
            ("row_cap_rule", row_cap_rule),
        ]));
        BuiltPrompt {
            template_id: SQL_TEMPLATE_ID,
            system,
            user: question.to_string(),
            digest_truncated: digest.truncated,
        }
    }

    /// Single repair attempt: the executor's error message is appended so
    /// the model can fix a bad reference.
    pub fn sql_repair_prompt(
        &self,
        question: &str,
        tables: &[TableDescriptor],
        failed_sql: &str,
        error: &str,
    ) -> BuiltPrompt {
        let digest = render_digest(tables, question, self.digest_budget);
        let system = PromptTemplate::new(SQL_REPAIR_SYSTEM).render(&HashMap::from([
            ("digest", digest.rendered),
            ("failed_sql", failed_sql.to_string()),
            ("error", error.to_string()),
        ]));
        BuiltPrompt {
            template_id: SQL_REPAIR_TEMPLATE_ID,
            system,
            user: question.to_string(),
            digest_truncated: digest.truncated,
        }
    }

    pub fn plan_prompt(
        &self,
        question: &str,
        tables: &[TableDescriptor],
        memory: &str,
        remaining_steps: usize,
    ) -> BuiltPrompt {
        let digest = render_digest(tables, question, self.digest_budget);
        let memory = if memory.is_empty() {
            "(none yet)".to_string()
        } else {
            memory.to_string()
        };
        let system = PromptTemplate::new(PLAN_SYSTEM).render(&HashMap::from([
            ("digest", digest.rendered),
            ("memory", memory),
            ("remaining_steps", remaining_steps.to_string()),
        ]));
        BuiltPrompt {
            template_id: PLAN_TEMPLATE_ID,
            system,
            user: question.to_string(),
            digest_truncated: digest.truncated,
        }
    }

    /// Narration never re-sees the schema or the full question; its only
    /// inputs are the serialized rows and a one-sentence restatement.
    pub fn narration_prompt(
        &self,
        restatement: &str,
        rows_serialized: &str,
        row_count: usize,
    ) -> BuiltPrompt {
        let system = PromptTemplate::new(NARRATION_SYSTEM).render(&HashMap::from([
            ("restatement", restatement.to_string()),
            ("rows", rows_serialized.to_string()),
            ("row_count", row_count.to_string()),
        ]));
        BuiltPrompt {
            template_id: NARRATION_TEMPLATE_ID,
            system,
            user: "Summarize the result.".to_string(),
            digest_truncated: false,
        }
    }

    pub fn synthesis_prompt(&self, question: &str, memory: &str) -> BuiltPrompt {
        let system = PromptTemplate::new(SYNTHESIS_SYSTEM).render(&HashMap::from([
            ("question", question.to_string()),
            ("memory", memory.to_string()),
        ]));
        BuiltPrompt {
            template_id: SYNTHESIS_TEMPLATE_ID,
            system,
            user: "Write the final answer.".to_string(),
            digest_truncated: false,
        }
    }
}

use std::collections::BTreeSet;

use sondar_core::{Scalar, TableDescriptor};

/// Prompt-ready description of the schema, possibly truncated to fit the
/// byte budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDigest {
    pub rendered: String,
    pub truncated: bool,
}

/// Renders tables for the prompt, dropping lowest-relevance tables first
/// when the budget is exceeded. Relevance is the overlap between question
/// tokens and the table's name and column names; ties break by name so the
/// same inputs always truncate identically.
pub fn render_digest(
    tables: &[TableDescriptor],
    question: &str,
    max_bytes: usize,
) -> SchemaDigest {
    let question_tokens = tokens(question);

    let mut ranked: Vec<(&TableDescriptor, usize)> = tables
        .iter()
        .map(|t| (t, relevance(t, &question_tokens)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name.cmp(&b.0.name)));

    let mut kept: Vec<&TableDescriptor> = Vec::new();
    let mut used = 0usize;
    let mut truncated = false;
    for &(table, _) in &ranked {
        let block = render_table(table);
        if used + block.len() > max_bytes && !kept.is_empty() {
            truncated = true;
            continue;
        }
        if block.len() > max_bytes && kept.is_empty() {
            // A single oversized table is kept whole; the prompt budget is
            // advisory at one table minimum.
            truncated = true;
        }
        used += block.len();
        kept.push(table);
    }

    kept.sort_by(|a, b| a.name.cmp(&b.name));
    let rendered = kept
        .iter()
        .map(|t| render_table(t))
        .collect::<Vec<_>>()
        .join("\n");

    SchemaDigest {
        rendered,
        truncated,
    }
}

fn render_table(table: &TableDescriptor) -> String {
    let mut out = format!("TABLE \"{}\" ({} rows)\n", table.name, table.row_count);
    for column in &table.columns {
        out.push_str(&format!("  \"{}\" {}", column.name, column.column_type.as_str()));
        if column.primary_key {
            out.push_str(" PRIMARY KEY");
        }
        if !column.nullable {
            out.push_str(" NOT NULL");
        }
        if !column.samples.is_empty() {
            let samples: Vec<String> = column.samples.iter().map(render_sample).collect();
            out.push_str(&format!(" e.g. {}", samples.join(", ")));
        }
        out.push('\n');
    }
    out
}

fn render_sample(sample: &Scalar) -> String {
    match sample {
        Scalar::Text(s) => {
            let mut clipped: String = s.chars().take(24).collect();
            if clipped.len() < s.len() {
                clipped.push('…');
            }
            format!("'{clipped}'")
        }
        other => other.render(),
    }
}

fn relevance(table: &TableDescriptor, question_tokens: &BTreeSet<String>) -> usize {
    let mut own = tokens(&table.name);
    for column in &table.columns {
        own.extend(tokens(&column.name));
    }
    own.intersection(question_tokens).count()
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

use std::collections::HashMap;

use regex::Regex;

/// `{{var}}` substitution. Unknown variables render as empty strings so a
/// template never fails at call time.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        let pattern = Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("static pattern");
        pattern
            .replace_all(&self.template, |caps: &regex::Captures| {
                vars.get(&caps[1]).cloned().unwrap_or_default()
            })
            .to_string()
    }
}

//! Lexical SQL safety gate.
//!
//! Accepts only single read-only `SELECT` (or `WITH … SELECT`) statements.
//! The check is purely syntactic: it tokenizes the input, respecting string
//! literals, quoted identifiers, and comments, and never consults the model
//! or the database. Execution remains the caller's responsibility after
//! acceptance.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct GateRejection {
    pub reason: String,
}

impl GateRejection {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

const FORBIDDEN_VERBS: [&str; 11] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "ATTACH", "PRAGMA",
    "REPLACE", "VACUUM",
];

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Semicolon,
    Punct,
}

pub fn check(sql: &str) -> Result<(), GateRejection> {
    let tokens = tokenize(sql)?;

    let first_word = tokens.iter().find_map(|t| match t {
        Token::Word(w) => Some(w.as_str()),
        _ => None,
    });
    let first_word = first_word.ok_or_else(|| GateRejection::new("empty statement"))?;

    for token in &tokens {
        if let Token::Word(word) = token {
            if FORBIDDEN_VERBS.contains(&word.as_str()) {
                return Err(GateRejection::new(format!("forbidden_verb: {word}")));
            }
        }
    }

    if first_word != "SELECT" && first_word != "WITH" {
        return Err(GateRejection::new(format!(
            "statement must start with SELECT, got {first_word}"
        )));
    }

    // A semicolon is only tolerated as trailer; anything after it is a
    // stacked statement.
    if let Some(position) = tokens.iter().position(|t| *t == Token::Semicolon) {
        if tokens[position + 1..]
            .iter()
            .any(|t| !matches!(t, Token::Semicolon))
        {
            return Err(GateRejection::new("multiple statements"));
        }
    }

    Ok(())
}

fn tokenize(sql: &str) -> Result<Vec<Token>, GateRejection> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                i = consume_quoted(&chars, i, c)?;
            }
            '[' => {
                i = consume_until(&chars, i + 1, ']')
                    .ok_or_else(|| GateRejection::new("unterminated bracketed identifier"))?;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let mut j = i + 2;
                loop {
                    match (chars.get(j), chars.get(j + 1)) {
                        (Some('*'), Some('/')) => break,
                        (None, _) => {
                            return Err(GateRejection::new("unterminated block comment"))
                        }
                        _ => j += 1,
                    }
                }
                i = j + 2;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            _ if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    word.push(chars[i].to_ascii_uppercase());
                    i += 1;
                }
                tokens.push(Token::Word(word));
            }
            _ if c.is_whitespace() => {
                i += 1;
            }
            _ => {
                tokens.push(Token::Punct);
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// Consumes a quoted region starting at `start` (which holds `quote`),
/// honoring doubled-quote escapes. Returns the index just past the closing
/// quote.
fn consume_quoted(chars: &[char], start: usize, quote: char) -> Result<usize, GateRejection> {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(GateRejection::new("unterminated string literal"))
}

fn consume_until(chars: &[char], mut i: usize, end: char) -> Option<usize> {
    while i < chars.len() {
        if chars[i] == end {
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

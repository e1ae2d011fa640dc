//! Static guard over LLM-generated Python.
//!
//! Acceptance is necessary but not sufficient for safety: the restricted
//! binding set in the harness is the primary line of defense, the guard
//! reduces attack surface before a process is spawned.

use sondar_core::SandboxErrorKind;

/// Identifiers whose bare appearance rejects the code outright.
const FORBIDDEN_IDENTIFIERS: [&str; 27] = [
    "open",
    "eval",
    "exec",
    "compile",
    "__import__",
    "importlib",
    "subprocess",
    "socket",
    "os",
    "sys",
    "shutil",
    "pathlib",
    "ctypes",
    "pickle",
    "marshal",
    "builtins",
    "globals",
    "locals",
    "vars",
    "getattr",
    "setattr",
    "delattr",
    "breakpoint",
    "input",
    "exit",
    "quit",
    "memoryview",
];

/// Module roots permitted in `import` / `from` statements; everything the
/// harness already binds plus stdlib helpers with no I/O surface.
const ALLOWED_IMPORT_ROOTS: [&str; 12] = [
    "numpy",
    "pandas",
    "matplotlib",
    "seaborn",
    "math",
    "statistics",
    "datetime",
    "json",
    "re",
    "warnings",
    "itertools",
    "collections",
];

pub fn check_code(code: &str) -> Result<(), (SandboxErrorKind, String)> {
    let stripped = strip_strings_and_comments(code);

    if stripped.split_whitespace().next().is_none() {
        return Err((SandboxErrorKind::Parse, "empty code".to_string()));
    }
    check_balance(&stripped)?;

    for token in identifiers(&stripped) {
        if FORBIDDEN_IDENTIFIERS.contains(&token.as_str()) {
            return Err((
                SandboxErrorKind::GuardRejected,
                format!("forbidden identifier: {token}"),
            ));
        }
        if token.len() > 4 && token.starts_with("__") && token.ends_with("__") {
            return Err((
                SandboxErrorKind::GuardRejected,
                format!("dunder access is not allowed: {token}"),
            ));
        }
    }

    check_imports(&stripped)?;
    Ok(())
}

fn check_imports(stripped: &str) -> Result<(), (SandboxErrorKind, String)> {
    for line in stripped.lines() {
        let line = line.trim_start();
        let module = if let Some(rest) = line.strip_prefix("import ") {
            rest.split([' ', '.', ',']).next()
        } else if let Some(rest) = line.strip_prefix("from ") {
            rest.split([' ', '.']).next()
        } else {
            None
        };
        if let Some(root) = module {
            if !ALLOWED_IMPORT_ROOTS.contains(&root) {
                return Err((
                    SandboxErrorKind::GuardRejected,
                    format!("import of '{root}' is not allowed"),
                ));
            }
        }
    }
    Ok(())
}

fn check_balance(stripped: &str) -> Result<(), (SandboxErrorKind, String)> {
    let mut stack = Vec::new();
    for c in stripped.chars() {
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Err((
                        SandboxErrorKind::Parse,
                        format!("unbalanced '{c}'"),
                    ));
                }
            }
            _ => {}
        }
    }
    if let Some(unclosed) = stack.first() {
        return Err((
            SandboxErrorKind::Parse,
            format!("unclosed '{unclosed}'"),
        ));
    }
    Ok(())
}

/// Replaces string literal and comment contents with spaces so the scans
/// above only see live code. Handles single/double quotes and triple-quoted
/// blocks; an unterminated literal is reported by the balance check that
/// runs after, not here.
fn strip_strings_and_comments(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '\'' || c == '"' {
            let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
            let skip = if triple { 3 } else { 1 };
            let mut j = i + skip;
            loop {
                if j >= chars.len() {
                    break;
                }
                if chars[j] == '\\' {
                    j += 2;
                    continue;
                }
                if chars[j] == c {
                    if !triple {
                        j += 1;
                        break;
                    }
                    if chars.get(j + 1) == Some(&c) && chars.get(j + 2) == Some(&c) {
                        j += 3;
                        break;
                    }
                }
                if !triple && chars[j] == '\n' {
                    break;
                }
                j += 1;
            }
            out.push(' ');
            for k in i..j.min(chars.len()) {
                if chars[k] == '\n' {
                    out.push('\n');
                }
            }
            i = j;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

fn identifiers(stripped: &str) -> impl Iterator<Item = String> + '_ {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in stripped.chars() {
        if c.is_alphanumeric() || c == '_' {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens.into_iter()
}

//! Line recognizer.
//!
//! Each trimmed source line is matched against an ordered grammar table;
//! the first rule whose pattern matches builds the [`Statement`]. Order
//! matters where forms overlap: `ifexists`/`iftext`/`if_player.x` before
//! plain `if`, `module.name(...)` before `name(...)`, and calls before
//! assignments.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::args::{closes_at_end, split_args};
use super::ast::{AssignTarget, Condition, ImportPlacement, Statement};
use super::builtins::is_reserved_head;
use super::error::CompileError;
use super::values::is_name;
use crate::util::{static_regex, unquote};

struct Rule {
    name: &'static str,
    pattern: Regex,
    build: fn(&Captures<'_>) -> Result<Statement, CompileError>,
}

fn rule(
    name: &'static str,
    pattern: &'static str,
    build: fn(&Captures<'_>) -> Result<Statement, CompileError>,
) -> Rule {
    Rule { name, pattern: static_regex(pattern), build }
}

fn group<'c>(caps: &'c Captures<'_>, i: usize) -> &'c str {
    caps.get(i).map_or("", |m| m.as_str().trim())
}

static GRAMMAR: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule("close", r"^\}$", |_| Ok(Statement::Close)),
        rule("import", r"(?i)^(import|use|использовать)\s+([^\s;#]+)$", build_import),
        rule(
            "event",
            r#"(?i)^event\s*\(\s*(?:"([^"]+)"|([^)]+?))\s*\)\s*\{$"#,
            |caps| {
                let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str().trim());
                Ok(Statement::Event { name: name.to_string() })
            },
        ),
        rule(
            "function",
            r"(?i)^(?:func|function|def|функция)\b\s*(?:\(\s*)?(\w+)(?:\s*\))?(?:\s*\(\s*([^)]*)\s*\))?\s*\{$",
            build_function,
        ),
        rule("loop", r"(?i)^(?:loop|цикл)\s+(\w+)(?:\s+every)?\s+(\d+)\s*\{$", build_loop),
        rule(
            "ifexists",
            r"(?i)^ifexists\s*(?:\(\s*([%\w]+)\s*\)|\s+([%\w]+))\s*\{$",
            |caps| {
                let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                Ok(Statement::IfOpen(Condition::Exists(name.to_string())))
            },
        ),
        rule("iftext", r"(?i)^iftext\s+(.+?)\s*\{$", |caps| {
            Ok(Statement::IfOpen(Condition::Text(group(caps, 1).to_string())))
        }),
        rule(
            "if_catalog",
            r"(?i)^if_?(player|game|entity|value)\.(\w+)(?:\s*\((.*)\))?\s*\{$",
            |caps| {
                Ok(Statement::IfOpen(Condition::Catalog {
                    module: format!("if_{}", group(caps, 1).to_lowercase()),
                    name: group(caps, 2).to_string(),
                    args: group(caps, 3).to_string(),
                }))
            },
        ),
        rule("if", r"(?i)^if\s+(.+?)\s*\{$", |caps| {
            Ok(Statement::IfOpen(Condition::Compare(group(caps, 1).to_string())))
        }),
        rule(
            "select",
            r"(?i)^select\.(\w+(?:\.\w+)*)\s*(?:\(\s*(.*?)\s*\))?\s*(\{)?$",
            |caps| {
                Ok(Statement::SelectOpen {
                    chain: group(caps, 1).to_string(),
                    args: group(caps, 2).to_string(),
                    block: caps.get(3).is_some(),
                })
            },
        ),
        rule("return", r"(?i)^return(?:\s+(.*)|\s*(\(.*))?$", build_return),
        rule("call", r"^(\w+)\.(\w+)\s*\((.*)\)$", |caps| {
            Ok(Statement::Call {
                module: group(caps, 1).to_string(),
                name: group(caps, 2).to_string(),
                args: group(caps, 3).to_string(),
            })
        }),
        rule("bare_call", r"^(\w+)\s*\((.*)\)$", |caps| {
            let name = group(caps, 1);
            if is_reserved_head(name) {
                return Err(CompileError::syntax(format!(
                    "`{name}(...)` looks like a block header but does not match its form"
                )));
            }
            Ok(Statement::BareCall { name: name.to_string(), args: group(caps, 2).to_string() })
        }),
        rule("assign", r"(?i)^(?:(save)\s+)?([%\w]+)\s*(~\s*)?=\s*(.+)$", |caps| {
            let value = group(caps, 4);
            if value.starts_with('=') {
                return Err(CompileError::syntax("`==` is a comparison; use it inside `if` or `iftext`"));
            }
            Ok(Statement::Assign {
                target: AssignTarget {
                    name: group(caps, 2).to_string(),
                    persistent: caps.get(1).is_some() || caps.get(3).is_some(),
                },
                value: value.to_string(),
            })
        }),
        rule("save_shorthand", r"^([%\w]+)\s*~\s*(.+)$", |caps| {
            Ok(Statement::Assign {
                target: AssignTarget { name: group(caps, 1).to_string(), persistent: true },
                value: group(caps, 2).to_string(),
            })
        }),
    ]
});

fn build_import(caps: &Captures<'_>) -> Result<Statement, CompileError> {
    let placement = if group(caps, 1).eq_ignore_ascii_case("import") {
        ImportPlacement::Splice
    } else {
        ImportPlacement::Append
    };
    Ok(Statement::Import { path: unquote(group(caps, 2)).to_string(), placement })
}

fn build_function(caps: &Captures<'_>) -> Result<Statement, CompileError> {
    let name = group(caps, 1).to_string();
    let mut params = Vec::new();
    for param in split_args(group(caps, 2)) {
        if !is_name(&param) {
            return Err(CompileError::syntax(format!("func {name}: invalid parameter name `{param}`")));
        }
        if params.contains(&param) {
            return Err(CompileError::syntax(format!("func {name}: duplicate parameter `{param}`")));
        }
        params.push(param);
    }
    Ok(Statement::Function { name, params })
}

/// `return(v)` drops the parentheses only when they enclose the whole
/// value; `return(a) + (b)` returns the sum.
fn build_return(caps: &Captures<'_>) -> Result<Statement, CompileError> {
    let value = match caps.get(2).map(|m| m.as_str().trim()) {
        Some(rest) if closes_at_end(rest, 0) => rest.get(1..rest.len() - 1).unwrap_or(rest).trim(),
        Some(rest) => rest,
        None => group(caps, 1),
    };
    let value = (!value.is_empty()).then(|| value.to_string());
    Ok(Statement::Return { value })
}

fn build_loop(caps: &Captures<'_>) -> Result<Statement, CompileError> {
    let raw = group(caps, 2);
    let ticks = raw
        .parse::<u32>()
        .map_err(|_| CompileError::syntax(format!("loop tick interval `{raw}` is out of range")))?;
    Ok(Statement::Loop { name: group(caps, 1).to_string(), ticks })
}

/// Whether the line carries no code.
pub fn is_blank(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#') || line.starts_with("//")
}

/// Classify one source line. `Ok(None)` means no statement form matched.
pub fn recognize(line: &str) -> Result<Option<Statement>, CompileError> {
    if is_blank(line) {
        return Ok(None);
    }
    let line = line.trim().trim_end_matches(';').trim_end();
    for rule in GRAMMAR.iter() {
        if let Some(caps) = rule.pattern.captures(line) {
            tracing::trace!(rule = rule.name, line, "recognized");
            return (rule.build)(&caps).map(Some);
        }
    }
    Ok(None)
}

/// Pre-pass helper: the signature declared on `line`, if it is a function
/// header.
pub fn function_signature(line: &str) -> Result<Option<(String, Vec<String>)>, CompileError> {
    Ok(match recognize(line)? {
        Some(Statement::Function { name, params }) => Some((name, params)),
        _ => None,
    })
}

//! Operand values: wrapping raw arguments into the host's typed forms.

use std::sync::LazyLock;

use regex::Regex;

use super::args::closes_at_end;
use super::error::CompileError;
use super::parser::parse_formula;
use crate::catalog::ParamMode;
use crate::util::{is_quoted, static_regex, unquote};

/// Wrapper heads the host understands; values already in one of these forms
/// pass through untouched.
pub const WRAPPER_HEADS: &[&str] = &[
    "text", "num", "var", "var_save", "arr", "arr_save", "array", "loc", "apple", "item",
];

static WRAPPED_RE: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\(.*\)\s*$"));
static CALL_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r"^\w+(?:\.\w+)?\s*\(.*\)\s*$"));
static BARE_CALL_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"^(\w+)\s*\((.*)\)\s*$"));
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"^[%\w]+$"));

pub fn is_wrapped(value: &str) -> bool {
    WRAPPED_RE
        .captures(value.trim())
        .and_then(|c| c.get(1))
        .is_some_and(|head| {
            let head = head.as_str().to_lowercase();
            WRAPPER_HEADS.contains(&head.as_str())
        })
}

/// `name(...)` or `module.name(...)` that is not a wrapper.
pub fn is_call_like(value: &str) -> bool {
    let v = value.trim();
    CALL_LIKE_RE.is_match(v) && !is_wrapped(v) && v.find('(').is_some_and(|open| closes_at_end(v, open))
}

/// Split `name(args)` into its parts.
pub fn split_bare_call(value: &str) -> Option<(String, String)> {
    let v = value.trim();
    let caps = BARE_CALL_RE.captures(v)?;
    if !v.find('(').is_some_and(|open| closes_at_end(v, open)) {
        return None;
    }
    Some((caps.get(1)?.as_str().to_string(), caps.get(2)?.as_str().to_string()))
}

pub fn is_name(value: &str) -> bool {
    NAME_RE.is_match(value.trim())
}

/// Format a number the way the host reads it: integral values without a
/// fractional part.
pub fn fmt_number(value: f64) -> String {
    if value.fract().abs() < 1e-9 && value.abs() < 1e15 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value}")
    }
}

/// Numeric value of a literal or constant-only arithmetic text.
pub fn const_value(value: &str) -> Option<f64> {
    let v = value.trim();
    if v.is_empty() || is_quoted(v) {
        return None;
    }
    parse_formula(v).ok()?.constant_value()
}

/// Wrap a raw argument for a parameter of `mode`.
pub fn wrap_for_mode(mode: ParamMode, value: &str) -> Result<String, CompileError> {
    let v = value.trim();
    if v.is_empty() {
        return Ok(String::new());
    }
    if is_wrapped(v) {
        return Ok(v.to_string());
    }
    if CALL_LIKE_RE.is_match(v) {
        return Err(CompileError::unsupported_expression(format!(
            "nested call `{v}` in an argument does not run on the host; \
             assign it first (`tmp = {v}`) and pass `%var(tmp)%`, or quote it"
        )));
    }
    Ok(wrap_plain(mode, v))
}

fn wrap_plain(mode: ParamMode, v: &str) -> String {
    match mode {
        ParamMode::Text => format!("text({v})"),
        ParamMode::Number => format!("num({v})"),
        ParamMode::Variable => format!("var({v})"),
        ParamMode::Location => format!("loc({v})"),
        ParamMode::Array => format!("arr({v})"),
        ParamMode::Item => format!("item({v})"),
        ParamMode::Any => v.to_string(),
    }
}

/// Wrap the contents of a string literal. Nothing inside it is read as a
/// wrapper or a call; an untyped slot receives it as text.
pub fn wrap_literal(mode: ParamMode, value: &str) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    match mode {
        ParamMode::Any => format!("text({value})"),
        _ => wrap_plain(mode, value),
    }
}

/// Wrap a value whose mode is not known from a parameter: pushed call
/// arguments, return values, assignments.
pub fn wrap_any(value: &str) -> String {
    let s = value.trim();
    if s.is_empty() {
        return "text()".to_string();
    }
    if is_wrapped(s) {
        return s.to_string();
    }
    if is_quoted(s) {
        return format!("text({})", unquote(s));
    }
    if let Some(n) = const_value(s) {
        return format!("num({})", fmt_number(n));
    }
    if is_name(s) {
        return format!("var({s})");
    }
    format!("text({s})")
}

/// Reference to a compiler temporary, as read by a parameter of `mode`.
pub fn temp_ref(mode: ParamMode, temp: &str) -> String {
    match mode {
        ParamMode::Text => format!("text(%var({temp})%)"),
        _ => format!("var({temp})"),
    }
}

//! Assignment forms and loop control, lowered onto catalog primitives.

use std::sync::LazyLock;

use regex::Regex;

use super::action::{Ctx, Instruction};
use super::args::{split_args, CallArgs};
use super::ast::AssignTarget;
use super::builtins::Primitive;
use super::calls::{lower_call, lower_value, CallEnv, CallResult};
use super::error::{CompileError, Warning, WarningKind};
use super::expr::{compile_formula, Temps};
use super::parser::{looks_like_formula, parse_formula};
use super::values::{is_call_like, is_name, is_wrapped, split_bare_call, wrap_any};
use crate::util::{is_quoted, static_regex, unquote};

static SLICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    static_regex(r#"^([%\w]+|".*?"|'.*?')\[\s*(\d+)\s*:\s*(\d+)\s*\]$"#)
});
static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"^([%\w]+)\[\s*([%\w]+)\s*\]$"));

/// `value`, `value2`, ... keys for chunked array writes.
fn value_key(i: usize) -> String {
    if i == 0 {
        "value".to_string()
    } else {
        format!("value{}", i + 1)
    }
}

/// `name = [a, b, ...]`: clear/create with the first chunk, append the rest.
fn array_literal(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    env: &CallEnv<'_>,
    target: &AssignTarget,
    inner: &str,
) -> Result<Vec<Instruction>, CompileError> {
    let mut out = Vec::new();
    let mut values = Vec::new();
    for element in split_args(inner) {
        values.push(lower_value(ctx, temps, env, &element, &mut out)?);
    }
    let array = target.array_token();
    let chunk = ctx.settings.array_chunk.max(1);
    let mut chunks = values.chunks(chunk);
    let first = chunks.next().unwrap_or_default();
    let mut args = CallArgs::default().kw("arr", array.as_str());
    for (i, value) in first.iter().enumerate() {
        args = args.kw(&value_key(i), value.as_str());
    }
    out.push(ctx.primitive(Primitive::ArrayCreate, args)?);
    for rest in chunks {
        let mut args = CallArgs::default().kw("arr", array.as_str());
        for (i, value) in rest.iter().enumerate() {
            args = args.kw(&value_key(i), value.as_str());
        }
        out.push(ctx.primitive(Primitive::ArrayAppend, args)?);
    }
    Ok(out)
}

/// `dst = src[a:b]` on text.
fn text_slice(ctx: &Ctx<'_>, target: &AssignTarget, src: &str, from: &str, to: &str) -> Result<Instruction, CompileError> {
    let text = if is_quoted(src) {
        format!("text({})", unquote(src))
    } else {
        format!("text(%var({src})%)")
    };
    let args = CallArgs::default()
        .kw("var", target.var_token())
        .kw("text", text)
        .kw("num", format!("num({from})"))
        .kw("num2", format!("num({to})"));
    ctx.primitive(Primitive::TextSlice, args)
}

/// `dst = arr[i]`.
fn array_index(ctx: &Ctx<'_>, target: &AssignTarget, array: &str, index: &str) -> Result<Instruction, CompileError> {
    let number = if index.chars().all(|c| c.is_ascii_digit()) {
        format!("num({index})")
    } else {
        format!("var({index})")
    };
    let args = CallArgs::default()
        .kw("arr", format!("arr({array})"))
        .kw("number", number)
        .kw("var", target.var_token());
    ctx.primitive(Primitive::ArrayGet, args)
}

/// Lower `target = value`. Multi-instruction arithmetic adds an advisory to
/// `warnings`.
pub fn lower_assign(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    env: &CallEnv<'_>,
    target: &AssignTarget,
    value: &str,
    warnings: &mut Vec<Warning>,
) -> Result<Vec<Instruction>, CompileError> {
    let value = value.trim();
    if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        return array_literal(ctx, temps, env, target, inner);
    }
    if let Some(caps) = SLICE_RE.captures(value) {
        let part = |i: usize| caps.get(i).map_or("", |m| m.as_str());
        return Ok(vec![text_slice(ctx, target, part(1), part(2), part(3))?]);
    }
    if let Some(caps) = INDEX_RE.captures(value) {
        let part = |i: usize| caps.get(i).map_or("", |m| m.as_str());
        return Ok(vec![array_index(ctx, target, part(1), part(2))?]);
    }
    if !is_wrapped(value) {
        if let Some((name, args)) = split_bare_call(value) {
            let dest = target.var_token();
            return lower_call(ctx, temps, env, &name, &args, CallResult::Into(&dest));
        }
        if is_call_like(value) {
            return Err(CompileError::unsupported_expression(format!(
                "`{value}`: catalog actions do not return values; only functions can be assigned from"
            )));
        }
    }
    if !is_quoted(value) && !is_wrapped(value) && looks_like_formula(value) {
        let code = compile_formula(ctx, temps, &target.var_token(), &parse_formula(value)?)?;
        if code.len() > 1 {
            warnings.push(Warning::new(
                WarningKind::InstructionCount,
                format!("`{} = {value}` compiles to {} instructions", target.name, code.len()),
            ));
        }
        return Ok(code);
    }
    let args = CallArgs::default().kw("var", target.var_token()).kw("value", wrap_any(value));
    Ok(vec![ctx.primitive(Primitive::SetValue, args)?])
}

/// `startloop(a, b)` / `stoploop(a)`: loop names, chunked per instruction.
pub fn lower_loop_control(ctx: &Ctx<'_>, start: bool, args: &str) -> Result<Vec<Instruction>, CompileError> {
    let names: Vec<String> = split_args(args).iter().map(|a| unquote(a).to_string()).collect();
    if names.is_empty() {
        return Err(CompileError::arity("loop control needs at least one loop name"));
    }
    if let Some(bad) = names.iter().find(|n| !is_name(n)) {
        return Err(CompileError::syntax(format!("`{bad}` is not a loop name")));
    }
    let primitive = if start { Primitive::StartLoops } else { Primitive::StopLoops };
    names
        .chunks(ctx.settings.loop_chunk.max(1))
        .map(|chunk| {
            let mut call = CallArgs::default();
            for (i, name) in chunk.iter().enumerate() {
                let key = if i == 0 { "text".to_string() } else { format!("text{}", i + 1) };
                call = call.kw(&key, format!("text({name})"));
            }
            ctx.primitive(primitive, call)
        })
        .collect()
}

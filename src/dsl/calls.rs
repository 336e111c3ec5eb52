//! Function calls on a host without a call stack.
//!
//! Two host-global arrays stand in for the stack: arguments are pushed onto
//! the argument array before `call_function` and popped into parameter
//! variables by the callee's prologue; every function body ends by pushing
//! exactly one value onto the return array, which the caller then either
//! reads (expression call) or discards (statement call). Each helper below
//! emits a matched push/pop pair, so balance holds by construction.

use indexmap::IndexMap;

use super::action::{bind, instruction, lookup, lookup_primitive, Ctx, Instruction};
use super::args::{split_args, split_top_level_eq, ArgSlot, CallArgs};
use super::builtins::{parse_bool, Primitive};
use super::error::{CompileError, Warning, WarningKind};
use super::expr::{compile_formula, Temps};
use super::parser::{looks_like_formula, parse_formula};
use super::values::{const_value, is_call_like, is_wrapped, split_bare_call, temp_ref, wrap_any};
use crate::catalog::ParamMode;
use crate::util::{is_quoted, unquote};

/// Function name → declared parameter names, collected before lowering so
/// forward references work.
pub type Signatures = IndexMap<String, Vec<String>>;

/// One array used as a stack, addressed at a fixed top index.
#[derive(Debug, Clone)]
pub struct HostStack {
    name: String,
}

impl HostStack {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }

    fn array(&self) -> String {
        format!("arr({})", self.name)
    }

    pub fn push_front(&self, ctx: &Ctx<'_>, value: &str) -> Result<Instruction, CompileError> {
        let args = CallArgs::default()
            .kw("arr", self.array())
            .kw("number", ctx.stack_top())
            .kw("value", value);
        ctx.primitive(Primitive::ArrayInsert, args)
    }

    /// Read the top entry into `target`, then remove it.
    pub fn pop_front_at(&self, ctx: &Ctx<'_>, target: &str) -> Result<[Instruction; 2], CompileError> {
        let read = CallArgs::default()
            .kw("arr", self.array())
            .kw("number", ctx.stack_top())
            .kw("var", target);
        Ok([ctx.primitive(Primitive::ArrayGet, read)?, self.discard(ctx)?])
    }

    pub fn discard(&self, ctx: &Ctx<'_>) -> Result<Instruction, CompileError> {
        let args = CallArgs::default()
            .kw("arr", self.array())
            .kw("number", ctx.stack_top());
        ctx.primitive(Primitive::ArrayRemove, args)
    }
}

#[derive(Debug, Clone)]
pub struct CallStacks {
    pub args: HostStack,
    pub ret: HostStack,
}

impl CallStacks {
    pub fn new(args: &str, ret: &str) -> Self {
        Self {
            args: HostStack::new(args),
            ret: HostStack::new(ret),
        }
    }
}

/// What happens to the callee's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallResult<'t> {
    Discard,
    Into(&'t str),
}

/// Everything a call lowering needs besides the read-only context.
pub struct CallEnv<'s> {
    pub stacks: &'s CallStacks,
    pub signatures: &'s Signatures,
}

/// Whether `value` is a call to a declared function.
pub fn user_call(value: &str, signatures: &Signatures) -> Option<(String, String)> {
    let (name, args) = split_bare_call(value)?;
    if is_wrapped(value) || !signatures.contains_key(&name) {
        return None;
    }
    Some((name, args))
}

/// Split bare-call arguments: positionals stay raw (quotes kept for
/// wrapping), and the only accepted keyword is `async`.
fn split_call_args(name: &str, text: &str) -> Result<(Vec<String>, bool), CompileError> {
    let mut positional = Vec::new();
    let mut is_async = false;
    for piece in split_args(text) {
        if !is_quoted(&piece) && !is_wrapped(&piece) {
            if let Some((key, value)) = split_top_level_eq(&piece) {
                if key.trim().eq_ignore_ascii_case("async") {
                    is_async = parse_bool(value);
                    continue;
                }
                return Err(CompileError::arity(format!(
                    "`{name}(...)` takes positional arguments only; got `{}=`",
                    key.trim()
                )));
            }
        }
        positional.push(piece);
    }
    Ok((positional, is_async))
}

/// Lower one argument or return value into a ready operand, hoisting
/// nested user calls and arithmetic into temporaries.
pub fn lower_value(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    env: &CallEnv<'_>,
    raw: &str,
    out: &mut Vec<Instruction>,
) -> Result<String, CompileError> {
    let raw = raw.trim();
    if let Some((name, args)) = user_call(raw, env.signatures) {
        let tmp = format!("var({})", temps.tmp());
        out.extend(lower_call(ctx, temps, env, &name, &args, CallResult::Into(&tmp))?);
        return Ok(tmp);
    }
    if is_call_like(raw) {
        return Err(CompileError::unsupported_expression(format!(
            "`{raw}` is not a declared function; only declared functions can be called inside arguments"
        )));
    }
    if !is_quoted(raw) && !is_wrapped(raw) && const_value(raw).is_none() && looks_like_formula(raw) {
        let expr = parse_formula(raw)?;
        let tmp = format!("var({})", temps.tmp());
        let code = compile_formula(ctx, temps, &tmp, &expr)?;
        if code.len() > 1 {
            temps.advise(Warning::new(
                WarningKind::InstructionCount,
                format!("`{raw}` compiles to {} instructions", code.len()),
            ));
        }
        out.extend(code);
        return Ok(tmp);
    }
    Ok(wrap_any(raw))
}

/// `name(a, b)` → push arguments, invoke, then consume the return slot.
pub fn lower_call(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    env: &CallEnv<'_>,
    name: &str,
    args: &str,
    result: CallResult<'_>,
) -> Result<Vec<Instruction>, CompileError> {
    let (positional, is_async) = split_call_args(name, args)?;
    if let Some(params) = env.signatures.get(name) {
        if params.len() != positional.len() {
            return Err(CompileError::arity(format!(
                "`{name}` expects {} argument(s), got {}",
                params.len(),
                positional.len()
            )));
        }
    }

    let mut out = Vec::new();
    let mut values = Vec::with_capacity(positional.len());
    for raw in &positional {
        values.push(lower_value(ctx, temps, env, raw, &mut out)?);
    }
    // Reverse order leaves the first argument on top for the prologue.
    for value in values.iter().rev() {
        out.push(env.stacks.args.push_front(ctx, value)?);
    }
    out.push(invoke(ctx, &format!("text({name})"), is_async)?);
    out.extend(consume_return(ctx, env.stacks, result)?);
    tracing::debug!(function = name, instructions = out.len(), "lowered call");
    Ok(out)
}

/// `call(target, async=true)`: explicit invoke by name, no arguments.
pub fn lower_explicit_call(
    ctx: &Ctx<'_>,
    env: &CallEnv<'_>,
    args: &str,
) -> Result<Vec<Instruction>, CompileError> {
    let parsed = CallArgs::parse(args);
    let is_async = parsed.keyword.iter().any(|(k, v)| k.eq_ignore_ascii_case("async") && parse_bool(v));
    if let Some(key) = parsed.keyword.keys().find(|k| !k.eq_ignore_ascii_case("async")) {
        return Err(CompileError::arity(format!("call(): unknown argument `{key}`")));
    }
    let [target] = parsed.positional.as_slice() else {
        return Err(CompileError::arity("call() takes exactly one function name"));
    };
    let name = unquote(target);
    if let Some(params) = env.signatures.get(name) {
        if !params.is_empty() {
            return Err(CompileError::arity(format!(
                "call({name}) passes no arguments but `{name}` expects {}",
                params.len()
            )));
        }
    }
    let target = if is_wrapped(name) { name.to_string() } else { format!("text({name})") };
    let mut out = vec![invoke(ctx, &target, is_async)?];
    out.extend(consume_return(ctx, env.stacks, CallResult::Discard)?);
    Ok(out)
}

fn invoke(ctx: &Ctx<'_>, target: &str, is_async: bool) -> Result<Instruction, CompileError> {
    let mut args = CallArgs::default().kw("text", target);
    if is_async {
        let (_, spec) = lookup_primitive(ctx.host, Primitive::CallFunction)?;
        let switch = spec.switches.first().ok_or_else(|| {
            CompileError::catalog_miss("call_function has no async switch in the catalog")
        })?;
        args = args.kw(&switch.name, "1");
    }
    ctx.primitive(Primitive::CallFunction, args)
}

fn consume_return(
    ctx: &Ctx<'_>,
    stacks: &CallStacks,
    result: CallResult<'_>,
) -> Result<Vec<Instruction>, CompileError> {
    Ok(match result {
        CallResult::Discard => vec![stacks.ret.discard(ctx)?],
        CallResult::Into(target) => stacks.ret.pop_front_at(ctx, target)?.to_vec(),
    })
}

/// `module.name(args)`. Declared-function calls among the arguments run
/// first and reach the action through temporaries; string literals are
/// never taken for calls.
pub fn lower_action(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    env: &CallEnv<'_>,
    module: &str,
    name: &str,
    args: &str,
) -> Result<Vec<Instruction>, CompileError> {
    let (canon, spec) = lookup(ctx.host, module, name)?;
    let mut call = CallArgs::parse(args);
    let mut out = Vec::new();
    for (idx, raw) in call.positional.iter_mut().enumerate() {
        if call.literals.contains(&ArgSlot::Positional(idx)) {
            continue;
        }
        let mode = spec.params.get(idx).map_or(ParamMode::Any, |p| p.mode);
        hoist_call(ctx, temps, env, mode, raw, &mut out)?;
    }
    for (key, raw) in &mut call.keyword {
        if call.literals.contains(&ArgSlot::Keyword(key.clone())) {
            continue;
        }
        let mode = spec.param(key).map_or(ParamMode::Any, |p| p.mode);
        hoist_call(ctx, temps, env, mode, raw, &mut out)?;
    }
    let pieces = bind(canon, spec, &call)?;
    out.push(instruction(ctx.host, spec, pieces)?);
    Ok(out)
}

fn hoist_call(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    env: &CallEnv<'_>,
    mode: ParamMode,
    raw: &mut String,
    out: &mut Vec<Instruction>,
) -> Result<(), CompileError> {
    let Some((name, args)) = user_call(raw, env.signatures) else {
        return Ok(());
    };
    let tmp = temps.tmp();
    let dest = format!("var({tmp})");
    out.extend(lower_call(ctx, temps, env, &name, &args, CallResult::Into(&dest))?);
    *raw = temp_ref(mode, &tmp);
    Ok(())
}

// ── Function bodies ──────────────────────────────────────────────

/// Pop each declared parameter off the argument stack, in order.
pub fn prologue(
    ctx: &Ctx<'_>,
    stacks: &CallStacks,
    params: &[String],
) -> Result<Vec<Instruction>, CompileError> {
    let mut out = Vec::with_capacity(params.len() * 2);
    for param in params {
        out.extend(stacks.args.pop_front_at(ctx, &format!("var({param})"))?);
    }
    Ok(out)
}

/// Lower a returned operand; no value returns the empty text.
pub fn return_value(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    env: &CallEnv<'_>,
    value: Option<&str>,
    out: &mut Vec<Instruction>,
) -> Result<String, CompileError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => lower_value(ctx, temps, env, raw, out),
        None => Ok("text()".to_string()),
    }
}

/// `return [value]` and the implicit empty return.
pub fn lower_return(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    env: &CallEnv<'_>,
    value: Option<&str>,
) -> Result<Vec<Instruction>, CompileError> {
    let mut out = Vec::new();
    let value = return_value(ctx, temps, env, value, &mut out)?;
    out.push(env.stacks.ret.push_front(ctx, &value)?);
    Ok(out)
}

/// Store a returned operand in the function's result variable. Functions
/// that return from inside blocks push that variable once, at the end.
pub fn assign_result(ctx: &Ctx<'_>, result: &str, value: &str) -> Result<Instruction, CompileError> {
    let args = CallArgs::default().kw("var", result).kw("value", value);
    ctx.primitive(Primitive::SetValue, args)
}

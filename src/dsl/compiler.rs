//! Statement driver.
//!
//! Walks the flattened line stream once, tracks which unit and which blocks
//! are open, and hands every statement to its lowering. Function signatures
//! are collected in a pre-pass so calls may precede declarations.

use std::borrow::Cow;
use std::collections::HashMap;

use regex::Regex;

use super::action::{Ctx, Instruction};
use super::assembler::{unit_header, Assembler, CompiledUnit, Program, UnitHeader, UnitKind};
use super::ast::Statement;
use super::builtins::{is_call_alias, is_loop_starter, is_loop_stopper};
use super::calls::{
    assign_result, lower_action, lower_call, lower_explicit_call, lower_return, prologue, return_value, CallEnv,
    CallResult, CallStacks, Signatures,
};
use super::error::{CompileError, Location, Warning, WarningKind};
use super::expr::Temps;
use super::imports::{Flattened, SourceLine};
use super::scope::{lower_condition, lower_select, ScopeStack};
use super::statement::{function_signature, is_blank, recognize};
use super::sugar::{lower_assign, lower_loop_control};
use crate::catalog::HostData;
use crate::settings::CompilerSettings;

// ── Namespaces ───────────────────────────────────────────────────

/// Drops `stem.` prefixes of imported files so `math.double(2)` calls the
/// inlined `double`. Stems that name a catalog module are left alone.
struct Namespaces(Option<Regex>);

impl Namespaces {
    fn new(host: &HostData, stems: &[String]) -> Result<Self, CompileError> {
        let stems: Vec<String> = stems
            .iter()
            .filter(|s| host.catalog.module(s).is_none() && !s.eq_ignore_ascii_case("select"))
            .map(|s| regex::escape(s))
            .collect();
        if stems.is_empty() {
            return Ok(Self(None));
        }
        let re = Regex::new(&format!(r"\b(?:{})\.", stems.join("|")))
            .map_err(|e| CompileError::syntax(format!("cannot use import names as prefixes: {e}")))?;
        Ok(Self(Some(re)))
    }

    fn strip<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match &self.0 {
            Some(re) => re.replace_all(text, ""),
            None => Cow::Borrowed(text),
        }
    }
}

fn collect_signatures(lines: &[SourceLine], namespaces: &Namespaces) -> Result<Signatures, CompileError> {
    let mut signatures = Signatures::new();
    let mut declared_at: HashMap<String, Location> = HashMap::new();
    for line in lines {
        let loc = line.location();
        let Some((name, params)) = function_signature(&namespaces.strip(&line.text)).map_err(|e| e.at(&loc))? else {
            continue;
        };
        if let Some(first) = declared_at.get(&name) {
            return Err(CompileError::syntax(format!("function `{name}` is already declared at {first}")).at(&loc));
        }
        declared_at.insert(name.clone(), loc);
        signatures.insert(name, params);
    }
    Ok(signatures)
}

// ── Driver ───────────────────────────────────────────────────────

/// How a function hands its value back. Every path through the body must
/// push exactly one entry onto the return stack.
enum Returns {
    /// No `return` seen; the empty text is pushed at the end.
    Implicit,
    /// One top-level `return`, pushed where it stands.
    Direct { at: usize, value: String },
    /// Returns inside blocks, or more than one return: each assigns the
    /// result variable, which is pushed once at the end.
    Collected,
}

struct OpenUnit {
    kind: UnitKind,
    name: String,
    header: UnitHeader,
    body: Vec<Instruction>,
    prologue_len: usize,
    returns: Returns,
    opened_at: Location,
}

impl OpenUnit {
    fn describe(&self) -> String {
        let kind = match self.kind {
            UnitKind::Event => "event",
            UnitKind::Function => "func",
            UnitKind::Loop => "loop",
        };
        format!("{kind} `{}`", self.name)
    }

    fn result_var(&self, settings: &CompilerSettings) -> String {
        format!("var({}{})", settings.result_prefix, self.name)
    }
}

struct Compiler<'a> {
    ctx: Ctx<'a>,
    env: CallEnv<'a>,
    temps: Temps,
    scope: ScopeStack,
    /// Openers of the blocks currently on `scope`, innermost last.
    blocks: Vec<Location>,
    unit: Option<OpenUnit>,
    assembler: Assembler,
}

impl<'a> Compiler<'a> {
    fn new(ctx: Ctx<'a>, env: CallEnv<'a>) -> Self {
        Self {
            ctx,
            env,
            temps: Temps::new(&ctx.settings.tmp_prefix, &ctx.settings.acc_prefix),
            scope: ScopeStack::default(),
            blocks: Vec::new(),
            unit: None,
            assembler: Assembler::new(ctx.settings.unit_instruction_ceiling),
        }
    }

    fn emit(&mut self, code: Vec<Instruction>) {
        if let Some(unit) = self.unit.as_mut() {
            unit.body.extend(code);
        }
    }

    fn compile_line(&mut self, text: &str, loc: &Location) -> Result<(), CompileError> {
        match recognize(text)? {
            Some(stmt) => self.compile_stmt(stmt, loc),
            None if self.unit.is_some() && !is_blank(text) => {
                Err(CompileError::syntax(format!("unrecognized statement `{}`", text.trim())))
            }
            // Free text between blocks is ignored.
            None => Ok(()),
        }
    }

    fn compile_stmt(&mut self, stmt: Statement, loc: &Location) -> Result<(), CompileError> {
        let needs_unit = !stmt.is_unit_header() && !matches!(stmt, Statement::Close | Statement::Import { .. });
        if needs_unit && self.unit.is_none() {
            return Err(CompileError::syntax(format!(
                "`{}` must be inside an event, func or loop block",
                loc.text.trim()
            )));
        }

        let code = match stmt {
            // Already inlined while flattening.
            Statement::Import { .. } => return Ok(()),
            Statement::Event { name } => return self.open_unit(UnitKind::Event, name, &[], 0, loc),
            Statement::Function { name, params } => {
                return self.open_unit(UnitKind::Function, name, &params, 0, loc)
            }
            Statement::Loop { name, ticks } => return self.open_unit(UnitKind::Loop, name, &[], ticks, loc),
            Statement::Close => return self.close_block(),
            Statement::Call { module, name, args } => {
                lower_action(&self.ctx, &mut self.temps, &self.env, &module, &name, &args)?
            }
            Statement::BareCall { name, args } => self.bare_call(&name, &args)?,
            Statement::Assign { target, value } => {
                let mut warnings = Vec::new();
                let code = lower_assign(&self.ctx, &mut self.temps, &self.env, &target, &value, &mut warnings)?;
                for warning in warnings {
                    self.assembler.warn(warning.at(loc));
                }
                code
            }
            Statement::IfOpen(condition) => {
                let test = lower_condition(&self.ctx, &condition)?;
                self.scope.open_if();
                self.blocks.push(loc.clone());
                vec![test]
            }
            Statement::SelectOpen { chain, args, block } => {
                let selection = lower_select(&self.ctx, &mut self.scope, &chain, &args, block)?;
                if block {
                    self.blocks.push(loc.clone());
                }
                vec![selection]
            }
            Statement::Return { value } => self.ret(value.as_deref(), loc)?,
        };
        for advisory in self.temps.take_advisories() {
            self.assembler.warn(advisory.at(loc));
        }
        self.emit(code);
        Ok(())
    }

    fn bare_call(&mut self, name: &str, args: &str) -> Result<Vec<Instruction>, CompileError> {
        if is_loop_starter(name) {
            return lower_loop_control(&self.ctx, true, args);
        }
        if is_loop_stopper(name) {
            return lower_loop_control(&self.ctx, false, args);
        }
        if is_call_alias(name) && !self.env.signatures.contains_key(name) {
            return lower_explicit_call(&self.ctx, &self.env, args);
        }
        lower_call(&self.ctx, &mut self.temps, &self.env, name, args, CallResult::Discard)
    }

    fn ret(&mut self, value: Option<&str>, loc: &Location) -> Result<Vec<Instruction>, CompileError> {
        let nested = !self.scope.is_empty();
        let Some(unit) = self.unit.as_mut().filter(|u| u.kind == UnitKind::Function) else {
            return Err(CompileError::syntax("`return` is only allowed inside func"));
        };
        let mut out = Vec::new();
        let value = return_value(&self.ctx, &mut self.temps, &self.env, value, &mut out)?;
        if !nested && matches!(unit.returns, Returns::Implicit) {
            let at = unit.body.len() + out.len();
            out.push(self.env.stacks.ret.push_front(&self.ctx, &value)?);
            unit.returns = Returns::Direct { at, value };
            return Ok(out);
        }

        let what = if nested { "inside a block" } else { "after an earlier return" };
        let message = format!(
            "return {what} in {}: the body keeps running after it and the last value assigned is returned",
            unit.describe()
        );
        self.assembler.warn(Warning::new(WarningKind::ConditionalReturn, message).at(loc));
        let result = unit.result_var(self.ctx.settings);
        if let Returns::Direct { at, value: earlier } = std::mem::replace(&mut unit.returns, Returns::Collected) {
            if let Some(push) = unit.body.get_mut(at) {
                *push = assign_result(&self.ctx, &result, &earlier)?;
            }
        }
        out.push(assign_result(&self.ctx, &result, &value)?);
        Ok(out)
    }

    fn open_unit(
        &mut self,
        kind: UnitKind,
        name: String,
        params: &[String],
        ticks: u32,
        loc: &Location,
    ) -> Result<(), CompileError> {
        if let Some(open) = &self.unit {
            return Err(CompileError::scope_imbalance(format!(
                "{} opened at {} is still open; close it before starting another block",
                open.describe(),
                open.opened_at
            )));
        }
        let min_ticks = self.ctx.settings.min_loop_ticks;
        let ticks = if kind == UnitKind::Loop && ticks < min_ticks {
            tracing::debug!(loop_name = %name, ticks, min_ticks, "loop interval raised to the minimum");
            min_ticks
        } else {
            ticks
        };
        let (header, warning) = unit_header(self.ctx.host, kind, &name, ticks)?;
        if let Some(warning) = warning {
            self.assembler.warn(warning.at(loc));
        }
        self.scope.reset();
        self.blocks.clear();
        let body = prologue(&self.ctx, self.env.stacks, params)?;
        self.unit = Some(OpenUnit {
            kind,
            name,
            header,
            prologue_len: body.len(),
            body,
            returns: Returns::Implicit,
            opened_at: loc.clone(),
        });
        Ok(())
    }

    fn close_block(&mut self) -> Result<(), CompileError> {
        if self.unit.is_none() {
            return Err(CompileError::scope_imbalance("`}` without an open block"));
        }
        if let Some(closer) = self.scope.close() {
            self.blocks.pop();
            self.emit(vec![closer]);
            return Ok(());
        }
        self.flush_unit()
    }

    fn flush_unit(&mut self) -> Result<(), CompileError> {
        let Some(mut unit) = self.unit.take() else {
            return Ok(());
        };
        if unit.kind == UnitKind::Function {
            match unit.returns {
                Returns::Implicit => {
                    let tail = lower_return(&self.ctx, &mut self.temps, &self.env, None)?;
                    unit.body.extend(tail);
                }
                Returns::Direct { .. } => {}
                Returns::Collected => {
                    let result = unit.result_var(self.ctx.settings);
                    let init = assign_result(&self.ctx, &result, "text()")?;
                    unit.body.insert(unit.prologue_len.min(unit.body.len()), init);
                    unit.body.push(self.env.stacks.ret.push_front(&self.ctx, &result)?);
                }
            }
        }
        self.assembler.push_unit(CompiledUnit {
            kind: unit.kind,
            name: unit.name,
            header: unit.header,
            body: unit.body,
        });
        Ok(())
    }

    fn finish(self) -> Result<Program, CompileError> {
        if let Some(unit) = &self.unit {
            return Err(match self.blocks.last() {
                Some(block) => CompileError::scope_imbalance(format!(
                    "block in {} is never closed",
                    unit.describe()
                ))
                .at(block),
                None => CompileError::scope_imbalance(format!("{} is never closed", unit.describe()))
                    .at(&unit.opened_at),
            });
        }
        Ok(self.assembler.finish())
    }
}

/// Compile an already flattened source. Stops at the first error; warnings
/// from flattening come first in the result.
pub fn compile(host: &HostData, settings: &CompilerSettings, flat: Flattened) -> Result<Program, CompileError> {
    let namespaces = Namespaces::new(host, &flat.namespaces)?;
    let signatures = collect_signatures(&flat.lines, &namespaces)?;
    let stacks = CallStacks::new(&settings.args_stack, &settings.ret_stack);
    let ctx = Ctx::new(host, settings);
    let env = CallEnv { stacks: &stacks, signatures: &signatures };

    let mut compiler = Compiler::new(ctx, env);
    for line in &flat.lines {
        let loc = line.location();
        let text = namespaces.strip(&line.text);
        compiler.compile_line(&text, &loc).map_err(|e| e.at(&loc))?;
    }
    let mut program = compiler.finish()?;

    let mut warnings = flat.warnings;
    warnings.append(&mut program.warnings);
    program.warnings = warnings;
    tracing::debug!(
        units = program.units.len(),
        warnings = program.warnings.len(),
        functions = signatures.len(),
        "compiled"
    );
    Ok(program)
}

//! Arithmetic lowering.
//!
//! The host evaluates one n-ary sum, difference, product or quotient per
//! placement, with a fixed operand limit. A tree is lowered bottom-up:
//! same-operator chains flatten into one operand list, every non-leaf operand
//! is computed into a fresh temporary first, and lists over the limit are
//! folded through accumulators.

use super::action::{Ctx, Instruction};
use super::args::CallArgs;
use super::ast::{BinOp, Expr, UnaryOp};
use super::builtins::Primitive;
use super::error::{CompileError, Warning};
use super::values::fmt_number;

/// Allocator for compiler temporaries. One per compilation, so no name is
/// ever handed out twice.
#[derive(Debug, Clone)]
pub struct Temps {
    tmp_prefix: String,
    acc_prefix: String,
    next_tmp: usize,
    next_acc: usize,
    /// Advisories raised by the statement being lowered.
    advisories: Vec<Warning>,
}

impl Temps {
    pub fn new(tmp_prefix: &str, acc_prefix: &str) -> Self {
        Self {
            tmp_prefix: tmp_prefix.to_string(),
            acc_prefix: acc_prefix.to_string(),
            next_tmp: 0,
            next_acc: 0,
            advisories: Vec::new(),
        }
    }

    pub fn tmp(&mut self) -> String {
        self.next_tmp += 1;
        format!("{}{}", self.tmp_prefix, self.next_tmp)
    }

    pub fn acc(&mut self) -> String {
        self.next_acc += 1;
        format!("{}{}", self.acc_prefix, self.next_acc)
    }

    pub fn advise(&mut self, warning: Warning) {
        self.advisories.push(warning);
    }

    pub fn take_advisories(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.advisories)
    }
}

fn primitive_for(op: BinOp) -> Primitive {
    match op {
        BinOp::Add => Primitive::Sum,
        BinOp::Sub => Primitive::Difference,
        BinOp::Mul => Primitive::Product,
        BinOp::Div => Primitive::Quotient,
    }
}

/// Operand token for a leaf, or `None` when the node needs a temporary.
fn leaf_operand(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Number(v) => Some(format!("num({})", fmt_number(*v))),
        Expr::Name(name) => Some(format!("var({name})")),
        Expr::Placeholder(p) => Some(format!("num({p})")),
        Expr::Unary { .. } | Expr::Binary { .. } => None,
    }
}

/// Collect the operand list of an `op` chain rooted at `expr`.
fn flatten<'e>(op: BinOp, expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::Binary { op: inner, left, right } if *inner == op => {
            flatten(op, left, out);
            if op.is_associative() {
                flatten(op, right, out);
            } else {
                out.push(right);
            }
        }
        other => out.push(other),
    }
}

/// Lower `expr` so that its value ends up in `target` (a wrapped variable
/// token such as `var(x)` or `var_save(x)`).
pub fn compile_formula(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    target: &str,
    expr: &Expr,
) -> Result<Vec<Instruction>, CompileError> {
    let mut out = Vec::new();
    lower_into(ctx, temps, target, expr, &mut out)?;
    Ok(out)
}

fn lower_into(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    target: &str,
    expr: &Expr,
    out: &mut Vec<Instruction>,
) -> Result<(), CompileError> {
    match expr {
        Expr::Number(_) | Expr::Name(_) | Expr::Placeholder(_) => {
            let value = leaf_operand(expr).unwrap_or_default();
            let args = CallArgs::default().kw("var", target).kw("value", value);
            out.push(ctx.primitive(Primitive::SetValue, args)?);
        }
        Expr::Unary { op: UnaryOp::Plus, operand } => lower_into(ctx, temps, target, operand, out)?,
        Expr::Unary { op: UnaryOp::Neg, operand } => {
            let operand = operand_token(ctx, temps, operand, out)?;
            emit_op(ctx, temps, Primitive::Product, target, vec!["num(-1)".to_string(), operand], out)?;
        }
        Expr::Binary { op, .. } => {
            let mut parts = Vec::new();
            flatten(*op, expr, &mut parts);
            let mut operands = Vec::with_capacity(parts.len());
            for part in parts {
                operands.push(operand_token(ctx, temps, part, out)?);
            }
            emit_op(ctx, temps, primitive_for(*op), target, operands, out)?;
        }
    }
    Ok(())
}

fn operand_token(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    expr: &Expr,
    out: &mut Vec<Instruction>,
) -> Result<String, CompileError> {
    if let Some(token) = leaf_operand(expr) {
        return Ok(token);
    }
    let tmp = temps.tmp();
    lower_into(ctx, temps, &format!("var({tmp})"), expr, out)?;
    Ok(format!("var({tmp})"))
}

/// Emit one n-ary action, folding the list through accumulators when it
/// exceeds the operand limit. Left-to-right folding keeps `-` and `/`
/// correct.
fn emit_op(
    ctx: &Ctx<'_>,
    temps: &mut Temps,
    primitive: Primitive,
    target: &str,
    operands: Vec<String>,
    out: &mut Vec<Instruction>,
) -> Result<(), CompileError> {
    let limit = ctx.settings.max_operands.max(2);
    let mut rest = operands.into_iter();
    let mut chunk: Vec<String> = rest.by_ref().take(limit).collect();
    loop {
        let remaining: Vec<String> = rest.by_ref().take(limit - 1).collect();
        if remaining.is_empty() {
            out.push(op_instruction(ctx, primitive, target, chunk)?);
            return Ok(());
        }
        let acc = format!("var({})", temps.acc());
        out.push(op_instruction(ctx, primitive, &acc, chunk)?);
        chunk = std::iter::once(acc).chain(remaining).collect();
    }
}

fn op_instruction(
    ctx: &Ctx<'_>,
    primitive: Primitive,
    target: &str,
    operands: Vec<String>,
) -> Result<Instruction, CompileError> {
    let mut args = CallArgs::default().kw("var", target);
    for (i, operand) in operands.into_iter().enumerate() {
        let key = if i == 0 { "num".to_string() } else { format!("num{}", i + 1) };
        args = args.kw(&key, operand);
    }
    ctx.primitive(primitive, args)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse_formula;
    use crate::dsl::test_support::{host, HostSim};
    use crate::settings::CompilerSettings;
    use pretty_assertions::assert_eq;

    fn lower(src: &str, settings: &CompilerSettings) -> Vec<Instruction> {
        let host = host();
        let ctx = Ctx::new(&host, settings);
        let mut temps = Temps::new(&settings.tmp_prefix, &settings.acc_prefix);
        compile_formula(&ctx, &mut temps, "var(a)", &parse_formula(src).unwrap()).unwrap()
    }

    fn run(src: &str, vars: &[(&str, f64)], settings: &CompilerSettings) -> (f64, usize) {
        let code = lower(src, settings);
        let mut sim = HostSim::default();
        for (name, value) in vars {
            sim.set_number(name, *value);
        }
        sim.run(&code);
        (sim.number("a"), code.len())
    }

    #[test]
    fn product_lowered_before_sum() {
        let settings = CompilerSettings::default();
        let code = lower("2 + 3 * 4", &settings);
        assert_eq!(code.len(), 2);
        assert_eq!(code[0].label, "Произведение чисел (*)||*");
        assert_eq!(
            code[0].operands,
            vec!["slot(9)=var(__mldsl_tmp1)", "slot(10)=num(3)", "slot(11)=num(4)"]
        );
        assert_eq!(
            code[1].operands,
            vec!["slot(9)=var(a)", "slot(10)=num(2)", "slot(11)=var(__mldsl_tmp1)"]
        );
        assert_eq!(run("2 + 3 * 4", &[], &settings), (14.0, 2));
    }

    #[test]
    fn leaf_is_a_plain_assignment() {
        let settings = CompilerSettings::default();
        let code = lower("-5", &settings);
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].operands, vec!["slot(10)=var(a)", "slot(12)=num(-5)"]);
        assert_eq!(run("2 + b * 4", &[("b", 3.0)], &settings).0, 14.0);
    }

    #[test]
    fn subtraction_keeps_order() {
        let settings = CompilerSettings::default();
        let (value, _) = run("x - y - z", &[("x", 10.0), ("y", 3.0), ("z", 2.0)], &settings);
        assert_eq!(value, 5.0);
        let (value, _) = run("x - (y - z)", &[("x", 10.0), ("y", 3.0), ("z", 2.0)], &settings);
        assert_eq!(value, 9.0);
        let (value, _) = run("x / y / z", &[("x", 12.0), ("y", 3.0), ("z", 2.0)], &settings);
        assert_eq!(value, 2.0);
    }

    #[test]
    fn long_chains_fold_through_accumulators() {
        let settings = CompilerSettings::default();
        let names: Vec<String> = (1..=23).map(|i| format!("v{i}")).collect();
        let src = names.join(" + ");
        let vars: Vec<(&str, f64)> = names.iter().map(|n| (n.as_str(), 1.0)).collect();
        let code = lower(&src, &settings);
        // 10, then acc + 9, then acc + 4
        assert_eq!(code.len(), 3);
        assert!(code.iter().all(|i| i.operands.len() <= 11));
        assert!(code[1].operands[1].contains("__mldsl_acc1"));
        assert_eq!(run(&src, &vars, &settings).0, 23.0);
    }

    #[test]
    fn long_difference_folds_left_to_right() {
        let mut settings = CompilerSettings::default();
        settings.max_operands = 3;
        let src = "a0 - a1 - a2 - a3 - a4";
        let vars = [("a0", 100.0), ("a1", 1.0), ("a2", 2.0), ("a3", 3.0), ("a4", 4.0)];
        assert_eq!(run(src, &vars, &settings).0, 90.0);
    }

    #[test]
    fn negation_multiplies_by_minus_one() {
        let settings = CompilerSettings::default();
        let code = lower("-b", &settings);
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].operands[1], "slot(10)=num(-1)");
        assert_eq!(run("-b + 1", &[("b", 4.0)], &settings).0, -3.0);
    }

    #[test]
    fn temporaries_are_never_reused() {
        let host = host();
        let settings = CompilerSettings::default();
        let ctx = Ctx::new(&host, &settings);
        let mut temps = Temps::new(&settings.tmp_prefix, &settings.acc_prefix);
        let e = parse_formula("x * y + 1").unwrap();
        let first = compile_formula(&ctx, &mut temps, "var(a)", &e).unwrap();
        let second = compile_formula(&ctx, &mut temps, "var(b)", &e).unwrap();
        assert!(first[0].operands[0].contains("__mldsl_tmp1"));
        assert!(second[0].operands[0].contains("__mldsl_tmp2"));
    }
}

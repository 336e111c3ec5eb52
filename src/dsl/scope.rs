//! Conditional and selection blocks.
//!
//! The host brackets a conditional's body physically, so closing an `if`
//! only has to move the cursor past the bracket. A selection has no
//! bracket: it stays active until something else is selected, so closing a
//! `select` block re-emits whatever was active before it.

use std::sync::LazyLock;

use regex::Regex;

use super::action::{bind, instruction, Ctx, Instruction};
use super::args::CallArgs;
use super::ast::Condition;
use super::builtins::{self, Primitive, ENTITY_HINTS, PLAYER_HINTS};
use super::error::CompileError;
use super::values::{fmt_number, is_name, is_wrapped};
use crate::catalog::{ActionSpec, HostData, SELECTION_MODULE};
use crate::util::{is_quoted, norm_ident, static_regex, strip_colors, unquote};

/// Category label shared by all selection actions.
const SELECTION_LABEL: &str = "Выбрать объект";
const GREATER_INCLUSIVE: &str = "≥ (Больше или равно)";
const GREATER_STRICT: &str = "> (Больше)";
const LESS_INCLUSIVE: &str = "≤ (Меньше или равно)";
const LESS_STRICT: &str = "< (Меньше)";
const SHOWN_CANDIDATES: usize = 8;

static EXISTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    static_regex(r"(?i)^(?:ifexists|exists)\s*(?:\(\s*([%\w]+)\s*\)|\s+([%\w]+))$")
});
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r"^(.+?)\s*(<=|<|>=|>)\s*([%\w]+)\s*(<=|<|>=|>)\s*(.+?)$"));
static COMPARE_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"^(.+?)\s*(>=|<=|>|<)\s*(.+?)$"));
static CATALOG_COND_RE: LazyLock<Regex> = LazyLock::new(|| {
    static_regex(r"(?i)^(if_?(?:value|player|game|entity))\.(\w+)\s*\((.*)\)$")
});
static TEXT_EQ_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"^(.+?)\s*(?:==|=)\s*(.+?)$"));
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"^[+-]?\d+(?:\.\d+)?$"));
static OR_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"(?i)\bor\b|\|\|"));

// ── Scope stack ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Frame {
    If,
    Select {
        previous: Option<Instruction>,
        default: Instruction,
    },
}

/// Open blocks inside the current unit, plus the active selection.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
    current_selection: Option<Instruction>,
}

impl ScopeStack {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Forget everything at a unit boundary: each unit starts with the
    /// host's default selection.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.current_selection = None;
    }

    pub fn open_if(&mut self) {
        self.frames.push(Frame::If);
    }

    /// Record a selection; with `block` the previous one comes back on close.
    pub fn select(&mut self, selection: Instruction, block: Option<Instruction>) {
        let previous = self.current_selection.replace(selection);
        if let Some(default) = block {
            self.frames.push(Frame::Select { previous, default });
        }
    }

    /// Close the innermost block and return the instruction that ends it.
    /// `None` means no block is open.
    pub fn close(&mut self) -> Option<Instruction> {
        match self.frames.pop()? {
            Frame::If => Some(Instruction::skip()),
            Frame::Select { previous, default } => {
                let restore = previous.unwrap_or(default);
                self.current_selection = Some(restore.clone());
                Some(restore)
            }
        }
    }

    pub fn current_selection(&self) -> Option<&Instruction> {
        self.current_selection.as_ref()
    }
}

// ── Conditions ───────────────────────────────────────────────────

fn number_operand(raw: &str) -> Result<String, CompileError> {
    let s = unquote(raw);
    if s.is_empty() {
        return Err(CompileError::syntax("empty comparison operand"));
    }
    if NUMBER_RE.is_match(s) {
        let v: f64 = s.parse().map_err(|_| CompileError::syntax(format!("bad number `{s}`")))?;
        return Ok(format!("num({})", fmt_number(v)));
    }
    if is_wrapped(s) {
        return Ok(s.to_string());
    }
    // `%var(x)%` style host placeholders
    if s.len() > 2 && s.starts_with('%') && s.ends_with('%') && s.contains('(') {
        return Ok(format!("num({s})"));
    }
    if is_name(s) {
        return Ok(format!("var({s})"));
    }
    Err(CompileError::unsupported_expression(format!(
        "comparison operand `{s}` must be a number, a variable or a wrapped value; \
         compute it into a variable first"
    )))
}

fn text_operand(raw: &str) -> Result<String, CompileError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(CompileError::syntax("empty text operand"));
    }
    if is_quoted(s) {
        return Ok(format!("text({})", unquote(s)));
    }
    if NUMBER_RE.is_match(s) {
        return Ok(format!("text({s})"));
    }
    if is_wrapped(s) {
        return Ok(s.to_string());
    }
    Ok(format!("var({s})"))
}

fn is_less(op: &str) -> bool {
    op.starts_with('<')
}

fn compare_number(
    ctx: &Ctx<'_>,
    checked: &str,
    lower: Option<(&str, bool)>,
    upper: Option<(&str, bool)>,
) -> Result<Instruction, CompileError> {
    let mut args = CallArgs::default().kw("num", number_operand(checked)?);
    if let Some((bound, inclusive)) = lower {
        args = args.kw("num2", number_operand(bound)?).kw(
            "tip_proverki_dlya_bolshe",
            if inclusive { GREATER_INCLUSIVE } else { GREATER_STRICT },
        );
    }
    if let Some((bound, inclusive)) = upper {
        args = args.kw("num3", number_operand(bound)?).kw(
            "tip_proverki_dlya_menshe",
            if inclusive { LESS_INCLUSIVE } else { LESS_STRICT },
        );
    }
    ctx.primitive(Primitive::CompareNumber, args)
}

fn exists(ctx: &Ctx<'_>, name: &str) -> Result<Instruction, CompileError> {
    ctx.primitive(Primitive::VarExists, CallArgs::default().kw("var", format!("var({name})")))
}

/// `if <expr> {` body: existence, range, single comparison, or a direct
/// catalog condition.
fn lower_compare(ctx: &Ctx<'_>, text: &str) -> Result<Instruction, CompileError> {
    let e = text.trim();
    if e.is_empty() {
        return Err(CompileError::syntax("if: empty condition"));
    }
    if let Some(caps) = EXISTS_RE.captures(e) {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        return exists(ctx, name);
    }
    if let Some(caps) = CATALOG_COND_RE.captures(e) {
        let part = |i: usize| caps.get(i).map_or("", |m| m.as_str());
        return ctx.place(part(1), part(2), &CallArgs::parse(part(3)));
    }
    if let Some(caps) = RANGE_RE.captures(e) {
        let part = |i: usize| caps.get(i).map_or("", |m| m.as_str().trim());
        let (a, op1, mid, op2, b) = (part(1), part(2), part(3), part(4), part(5));
        return match (is_less(op1), is_less(op2)) {
            // a <= mid <= b
            (true, true) => compare_number(
                ctx,
                mid,
                Some((a, op1 == "<=")),
                Some((b, op2 == "<=")),
            ),
            // a >= mid >= b
            (false, false) => compare_number(
                ctx,
                mid,
                Some((b, op2 == ">=")),
                Some((a, op1 == ">=")),
            ),
            _ => Err(CompileError::syntax(format!(
                "range `{e}` mixes `<` and `>`; write it as `lo <= x <= hi`"
            ))),
        };
    }
    if let Some(caps) = COMPARE_RE.captures(e) {
        let part = |i: usize| caps.get(i).map_or("", |m| m.as_str().trim());
        let (lhs, op, rhs) = (part(1), part(2), part(3));
        let inclusive = op.ends_with('=');
        // Strict is the host default, so only inclusive bounds click a switch.
        let mut args = CallArgs::default().kw("num", number_operand(lhs)?);
        if is_less(op) {
            args = args.kw("num3", number_operand(rhs)?);
            if inclusive {
                args = args.kw("tip_proverki_dlya_menshe", LESS_INCLUSIVE);
            }
        } else {
            args = args.kw("num2", number_operand(rhs)?);
            if inclusive {
                args = args.kw("tip_proverki_dlya_bolshe", GREATER_INCLUSIVE);
            }
        }
        return ctx.primitive(Primitive::CompareNumber, args);
    }
    Err(CompileError::syntax(format!("if: unsupported condition `{e}`")))
}

fn lower_text(ctx: &Ctx<'_>, text: &str) -> Result<Instruction, CompileError> {
    let caps = TEXT_EQ_RE.captures(text.trim()).ok_or_else(|| {
        CompileError::syntax("iftext: expected `<target> == <a> or <b> ...`")
    })?;
    let target = caps.get(1).map_or("", |m| m.as_str());
    let rest = caps.get(2).map_or("", |m| m.as_str());
    let alternatives: Vec<&str> = OR_RE.split(rest).map(str::trim).filter(|p| !p.is_empty()).collect();
    if alternatives.is_empty() {
        return Err(CompileError::syntax("iftext: expected at least one text to compare"));
    }
    let max = ctx.settings.iftext_max_options;
    if alternatives.len() > max {
        return Err(CompileError::arity(format!(
            "iftext: {} alternatives, the host compares at most {max}",
            alternatives.len()
        )));
    }
    let mut args = CallArgs::default().kw("text", text_operand(target)?);
    for (i, alt) in alternatives.iter().enumerate() {
        args = args.kw(&format!("text{}", i + 2), text_operand(alt)?);
    }
    ctx.primitive(Primitive::CompareText, args)
}

/// Lower a conditional opener to its single test placement.
pub fn lower_condition(ctx: &Ctx<'_>, condition: &Condition) -> Result<Instruction, CompileError> {
    match condition {
        Condition::Compare(text) => lower_compare(ctx, text),
        Condition::Text(text) => lower_text(ctx, text),
        Condition::Exists(name) => exists(ctx, name),
        Condition::Catalog { module, name, args } => ctx.place(module, name, &CallArgs::parse(args)),
    }
}

// ── Selection ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Player,
    Entity,
}

/// Keyword guess from the action's visible texts; unknown reads as player.
pub fn selection_domain(spec: &ActionSpec) -> Domain {
    let blob = [&spec.sign2, &spec.gui, &spec.menu]
        .iter()
        .map(|s| strip_colors(s).to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if blob.contains("игрок") {
        Domain::Player
    } else if blob.contains("моб") || blob.contains("сущност") {
        Domain::Entity
    } else {
        Domain::Player
    }
}

fn has_hint(segments: &[&str], needles: &[&str]) -> bool {
    segments.iter().any(|seg| {
        let seg = norm_ident(seg);
        needles.iter().any(|n| seg.contains(n))
    })
}

/// Match the last chain segment against the selection actions; earlier
/// segments only break ties (`select.player.sneak`).
pub fn resolve_selection<'h>(
    host: &'h HostData,
    chain: &str,
) -> Result<(&'h str, &'h ActionSpec), CompileError> {
    let segments: Vec<&str> = chain.split('.').filter(|s| !s.is_empty()).collect();
    let Some((leaf, hints)) = segments.split_last() else {
        return Err(CompileError::syntax("select: empty selector"));
    };
    let mut key = norm_ident(leaf);
    if let Some(synonym) = builtins::leaf_synonym(&key) {
        key = synonym.to_string();
    }
    if let Some(mapped) = builtins::select_shorthand(&key) {
        key = mapped.to_string();
    }
    let target = norm_ident(&key);

    let selection_key = host.registry.key_for(SELECTION_LABEL);
    let mut hits: Vec<(&str, &ActionSpec)> = host
        .catalog
        .module(SELECTION_MODULE)
        .into_iter()
        .flatten()
        .filter(|(_, spec)| host.registry.key_for(&spec.category) == selection_key)
        .filter(|(canon, spec)| {
            std::iter::once(canon.as_str())
                .chain(spec.aliases.iter().map(String::as_str))
                .chain([spec.menu.as_str(), spec.gui.as_str(), spec.sign2.as_str()])
                .filter(|k| !k.is_empty())
                .any(|k| norm_ident(k) == target)
        })
        .map(|(canon, spec)| (canon.as_str(), spec))
        .collect();

    if hits.is_empty() {
        return Err(CompileError::catalog_miss(format!("select: unknown selector `{leaf}` in `{chain}`")));
    }
    if hits.len() == 1 {
        return Ok(hits.remove(0));
    }

    let want_player = has_hint(hints, PLAYER_HINTS);
    let want_entity = has_hint(hints, ENTITY_HINTS);
    if want_player || want_entity {
        let filtered: Vec<(&str, &ActionSpec)> = hits
            .iter()
            .copied()
            .filter(|(_, spec)| match selection_domain(spec) {
                Domain::Player => want_player,
                Domain::Entity => want_entity,
            })
            .collect();
        if let [only] = filtered.as_slice() {
            return Ok(*only);
        }
        if !filtered.is_empty() {
            hits = filtered;
        }
    }

    let shown: Vec<String> = hits
        .iter()
        .take(SHOWN_CANDIDATES)
        .map(|(canon, spec)| format!("{canon}:{}", strip_colors(&spec.menu)))
        .collect();
    let more = if hits.len() > SHOWN_CANDIDATES { ", ..." } else { "" };
    Err(CompileError::ambiguous_selection(format!(
        "select: `{leaf}` is ambiguous; candidates: {}{more}",
        shown.join(", ")
    )))
}

pub fn default_selection(ctx: &Ctx<'_>, domain: Domain) -> Result<Instruction, CompileError> {
    let primitive = match domain {
        Domain::Player => Primitive::SelectDefaultPlayer,
        Domain::Entity => Primitive::SelectDefaultEntity,
    };
    ctx.primitive(primitive, CallArgs::default())
}

/// `select.<chain>(args)` with an optional restoring block.
pub fn lower_select(
    ctx: &Ctx<'_>,
    scope: &mut ScopeStack,
    chain: &str,
    args: &str,
    block: bool,
) -> Result<Instruction, CompileError> {
    let (canon, spec) = resolve_selection(ctx.host, chain)?;
    let pieces = bind(canon, spec, &CallArgs::parse(args))?;
    let selection = instruction(ctx.host, spec, pieces)?;
    let restore = if block {
        Some(default_selection(ctx, selection_domain(spec))?)
    } else {
        None
    };
    scope.select(selection.clone(), restore);
    Ok(selection)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;
    use crate::dsl::test_support::host;
    use crate::settings::CompilerSettings;
    use pretty_assertions::assert_eq;

    fn cond(c: Condition) -> Result<Instruction, CompileError> {
        let host = host();
        let settings = CompilerSettings::default();
        lower_condition(&Ctx::new(&host, &settings), &c)
    }

    fn compare(text: &str) -> Result<Instruction, CompileError> {
        cond(Condition::Compare(text.to_string()))
    }

    #[test]
    fn inclusive_greater_clicks_switch() {
        let ins = compare("x >= 5").unwrap();
        assert_eq!(ins.label, "Сравнить числа||Сравнить число");
        assert_eq!(ins.category, "obsidian");
        assert_eq!(ins.operands, vec!["slot(10)=var(x)", "slot(11)=num(5)", "clicks(14,1)=0"]);
    }

    #[test]
    fn strict_comparisons_use_defaults() {
        assert_eq!(compare("x > 5").unwrap().operands, vec!["slot(10)=var(x)", "slot(11)=num(5)"]);
        assert_eq!(compare("x < 5").unwrap().operands, vec!["slot(10)=var(x)", "slot(12)=num(5)"]);
        assert_eq!(
            compare("x <= 5").unwrap().operands,
            vec!["slot(10)=var(x)", "slot(12)=num(5)", "clicks(15,1)=0"]
        );
    }

    #[test]
    fn ranges_in_both_directions() {
        let up = compare("1 <= x < 10").unwrap();
        assert_eq!(
            up.operands,
            vec!["slot(10)=var(x)", "slot(11)=num(1)", "slot(12)=num(10)", "clicks(14,1)=0"]
        );
        let down = compare("10 >= x > 1").unwrap();
        assert_eq!(
            down.operands,
            vec!["slot(10)=var(x)", "slot(11)=num(1)", "slot(12)=num(10)", "clicks(15,1)=0"]
        );
        let err = compare("1 < x > 10").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn exists_and_catalog_fallback() {
        let ins = compare("exists(score)").unwrap();
        assert_eq!(ins.operands, vec!["slot(13)=var(score)"]);
        let ins = compare("if_player.sneaking()").unwrap();
        assert_eq!(ins.category, "oak_planks");
        let err = compare("x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn formula_operands_are_rejected() {
        let err = compare("x + 1 > 5").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedExpression);
    }

    #[test]
    fn iftext_alternatives() {
        let ins = cond(Condition::Text("name == \"Steve\" or \"Alex\" || admin".into())).unwrap();
        assert_eq!(
            ins.operands,
            vec!["slot(9)=var(name)", "slot(10)=text(Steve)", "slot(11)=text(Alex)", "slot(12)=var(admin)"]
        );
        let many = (1..=8).map(|i| format!("\"{i}\"")).collect::<Vec<_>>().join(" or ");
        let err = cond(Condition::Text(format!("name == {many}"))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arity);
    }

    #[test]
    fn selection_resolves_by_alias_and_hint() {
        let host = host();
        let (canon, spec) = resolve_selection(&host, "entity").unwrap();
        assert_eq!(canon, "vse_suschnosti");
        assert_eq!(selection_domain(spec), Domain::Entity);

        let (canon, _) = resolve_selection(&host, "player.sneak").unwrap();
        assert_eq!(canon, "kradetsya");
        let (canon, _) = resolve_selection(&host, "mob.приседает").unwrap();
        assert_eq!(canon, "kradetsya_1");
        let (canon, _) = resolve_selection(&host, "allplayers").unwrap();
        assert_eq!(canon, "vse_igroki");
    }

    #[test]
    fn selection_errors() {
        let host = host();
        let err = resolve_selection(&host, "sneak").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousSelection);
        assert!(err.message.contains("kradetsya:Игрок крадётся"));
        assert!(err.message.contains("kradetsya_1:Сущность крадётся"));
        let err = resolve_selection(&host, "dragons").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CatalogMiss);
    }

    #[test]
    fn closing_select_restores_previous_or_default() {
        let host = host();
        let settings = CompilerSettings::default();
        let ctx = Ctx::new(&host, &settings);
        let mut scope = ScopeStack::default();

        lower_select(&ctx, &mut scope, "entity", "", true).unwrap();
        let restored = scope.close().unwrap();
        assert_eq!(restored.label, "Сущность по умолчанию||Сущность по умолчанию");

        let outer = lower_select(&ctx, &mut scope, "allplayers", "", false).unwrap();
        lower_select(&ctx, &mut scope, "entity", "", true).unwrap();
        scope.open_if();
        assert!(scope.close().unwrap().is_skip());
        assert_eq!(scope.close().unwrap(), outer);
        assert_eq!(scope.current_selection(), Some(&outer));
        assert!(scope.close().is_none());
    }
}

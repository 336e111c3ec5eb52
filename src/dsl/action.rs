//! Catalog lookup and operand binding for a single placement.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::args::{ArgSlot, CallArgs};
use super::builtins::{self, Primitive};
use super::enums::resolve_switch;
use super::error::CompileError;
use super::values::{wrap_for_mode, wrap_literal};
use crate::catalog::{canonical_module, ActionSpec, HostData, SELECTION_MODULE};
use crate::settings::CompilerSettings;

/// Category value of the cursor-advance marker that closes a conditional.
pub const SKIP_CATEGORY: &str = "skip";
/// Serialized form of an empty operand list.
pub const NO_OPERANDS: &str = "no";

/// One placement: physical category token, composite label and operand
/// pieces (`slot(N)=value`, `clicks(N,k)=0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Instruction {
    pub category: String,
    pub label: String,
    pub operands: Vec<String>,
}

impl Instruction {
    /// Advance the host cursor past a conditional bracket without placing
    /// anything.
    pub fn skip() -> Self {
        Self {
            category: SKIP_CATEGORY.to_string(),
            label: String::new(),
            operands: Vec::new(),
        }
    }

    pub fn is_skip(&self) -> bool {
        self.category == SKIP_CATEGORY
    }

    pub fn operand_string(&self) -> String {
        if self.operands.is_empty() {
            NO_OPERANDS.to_string()
        } else {
            self.operands.join(",")
        }
    }
}

/// Find `module.name`, applying selection shorthands for the selection
/// module.
pub fn lookup<'h>(
    host: &'h HostData,
    module: &str,
    name: &str,
) -> Result<(&'h str, &'h ActionSpec), CompileError> {
    if let Some(found) = host.catalog.find(module, name) {
        return Ok(found);
    }
    if canonical_module(module) == SELECTION_MODULE {
        if let Some(found) = builtins::select_shorthand(name).and_then(|n| host.catalog.find(module, n)) {
            return Ok(found);
        }
    }
    if host.catalog.module(module).is_none() {
        return Err(CompileError::catalog_miss(format!("unknown module `{module}`")));
    }
    Err(CompileError::catalog_miss(format!("unknown action `{module}.{name}`")))
}

pub fn lookup_primitive(
    host: &HostData,
    primitive: Primitive,
) -> Result<(&str, &ActionSpec), CompileError> {
    let def = primitive.def();
    def.names
        .iter()
        .find_map(|n| host.catalog.find(def.module, n))
        .ok_or_else(|| {
            CompileError::catalog_miss(format!(
                "catalog has no `{}.{}` ({})",
                def.module,
                def.names.join("|"),
                def.description
            ))
        })
}

/// Bind call arguments to the spec's slots. Positional arguments fill
/// parameters in declaration order; a keyword for the same parameter wins.
pub fn bind(canon: &str, spec: &ActionSpec, args: &CallArgs) -> Result<Vec<String>, CompileError> {
    if args.positional.len() > spec.params.len() {
        return Err(CompileError::arity(format!(
            "`{canon}` takes {} argument(s), got {} positional",
            spec.params.len(),
            args.positional.len()
        )));
    }
    if let Some(key) = args
        .keyword
        .keys()
        .find(|k| spec.param(k).is_none() && spec.switch(k).is_none())
    {
        let known: Vec<&str> = spec
            .params
            .iter()
            .map(|p| p.name.as_str())
            .chain(spec.switches.iter().map(|s| s.name.as_str()))
            .collect();
        return Err(CompileError::arity(format!(
            "`{canon}` has no argument `{key}`; expected one of: {}",
            known.join(", ")
        )));
    }

    let mut pieces = Vec::new();
    for (idx, param) in spec.params.iter().enumerate() {
        let (raw, slot) = match args.keyword.get(&param.name) {
            Some(raw) => (raw, ArgSlot::Keyword(param.name.clone())),
            None => match args.positional.get(idx) {
                Some(raw) => (raw, ArgSlot::Positional(idx)),
                None => continue,
            },
        };
        let value = if args.is_literal(&slot) {
            wrap_literal(param.mode, raw)
        } else {
            wrap_for_mode(param.mode, raw)?
        };
        if !value.is_empty() {
            pieces.push(format!("slot({})={value}", param.slot));
        }
    }
    for switch in &spec.switches {
        let Some(raw) = args.keyword.get(&switch.name) else { continue };
        let clicks = resolve_switch(switch, raw)?;
        // Zero clicks is the host default and must not be emitted.
        if clicks > 0 {
            pieces.push(format!("clicks({},{clicks})=0", switch.slot));
        }
    }
    Ok(pieces)
}

/// Resolve the category token and build the placement.
pub fn instruction(
    host: &HostData,
    spec: &ActionSpec,
    operands: Vec<String>,
) -> Result<Instruction, CompileError> {
    let category = host
        .registry
        .resolve(&spec.category)
        .map_err(|miss| CompileError::registry_miss(miss.to_string()))?;
    Ok(Instruction {
        category: category.to_string(),
        label: spec.composite_label(),
        operands,
    })
}

/// `module.name(args)` → placement.
pub fn place(
    host: &HostData,
    module: &str,
    name: &str,
    args: &CallArgs,
) -> Result<Instruction, CompileError> {
    let (canon, spec) = lookup(host, module, name)?;
    let pieces = bind(canon, spec, args)?;
    instruction(host, spec, pieces)
}

pub fn place_primitive(
    host: &HostData,
    primitive: Primitive,
    args: &CallArgs,
) -> Result<Instruction, CompileError> {
    let (canon, spec) = lookup_primitive(host, primitive)?;
    let pieces = bind(canon, spec, args)?;
    instruction(host, spec, pieces)
}

/// Read-only state shared by every lowering step of one compilation.
#[derive(Clone, Copy)]
pub struct Ctx<'a> {
    pub host: &'a HostData,
    pub settings: &'a CompilerSettings,
}

impl<'a> Ctx<'a> {
    pub fn new(host: &'a HostData, settings: &'a CompilerSettings) -> Self {
        Self { host, settings }
    }

    pub fn place(&self, module: &str, name: &str, args: &CallArgs) -> Result<Instruction, CompileError> {
        place(self.host, module, name, args)
    }

    pub fn primitive(&self, primitive: Primitive, args: CallArgs) -> Result<Instruction, CompileError> {
        place_primitive(self.host, primitive, &args)
    }

    /// `num(top)` for the call-stack index.
    pub fn stack_top(&self) -> String {
        format!("num({})", self.settings.stack_top)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;
    use crate::dsl::test_support::host;
    use pretty_assertions::assert_eq;

    #[test]
    fn places_message_with_positional_text() {
        let host = host();
        let ins = place(&host, "player", "message", &CallArgs::parse("\"Привет\", name")).unwrap();
        assert_eq!(ins.category, "cobblestone");
        assert_eq!(ins.label, "Отправить сообщение||Сообщение");
        assert_eq!(ins.operands, vec!["slot(9)=text(Привет)", "slot(10)=text(name)"]);
    }

    #[test]
    fn switch_clicks_emitted_only_when_positive() {
        let host = host();
        let ins = place(&host, "player", "message", &CallArgs::parse("a, razdelenie=\"Без разделения\"")).unwrap();
        assert_eq!(ins.operands, vec!["slot(9)=text(a)", "clicks(26,1)=0"]);

        let ins = place(&host, "player", "message", &CallArgs::parse("a, razdelenie=\" \"")).unwrap();
        assert_eq!(ins.operands, vec!["slot(9)=text(a)"]);
    }

    #[test]
    fn aliases_resolve_through_registry() {
        let host = host();
        let ins = place(&host, "var", "set_value", &CallArgs::parse("var=x, value=num(1)")).unwrap();
        assert_eq!(ins.category, "iron_block");
        assert_eq!(ins.operands, vec!["slot(10)=var(x)", "slot(12)=num(1)"]);
    }

    #[test]
    fn selection_shorthand_lookup() {
        let host = host();
        let (canon, _) = lookup(&host, "select", "allplayers").unwrap();
        assert_eq!(canon, "vse_igroki");
    }

    #[test]
    fn misses_are_named() {
        let host = host();
        let err = place(&host, "player", "dance", &CallArgs::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CatalogMiss);
        assert!(err.message.contains("player.dance"));

        let err = place(&host, "nowhere", "x", &CallArgs::default()).unwrap_err();
        assert!(err.message.contains("unknown module"));

        let err = place(&host, "if_entity", "is_burning", &CallArgs::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RegistryMiss);
        assert!(err.message.contains("Если сущность"));
    }

    #[test]
    fn arity_errors() {
        let host = host();
        let err = place(&host, "player", "teleport", &CallArgs::parse("a, b")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arity);
        let err = place(&host, "player", "teleport", &CallArgs::parse("where=a")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arity);
        assert!(err.message.contains("loc"));
    }

    #[test]
    fn skip_marker() {
        let skip = Instruction::skip();
        assert!(skip.is_skip());
        assert_eq!(skip.operand_string(), "no");
    }
}

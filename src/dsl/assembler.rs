//! Program units and output packing.
//!
//! A compiled program is a list of units (event, function, loop), each a
//! header placement followed by its body. It leaves the compiler in one of
//! two shapes: host commands, one line per unit and bounded in length, or a
//! structured plan for downstream tooling.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::action::{Instruction, NO_OPERANDS};
use super::error::{CompileError, Warning, WarningKind};
use crate::catalog::events::{canonical_event_name, PLAYER_EVENT_LABEL};
use crate::catalog::HostData;

pub const FUNCTION_LABEL: &str = "Функция";
pub const LOOP_LABEL: &str = "Цикл";
/// Command verb understood by the host.
pub const COMMAND_HEAD: &str = "/placeadvanced";
/// Plan entry separating two units.
pub const NEWLINE_CATEGORY: &str = "newline";
/// Separates the clickable menu label from the expected sign text.
const LABEL_SEPARATOR: &str = "||";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Event,
    Function,
    Loop,
}

/// The placement that opens a unit. `args` is `no` for events and
/// functions and the tick interval for loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHeader {
    pub category: String,
    pub label: String,
    pub args: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    pub kind: UnitKind,
    pub name: String,
    pub header: UnitHeader,
    pub body: Vec<Instruction>,
}

impl CompiledUnit {
    pub fn describe(&self) -> String {
        let kind = match self.kind {
            UnitKind::Event => "event",
            UnitKind::Function => "func",
            UnitKind::Loop => "loop",
        };
        format!("{kind} `{}`", self.name)
    }
}

fn category(host: &HostData, label: &str) -> Result<String, CompileError> {
    host.registry
        .resolve(label)
        .map(str::to_string)
        .map_err(|miss| CompileError::registry_miss(miss.to_string()))
}

/// Build a unit header. Unknown event names fall back to the raw name under
/// the player-event category, with a warning.
pub fn unit_header(
    host: &HostData,
    kind: UnitKind,
    name: &str,
    ticks: u32,
) -> Result<(UnitHeader, Option<Warning>), CompileError> {
    let no = NO_OPERANDS.to_string();
    Ok(match kind {
        UnitKind::Event => match host.events.lookup(name) {
            Some(event) => (
                UnitHeader {
                    category: category(host, event.scope.category_label())?,
                    label: event.label(),
                    args: no,
                },
                None,
            ),
            None => {
                let raw = canonical_event_name(name);
                let warning = Warning::new(
                    WarningKind::UnknownEvent,
                    format!("unknown event `{raw}`; compiled with the raw name"),
                );
                (
                    UnitHeader { category: category(host, PLAYER_EVENT_LABEL)?, label: raw, args: no },
                    Some(warning),
                )
            }
        },
        UnitKind::Function => (
            UnitHeader { category: category(host, FUNCTION_LABEL)?, label: name.to_string(), args: no },
            None,
        ),
        UnitKind::Loop => (
            UnitHeader { category: category(host, LOOP_LABEL)?, label: name.to_string(), args: ticks.to_string() },
            None,
        ),
    })
}

// ── Plan ─────────────────────────────────────────────────────────

/// One record of the structured plan. Unit separators carry only the
/// category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanEntry {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operands: Option<String>,
}

impl PlanEntry {
    fn placement(category: &str, label: &str, operands: String) -> Self {
        Self {
            category: category.to_string(),
            label: Some(label.to_string()),
            operands: Some(operands),
        }
    }

    fn newline() -> Self {
        Self { category: NEWLINE_CATEGORY.to_string(), label: None, operands: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
}

// ── Program ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub units: Vec<CompiledUnit>,
    pub warnings: Vec<Warning>,
}

impl Program {
    pub fn plan(&self) -> Plan {
        let mut entries = Vec::new();
        for (i, unit) in self.units.iter().enumerate() {
            if i > 0 {
                entries.push(PlanEntry::newline());
            }
            let h = &unit.header;
            entries.push(PlanEntry::placement(&h.category, &h.label, h.args.clone()));
            entries.extend(
                unit.body
                    .iter()
                    .map(|ins| PlanEntry::placement(&ins.category, &ins.label, ins.operand_string())),
            );
        }
        Plan { entries }
    }

    /// One host command per unit, each at most `max_len` characters.
    pub fn commands(&self, max_len: usize) -> Result<Vec<String>, CompileError> {
        self.units
            .iter()
            .map(|unit| {
                let cmd = pack_unit(unit);
                let len = cmd.chars().count();
                if len > max_len {
                    return Err(CompileError::length_overflow(&unit.describe(), len, max_len));
                }
                Ok(cmd)
            })
            .collect()
    }
}

/// Only the clickable part of a composite label goes on the wire.
fn clickable(label: &str) -> &str {
    label.split_once(LABEL_SEPARATOR).map_or(label, |(menu, _)| menu)
}

fn pack_unit(unit: &CompiledUnit) -> String {
    let h = &unit.header;
    let mut parts = vec![
        COMMAND_HEAD.to_string(),
        h.category.clone(),
        format!("\"{}\"", h.label),
        h.args.clone(),
    ];
    for ins in &unit.body {
        parts.push(ins.category.clone());
        parts.push(format!("\"{}\"", clickable(&ins.label)));
        parts.push(if ins.operands.is_empty() {
            NO_OPERANDS.to_string()
        } else {
            format!("\"{}\"", ins.operand_string())
        });
    }
    parts.join(" ")
}

/// Collects finished units and the per-unit size advisory.
#[derive(Debug)]
pub struct Assembler {
    ceiling: usize,
    program: Program,
}

impl Assembler {
    pub fn new(ceiling: usize) -> Self {
        Self { ceiling, program: Program::default() }
    }

    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.program.warnings.push(warning);
    }

    pub fn push_unit(&mut self, unit: CompiledUnit) {
        let count = unit.body.len();
        if count > self.ceiling {
            self.warn(Warning::new(
                WarningKind::InstructionCount,
                format!(
                    "{} has {count} instructions (comfortable ceiling is {}); split it into functions",
                    unit.describe(),
                    self.ceiling
                ),
            ));
        }
        tracing::debug!(unit = %unit.describe(), instructions = count, "unit flushed");
        self.program.units.push(unit);
    }

    pub fn finish(self) -> Program {
        self.program
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::test_support::host;
    use pretty_assertions::assert_eq;

    fn message(text: &str) -> Instruction {
        Instruction {
            category: "cobblestone".into(),
            label: "Отправить сообщение||Сообщение".into(),
            operands: vec![format!("slot(9)=text({text})")],
        }
    }

    fn event_unit(body: Vec<Instruction>) -> CompiledUnit {
        let (header, warning) = unit_header(&host(), UnitKind::Event, "join", 0).unwrap();
        assert!(warning.is_none());
        CompiledUnit { kind: UnitKind::Event, name: "join".into(), header, body }
    }

    #[test]
    fn headers_per_kind() {
        let host = host();
        let (h, _) = unit_header(&host, UnitKind::Event, "join", 0).unwrap();
        assert_eq!(h, UnitHeader {
            category: "diamond_block".into(),
            label: "Вход игрока||Вход".into(),
            args: "no".into(),
        });
        let (h, _) = unit_header(&host, UnitKind::Event, "Запуск мира", 0).unwrap();
        assert_eq!(h.category, "gold_block");
        let (h, _) = unit_header(&host, UnitKind::Loop, "tick", 20).unwrap();
        assert_eq!((h.category.as_str(), h.args.as_str()), ("emerald_block", "20"));
        let (h, _) = unit_header(&host, UnitKind::Function, "f", 0).unwrap();
        assert_eq!((h.category.as_str(), h.label.as_str()), ("lapis_block", "f"));
    }

    #[test]
    fn unknown_event_falls_back_with_warning() {
        let (h, warning) = unit_header(&host(), UnitKind::Event, "Танец", 0).unwrap();
        assert_eq!(h.label, "Танец");
        assert_eq!(h.category, "diamond_block");
        assert_eq!(warning.unwrap().kind, WarningKind::UnknownEvent);
    }

    #[test]
    fn command_packs_clickable_labels() {
        let program = Program {
            units: vec![event_unit(vec![message("hi"), Instruction::skip()])],
            warnings: vec![],
        };
        let cmds = program.commands(240).unwrap();
        assert_eq!(
            cmds[0],
            "/placeadvanced diamond_block \"Вход игрока||Вход\" no \
             cobblestone \"Отправить сообщение\" \"slot(9)=text(hi)\" skip \"\" no"
        );
    }

    #[test]
    fn overflow_reports_excess() {
        let program = Program { units: vec![event_unit(vec![message("hello"); 10])], warnings: vec![] };
        let err = program.commands(240).unwrap_err();
        assert_eq!(err.kind, crate::dsl::error::ErrorKind::LengthOverflow);
        assert!(err.message.contains("over by"));
        assert!(err.message.contains("event `join`"));
    }

    #[test]
    fn plan_separates_units() {
        let mut asm = Assembler::new(48);
        asm.push_unit(event_unit(vec![message("a")]));
        asm.push_unit(event_unit(vec![]));
        let plan = asm.finish().plan();
        let cats: Vec<&str> = plan.entries.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(cats, vec!["diamond_block", "cobblestone", "newline", "diamond_block"]);
        let json = serde_json::to_value(&plan.entries[2]).unwrap();
        assert_eq!(json, serde_json::json!({"category": "newline"}));
    }

    #[test]
    fn ceiling_advisory() {
        let mut asm = Assembler::new(2);
        asm.push_unit(event_unit(vec![message("a"); 3]));
        let program = asm.finish();
        assert_eq!(program.warnings.len(), 1);
        assert_eq!(program.warnings[0].kind, WarningKind::InstructionCount);
    }
}

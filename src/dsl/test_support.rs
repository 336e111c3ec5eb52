//! Fixtures shared by the lowering tests: the demo host data and a tiny
//! interpreter for the handful of host actions the compiler emits itself.

use std::collections::HashMap;

use super::action::Instruction;
use crate::catalog::{ActionCatalog, HostData, KnownEvents, Registry};

const CATALOG: &str = include_str!("../../demos/catalog/api_aliases.json");
const ALIASES: &str = include_str!("../../demos/catalog/aliases.json");
const REGISTRY: &str = include_str!("../../demos/catalog/allactions.txt");
const EVENTS: &str = include_str!("../../demos/catalog/known_events.json");

const ARGS_STACK: &str = "__mldsl_args";
const RET_STACK: &str = "__mldsl_ret";

#[allow(clippy::unwrap_used)]
pub fn host() -> HostData {
    HostData {
        catalog: ActionCatalog::from_json(CATALOG).unwrap(),
        registry: Registry::parse(REGISTRY, Some(ALIASES)).unwrap(),
        events: KnownEvents::from_json(EVENTS).unwrap(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Text(String),
}

impl Value {
    fn as_number(&self) -> f64 {
        match self {
            Value::Num(v) => *v,
            Value::Text(t) => t.parse().unwrap_or(0.0),
        }
    }
}

/// Executes emitted instructions against in-memory variables and arrays.
/// Functions are opaque: `define_function` records how many arguments the
/// callee pops, and every call pushes exactly one return value.
#[derive(Debug, Default)]
pub struct HostSim {
    vars: HashMap<String, Value>,
    arrays: HashMap<String, Vec<Value>>,
    functions: HashMap<String, usize>,
    calls: Vec<String>,
}

fn inner<'a>(token: &'a str, head: &str) -> Option<&'a str> {
    token.strip_prefix(head)?.strip_prefix('(')?.strip_suffix(')')
}

fn var_name(token: &str) -> &str {
    inner(token, "var_save").or_else(|| inner(token, "var")).unwrap_or(token)
}

fn array_name(token: &str) -> &str {
    inner(token, "arr_save").or_else(|| inner(token, "arr")).unwrap_or(token)
}

impl HostSim {
    pub fn set_number(&mut self, name: &str, value: f64) {
        self.vars.insert(name.to_string(), Value::Num(value));
    }

    pub fn number(&self, name: &str) -> f64 {
        self.vars.get(name).map_or(0.0, Value::as_number)
    }

    pub fn define_function(&mut self, name: &str, arity: usize) {
        self.functions.insert(name.to_string(), arity);
    }

    pub fn array_len(&self, name: &str) -> usize {
        self.arrays.get(name).map_or(0, Vec::len)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.clone()
    }

    fn value(&self, token: &str) -> Value {
        if let Some(raw) = inner(token, "num") {
            if let Some(name) = raw.strip_prefix("%var(").and_then(|r| r.strip_suffix(")%")) {
                return Value::Num(self.number(name));
            }
            return Value::Num(raw.parse().unwrap_or(0.0));
        }
        if let Some(raw) = inner(token, "text") {
            return Value::Text(raw.to_string());
        }
        self.vars.get(var_name(token)).cloned().unwrap_or(Value::Num(0.0))
    }

    fn slots(ins: &Instruction) -> HashMap<u32, String> {
        ins.operands
            .iter()
            .filter_map(|op| {
                let rest = op.strip_prefix("slot(")?;
                let (slot, value) = rest.split_once(")=")?;
                Some((slot.parse().ok()?, value.to_string()))
            })
            .collect()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn index(&self, slots: &HashMap<u32, String>) -> usize {
        let n = slots.get(&11).map_or(1.0, |t| self.value(t).as_number());
        (n as usize).saturating_sub(1)
    }

    pub fn run(&mut self, code: &[Instruction]) {
        for ins in code {
            let slots = Self::slots(ins);
            let menu = ins.label.split("||").next().unwrap_or_default();
            let op = match menu {
                "Сумма чисел (+)" => Some('+'),
                "Разность чисел (-)" => Some('-'),
                "Произведение чисел (*)" => Some('*'),
                "Частное чисел (/)" => Some('/'),
                _ => None,
            };
            if let Some(op) = op {
                let mut nums = (10..=19).filter_map(|s| slots.get(&s)).map(|t| self.value(t).as_number());
                let first = nums.next().unwrap_or(0.0);
                let result = nums.fold(first, |a, b| match op {
                    '+' => a + b,
                    '-' => a - b,
                    '*' => a * b,
                    _ => a / b,
                });
                if let Some(target) = slots.get(&9) {
                    self.vars.insert(var_name(target).to_string(), Value::Num(result));
                }
                continue;
            }
            match menu {
                "Установить значение (=)" => {
                    if let (Some(target), Some(value)) = (slots.get(&10), slots.get(&12)) {
                        let value = self.value(value);
                        self.vars.insert(var_name(target).to_string(), value);
                    }
                }
                "Вставить элемент в массив" => {
                    let (Some(arr), Some(value)) = (slots.get(&10), slots.get(&12)) else { continue };
                    let at = self.index(&slots);
                    let value = self.value(value);
                    let items = self.arrays.entry(array_name(arr).to_string()).or_default();
                    items.insert(at.min(items.len()), value);
                }
                "Получить элемент массива" => {
                    let (Some(arr), Some(target)) = (slots.get(&10), slots.get(&12)) else { continue };
                    let at = self.index(&slots);
                    let value = self
                        .arrays
                        .get(array_name(arr))
                        .and_then(|items| items.get(at))
                        .cloned()
                        .unwrap_or(Value::Num(0.0));
                    self.vars.insert(var_name(target).to_string(), value);
                }
                "Удалить элемент массива" => {
                    let Some(arr) = slots.get(&10) else { continue };
                    let at = self.index(&slots);
                    if let Some(items) = self.arrays.get_mut(array_name(arr)) {
                        if at < items.len() {
                            items.remove(at);
                        }
                    }
                }
                "Вызвать функцию" => {
                    let name = slots.get(&13).and_then(|t| inner(t, "text")).unwrap_or_default().to_string();
                    let arity = self.functions.get(&name).copied().unwrap_or(0);
                    let args = self.arrays.entry(ARGS_STACK.to_string()).or_default();
                    args.drain(..arity.min(args.len()));
                    self.arrays.entry(RET_STACK.to_string()).or_default().insert(0, Value::Num(0.0));
                    self.calls.push(name);
                }
                _ => {}
            }
        }
    }
}

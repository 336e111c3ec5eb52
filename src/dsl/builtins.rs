//! Catalog actions the compiler emits on its own, and the source-level sugar
//! tables. Each generated placement goes through one entry here, so a host
//! catalog that renames an action only needs a new fallback name.

/// Host action the lowering emits without the author naming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    ArrayInsert,
    ArrayGet,
    ArrayRemove,
    ArrayCreate,
    ArrayAppend,
    SetValue,
    Sum,
    Difference,
    Product,
    Quotient,
    TextSlice,
    CallFunction,
    StartLoops,
    StopLoops,
    CompareNumber,
    CompareText,
    VarExists,
    SelectDefaultPlayer,
    SelectDefaultEntity,
}

/// Where a primitive lives in the catalog: module plus candidate names,
/// tried in order.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveDef {
    pub module: &'static str,
    pub names: &'static [&'static str],
    pub description: &'static str,
}

impl Primitive {
    pub const ALL: &'static [Primitive] = &[
        Primitive::ArrayInsert,
        Primitive::ArrayGet,
        Primitive::ArrayRemove,
        Primitive::ArrayCreate,
        Primitive::ArrayAppend,
        Primitive::SetValue,
        Primitive::Sum,
        Primitive::Difference,
        Primitive::Product,
        Primitive::Quotient,
        Primitive::TextSlice,
        Primitive::CallFunction,
        Primitive::StartLoops,
        Primitive::StopLoops,
        Primitive::CompareNumber,
        Primitive::CompareText,
        Primitive::VarExists,
        Primitive::SelectDefaultPlayer,
        Primitive::SelectDefaultEntity,
    ];

    pub fn def(self) -> PrimitiveDef {
        let (module, names, description): (&str, &[&str], &str) = match self {
            // ── Call stacks ─────────────────────────────────────────
            Primitive::ArrayInsert => ("array", &["vstavit_v_massiv"], "Insert at index (stack push)"),
            Primitive::ArrayGet => ("array", &["get_array"], "Read element into a variable"),
            Primitive::ArrayRemove => ("array", &["remove_array"], "Remove element at index (stack drop)"),
            // ── Array literals ──────────────────────────────────────
            Primitive::ArrayCreate => (
                "array",
                &["ochistit_sozdat_massiv", "sozdat_massiv"],
                "Clear and fill an array",
            ),
            Primitive::ArrayAppend => ("array", &["add_array"], "Append values to an array"),
            // ── Variables and arithmetic ────────────────────────────
            Primitive::SetValue => ("var", &["set_value"], "Plain assignment"),
            Primitive::Sum => ("var", &["set_sum"], "var = num + num2 + ..."),
            Primitive::Difference => ("var", &["set_difference"], "var = num - num2 - ..."),
            Primitive::Product => ("var", &["set_product"], "var = num * num2 * ..."),
            Primitive::Quotient => ("var", &["set_quotient"], "var = num / num2 / ..."),
            Primitive::TextSlice => ("var", &["text"], "Substring by character range"),
            // ── Control ─────────────────────────────────────────────
            Primitive::CallFunction => ("game", &["call_function"], "Invoke a function by name"),
            Primitive::StartLoops => (
                "game",
                &["start_loops", "unnamed_8", "начать_цикл"],
                "Start named loops",
            ),
            Primitive::StopLoops => (
                "game",
                &["stop_loops", "unnamed_9", "остановить_цикл"],
                "Stop named loops",
            ),
            Primitive::CompareNumber => ("if_value", &["number_2"], "Range/bound comparison"),
            Primitive::CompareText => ("if_value", &["text"], "Text equals any alternative"),
            Primitive::VarExists => ("if_value", &["var"], "Variable exists"),
            // ── Selection defaults ──────────────────────────────────
            Primitive::SelectDefaultPlayer => ("misc", &["igrok_po_umolchaniyu"], "Default player"),
            Primitive::SelectDefaultEntity => (
                "misc",
                &["suschnost_po_umolchaniyu"],
                "Default entity",
            ),
        };
        PrimitiveDef { module, names, description }
    }
}

// ── Source sugar ─────────────────────────────────────────────────

/// `select.<shorthand>` → selection action name.
pub static SELECT_SHORTHANDS: &[(&str, &str)] = &[
    ("allplayers", "vse_igroki"),
    ("allplayer", "vse_igroki"),
    ("allmobs", "vse_moby"),
    ("allentities", "vse_suschnosti"),
    ("randomplayer", "sluchaynyy_igrok"),
    ("randommob", "sluchaynyy_mob"),
    ("randentity", "sluchaynaya_suschnost"),
    ("randomentity", "sluchaynaya_suschnost"),
    ("defaultplayer", "igrok_po_umolchaniyu"),
    ("defaultentity", "suschnost_po_umolchaniyu"),
];

/// Leaf words treated as the same selection condition.
pub static LEAF_SYNONYMS: &[(&str, &str)] = &[
    ("приседает", "kradetsya"),
    ("нашифте", "kradetsya"),
    ("шифт", "kradetsya"),
    ("sneak", "kradetsya"),
    ("sneaking", "kradetsya"),
];

/// Earlier chain segments that narrow a selection to players.
pub static PLAYER_HINTS: &[&str] = &["player", "игрок"];
/// Earlier chain segments that narrow a selection to entities.
pub static ENTITY_HINTS: &[&str] = &["entity", "mob", "существо", "сущность", "моб"];

pub static LOOP_STARTERS: &[&str] = &["startloop", "start_loop", "запуститьцикл", "запустить_цикл"];
pub static LOOP_STOPPERS: &[&str] = &[
    "stoploop",
    "stop_loop",
    "остановитьцикл",
    "остановить_цикл",
    "стопцикл",
    "стоп_цикл",
];

/// Explicit call-by-name spellings: `call(name, async=true)`.
pub static CALL_ALIASES: &[&str] = &["call", "invoke", "вызвать", "runfunc", "run_func"];

/// Words that can never be a bare function call.
pub static RESERVED_HEADS: &[&str] = &[
    "event", "func", "function", "def", "loop", "цикл", "функция", "if", "iftext", "ifexists",
];

/// Accepted spellings of a true flag (`async=...`).
pub static TRUE_WORDS: &[&str] = &["1", "true", "yes", "y", "on", "async", "асинхронно", "асинхронный"];

pub fn select_shorthand(name: &str) -> Option<&'static str> {
    let key = name.to_lowercase();
    SELECT_SHORTHANDS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

pub fn leaf_synonym(name: &str) -> Option<&'static str> {
    let key = name.to_lowercase();
    LEAF_SYNONYMS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

pub fn is_loop_starter(name: &str) -> bool {
    LOOP_STARTERS.contains(&name.to_lowercase().as_str())
}

pub fn is_loop_stopper(name: &str) -> bool {
    LOOP_STOPPERS.contains(&name.to_lowercase().as_str())
}

pub fn is_call_alias(name: &str) -> bool {
    CALL_ALIASES.contains(&name.to_lowercase().as_str())
}

pub fn is_reserved_head(name: &str) -> bool {
    RESERVED_HEADS.contains(&name.to_lowercase().as_str())
}

pub fn parse_bool(value: &str) -> bool {
    let v = crate::util::unquote(value).trim().to_lowercase();
    TRUE_WORDS.contains(&v.as_str())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::test_support::host;

    #[test]
    fn every_primitive_resolves_in_demo_catalog() {
        let host = host();
        for p in Primitive::ALL {
            let def = p.def();
            let found = def.names.iter().any(|n| host.catalog.find(def.module, n).is_some());
            assert!(found, "{p:?} ({}) missing from catalog", def.description);
        }
    }

    #[test]
    fn sugar_lookups_ignore_case() {
        assert_eq!(select_shorthand("AllPlayers"), Some("vse_igroki"));
        assert_eq!(leaf_synonym("Sneak"), Some("kradetsya"));
        assert!(is_loop_starter("StartLoop"));
        assert!(is_loop_stopper("стоп_цикл"));
        assert!(is_call_alias("Invoke"));
        assert!(is_reserved_head("FUNC"));
    }

    #[test]
    fn bool_words() {
        assert!(parse_bool("true"));
        assert!(parse_bool("\"Асинхронно\""));
        assert!(parse_bool(" 1 "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }
}

use super::error::CompileError;
use crate::catalog::Switch;
use crate::util::{norm_ident, strip_colors};

const SHOWN_OPTIONS: usize = 8;

/// Resolve a switch value written in source to its click count.
///
/// Order: exact label, separator shorthand, normalized label, integer.
pub fn resolve_switch(switch: &Switch, raw: &str) -> Result<i64, CompileError> {
    if let Some(&clicks) = switch.options.get(raw) {
        return Ok(clicks);
    }
    if let Some(clicks) = separator_shorthand(switch, raw) {
        return Ok(clicks);
    }
    let wanted = fuzzy_key(raw);
    if let Some((_, &clicks)) = switch.options.iter().find(|(label, _)| fuzzy_key(label) == wanted) {
        return Ok(clicks);
    }
    if let Ok(n) = raw.trim().parse::<i64>() {
        return Ok(n);
    }

    let shown: Vec<&str> = switch.options.keys().take(SHOWN_OPTIONS).map(String::as_str).collect();
    let more = if switch.options.len() > SHOWN_OPTIONS { ", ..." } else { "" };
    Err(CompileError::catalog_miss(format!(
        "switch `{}`: unknown value `{raw}`; options: {}{more}",
        switch.name,
        shown.join(", ")
    )))
}

/// Empty, space and newline values pick the option whose label names that
/// separator.
fn separator_shorthand(switch: &Switch, raw: &str) -> Option<i64> {
    let find = |pred: &dyn Fn(&str) -> bool| {
        switch
            .options
            .iter()
            .find(|(label, _)| pred(&strip_colors(label).to_lowercase()))
            .map(|(_, &clicks)| clicks)
    };
    match raw {
        "" => find(&|l| l.contains("без") && l.contains("раздел")).or(Some(0)),
        " " => find(&|l| l.contains("проб")),
        "\\n" | "\n" | "newline" | "line" | "new_line" => {
            find(&|l| (l.contains("нов") && l.contains("строк")) || l.contains("newline"))
        }
        _ => None,
    }
}

fn fuzzy_key(text: &str) -> String {
    norm_ident(text)
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`'))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;
    use indexmap::IndexMap;

    fn separator() -> Switch {
        let mut options = IndexMap::new();
        options.insert("Разделение пробелом".to_string(), 0);
        options.insert("Без разделения".to_string(), 1);
        options.insert("Разделение новой строкой".to_string(), 2);
        Switch { name: "razdelenie".to_string(), slot: 26, options }
    }

    #[test]
    fn fuzzy_forms_resolve_to_same_click() {
        let sw = separator();
        for raw in ["Без разделения", "без_разделения", " без разделения "] {
            assert_eq!(resolve_switch(&sw, raw).unwrap(), 1, "{raw:?}");
        }
    }

    #[test]
    fn separator_shorthands() {
        let sw = separator();
        assert_eq!(resolve_switch(&sw, "").unwrap(), 1);
        assert_eq!(resolve_switch(&sw, " ").unwrap(), 0);
        assert_eq!(resolve_switch(&sw, "\\n").unwrap(), 2);
        assert_eq!(resolve_switch(&sw, "newline").unwrap(), 2);
    }

    #[test]
    fn numeric_fallback() {
        assert_eq!(resolve_switch(&separator(), "2").unwrap(), 2);
    }

    #[test]
    fn empty_value_without_named_option_is_default() {
        let mut options = IndexMap::new();
        options.insert("Синхронно".to_string(), 0);
        options.insert("Асинхронно".to_string(), 1);
        let sw = Switch { name: "async".to_string(), slot: 16, options };
        assert_eq!(resolve_switch(&sw, "").unwrap(), 0);
        assert_eq!(resolve_switch(&sw, "асинхронно").unwrap(), 1);
    }

    #[test]
    fn miss_lists_options() {
        let err = resolve_switch(&separator(), "зигзаг").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CatalogMiss);
        assert!(err.message.contains("Без разделения"));
        assert!(err.message.contains("зигзаг"));
    }
}

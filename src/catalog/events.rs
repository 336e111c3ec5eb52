use std::collections::HashMap;

use serde::Deserialize;

use crate::util::{norm_key, strip_colors};

pub const PLAYER_EVENT_LABEL: &str = "Событие игрока";
pub const WORLD_EVENT_LABEL: &str = "Событие мира";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    Player,
    World,
}

impl EventScope {
    /// Category label resolved through the registry for the unit header.
    pub fn category_label(self) -> &'static str {
        match self {
            EventScope::Player => PLAYER_EVENT_LABEL,
            EventScope::World => WORLD_EVENT_LABEL,
        }
    }
}

/// One entry of the known-events table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownEvent {
    pub scope: EventScope,
    /// Clickable menu title.
    pub menu: String,
    /// Sign text the host shows once the event is placed.
    pub expected: String,
}

impl KnownEvent {
    pub fn label(&self) -> String {
        format!("{}||{}", self.menu, self.expected)
    }
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(default)]
    signs: Vec<String>,
    #[serde(default)]
    subitem: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Known event names keyed by normalized menu title and sign text.
#[derive(Debug, Clone, Default)]
pub struct KnownEvents {
    by_key: HashMap<String, KnownEvent>,
}

impl KnownEvents {
    /// Parse the exported action records, keeping only event headings.
    /// Records that are not objects or lack signs are skipped.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<serde_json::Value> =
            serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
        let mut by_key = HashMap::new();
        for value in records {
            let Ok(record) = serde_json::from_value::<EventRecord>(value) else {
                continue;
            };
            let sign = |i: usize| {
                record
                    .signs
                    .get(i)
                    .map(|s| strip_colors(s).trim().to_string())
                    .unwrap_or_default()
            };
            let heading = sign(0);
            let sign2 = sign(1);
            let scope = match heading.as_str() {
                PLAYER_EVENT_LABEL => EventScope::Player,
                WORLD_EVENT_LABEL => EventScope::World,
                _ => continue,
            };
            let raw_menu = record
                .subitem
                .as_deref()
                .or(record.category.as_deref())
                .unwrap_or_default();
            let mut menu = display_name(raw_menu);
            if menu.is_empty() {
                menu.clone_from(&sign2);
            }
            if menu.is_empty() {
                continue;
            }
            let expected = if sign2.is_empty() { menu.clone() } else { sign2.clone() };
            let event = KnownEvent { scope, menu: menu.clone(), expected };
            by_key.entry(norm_key(&menu)).or_insert_with(|| event.clone());
            if !sign2.is_empty() {
                by_key.entry(norm_key(&sign2)).or_insert(event);
            }
        }
        Ok(Self { by_key })
    }

    /// Look up an event by the name written in source, after mapping the
    /// English variants onto the host names.
    pub fn lookup(&self, name: &str) -> Option<&KnownEvent> {
        self.by_key.get(&norm_key(&canonical_event_name(name)))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// `join` → `вход`, `leave`/`quit` → `выход`; anything else unchanged.
pub fn canonical_event_name(variant: &str) -> String {
    let v = variant.trim().to_lowercase();
    match v.as_str() {
        "join" | "вход" => "вход".to_string(),
        "leave" | "quit" | "выход" => "выход".to_string(),
        _ => variant.trim().to_string(),
    }
}

/// Item titles look like `[Событие] Вход игрока | description`; keep the
/// part between the bracket tag and the first pipe.
fn display_name(raw: &str) -> String {
    let s = strip_colors(raw);
    let s = match s.split_once(']') {
        Some((_, rest)) => rest,
        None => s.as_str(),
    };
    let s = s.trim();
    match s.split_once('|') {
        Some((head, _)) => head.trim().to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const EVENTS: &str = r#"[
        {"signs": ["Событие игрока", "Вход", "", ""], "subitem": "[Событие] Вход игрока | Игрок зашёл"},
        {"signs": ["Действие игрока", "Сообщение", "", ""], "subitem": "Отправить сообщение"},
        {"signs": ["Событие мира", "Запуск мира", "", ""], "category": "Запуск мира"},
        42
    ]"#;

    #[test]
    fn keeps_only_event_headings() {
        let events = KnownEvents::from_json(EVENTS).unwrap();
        assert!(events.lookup("Сообщение").is_none());
        let world = events.lookup("запуск мира").unwrap();
        assert_eq!(world.scope, EventScope::World);
        assert_eq!(world.label(), "Запуск мира||Запуск мира");
    }

    #[test]
    fn english_variants_map_to_host_names() {
        let events = KnownEvents::from_json(EVENTS).unwrap();
        let join = events.lookup("join").unwrap();
        assert_eq!(join.scope, EventScope::Player);
        assert_eq!(join.label(), "Вход игрока||Вход");
        assert_eq!(events.lookup("Вход игрока"), Some(join));
    }

    #[test]
    fn display_name_strips_tag_and_description() {
        assert_eq!(display_name("[Событие] Вход игрока | Игрок зашёл"), "Вход игрока");
        assert_eq!(display_name("\u{a7}aПравый клик"), "Правый клик");
    }
}

//! Category tag → physical category token.
//!
//! Two inputs: the registry list exported from the host (`[(ns:token) Label]`
//! entries) and the alias table mapping catalog labels onto registry labels
//! (`{"sign1": {"Присв. переменную": "Присвоить переменную"}}`). Both are keyed
//! by [`norm_key`], so colour codes, case and spacing never matter.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::util::{norm_key, static_regex, strip_colors};

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"\[\(([^\]]+)\)\s+([^\]]+)\]"));

#[derive(Debug, Default, Deserialize)]
struct AliasFile {
    #[serde(default)]
    sign1: HashMap<String, String>,
}

/// Failed lookup: the tag has no physical mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryMiss {
    pub label: String,
    pub key: String,
}

impl std::fmt::Display for RegistryMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no category token for `{}` (key `{}`); add it to the registry list or the alias table",
            self.label, self.key
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    aliases: HashMap<String, String>,
    blocks: HashMap<String, String>,
}

impl Registry {
    /// Build from the registry list text and the alias table JSON.
    pub fn parse(list: &str, aliases_json: Option<&str>) -> Result<Self, serde_json::Error> {
        let alias_file: AliasFile = match aliases_json {
            Some(json) => serde_json::from_str(json.trim_start_matches('\u{feff}'))?,
            None => AliasFile::default(),
        };
        let aliases = alias_file
            .sign1
            .into_iter()
            .map(|(from, to)| (norm_key(&from), to))
            .collect();

        let mut blocks = HashMap::new();
        for caps in ENTRY_RE.captures_iter(list) {
            let (Some(token), Some(label)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let token = token.as_str().trim();
            let token = token.strip_prefix("minecraft:").unwrap_or(token);
            blocks.insert(norm_key(strip_colors(label.as_str()).trim()), token.to_string());
        }
        Ok(Self { aliases, blocks })
    }

    /// The lookup key for a category label, after applying the alias table.
    pub fn key_for(&self, label: &str) -> String {
        let key = norm_key(label);
        match self.aliases.get(&key) {
            Some(target) => norm_key(target),
            None => key,
        }
    }

    pub fn resolve(&self, label: &str) -> Result<&str, RegistryMiss> {
        let key = self.key_for(label);
        match self.blocks.get(&key) {
            Some(token) => Ok(token.as_str()),
            None => Err(RegistryMiss {
                label: strip_colors(label).trim().to_string(),
                key,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const LIST: &str = "[(minecraft:cobblestone) Действие игрока]\n\
                        [(minecraft:iron_block) \u{a7}eПрисвоить  переменную]\n\
                        junk line\n\
                        [(obsidian) Массив]";

    #[test]
    fn parses_entries_and_strips_namespace() {
        let reg = Registry::parse(LIST, None).unwrap();
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.resolve("Действие игрока").unwrap(), "cobblestone");
        assert_eq!(reg.resolve("  действие   ИГРОКА ").unwrap(), "cobblestone");
        assert_eq!(reg.resolve("Массив").unwrap(), "obsidian");
    }

    #[test]
    fn alias_table_redirects_labels() {
        let aliases = r#"{"sign1": {"Присв. переменную": "Присвоить переменную"}}"#;
        let reg = Registry::parse(LIST, Some(aliases)).unwrap();
        assert_eq!(reg.resolve("Присв. переменную").unwrap(), "iron_block");
    }

    #[test]
    fn miss_names_label_and_remedy() {
        let reg = Registry::parse(LIST, None).unwrap();
        let miss = reg.resolve("Если сущность").unwrap_err();
        assert_eq!(miss.label, "Если сущность");
        let text = miss.to_string();
        assert!(text.contains("Если сущность"));
        assert!(text.contains("alias table"));
    }
}

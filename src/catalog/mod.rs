//! The host action catalog and the tables that map it onto placements.
//!
//! Everything here is loaded once before compilation and never mutated
//! afterwards: [`HostData`] is shared by reference across the whole pass.

pub mod events;
pub mod registry;

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::settings::HostPaths;
use crate::util::strip_colors;

pub use events::{EventScope, KnownEvent, KnownEvents};
pub use registry::{Registry, RegistryMiss};

// ── Action specifications ────────────────────────────────────────

/// How a raw argument is wrapped before it reaches the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamMode {
    Text,
    Number,
    Variable,
    Array,
    Location,
    Item,
    #[serde(other)]
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub mode: ParamMode,
    pub slot: u32,
}

/// An operand selected by clicking the slot N times instead of by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    pub name: String,
    pub slot: u32,
    pub options: IndexMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(default)]
    pub id: String,
    /// Category tag, resolved to a physical token through the registry.
    #[serde(rename = "sign1", default)]
    pub category: String,
    #[serde(default)]
    pub sign2: String,
    #[serde(default)]
    pub gui: String,
    #[serde(default)]
    pub menu: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(rename = "enums", default)]
    pub switches: Vec<Switch>,
}

impl ActionSpec {
    /// Short display label: menu title, falling back to the sign or GUI text.
    pub fn label(&self) -> String {
        [&self.menu, &self.sign2, &self.gui]
            .into_iter()
            .map(|s| strip_colors(s).trim().to_string())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    /// Text the host shows once the action is placed.
    pub fn expected_label(&self) -> String {
        [&self.sign2, &self.gui]
            .into_iter()
            .map(|s| strip_colors(s).trim().to_string())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    /// `menu||expected`. The host may show either label, so both travel with
    /// the instruction; command packing keeps only the clickable part.
    pub fn composite_label(&self) -> String {
        let expected = self.expected_label();
        if expected.is_empty() {
            return self.label();
        }
        let menu = strip_colors(&self.menu).trim().to_string();
        let head = if menu.is_empty() { self.label() } else { menu };
        format!("{head}||{expected}")
    }

    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn switch(&self, name: &str) -> Option<&Switch> {
        self.switches.iter().find(|s| s.name == name)
    }
}

// ── Catalog ──────────────────────────────────────────────────────

/// Source-level module names accepted in place of catalog module names.
pub static MODULE_ALIASES: &[(&str, &str)] = &[
    ("игрок", "player"),
    ("событие", "event"),
    ("select", SELECTION_MODULE),
    ("выборка", SELECTION_MODULE),
];

/// Catalog module holding the selection ("Выбрать объект") actions.
pub const SELECTION_MODULE: &str = "misc";

pub fn canonical_module(module: &str) -> &str {
    MODULE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == module)
        .map_or(module, |(_, target)| *target)
}

/// `module → name → ActionSpec`, in catalog order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionCatalog {
    modules: IndexMap<String, IndexMap<String, ActionSpec>>,
}

impl ActionCatalog {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text.trim_start_matches('\u{feff}'))
    }

    pub fn module(&self, module: &str) -> Option<&IndexMap<String, ActionSpec>> {
        self.modules.get(canonical_module(module))
    }

    /// Find an action by canonical name, then by alias. Returns the
    /// canonical name alongside the spec.
    pub fn find(&self, module: &str, name: &str) -> Option<(&str, &ActionSpec)> {
        let actions = self.module(module)?;
        if let Some((canon, spec)) = actions.get_key_value(name) {
            return Some((canon.as_str(), spec));
        }
        actions
            .iter()
            .find(|(_, spec)| spec.aliases.iter().any(|a| a == name))
            .map(|(canon, spec)| (canon.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Host data bundle ─────────────────────────────────────────────

/// Everything the compiler reads from the host side.
#[derive(Debug, Clone, Default)]
pub struct HostData {
    pub catalog: ActionCatalog,
    pub registry: Registry,
    pub events: KnownEvents,
}

impl HostData {
    /// Load host data from `data_dir`. The catalog is required; a missing
    /// alias table, registry list or events table loads as empty and every
    /// lookup against it fails later with a named diagnostic.
    pub fn load(data_dir: &Path, paths: &HostPaths) -> Result<Self, LoadError> {
        let catalog_path = paths.catalog_path(data_dir);
        let text = read_text(&catalog_path)?;
        let catalog =
            ActionCatalog::from_json(&text).map_err(|e| LoadError::json(&catalog_path, e))?;

        let aliases_path = paths.aliases_path(data_dir);
        let aliases = read_optional(&aliases_path)?;
        let registry_path = paths.registry_path(data_dir);
        let list = read_optional(&registry_path)?.unwrap_or_default();
        let registry = Registry::parse(&list, aliases.as_deref())
            .map_err(|e| LoadError::json(&aliases_path, e))?;
        if registry.is_empty() {
            tracing::warn!(path = %registry_path.display(), "registry list is empty or missing");
        }

        let events_path = paths.known_events_path(data_dir);
        let events = match read_optional(&events_path)? {
            Some(text) => {
                KnownEvents::from_json(&text).map_err(|e| LoadError::json(&events_path, e))?
            }
            None => KnownEvents::default(),
        };

        tracing::debug!(
            actions = catalog.len(),
            registry = registry.len(),
            events = events.len(),
            "host data loaded"
        );
        Ok(Self { catalog, registry, events })
    }
}

fn read_text(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))
}

fn read_optional(path: &Path) -> Result<Option<String>, LoadError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "optional host file not found");
        return Ok(None);
    }
    read_text(path).map(Some)
}

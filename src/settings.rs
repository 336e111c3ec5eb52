use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{read_json, write_json, LoadError};

// ── Host data file names ─────────────────────────────────────────

/// Names of the host data files, resolved relative to the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPaths {
    pub catalog: String,
    pub aliases: String,
    pub registry: String,
    pub known_events: String,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            catalog: crate::paths::CATALOG_FILE.to_string(),
            aliases: crate::paths::ALIASES_FILE.to_string(),
            registry: crate::paths::REGISTRY_FILE.to_string(),
            known_events: crate::paths::KNOWN_EVENTS_FILE.to_string(),
        }
    }
}

impl HostPaths {
    pub fn catalog_path(&self, data_dir: &Path) -> PathBuf {
        crate::paths::data_file(data_dir, &self.catalog)
    }

    pub fn aliases_path(&self, data_dir: &Path) -> PathBuf {
        crate::paths::data_file(data_dir, &self.aliases)
    }

    pub fn registry_path(&self, data_dir: &Path) -> PathBuf {
        crate::paths::data_file(data_dir, &self.registry)
    }

    pub fn known_events_path(&self, data_dir: &Path) -> PathBuf {
        crate::paths::data_file(data_dir, &self.known_events)
    }
}

// ── Compiler settings ────────────────────────────────────────────

/// Tunables for one compilation. Every field has a default matching the
/// host runtime, so an empty or partial settings file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub version: u32,
    /// Character ceiling of one packed host command.
    pub max_command_len: usize,
    /// Operand slots one arithmetic action can carry.
    pub max_operands: usize,
    pub args_stack: String,
    pub ret_stack: String,
    pub tmp_prefix: String,
    pub acc_prefix: String,
    /// Prefix of the per-function variable that collects a return value
    /// when the function returns from inside a block.
    pub result_prefix: String,
    /// Array position used as the top of both call stacks. The host's
    /// array actions are 1-based.
    pub stack_top: u32,
    pub min_loop_ticks: u32,
    /// Instruction count per unit above which an advisory is emitted.
    pub unit_instruction_ceiling: usize,
    pub source_extension: String,
    pub iftext_max_options: usize,
    pub array_chunk: usize,
    pub loop_chunk: usize,
    pub host: HostPaths,
}

const SETTINGS_VERSION: u32 = 1;

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            max_command_len: 240,
            max_operands: 10,
            args_stack: "__mldsl_args".to_string(),
            ret_stack: "__mldsl_ret".to_string(),
            tmp_prefix: "__mldsl_tmp".to_string(),
            acc_prefix: "__mldsl_acc".to_string(),
            result_prefix: "__mldsl_res_".to_string(),
            stack_top: 1,
            min_loop_ticks: 5,
            unit_instruction_ceiling: 48,
            source_extension: crate::paths::SOURCE_EXTENSION.to_string(),
            iftext_max_options: 7,
            array_chunk: 9,
            loop_chunk: 18,
            host: HostPaths::default(),
        }
    }
}

impl CompilerSettings {
    /// Reject values the lowering cannot work with. Operand splitting needs
    /// room for the accumulator plus at least one fresh operand.
    pub fn validate(&self, path: &Path) -> Result<(), LoadError> {
        if self.max_operands < 2 {
            return Err(LoadError::format(path, "max_operands must be at least 2"));
        }
        for (name, value) in [
            ("array_chunk", self.array_chunk),
            ("loop_chunk", self.loop_chunk),
            ("iftext_max_options", self.iftext_max_options),
            ("max_command_len", self.max_command_len),
        ] {
            if value == 0 {
                return Err(LoadError::format(path, format!("{name} must be positive")));
            }
        }
        if self.args_stack.is_empty() || self.ret_stack.is_empty() {
            return Err(LoadError::format(path, "stack names must not be empty"));
        }
        if self.args_stack == self.ret_stack {
            return Err(LoadError::format(path, "argument and return stacks must differ"));
        }
        Ok(())
    }
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<CompilerSettings, LoadError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(CompilerSettings::default());
    }
    let settings = read_json::<CompilerSettings>(path)?;
    settings.validate(path)?;
    Ok(settings)
}

/// Save settings as pretty JSON, creating the parent directory if needed.
pub fn save_settings(path: &Path, settings: &CompilerSettings) -> Result<(), LoadError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LoadError::io(parent, e))?;
    }
    write_json(path, settings)
}

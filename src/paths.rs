//! Centralized path definitions for host data files and compiler settings.
//!
//! This module is the single source of truth for leaf filenames. No other
//! module should hard-code these strings.

use std::path::{Path, PathBuf};

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "mldsl.json";
pub const CATALOG_FILE: &str = "api_aliases.json";
pub const ALIASES_FILE: &str = "aliases.json";
pub const REGISTRY_FILE: &str = "allactions.txt";
pub const KNOWN_EVENTS_FILE: &str = "known_events.json";

/// Source extension appended to imports that do not spell one out.
pub const SOURCE_EXTENSION: &str = "mldsl";

// ── Path builders ────────────────────────────────────────────────

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE)
}

/// Resolve a configured host-data file against the data directory.
/// Absolute paths are kept as-is.
pub fn data_file(data_dir: &Path, name: &str) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        data_dir.join(candidate)
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into
/// the preceding component. Never touches the filesystem, so it works for
/// in-memory sources as well as real files.
pub fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_parent_components() {
        assert_eq!(
            normalize(Path::new("src/lib/../main.mldsl")),
            PathBuf::from("src/main.mldsl")
        );
        assert_eq!(normalize(Path::new("./a/./b")), PathBuf::from("a/b"));
    }

    #[test]
    fn data_file_keeps_absolute_paths() {
        let abs = if cfg!(windows) { "C:\\data\\x.json" } else { "/data/x.json" };
        assert_eq!(data_file(Path::new("base"), abs), PathBuf::from(abs));
        assert_eq!(data_file(Path::new("base"), "x.json"), Path::new("base").join("x.json"));
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Failure while loading host data (catalog, alias table, registry list,
/// known events) or compiler settings from disk.
///
/// These are environment problems rather than compile diagnostics: the
/// compiler never starts when one of its inputs cannot be read.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid data in {path}: {message}")]
    Format { path: PathBuf, message: String },
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        LoadError::Json {
            path: path.into(),
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LoadError::Format {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Read and deserialize a JSON file, tagging failures with the path.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<T, LoadError> {
    let data = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_str(data.trim_start_matches('\u{feff}')).map_err(|e| LoadError::json(path, e))
}

/// Serialize a value as pretty JSON and write it to `path`.
pub(crate) fn write_json<T: serde::Serialize>(
    path: &std::path::Path,
    value: &T,
) -> Result<(), LoadError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| LoadError::json(path, e))?;
    std::fs::write(path, json + "\n").map_err(|e| LoadError::io(path, e))
}

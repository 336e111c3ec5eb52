//! Import inlining.
//!
//! `import path` splices the file at the directive; `use path` appends it
//! after the importing file's own lines. Paths are relative to the importing
//! file and get the source extension when they have none. A file that is
//! already being inlined higher up the same branch is a cycle: it is skipped
//! with a warning so the rest still compiles. A file that was fully inlined
//! earlier on another branch is skipped silently.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::ast::{ImportPlacement, Statement};
use super::error::{CompileError, Location, Warning, WarningKind};
use super::statement::recognize;
use crate::paths::normalize;

/// Where source text comes from. The filesystem in production, a map in
/// tests.
pub trait SourceProvider {
    fn read(&self, path: &Path) -> Result<String, CompileError>;

    /// Identity of a file for cycle detection.
    fn canonical(&self, path: &Path) -> PathBuf {
        normalize(path)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsSources;

impl SourceProvider for FsSources {
    fn read(&self, path: &Path) -> Result<String, CompileError> {
        std::fs::read_to_string(path)
            .map(|text| text.trim_start_matches('\u{feff}').to_string())
            .map_err(|e| CompileError::io(format!("cannot read {}: {e}", path.display())))
    }

    fn canonical(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| normalize(path))
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemorySources {
    files: HashMap<PathBuf, String>,
}

impl MemorySources {
    pub fn with(mut self, path: impl AsRef<Path>, text: &str) -> Self {
        self.files.insert(normalize(path.as_ref()), text.to_string());
        self
    }
}

impl SourceProvider for MemorySources {
    fn read(&self, path: &Path) -> Result<String, CompileError> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| CompileError::io(format!("file not found: {}", path.display())))
    }
}

/// One line of the flattened stream, remembering where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub file: PathBuf,
    /// 1-based.
    pub line: usize,
    pub text: String,
}

impl SourceLine {
    pub fn location(&self) -> Location {
        Location::new(&self.file, self.line, &self.text)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Flattened {
    pub lines: Vec<SourceLine>,
    /// File stems of everything imported, for `stem.` prefix stripping.
    pub namespaces: Vec<String>,
    pub warnings: Vec<Warning>,
}

pub fn resolve_import_path(importer: &Path, raw: &str, extension: &str) -> PathBuf {
    let rel = raw.replace('\\', "/");
    let suffix = format!(".{extension}");
    let rel = if rel.to_lowercase().ends_with(&suffix) { rel } else { format!("{rel}{suffix}") };
    importer.parent().unwrap_or_else(|| Path::new("")).join(rel)
}

struct Flattener<'p> {
    provider: &'p dyn SourceProvider,
    extension: &'p str,
    active: Vec<PathBuf>,
    done: HashSet<PathBuf>,
    out: Flattened,
}

impl Flattener<'_> {
    fn visit(&mut self, path: &Path, from: Option<&Location>) -> Result<(), CompileError> {
        let id = self.provider.canonical(path);
        if self.active.contains(&id) {
            let chain: Vec<String> = self
                .active
                .iter()
                .chain(std::iter::once(&id))
                .map(|p| p.display().to_string())
                .collect();
            let mut warning = Warning::new(
                WarningKind::ImportCycle,
                format!("import cycle skipped: {}", chain.join(" -> ")),
            );
            if let Some(loc) = from {
                warning = warning.at(loc);
            }
            tracing::warn!("{warning}");
            self.out.warnings.push(warning);
            return Ok(());
        }
        if self.done.contains(&id) {
            tracing::debug!(path = %path.display(), "already inlined");
            return Ok(());
        }

        let text = match self.provider.read(path) {
            Ok(text) => text,
            Err(e) => {
                return Err(match from {
                    Some(loc) => e.at(loc),
                    None => e,
                })
            }
        };
        tracing::debug!(path = %path.display(), "inlining");
        self.active.push(id.clone());

        let mut appended = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let here = Location::new(path, idx + 1, raw);
            if let Ok(Some(Statement::Import { path: target, placement })) = recognize(raw) {
                if let Some(stem) = Path::new(&target).file_stem().and_then(|s| s.to_str()) {
                    if !self.out.namespaces.iter().any(|n| n == stem) {
                        self.out.namespaces.push(stem.to_string());
                    }
                }
                let resolved = resolve_import_path(path, &target, self.extension);
                match placement {
                    ImportPlacement::Splice => self.visit(&resolved, Some(&here))?,
                    ImportPlacement::Append => appended.push((resolved, here)),
                }
                continue;
            }
            self.out.lines.push(SourceLine {
                file: path.to_path_buf(),
                line: idx + 1,
                text: raw.to_string(),
            });
        }
        for (resolved, here) in appended {
            self.visit(&resolved, Some(&here))?;
        }

        self.active.pop();
        self.done.insert(id);
        Ok(())
    }
}

/// Inline every import reachable from `entry` into one line stream.
pub fn flatten(
    provider: &dyn SourceProvider,
    entry: &Path,
    extension: &str,
) -> Result<Flattened, CompileError> {
    let mut flattener = Flattener {
        provider,
        extension,
        active: Vec::new(),
        done: HashSet::new(),
        out: Flattened::default(),
    };
    flattener.visit(entry, None)?;
    Ok(flattener.out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn texts(f: &Flattened) -> Vec<&str> {
        f.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn splice_and_append() {
        let src = MemorySources::default()
            .with("main.mldsl", "a\nimport lib/x\nuse lib/y;\nb")
            .with("lib/x.mldsl", "x1")
            .with("lib/y.mldsl", "y1");
        let flat = flatten(&src, Path::new("main.mldsl"), "mldsl").unwrap();
        assert_eq!(texts(&flat), vec!["a", "x1", "b", "y1"]);
        assert_eq!(flat.namespaces, vec!["x", "y"]);
        assert_eq!(flat.lines[1].file, PathBuf::from("lib/x.mldsl"));
        assert_eq!(flat.lines[2].line, 4);
        assert!(flat.warnings.is_empty());
    }

    #[test]
    fn relative_paths_resolve_against_importer() {
        let src = MemorySources::default()
            .with("main.mldsl", "import lib/a")
            .with("lib/a.mldsl", "import ../shared.mldsl\na")
            .with("shared.mldsl", "s");
        let flat = flatten(&src, Path::new("main.mldsl"), "mldsl").unwrap();
        assert_eq!(texts(&flat), vec!["s", "a"]);
    }

    #[test]
    fn cycle_is_a_warning() {
        let src = MemorySources::default()
            .with("a.mldsl", "import b\nfrom_a")
            .with("b.mldsl", "import a\nfrom_b");
        let flat = flatten(&src, Path::new("a.mldsl"), "mldsl").unwrap();
        assert_eq!(texts(&flat), vec!["from_b", "from_a"]);
        assert_eq!(flat.warnings.len(), 1);
        assert_eq!(flat.warnings[0].kind, WarningKind::ImportCycle);
        assert!(flat.warnings[0].message.contains("a.mldsl -> b.mldsl -> a.mldsl"));
        assert_eq!(flat.warnings[0].location.as_ref().unwrap().line, 1);
    }

    #[test]
    fn diamond_inlines_once() {
        let src = MemorySources::default()
            .with("m.mldsl", "import l\nimport r")
            .with("l.mldsl", "import d\nl")
            .with("r.mldsl", "import d\nr")
            .with("d.mldsl", "d");
        let flat = flatten(&src, Path::new("m.mldsl"), "mldsl").unwrap();
        assert_eq!(texts(&flat), vec!["d", "l", "r"]);
        assert!(flat.warnings.is_empty());
    }

    #[test]
    fn missing_import_names_the_directive() {
        let src = MemorySources::default().with("m.mldsl", "x\nimport nope");
        let err = flatten(&src, Path::new("m.mldsl"), "mldsl").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(err.location.unwrap().line, 2);
    }

    #[test]
    fn filesystem_cycle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mldsl"), "import b\n").unwrap();
        std::fs::write(dir.path().join("b.mldsl"), "import a\n").unwrap();
        let flat = flatten(&FsSources, &dir.path().join("a.mldsl"), "mldsl").unwrap();
        assert_eq!(flat.warnings.len(), 1);
        assert!(flat.lines.is_empty());
    }
}

use std::path::PathBuf;

/// Where a diagnostic came from: the (possibly imported) file, the 1-based
/// line number and the line text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub text: String,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize, text: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A fatal compilation error. Compilation of the current file stops at the
/// first one; no partial output is produced.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Line matches no statement form, or a form is malformed.
    Syntax,
    /// Unknown module, action, alias or switch option.
    CatalogMiss,
    /// Category tag without a physical token.
    RegistryMiss,
    /// Argument count or name does not fit the callee.
    Arity,
    UnsupportedExpression,
    AmbiguousSelection,
    ScopeImbalance,
    LengthOverflow,
    Io,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::CatalogMiss => "catalog",
            ErrorKind::RegistryMiss => "registry",
            ErrorKind::Arity => "arity",
            ErrorKind::UnsupportedExpression => "expression",
            ErrorKind::AmbiguousSelection => "selection",
            ErrorKind::ScopeImbalance => "scope",
            ErrorKind::LengthOverflow => "length",
            ErrorKind::Io => "io",
        }
    }
}

impl CompileError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    pub fn catalog_miss(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CatalogMiss, message)
    }

    pub fn registry_miss(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RegistryMiss, message)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arity, message)
    }

    pub fn unsupported_expression(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedExpression, message)
    }

    pub fn ambiguous_selection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AmbiguousSelection, message)
    }

    pub fn scope_imbalance(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ScopeImbalance, message)
    }

    /// `actual` and `limit` are character counts of the packed command.
    pub fn length_overflow(what: &str, actual: usize, limit: usize) -> Self {
        Self::new(
            ErrorKind::LengthOverflow,
            format!(
                "command for {what} is {actual} chars, limit is {limit} (over by {})",
                actual.saturating_sub(limit)
            ),
        )
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// Attach a location unless one is already set. Errors raised deep in
    /// lowering carry none; the driver adds the current line.
    pub fn at(mut self, location: &Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location.clone());
        }
        self
    }

    /// Format with the offending line quoted underneath.
    pub fn format_with_source(&self) -> String {
        match &self.location {
            Some(loc) if !loc.text.trim().is_empty() => {
                format!("{self}\n    | {}", loc.text.trim())
            }
            _ => self.to_string(),
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "[{}] {loc}: {}", self.kind.label(), self.message),
            None => write!(f, "[{}] {}", self.kind.label(), self.message),
        }
    }
}

impl std::error::Error for CompileError {}

// ── Warnings ─────────────────────────────────────────────────────

/// Non-fatal diagnostic collected alongside the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    ImportCycle,
    UnknownEvent,
    InstructionCount,
    /// `return` inside a block or after another return. The host has no
    /// early exit, so the body keeps running after it.
    ConditionalReturn,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: &Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location.clone());
        }
        self
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "[warn] {loc}: {}", self.message),
            None => write!(f, "[warn] {}", self.message),
        }
    }
}

//! Error and warning types for the USD loaders.

use std::fmt;
use thiserror::Error;

/// Main error type for USD load, decode, and composition operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Resolver or input supply failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid magic bytes at start of a crate file or usda header
    #[error("Bad magic: {0}")]
    BadMagic(String),

    /// Unsupported file format version
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    /// Input ended mid-structure
    #[error("Truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// usda grammar violation
    #[error("{0}")]
    Syntax(Box<SyntaxError>),

    /// Path string violates the path grammar
    #[error("Malformed path `{path}`: {reason}")]
    MalformedPath { path: String, reason: String },

    /// Crate value rep references out-of-bounds data or an unknown type
    #[error("Corrupt value rep 0x{rep:016x}: {reason}")]
    CorruptValueRep { rep: u64, reason: String },

    /// Value access with the wrong type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Array index out of bounds
    #[error("Index {index} out of range (len: {len})")]
    OutOfRange { index: usize, len: usize },

    /// Attribute has neither a default value nor time samples
    #[error("Attribute `{0}` has no authored value")]
    NotAuthored(String),

    /// Required section or field absent
    #[error("Missing required {0}")]
    MissingRequired(String),

    /// Path tree in a crate file loops back on itself
    #[error("Cyclic path structure at path index {0}")]
    CyclicPath(usize),

    /// references/payload loop
    #[error("Composition cycle: {0}")]
    CompositionCycle(String),

    /// Resolver returned not-found
    #[error("Unresolved asset: {0}")]
    UnresolvedAsset(String),

    /// Allocation ceiling breached
    #[error("Resource limit exceeded: {what} ({requested} > {limit})")]
    ResourceLimit {
        what: &'static str,
        requested: u64,
        limit: u64,
    },

    /// Two PrimSpecs claim the same absolute path within one layer
    #[error("Duplicate prim: {0}")]
    DuplicatePrim(String),

    /// Integer codec run exceeds the configured ceiling
    #[error("Integer run of {count} exceeds limit {limit}")]
    OversizedRun { count: u64, limit: u64 },

    /// Structurally valid input using a feature this reader does not accept
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Invalid data structure in a binary container
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),
}

impl Error {
    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a syntax error at a source location.
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax(Box::new(SyntaxError {
            line,
            column,
            message: message.into(),
            rules: Vec::new(),
            highlight: None,
            continued: Vec::new(),
        }))
    }

    /// Create a malformed path error.
    pub fn malformed_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a corrupt value rep error.
    pub fn corrupt_rep(rep: u64, reason: impl Into<String>) -> Self {
        Self::CorruptValueRep {
            rep,
            reason: reason.into(),
        }
    }

    /// The syntax diagnostic, if this is a usda grammar error.
    pub fn as_syntax(&self) -> Option<&SyntaxError> {
        match self {
            Self::Syntax(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::invalid(format!("invalid UTF-8: {e}"))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::invalid(format!("invalid UTF-8: {e}"))
    }
}

/// Result type alias for USD operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A usda diagnostic with location and the chain of enclosing grammar rules.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    /// Enclosing rules, innermost first.
    pub rules: Vec<String>,
    /// Source line with a caret under the offending column.
    pub highlight: Option<String>,
    /// Diagnostics for later statements collected after the first failure.
    pub continued: Vec<SyntaxError>,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at {}:{}: {}", self.line, self.column, self.message)?;
        for rule in &self.rules {
            write!(f, "\n  while {rule}")?;
        }
        if let Some(h) = &self.highlight {
            write!(f, "\n{h}")?;
        }
        if !self.continued.is_empty() {
            write!(f, "\n({} further diagnostics)", self.continued.len())?;
        }
        Ok(())
    }
}

/// Adds an enclosing-rule frame to syntax errors as they propagate outward.
pub trait ResultExt<T> {
    fn context<C: fmt::Display>(self, rule: C) -> Result<T>;

    fn with_context<C: fmt::Display, F: FnOnce() -> C>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C: fmt::Display>(self, rule: C) -> Result<T> {
        self.map_err(|e| push_rule(e, rule.to_string()))
    }

    fn with_context<C: fmt::Display, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.map_err(|e| push_rule(e, f().to_string()))
    }
}

fn push_rule(err: Error, rule: String) -> Error {
    match err {
        Error::Syntax(mut e) => {
            e.rules.push(rule);
            Error::Syntax(e)
        }
        other => other,
    }
}

/// Category of a non-fatal diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WarningKind {
    UnknownMetadata,
    Deprecated,
    CompositionCycle,
    UnresolvedAsset,
    Composition,
}

/// A non-fatal diagnostic raised during load or composition.
#[derive(Clone, Debug, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Warning sink passed alongside the error channel.
#[derive(Clone, Debug, Default)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and mirror it to the log.
    pub fn push(&mut self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(?kind, "{}", message);
        self.items.push(Warning { kind, message });
    }

    pub fn extend(&mut self, other: Warnings) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter()
    }

    pub fn has(&self, kind: WarningKind) -> bool {
        self.items.iter().any(|w| w.kind == kind)
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::BadMagic("XXXX".into());
        assert!(e.to_string().contains("magic"));

        let e = Error::OutOfRange { index: 5, len: 3 };
        assert!(e.to_string().contains('5'));
        assert!(e.to_string().contains('3'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_rule_chain() {
        let r: Result<()> = Err(Error::syntax(3, 7, "expected ')'"));
        let err = r
            .context("parsing matrix4d row 2")
            .context("parsing value for `xformOp:transform`")
            .unwrap_err();
        let syn = err.as_syntax().unwrap();
        assert_eq!(syn.rules.len(), 2);
        assert_eq!(syn.rules[0], "parsing matrix4d row 2");
        let text = err.to_string();
        assert!(text.contains("3:7"));
        assert!(text.contains("xformOp:transform"));
    }

    #[test]
    fn test_context_ignores_other_errors() {
        let r: Result<()> = Err(Error::NotAuthored("x".into()));
        assert_eq!(r.context("anything").unwrap_err(), Error::NotAuthored("x".into()));
    }

    #[test]
    fn test_warning_sink() {
        let mut w = Warnings::new();
        assert!(w.is_empty());
        w.push(WarningKind::CompositionCycle, "p.usda -> q.usda -> p.usda");
        assert!(w.has(WarningKind::CompositionCycle));
        assert!(!w.has(WarningKind::UnresolvedAsset));
        assert_eq!(w.len(), 1);
    }
}

// Structured diagnostics shared by the lexer, parser and host
// Collection is thread-safe so hosts may validate sources concurrently.

use std::fmt;
use std::sync::Mutex;

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
            Severity::Hint => write!(f, "hint"),
        }
    }
}

/// A source position: file label, 1-based line and column, byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub length: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Stable diagnostic codes. The letter names the family (P = parse),
/// the number never changes meaning once released.
pub mod codes {
    pub const UNEXPECTED_TOKEN: &str = "P001";
    pub const MISSING_DELIMITER: &str = "P002";
    pub const INVALID_NUMBER: &str = "P003";
    pub const UNTERMINATED_STRING: &str = "P004";
    pub const UNTERMINATED_COMMENT: &str = "P005";
    pub const RESERVED_WORD: &str = "P006";
    pub const INVALID_TABLE_CONSTRUCTOR: &str = "P007";
    pub const INVALID_FUNCTION_DEF: &str = "P008";
    pub const INVALID_ESCAPE: &str = "P009";
    pub const MISPLACED_STATEMENT: &str = "P010";
}

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub help: Option<String>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            message: message.into(),
            location: None,
            help: None,
            notes: Vec::new(),
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(code, message)
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "{}: {}[{}]: {}",
                loc, self.severity, self.code, self.message
            ),
            None => write!(f, "{}[{}]: {}", self.severity, self.code, self.message),
        }
    }
}

/// Ordered, append-only diagnostic sink.
///
/// Appending is thread-safe; a host may run `validate` on several sources
/// sharing one collector.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    records: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.lock().iter().any(|d| d.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.lock().iter().any(|d| d.severity == Severity::Warning)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.lock().iter().filter(|d| d.severity == severity).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Diagnostics in report order.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.records.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

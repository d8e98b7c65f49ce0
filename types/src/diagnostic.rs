//! Compiler diagnostics.

use serde::{Deserialize, Serialize};

use crate::Range;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl DiagnosticSeverity {
    /// Parse the severity word the compiler writes in `DIAG` frames.
    ///
    /// Returns `None` for unknown words. Callers (boundary code) decide the
    /// fallback policy.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warning),
            "info" | "information" => Some(Self::Information),
            "hint" => Some(Self::Hint),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

/// Which band of the problem store a diagnostic belongs to.
///
/// Parse problems come from re-parsing a single document; analysis problems
/// come from whole-project semantic analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    Parse,
    Analysis,
}

/// A single diagnostic reported by the compiler.
///
/// Fields are private; the only construction path is [`Diagnostic::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    range: Range,
    message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(severity: DiagnosticSeverity, range: Range, message: impl Into<String>) -> Self {
        Self {
            severity,
            range,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    /// 0-indexed range.
    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Format as `uri:line:col: severity: message` (1-indexed for display).
    #[must_use]
    pub fn display_with_uri(&self, uri: &str) -> String {
        format!(
            "{}:{}:{}: {}: {}",
            uri,
            self.range.start.line + 1,
            self.range.start.character + 1,
            self.severity.label(),
            self.message,
        )
    }
}

//! Core domain types for the ghul language server.
//!
//! This crate contains pure data types with no IO and no async: positions,
//! diagnostics, and the typed results of every request the compiler answers.
//! Everything here can be used from any layer of the workspace.

#![allow(clippy::missing_errors_doc)]

mod diagnostic;
mod results;

pub use diagnostic::{Diagnostic, DiagnosticSeverity, ProblemKind};
pub use results::{
    CompletionItem, Hover, SignatureHelp, SignatureInformation, SymbolInformation, TextEdit,
    WorkspaceEdit,
};

use serde::{Deserialize, Serialize};

// ============================================================================
// Positions
// ============================================================================

/// A 0-indexed position in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    /// Convert a 1-indexed compiler position to a 0-indexed one.
    ///
    /// The compiler never reports line or column 0, but a stray 0 clamps to
    /// the start of the document rather than wrapping.
    #[must_use]
    pub const fn from_one_based(line: u32, character: u32) -> Self {
        Self {
            line: line.saturating_sub(1),
            character: character.saturating_sub(1),
        }
    }
}

/// A half-open span between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A range inside a specific document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

impl Location {
    #[must_use]
    pub fn new(uri: impl Into<String>, range: Range) -> Self {
        Self {
            uri: uri.into(),
            range,
        }
    }
}

/// Full text of one source file, keyed by its normalized URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub uri: String,
    pub text: String,
}

impl Document {
    #[must_use]
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_one_based_shifts_both_axes() {
        assert_eq!(Position::from_one_based(3, 5), Position::new(2, 4));
    }

    #[test]
    fn test_from_one_based_clamps_zero() {
        assert_eq!(Position::from_one_based(0, 0), Position::new(0, 0));
    }

    #[test]
    fn test_positions_order_by_line_then_character() {
        assert!(Position::new(1, 9) < Position::new(2, 0));
        assert!(Position::new(2, 1) < Position::new(2, 3));
    }
}

//! Typed results of compiler requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Location, Range};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hover {
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    /// Numeric completion kind, passed through from the compiler unchanged.
    pub kind: u32,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInformation {
    pub label: String,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHelp {
    pub signatures: Vec<SignatureInformation>,
    pub active_signature: u32,
    pub active_parameter: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInformation {
    pub name: String,
    /// Numeric symbol kind, passed through from the compiler unchanged.
    pub kind: u32,
    pub container_name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

/// A set of text edits spanning several documents, grouped by URI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkspaceEdit {
    changes: BTreeMap<String, Vec<TextEdit>>,
}

impl WorkspaceEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edit to the list for `uri`, preserving arrival order.
    pub fn push(&mut self, uri: impl Into<String>, edit: TextEdit) {
        self.changes.entry(uri.into()).or_default().push(edit);
    }

    #[must_use]
    pub fn changes(&self) -> &BTreeMap<String, Vec<TextEdit>> {
        &self.changes
    }

    #[must_use]
    pub fn into_changes(self) -> BTreeMap<String, Vec<TextEdit>> {
        self.changes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    fn edit(line: u32, text: &str) -> TextEdit {
        TextEdit {
            range: Range::new(Position::new(line, 0), Position::new(line, 3)),
            new_text: text.to_string(),
        }
    }

    #[test]
    fn test_workspace_edit_groups_by_uri() {
        let mut changes = WorkspaceEdit::new();
        changes.push("file:///b.ghul", edit(1, "x"));
        changes.push("file:///a.ghul", edit(2, "y"));
        changes.push("file:///b.ghul", edit(3, "z"));

        assert_eq!(changes.changes().len(), 2);
        let b = &changes.changes()["file:///b.ghul"];
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].new_text, "x");
        assert_eq!(b[1].new_text, "z");
    }

    #[test]
    fn test_workspace_edit_default_is_empty() {
        assert!(WorkspaceEdit::default().is_empty());
    }
}

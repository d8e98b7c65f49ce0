//! ghul result types to LSP types.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use ghul_types::{
    CompletionItem, Diagnostic, DiagnosticSeverity, Hover, Location, Position, Range,
    SignatureHelp, SymbolInformation, WorkspaceEdit,
};
use tower_lsp::lsp_types as lsp;

use crate::uri;

pub fn position(position: lsp::Position) -> Position {
    Position::new(position.line, position.character)
}

fn lsp_position(position: Position) -> lsp::Position {
    lsp::Position::new(position.line, position.character)
}

fn range(range: Range) -> lsp::Range {
    lsp::Range::new(lsp_position(range.start), lsp_position(range.end))
}

pub fn location(location: &Location) -> Option<lsp::Location> {
    let url = uri::to_url(&location.uri)?;
    Some(lsp::Location::new(url, range(location.range)))
}

pub fn locations(locations: &[Location]) -> Vec<lsp::Location> {
    locations.iter().filter_map(location).collect()
}

pub fn severity(severity: DiagnosticSeverity) -> lsp::DiagnosticSeverity {
    match severity {
        DiagnosticSeverity::Error => lsp::DiagnosticSeverity::ERROR,
        DiagnosticSeverity::Warning => lsp::DiagnosticSeverity::WARNING,
        DiagnosticSeverity::Information => lsp::DiagnosticSeverity::INFORMATION,
        DiagnosticSeverity::Hint => lsp::DiagnosticSeverity::HINT,
    }
}

pub fn diagnostic(diagnostic: &Diagnostic) -> lsp::Diagnostic {
    lsp::Diagnostic {
        range: range(diagnostic.range()),
        severity: Some(severity(diagnostic.severity())),
        source: Some(String::from("ghul")),
        message: diagnostic.message().to_string(),
        ..Default::default()
    }
}

pub fn hover(hover: Hover) -> lsp::Hover {
    lsp::Hover {
        contents: lsp::HoverContents::Markup(lsp::MarkupContent {
            kind: lsp::MarkupKind::Markdown,
            value: format!("```ghul\n{}\n```", hover.contents),
        }),
        range: None,
    }
}

const COMPLETION_KINDS: RangeInclusive<u32> = 1..=25;
const SYMBOL_KINDS: RangeInclusive<u32> = 1..=26;

/// Kinds are LSP numbers already; numbers outside the LSP range are dropped.
fn completion_kind(kind: u32) -> Option<lsp::CompletionItemKind> {
    if !COMPLETION_KINDS.contains(&kind) {
        return None;
    }
    serde_json::from_value(serde_json::Value::from(kind)).ok()
}

fn symbol_kind(kind: u32) -> lsp::SymbolKind {
    if !SYMBOL_KINDS.contains(&kind) {
        return lsp::SymbolKind::NULL;
    }
    serde_json::from_value(serde_json::Value::from(kind)).unwrap_or(lsp::SymbolKind::NULL)
}

pub fn completion(item: CompletionItem) -> lsp::CompletionItem {
    lsp::CompletionItem {
        kind: completion_kind(item.kind),
        detail: (!item.detail.is_empty()).then_some(item.detail),
        ..lsp::CompletionItem::new_simple(item.label, String::new())
    }
}

pub fn signature_help(help: SignatureHelp) -> lsp::SignatureHelp {
    let signatures = help
        .signatures
        .into_iter()
        .map(|signature| lsp::SignatureInformation {
            label: signature.label,
            documentation: None,
            parameters: Some(
                signature
                    .parameters
                    .into_iter()
                    .map(|parameter| lsp::ParameterInformation {
                        label: lsp::ParameterLabel::Simple(parameter),
                        documentation: None,
                    })
                    .collect(),
            ),
            active_parameter: None,
        })
        .collect();

    lsp::SignatureHelp {
        signatures,
        active_signature: Some(help.active_signature),
        active_parameter: Some(help.active_parameter),
    }
}

#[allow(deprecated)]
pub fn symbol(symbol: SymbolInformation) -> Option<lsp::SymbolInformation> {
    Some(lsp::SymbolInformation {
        location: location(&symbol.location)?,
        name: symbol.name,
        kind: symbol_kind(symbol.kind),
        tags: None,
        deprecated: None,
        container_name: (!symbol.container_name.is_empty()).then_some(symbol.container_name),
    })
}

pub fn symbols(symbols: Vec<SymbolInformation>) -> Vec<lsp::SymbolInformation> {
    symbols.into_iter().filter_map(symbol).collect()
}

pub fn workspace_edit(edit: WorkspaceEdit) -> lsp::WorkspaceEdit {
    let mut changes = HashMap::new();
    for (key, edits) in edit.into_changes() {
        let Some(url) = uri::to_url(&key) else {
            tracing::warn!(uri = %key, "Dropping rename edits for unparseable uri");
            continue;
        };
        let edits = edits
            .into_iter()
            .map(|edit| lsp::TextEdit::new(range(edit.range), edit.new_text))
            .collect();
        changes.insert(url, edits);
    }
    lsp::WorkspaceEdit::new(changes)
}

#[cfg(test)]
mod tests {
    use ghul_types::{SignatureInformation, TextEdit};

    use super::*;

    fn span(line: u32, start: u32, end: u32) -> Range {
        Range::new(Position::new(line, start), Position::new(line, end))
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            severity(DiagnosticSeverity::Error),
            lsp::DiagnosticSeverity::ERROR
        );
        assert_eq!(
            severity(DiagnosticSeverity::Warning),
            lsp::DiagnosticSeverity::WARNING
        );
        assert_eq!(
            severity(DiagnosticSeverity::Information),
            lsp::DiagnosticSeverity::INFORMATION
        );
        assert_eq!(
            severity(DiagnosticSeverity::Hint),
            lsp::DiagnosticSeverity::HINT
        );
    }

    #[test]
    fn test_diagnostic_carries_source_and_range() {
        let converted = diagnostic(&Diagnostic::new(
            DiagnosticSeverity::Warning,
            span(2, 4, 9),
            "unused",
        ));
        assert_eq!(converted.source.as_deref(), Some("ghul"));
        assert_eq!(converted.range.start, lsp::Position::new(2, 4));
        assert_eq!(converted.message, "unused");
    }

    #[test]
    fn test_completion_kind_passes_through() {
        let item = completion(CompletionItem {
            label: "foo".to_string(),
            kind: 7,
            detail: "int".to_string(),
        });
        assert_eq!(item.kind, Some(lsp::CompletionItemKind::CLASS));
        assert_eq!(item.detail.as_deref(), Some("int"));
    }

    #[test]
    fn test_unknown_kinds_fall_back() {
        assert_eq!(completion_kind(0), None);
        assert_eq!(completion_kind(26), None);
        assert_eq!(completion_kind(25), Some(lsp::CompletionItemKind::TYPE_PARAMETER));
        assert_eq!(symbol_kind(99), lsp::SymbolKind::NULL);
        assert_eq!(symbol_kind(5), lsp::SymbolKind::CLASS);
    }

    #[test]
    fn test_location_with_bad_uri_is_dropped() {
        let bad = Location::new("not a uri", span(0, 0, 1));
        let good = Location::new("file:///a.ghul", span(0, 0, 1));
        assert_eq!(locations(&[bad, good]).len(), 1);
    }

    #[test]
    fn test_signature_help_keeps_active_indices() {
        let help = signature_help(SignatureHelp {
            signatures: vec![SignatureInformation {
                label: "f(a: int, b: int)".to_string(),
                parameters: vec!["a: int".to_string(), "b: int".to_string()],
            }],
            active_signature: 0,
            active_parameter: 1,
        });
        assert_eq!(help.active_parameter, Some(1));
        assert_eq!(help.signatures[0].parameters.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_workspace_edit_groups_by_url() {
        let mut edit = WorkspaceEdit::new();
        for line in [0, 4] {
            edit.push(
                "file:///a.ghul",
                TextEdit {
                    range: span(line, 0, 3),
                    new_text: "bar".to_string(),
                },
            );
        }
        let converted = workspace_edit(edit);
        let changes = converted.changes.unwrap();
        let url = lsp::Url::parse("file:///a.ghul").unwrap();
        assert_eq!(changes[&url].len(), 2);
    }
}

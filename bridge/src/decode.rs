//! Payload decoders, one per response command.
//!
//! Fields are tab separated. Lines and columns arrive 1-based and leave
//! 0-based.

use ghul_types::{
    CompletionItem, Diagnostic, DiagnosticSeverity, Hover, Location, Position, Range,
    SignatureHelp, SignatureInformation, SymbolInformation, TextEdit, WorkspaceEdit,
};

use crate::error::DecodeError;

fn fields(line: &str) -> Vec<&str> {
    line.split('\t').collect()
}

fn number(field: &'static str, value: &str) -> Result<u32, DecodeError> {
    value
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

/// `start-line, start-col, end-line, end-col`.
fn range(fields: &[&str]) -> Result<Range, DecodeError> {
    let [start_line, start_col, end_line, end_col] = fields else {
        return Err(DecodeError::FieldCount {
            expected: 4,
            found: fields.len(),
        });
    };
    Ok(Range::new(
        Position::from_one_based(
            number("start line", start_line)?,
            number("start column", start_col)?,
        ),
        Position::from_one_based(
            number("end line", end_line)?,
            number("end column", end_col)?,
        ),
    ))
}

/// `uri, start-line, start-col, end-line, end-col`.
fn location(fields: &[&str]) -> Result<Location, DecodeError> {
    Ok(Location::new(fields[0], range(&fields[1..5])?))
}

pub(crate) fn hover(lines: &[String]) -> Result<Option<Hover>, DecodeError> {
    let contents = lines.join("\n");
    if contents.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(Hover { contents }))
}

/// Shared by definition and declaration.
pub(crate) fn single_location(lines: &[String]) -> Result<Option<Location>, DecodeError> {
    let Some(line) = lines.first() else {
        return Ok(None);
    };
    let fields = fields(line);
    if fields.len() < 5 {
        return Ok(None);
    }
    location(&fields).map(Some)
}

/// Shared by references and implementation. Lines that are not a full
/// location are skipped.
pub(crate) fn locations(lines: &[String]) -> Result<Vec<Location>, DecodeError> {
    lines
        .iter()
        .map(|line| fields(line))
        .filter(|fields| fields.len() >= 5)
        .map(|fields| location(&fields))
        .collect()
}

pub(crate) fn completion(lines: &[String]) -> Result<Vec<CompletionItem>, DecodeError> {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let fields = fields(line);
        if fields.len() < 3 {
            continue;
        }
        items.push(CompletionItem {
            label: fields[0].to_string(),
            kind: number("completion kind", fields[1])?,
            detail: fields[2..].join("\t"),
        });
    }
    Ok(items)
}

pub(crate) fn signature_help(lines: &[String]) -> Result<Option<SignatureHelp>, DecodeError> {
    let [active_signature, active_parameter, rest @ ..] = lines else {
        return Ok(None);
    };

    let signatures: Vec<SignatureInformation> = rest
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = line.split('\t');
            SignatureInformation {
                label: fields.next().unwrap_or_default().to_string(),
                parameters: fields.map(str::to_string).collect(),
            }
        })
        .collect();

    if signatures.is_empty() {
        return Ok(None);
    }

    Ok(Some(SignatureHelp {
        signatures,
        active_signature: number("active signature", active_signature)?,
        active_parameter: number("active parameter", active_parameter)?,
    }))
}

/// Shared by document and workspace symbols. The first line is a legacy
/// marker; after it, a bare uri line sets the document for the records
/// that follow.
pub(crate) fn symbols(lines: &[String]) -> Result<Vec<SymbolInformation>, DecodeError> {
    let mut current_uri: Option<&str> = None;
    let mut symbols = Vec::new();

    for line in lines.iter().skip(1) {
        if line.is_empty() {
            continue;
        }
        let fields = fields(line);
        match fields.len() {
            1 => current_uri = Some(line.as_str()),
            7 => {
                let uri = current_uri.ok_or(DecodeError::SymbolWithoutUri)?;
                symbols.push(SymbolInformation {
                    name: fields[0].to_string(),
                    kind: number("symbol kind", fields[1])?,
                    container_name: fields[2].to_string(),
                    location: Location::new(uri, range(&fields[3..7])?),
                });
            }
            found => {
                return Err(DecodeError::FieldCount { expected: 7, found });
            }
        }
    }

    Ok(symbols)
}

pub(crate) fn rename(lines: &[String]) -> Result<Option<WorkspaceEdit>, DecodeError> {
    let mut changes = WorkspaceEdit::new();
    for line in lines {
        let fields = fields(line);
        if fields.len() < 6 {
            continue;
        }
        changes.push(
            fields[0],
            TextEdit {
                range: range(&fields[1..5])?,
                new_text: fields[5..].join("\t"),
            },
        );
    }
    Ok((!changes.is_empty()).then_some(changes))
}

/// `severity, uri, start-line, start-col, end-line, end-col, message`.
///
/// Returns `None` for lines too short to be a diagnostic.
pub(crate) fn diagnostic(line: &str) -> Result<Option<(String, Diagnostic)>, DecodeError> {
    let fields = fields(line);
    if fields.len() < 7 {
        return Ok(None);
    }
    let severity = DiagnosticSeverity::from_wire(fields[0]).unwrap_or(DiagnosticSeverity::Warning);
    let diagnostic = Diagnostic::new(severity, range(&fields[2..6])?, fields[6..].join("\t"));
    Ok(Some((fields[1].to_string(), diagnostic)))
}

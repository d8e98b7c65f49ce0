//! Outgoing command encoding.
//!
//! Every request is a `#COMMAND#` line followed by one argument per line.
//! Positions go over the wire 1-based, except the column of completion and
//! signature requests, which the compiler expects 0-based (the cursor sits
//! between characters).

use ghul_types::{Document, Position};

use crate::frame::FRAME_SEPARATOR;

/// A document position as the target of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextPosition {
    pub uri: String,
    pub position: Position,
}

impl TextPosition {
    pub fn new(uri: impl Into<String>, position: Position) -> Self {
        Self {
            uri: uri.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WireRequest {
    Hover(TextPosition),
    Definition(TextPosition),
    Declaration(TextPosition),
    Completion(TextPosition),
    Signature(TextPosition),
    /// `None` asks for workspace-wide symbols.
    Symbols(Option<String>),
    References(TextPosition),
    Implementation(TextPosition),
    Rename { at: TextPosition, new_name: String },
    Restart,
}

impl WireRequest {
    pub fn encode(&self) -> String {
        match self {
            Self::Hover(at) => one_based("#HOVER#", at),
            Self::Definition(at) => one_based("#DEFINITION#", at),
            Self::Declaration(at) => one_based("#DECLARATION#", at),
            Self::Completion(at) => zero_based_column("#COMPLETE#", at),
            Self::Signature(at) => zero_based_column("#SIGNATURE#", at),
            Self::Symbols(uri) => format!("#SYMBOLS#\n{}\n", uri.as_deref().unwrap_or("")),
            Self::References(at) => one_based("#REFERENCES#", at),
            Self::Implementation(at) => one_based("#IMPLEMENTATION#", at),
            Self::Rename { at, new_name } => {
                format!("{}{new_name}\n", one_based("#RENAMEREQUEST#", at))
            }
            Self::Restart => String::from("#RESTART#\n"),
        }
    }
}

fn one_based(command: &str, at: &TextPosition) -> String {
    format!(
        "{command}\n{}\n{}\n{}\n",
        at.uri,
        at.position.line + 1,
        at.position.character + 1
    )
}

fn zero_based_column(command: &str, at: &TextPosition) -> String {
    format!(
        "{command}\n{}\n{}\n{}\n",
        at.uri,
        at.position.line + 1,
        at.position.character
    )
}

/// Encode a multi-document edit: the uri list, a blank line, then each
/// document's full text closed by the frame separator, in uri order.
pub(crate) fn encode_edit(documents: &[Document]) -> String {
    let text_len: usize = documents.iter().map(|d| d.text.len() + 1).sum();
    let mut out = String::with_capacity(text_len + 64);

    out.push_str("#EDIT#\n");
    for document in documents {
        out.push_str(&document.uri);
        out.push('\n');
    }
    out.push('\n');
    for document in documents {
        out.push_str(&document.text);
        out.push(char::from(FRAME_SEPARATOR));
    }
    out
}

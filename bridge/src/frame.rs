//! Frame reassembly for the compiler's output stream.
//!
//! The compiler writes frames separated by a single form feed byte. Each
//! frame is a list of `\n`-terminated lines: the first names the command,
//! and the mandatory final empty line closes the frame.
//!
//! ```text
//! HOVER\n
//! some text\n
//! \x0C
//! ```

use crate::error::ProtocolError;

/// Reserved byte separating frames. Never valid inside a payload.
pub const FRAME_SEPARATOR: u8 = 0x0C;

/// Commands the compiler may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Listen,
    DiagParse,
    DiagAnalysis,
    Analysed,
    Hover,
    Definition,
    Declaration,
    Completion,
    Signature,
    Symbols,
    References,
    Implementation,
    Rename,
    Except,
    Restart,
}

impl Command {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let command = match name {
            "LISTEN" => Self::Listen,
            "DIAG PARSE" => Self::DiagParse,
            "DIAG ANALYSIS" => Self::DiagAnalysis,
            "ANALYSED" => Self::Analysed,
            "HOVER" => Self::Hover,
            "DEFINITION" => Self::Definition,
            "DECLARATION" => Self::Declaration,
            "COMPLETION" => Self::Completion,
            "SIGNATURE" => Self::Signature,
            "SYMBOLS" => Self::Symbols,
            "REFERENCES" => Self::References,
            "IMPLEMENTATION" => Self::Implementation,
            "RENAMEREQUEST" => Self::Rename,
            "EXCEPT" => Self::Except,
            "RESTART" => Self::Restart,
            _ => return None,
        };
        Some(command)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Listen => "LISTEN",
            Self::DiagParse => "DIAG PARSE",
            Self::DiagAnalysis => "DIAG ANALYSIS",
            Self::Analysed => "ANALYSED",
            Self::Hover => "HOVER",
            Self::Definition => "DEFINITION",
            Self::Declaration => "DECLARATION",
            Self::Completion => "COMPLETION",
            Self::Signature => "SIGNATURE",
            Self::Symbols => "SYMBOLS",
            Self::References => "REFERENCES",
            Self::Implementation => "IMPLEMENTATION",
            Self::Rename => "RENAMEREQUEST",
            Self::Except => "EXCEPT",
            Self::Restart => "RESTART",
        }
    }
}

/// One complete message from the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Payload lines, without the command line and the terminator.
    pub lines: Vec<String>,
}

impl Frame {
    /// Decode the bytes between two separators.
    pub fn decode(segment: &[u8]) -> Result<Self, ProtocolError> {
        if segment.is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }

        let text = String::from_utf8_lossy(segment);
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();

        // `split` always yields at least one element.
        let terminator = lines.pop().unwrap_or_default();
        if !terminator.is_empty() {
            let name = lines.into_iter().next().unwrap_or(terminator);
            return Err(ProtocolError::MissingTerminator(name));
        }

        let mut lines = lines.into_iter();
        let name = lines.next().unwrap_or_default();
        let command = Command::parse(&name).ok_or(ProtocolError::UnknownCommand(name))?;

        Ok(Self {
            command,
            lines: lines.collect(),
        })
    }
}

/// Accumulates stdout chunks and yields frames as they complete.
///
/// Chunks may split a frame (or a multi-byte UTF-8 sequence) anywhere; the
/// trailing partial segment is kept until its separator arrives.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
}

impl FrameBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and decode every frame it completes, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Frame, ProtocolError>> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_separator) = self.buffer.iter().rposition(|&b| b == FRAME_SEPARATOR) else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_separator + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete[..last_separator]
            .split(|&b| b == FRAME_SEPARATOR)
            .map(Frame::decode)
            .collect()
    }

    /// Drop any partial frame; used when the compiler process is replaced.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Bytes held back waiting for a separator.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

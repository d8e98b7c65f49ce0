//! Error types surfaced by the bridge.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::correlation::RequestKind;

/// Stream-level failures. Any of these means frame alignment with the
/// compiler can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty frame; compiler output is out of sync")]
    EmptyFrame,
    #[error("unrecognized compiler command `{0}`")]
    UnknownCommand(String),
    #[error("frame `{0}` is missing its terminating empty line")]
    MissingTerminator(String),
}

/// A response payload that does not match its command's line format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid number `{value}` in {field}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("symbol record appears before any document uri")]
    SymbolWithoutUri,
}

/// Why a request to the compiler did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("compiler protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("malformed {kind} response: {source}")]
    Decode {
        kind: RequestKind,
        #[source]
        source: DecodeError,
    },
    #[error("compiler raised an exception: {0}")]
    CompilerException(String),
    #[error("compiler made no progress for {0:?}")]
    WatchdogTimeout(Duration),
    #[error("edit queue invariant violated: {0}")]
    InvariantViolation(String),
    #[error("pipeline aborted; restart required")]
    Aborted,
    #[error("bridge has shut down")]
    Closed,
}

/// The compiler process could not be launched.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("{command} not found in PATH")]
    NotFound {
        command: String,
        #[source]
        source: which::Error,
    },
    #[error("failed to write response file: {0}")]
    ResponseFile(#[source] io::Error),
    #[error("failed to spawn {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("compiler {0} was not captured")]
    MissingPipe(&'static str),
}

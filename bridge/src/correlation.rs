//! Per-kind FIFO pairing of requests with responses.
//!
//! The compiler answers requests of one kind strictly in the order they were
//! sent, so there are no request ids: the oldest holder in a kind's queue
//! owns the next response frame of that kind. A holder whose caller has gone
//! away still keeps its place, otherwise every later pairing would shift.

use std::collections::VecDeque;
use std::fmt;

use ghul_types::{CompletionItem, Hover, Location, SignatureHelp, SymbolInformation, WorkspaceEdit};
use tokio::sync::oneshot;

use crate::decode;
use crate::error::{BridgeError, DecodeError};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, BridgeError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Hover,
    Definition,
    Declaration,
    Completion,
    SignatureHelp,
    Symbols,
    References,
    Implementation,
    Rename,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hover => "hover",
            Self::Definition => "definition",
            Self::Declaration => "declaration",
            Self::Completion => "completion",
            Self::SignatureHelp => "signature help",
            Self::Symbols => "symbols",
            Self::References => "references",
            Self::Implementation => "implementation",
            Self::Rename => "rename",
        };
        f.write_str(name)
    }
}

/// A caller waiting for one typed result.
pub(crate) enum Responder {
    Hover(Reply<Option<Hover>>),
    Definition(Reply<Option<Location>>),
    Declaration(Reply<Option<Location>>),
    Completion(Reply<Vec<CompletionItem>>),
    SignatureHelp(Reply<Option<SignatureHelp>>),
    Symbols(Reply<Vec<SymbolInformation>>),
    References(Reply<Vec<Location>>),
    Implementation(Reply<Vec<Location>>),
    Rename(Reply<Option<WorkspaceEdit>>),
}

impl Responder {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Hover(_) => RequestKind::Hover,
            Self::Definition(_) => RequestKind::Definition,
            Self::Declaration(_) => RequestKind::Declaration,
            Self::Completion(_) => RequestKind::Completion,
            Self::SignatureHelp(_) => RequestKind::SignatureHelp,
            Self::Symbols(_) => RequestKind::Symbols,
            Self::References(_) => RequestKind::References,
            Self::Implementation(_) => RequestKind::Implementation,
            Self::Rename(_) => RequestKind::Rename,
        }
    }

    /// Answer immediately with the empty result for this kind.
    pub fn respond_empty(self) {
        match self {
            Self::Hover(reply) => send_empty(reply),
            Self::Definition(reply) | Self::Declaration(reply) => send_empty(reply),
            Self::Completion(reply) => send_empty(reply),
            Self::SignatureHelp(reply) => send_empty(reply),
            Self::Symbols(reply) => send_empty(reply),
            Self::References(reply) | Self::Implementation(reply) => send_empty(reply),
            Self::Rename(reply) => send_empty(reply),
        }
    }

    pub fn fail(self, error: BridgeError) {
        match self {
            Self::Hover(reply) => drop(reply.send(Err(error))),
            Self::Definition(reply) | Self::Declaration(reply) => drop(reply.send(Err(error))),
            Self::Completion(reply) => drop(reply.send(Err(error))),
            Self::SignatureHelp(reply) => drop(reply.send(Err(error))),
            Self::Symbols(reply) => drop(reply.send(Err(error))),
            Self::References(reply) | Self::Implementation(reply) => drop(reply.send(Err(error))),
            Self::Rename(reply) => drop(reply.send(Err(error))),
        }
    }
}

fn send_empty<T: Default>(reply: Reply<T>) {
    // The caller may have stopped waiting; nothing to do then.
    let _ = reply.send(Ok(T::default()));
}

/// Outstanding requests of a single kind, oldest first.
pub(crate) struct Pending<T> {
    kind: RequestKind,
    holders: VecDeque<Reply<T>>,
}

impl<T: Default> Pending<T> {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            holders: VecDeque::new(),
        }
    }

    /// Register a new outstanding request and hand back its receiver.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn expect(&mut self) -> oneshot::Receiver<Result<T, BridgeError>> {
        let (tx, rx) = oneshot::channel();
        self.push(tx);
        rx
    }

    pub fn push(&mut self, reply: Reply<T>) {
        self.holders.push_back(reply);
    }

    /// Settle the oldest holder. Returns `false` when nothing was waiting and
    /// the result was discarded.
    pub fn resolve_next(&mut self, result: Result<T, DecodeError>) -> bool {
        let Some(reply) = self.holders.pop_front() else {
            tracing::debug!(kind = %self.kind, "Discarding response with no pending request");
            return false;
        };
        let kind = self.kind;
        let _ = reply.send(result.map_err(|source| {
            tracing::warn!(kind = %kind, error = %source, "Failed to decode compiler response");
            BridgeError::Decode { kind, source }
        }));
        true
    }

    pub fn resolve_all_empty(&mut self) -> usize {
        let count = self.holders.len();
        for reply in self.holders.drain(..) {
            send_empty(reply);
        }
        count
    }

    pub fn reject_all(&mut self, error: &BridgeError) -> usize {
        let count = self.holders.len();
        for reply in self.holders.drain(..) {
            let _ = reply.send(Err(error.clone()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }
}

/// One FIFO per request kind.
pub(crate) struct CorrelationQueues {
    pub hover: Pending<Option<Hover>>,
    pub definition: Pending<Option<Location>>,
    pub declaration: Pending<Option<Location>>,
    pub completion: Pending<Vec<CompletionItem>>,
    pub signature_help: Pending<Option<SignatureHelp>>,
    pub symbols: Pending<Vec<SymbolInformation>>,
    pub references: Pending<Vec<Location>>,
    pub implementation: Pending<Vec<Location>>,
    pub rename: Pending<Option<WorkspaceEdit>>,
}

impl CorrelationQueues {
    pub fn new() -> Self {
        Self {
            hover: Pending::new(RequestKind::Hover),
            definition: Pending::new(RequestKind::Definition),
            declaration: Pending::new(RequestKind::Declaration),
            completion: Pending::new(RequestKind::Completion),
            signature_help: Pending::new(RequestKind::SignatureHelp),
            symbols: Pending::new(RequestKind::Symbols),
            references: Pending::new(RequestKind::References),
            implementation: Pending::new(RequestKind::Implementation),
            rename: Pending::new(RequestKind::Rename),
        }
    }

    /// Queue a caller behind every earlier request of the same kind.
    pub fn expect(&mut self, responder: Responder) {
        match responder {
            Responder::Hover(reply) => self.hover.push(reply),
            Responder::Definition(reply) => self.definition.push(reply),
            Responder::Declaration(reply) => self.declaration.push(reply),
            Responder::Completion(reply) => self.completion.push(reply),
            Responder::SignatureHelp(reply) => self.signature_help.push(reply),
            Responder::Symbols(reply) => self.symbols.push(reply),
            Responder::References(reply) => self.references.push(reply),
            Responder::Implementation(reply) => self.implementation.push(reply),
            Responder::Rename(reply) => self.rename.push(reply),
        }
    }

    /// Decode a response payload and settle the oldest request of `kind`.
    pub fn handle(&mut self, kind: RequestKind, lines: &[String]) -> bool {
        match kind {
            RequestKind::Hover => self.hover.resolve_next(decode::hover(lines)),
            RequestKind::Definition => self.definition.resolve_next(decode::single_location(lines)),
            RequestKind::Declaration => {
                self.declaration.resolve_next(decode::single_location(lines))
            }
            RequestKind::Completion => self.completion.resolve_next(decode::completion(lines)),
            RequestKind::SignatureHelp => {
                self.signature_help.resolve_next(decode::signature_help(lines))
            }
            RequestKind::Symbols => self.symbols.resolve_next(decode::symbols(lines)),
            RequestKind::References => self.references.resolve_next(decode::locations(lines)),
            RequestKind::Implementation => {
                self.implementation.resolve_next(decode::locations(lines))
            }
            RequestKind::Rename => self.rename.resolve_next(decode::rename(lines)),
        }
    }

    /// Answer every outstanding request with an empty result.
    pub fn resolve_all_empty(&mut self) -> usize {
        self.hover.resolve_all_empty()
            + self.definition.resolve_all_empty()
            + self.declaration.resolve_all_empty()
            + self.completion.resolve_all_empty()
            + self.signature_help.resolve_all_empty()
            + self.symbols.resolve_all_empty()
            + self.references.resolve_all_empty()
            + self.implementation.resolve_all_empty()
            + self.rename.resolve_all_empty()
    }

    /// Fail every outstanding request with `error`.
    pub fn reject_all(&mut self, error: &BridgeError) -> usize {
        self.hover.reject_all(error)
            + self.definition.reject_all(error)
            + self.declaration.reject_all(error)
            + self.completion.reject_all(error)
            + self.signature_help.reject_all(error)
            + self.symbols.reject_all(error)
            + self.references.reject_all(error)
            + self.implementation.reject_all(error)
            + self.rename.reject_all(error)
    }

    pub fn outstanding(&self) -> usize {
        self.hover.len()
            + self.definition.len()
            + self.declaration.len()
            + self.completion.len()
            + self.signature_help.len()
            + self.symbols.len()
            + self.references.len()
            + self.implementation.len()
            + self.rename.len()
    }
}

//! Bridge between a language server and the ghul compiler's analysis mode.
//!
//! The compiler runs as a long-lived subprocess speaking a line-oriented
//! protocol over stdin/stdout. [`Bridge`] debounces document edits into
//! batches, pairs responses with requests per kind in FIFO order, collects
//! diagnostics and restarts the compiler when it dies.

pub mod error;
pub mod frame;
pub mod types;

mod correlation;
mod decode;
mod edit_queue;
mod handle;
mod pipeline;
mod problems;
mod process;
mod protocol;
mod watchdog;

pub use correlation::RequestKind;
pub use edit_queue::QueueState;
pub use error::{BridgeError, DecodeError, ProtocolError, SpawnError};
pub use frame::{Command, FRAME_SEPARATOR, Frame, FrameBuffer};
pub use handle::Bridge;
pub use types::{
    BridgeConfig, BridgeEvent, CompilerConfig, DEFAULT_EDIT_DEBOUNCE, DEFAULT_WATCHDOG_TIMEOUT,
    LifecycleEvent,
};

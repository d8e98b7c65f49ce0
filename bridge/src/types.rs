//! Public types consumed by the language-server frontend.
//!
//! The frontend constructs a [`BridgeConfig`], receives [`BridgeEvent`]s, and
//! reacts to [`LifecycleEvent`]s for status reporting.

use std::path::PathBuf;
use std::time::Duration;

use ghul_types::Diagnostic;
use serde::Deserialize;

/// Quiet period after the last edit before a batch is sent.
pub const DEFAULT_EDIT_DEBOUNCE: Duration = Duration::from_millis(100);

/// How long the compiler may go without progress while work is outstanding.
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(120);

/// How to launch the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Executable, resolved on `PATH` (e.g. "ghul-compiler" or "dotnet").
    pub command: String,
    /// Arguments placed on the command line before the response file.
    pub args: Vec<String>,
    /// Arguments written to the response file.
    pub analyse_args: Vec<String>,
    /// Never spawn the compiler this session.
    pub block: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: String::from("ghul-compiler"),
            args: Vec::new(),
            analyse_args: vec![String::from("--analyse")],
            block: false,
        }
    }
}

/// Everything the bridge needs to run one compiler session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub compiler: CompilerConfig,
    /// Working directory for the compiler process.
    pub workspace_root: PathBuf,
    pub edit_debounce: Duration,
    pub watchdog_timeout: Duration,
}

impl BridgeConfig {
    #[must_use]
    pub fn new(compiler: CompilerConfig, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            compiler,
            workspace_root: workspace_root.into(),
            edit_debounce: DEFAULT_EDIT_DEBOUNCE,
            watchdog_timeout: DEFAULT_WATCHDOG_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_edit_debounce(mut self, edit_debounce: Duration) -> Self {
        self.edit_debounce = edit_debounce;
        self
    }

    #[must_use]
    pub fn with_watchdog_timeout(mut self, watchdog_timeout: Duration) -> Self {
        self.watchdog_timeout = watchdog_timeout;
        self
    }
}

/// An event emitted by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Complete diagnostics for one document. An empty list clears it.
    Diagnostics { uri: String, items: Vec<Diagnostic> },
    Lifecycle(LifecycleEvent),
}

/// Compiler lifecycle notifications, emitted right after the state change
/// they describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// About to spawn the compiler.
    Starting,
    /// Process spawned; waiting for it to listen.
    Running,
    /// Compiler is ready for edits.
    Listening,
    /// An analysis pass finished and diagnostics were published.
    Analysed,
    /// The bridge stopped the compiler itself.
    Killed,
    /// The compiler exited on its own; a restart follows.
    Crashed { status: String },
    /// The compiler output could not be parsed; outstanding requests failed.
    ProtocolError { message: String },
    /// The compiler reported an internal exception.
    Exception { message: String },
    /// The pipeline is stuck or could not start; requests fail until restart.
    Aborted { reason: String },
    /// Spawning is disabled by configuration.
    Blocked,
}

//! The public `Bridge` handle and the actor task that owns the pipeline.
//!
//! The handle is a cheap clone around a command channel. The actor owns the
//! compiler process and every piece of pipeline state, so nothing is shared
//! and nothing is locked. Timers are deadlines read back from the pipeline
//! each turn of the loop.

use ghul_types::{
    CompletionItem, Document, Hover, Location, Position, SignatureHelp, SymbolInformation,
    WorkspaceEdit,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::correlation::{Reply, Responder};
use crate::error::BridgeError;
use crate::pipeline::Pipeline;
use crate::process::{ExitDisposition, ProcessEvent, ProcessManager};
use crate::protocol::{TextPosition, WireRequest};
use crate::types::{BridgeConfig, BridgeEvent};

/// Channel capacity for commands from handles to the actor.
const COMMAND_CHANNEL_CAPACITY: usize = 256;

enum BridgeCommand {
    Start(Vec<Document>),
    Edit {
        uri: String,
        version: Option<i64>,
        text: String,
    },
    Flush,
    Request {
        request: WireRequest,
        responder: Responder,
    },
    RequestCompilerRestart,
    Restart(Box<BridgeConfig>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running bridge.
///
/// Requests made before the first analysis completes resolve immediately
/// with an empty result. Requests of one kind are answered in the order
/// they were made.
#[derive(Clone)]
pub struct Bridge {
    commands: mpsc::Sender<BridgeCommand>,
}

impl Bridge {
    /// Spawn the actor on the current runtime. The compiler is not started
    /// until [`Bridge::start`].
    pub fn spawn(config: BridgeConfig) -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (process_tx, process_rx) = mpsc::unbounded_channel();

        let actor = BridgeActor {
            pipeline: Pipeline::new(&config, events_tx),
            processes: ProcessManager::new(process_tx),
            config,
            process_rx,
            commands: commands_rx,
        };
        tokio::spawn(actor.run());

        (
            Self {
                commands: commands_tx,
            },
            events_rx,
        )
    }

    async fn send(&self, command: BridgeCommand) -> Result<(), BridgeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BridgeError::Closed)
    }

    async fn request<T>(
        &self,
        request: WireRequest,
        responder: fn(Reply<T>) -> Responder,
    ) -> Result<T, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send(BridgeCommand::Request {
            request,
            responder: responder(tx),
        })
        .await?;
        rx.await.map_err(|_| BridgeError::Closed)?
    }

    /// Start (or restart) the compiler and load the whole project.
    pub async fn start(&self, documents: Vec<Document>) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Start(documents)).await
    }

    /// Queue an edit from a source without versions.
    pub async fn queue_edit(
        &self,
        uri: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Edit {
            uri: uri.into(),
            version: None,
            text: text.into(),
        })
        .await
    }

    pub async fn queue_versioned_edit(
        &self,
        uri: impl Into<String>,
        version: i64,
        text: impl Into<String>,
    ) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Edit {
            uri: uri.into(),
            version: Some(version),
            text: text.into(),
        })
        .await
    }

    /// Send pending edits without waiting for the debounce.
    pub async fn flush(&self) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Flush).await
    }

    pub async fn hover(
        &self,
        uri: impl Into<String>,
        position: Position,
    ) -> Result<Option<Hover>, BridgeError> {
        let at = TextPosition::new(uri, position);
        self.request(WireRequest::Hover(at), Responder::Hover).await
    }

    pub async fn definition(
        &self,
        uri: impl Into<String>,
        position: Position,
    ) -> Result<Option<Location>, BridgeError> {
        let at = TextPosition::new(uri, position);
        self.request(WireRequest::Definition(at), Responder::Definition)
            .await
    }

    pub async fn declaration(
        &self,
        uri: impl Into<String>,
        position: Position,
    ) -> Result<Option<Location>, BridgeError> {
        let at = TextPosition::new(uri, position);
        self.request(WireRequest::Declaration(at), Responder::Declaration)
            .await
    }

    /// Pending edits are flushed first so completion sees the latest text.
    pub async fn completion(
        &self,
        uri: impl Into<String>,
        position: Position,
    ) -> Result<Vec<CompletionItem>, BridgeError> {
        let at = TextPosition::new(uri, position);
        self.request(WireRequest::Completion(at), Responder::Completion)
            .await
    }

    /// Pending edits are flushed first, as for completion.
    pub async fn signature_help(
        &self,
        uri: impl Into<String>,
        position: Position,
    ) -> Result<Option<SignatureHelp>, BridgeError> {
        let at = TextPosition::new(uri, position);
        self.request(WireRequest::Signature(at), Responder::SignatureHelp)
            .await
    }

    pub async fn document_symbols(
        &self,
        uri: impl Into<String>,
    ) -> Result<Vec<SymbolInformation>, BridgeError> {
        self.request(WireRequest::Symbols(Some(uri.into())), Responder::Symbols)
            .await
    }

    pub async fn workspace_symbols(&self) -> Result<Vec<SymbolInformation>, BridgeError> {
        self.request(WireRequest::Symbols(None), Responder::Symbols)
            .await
    }

    pub async fn references(
        &self,
        uri: impl Into<String>,
        position: Position,
    ) -> Result<Vec<Location>, BridgeError> {
        let at = TextPosition::new(uri, position);
        self.request(WireRequest::References(at), Responder::References)
            .await
    }

    pub async fn implementation(
        &self,
        uri: impl Into<String>,
        position: Position,
    ) -> Result<Vec<Location>, BridgeError> {
        let at = TextPosition::new(uri, position);
        self.request(WireRequest::Implementation(at), Responder::Implementation)
            .await
    }

    pub async fn rename(
        &self,
        uri: impl Into<String>,
        position: Position,
        new_name: impl Into<String>,
    ) -> Result<Option<WorkspaceEdit>, BridgeError> {
        let request = WireRequest::Rename {
            at: TextPosition::new(uri, position),
            new_name: new_name.into(),
        };
        self.request(request, Responder::Rename).await
    }

    /// Ask the running compiler to restart its analysis from scratch.
    pub async fn request_compiler_restart(&self) -> Result<(), BridgeError> {
        self.send(BridgeCommand::RequestCompilerRestart).await
    }

    /// Replace the configuration and restart the compiler with it. Clears a
    /// block or an abort.
    pub async fn restart(&self, config: BridgeConfig) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Restart(Box::new(config))).await
    }

    /// Stop the compiler and the actor. Outstanding requests resolve empty.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(BridgeCommand::Shutdown(done_tx)).await?;
        done_rx.await.map_err(|_| BridgeError::Closed)
    }
}

struct BridgeActor {
    config: BridgeConfig,
    pipeline: Pipeline,
    processes: ProcessManager,
    process_rx: mpsc::UnboundedReceiver<ProcessEvent>,
    commands: mpsc::Receiver<BridgeCommand>,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl BridgeActor {
    async fn run(mut self) {
        loop {
            let edit_deadline = self.pipeline.edit_deadline();
            let watchdog_deadline = self.pipeline.watchdog_deadline();

            tokio::select! {
                Some(event) = self.process_rx.recv() => self.on_process_event(event).await,
                command = self.commands.recv() => match command {
                    Some(BridgeCommand::Shutdown(done)) => {
                        self.commands.close();
                        self.stop_compiler().await;
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.on_command(command).await,
                    None => {
                        tracing::debug!("All bridge handles dropped");
                        self.stop_compiler().await;
                        break;
                    }
                },
                () = sleep_until(edit_deadline) => self.pipeline.flush_edits(Instant::now()),
                () = sleep_until(watchdog_deadline) => self.on_watchdog_expired().await,
            }
        }
        tracing::debug!("Bridge actor stopped");
    }

    async fn on_command(&mut self, command: BridgeCommand) {
        let now = Instant::now();
        match command {
            BridgeCommand::Start(documents) => {
                self.stop_compiler().await;
                self.pipeline.load(documents, now);
                self.spawn_compiler().await;
            }
            BridgeCommand::Edit { uri, version, text } => {
                if let Err(e) = self.pipeline.queue_edit(&uri, version, text, now) {
                    tracing::error!(%uri, "Dropping edit: {e}");
                }
            }
            BridgeCommand::Flush => self.pipeline.flush_edits(now),
            BridgeCommand::Request { request, responder } => {
                self.pipeline.submit(request, responder, now);
            }
            BridgeCommand::RequestCompilerRestart => self.pipeline.request_compiler_restart(),
            BridgeCommand::Restart(config) => {
                self.config = *config;
                self.pipeline.apply_timing(&self.config);
                self.stop_compiler().await;
                self.spawn_compiler().await;
            }
            // Handled by the run loop.
            BridgeCommand::Shutdown(_) => {}
        }
    }

    async fn on_process_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Stdout { generation, chunk } => {
                if self.processes.is_current(generation) {
                    self.pipeline.handle_chunk(&chunk, Instant::now());
                } else {
                    tracing::debug!(generation, bytes = chunk.len(), "Ignoring stale compiler output");
                }
            }
            ProcessEvent::Exited { generation, status } => {
                match self.processes.classify_exit(generation) {
                    ExitDisposition::Expected => {
                        tracing::debug!(generation, %status, "Compiler exited as expected");
                    }
                    ExitDisposition::Unexpected => {
                        self.pipeline.recover(status);
                        self.spawn_compiler().await;
                    }
                }
            }
        }
    }

    /// Stopping the stalled process makes its exit expected; nothing
    /// respawns it before an explicit restart.
    async fn on_watchdog_expired(&mut self) {
        self.pipeline.watchdog_expired();
        self.processes.stop().await;
    }

    async fn stop_compiler(&mut self) {
        if self.processes.is_running() {
            self.processes.stop().await;
            self.pipeline.stopped();
        }
    }

    async fn spawn_compiler(&mut self) {
        if self.config.compiler.block {
            self.pipeline.block();
            return;
        }

        self.pipeline.starting();
        match self
            .processes
            .start(&self.config.compiler, &self.config.workspace_root)
            .await
        {
            Ok(writer) => self.pipeline.attach(writer, Instant::now()),
            Err(e) => self.pipeline.spawn_failed(e.to_string()),
        }
    }
}

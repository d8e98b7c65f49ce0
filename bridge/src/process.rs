//! Compiler process: spawn, stdio wiring, kill and exit classification.

use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::SpawnError;
use crate::types::CompilerConfig;

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// How long to wait for stdout to drain after the process exits.
const STDOUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) enum WriterCommand {
    Send(String),
    Shutdown,
}

/// Something happened to a compiler process. Every event carries the
/// generation of the process it came from.
#[derive(Debug)]
pub(crate) enum ProcessEvent {
    Stdout { generation: u64, chunk: Vec<u8> },
    Exited { generation: u64, status: String },
}

/// Whether an exit was caused by us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitDisposition {
    Expected,
    Unexpected,
}

/// Quote an argument for a response file. Arguments go one per line;
/// whitespace or quotes force double quoting with `\"` escapes.
fn quote_argument(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '"') {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('"', "\\\""))
}

pub(crate) fn response_file_contents(args: &[String]) -> String {
    let mut out = String::new();
    for arg in args {
        out.push_str(&quote_argument(arg));
        out.push('\n');
    }
    out
}

fn write_response_file(args: &[String]) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("ghul-")
        .suffix(".rsp")
        .tempfile()?;
    file.write_all(response_file_contents(args).as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn describe_exit(status: std::io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => status.to_string(),
        Err(e) => format!("unknown ({e})"),
    }
}

/// One live compiler process and the tasks servicing its pipes.
pub(crate) struct RunningCompiler {
    generation: u64,
    writer_tx: mpsc::UnboundedSender<WriterCommand>,
    kill_tx: Option<oneshot::Sender<()>>,
    exit_handle: JoinHandle<()>,
    /// Deleted when the process is replaced.
    _response_file: NamedTempFile,
}

impl RunningCompiler {
    pub fn spawn(
        generation: u64,
        config: &CompilerConfig,
        workspace_root: &Path,
        events: mpsc::UnboundedSender<ProcessEvent>,
    ) -> Result<Self, SpawnError> {
        let resolved_cmd =
            which::which(&config.command).map_err(|source| SpawnError::NotFound {
                command: config.command.clone(),
                source,
            })?;
        let response_file =
            write_response_file(&config.analyse_args).map_err(SpawnError::ResponseFile)?;

        let mut cmd = Command::new(&resolved_cmd);
        cmd.args(&config.args)
            .arg(format!("@{}", response_file.path().display()))
            .current_dir(workspace_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SpawnError::Launch {
            command: config.command.clone(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;
        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stderr = child.stderr.take().ok_or(SpawnError::MissingPipe("stderr"))?;

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<WriterCommand>();
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(message) => {
                        let written = async {
                            stdin.write_all(message.as_bytes()).await?;
                            stdin.flush().await
                        };
                        // The exit handler owns recovery; a dead pipe is only logged.
                        if let Err(e) = written.await {
                            tracing::warn!(generation, "Compiler write error: {e}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_events = events.clone();
        let reader_handle = tokio::spawn(async move {
            let mut stdout = stdout;
            let mut buf = vec![0u8; READ_BUFFER_BYTES];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => {
                        tracing::debug!(generation, "Compiler closed stdout");
                        break;
                    }
                    Ok(n) => {
                        let chunk = buf[..n].to_vec();
                        if reader_events
                            .send(ProcessEvent::Stdout { generation, chunk })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(generation, "Compiler read error: {e}");
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            let mut stderr = stderr;
            if let Err(e) = tokio::io::copy(&mut stderr, &mut tokio::io::stderr()).await {
                tracing::debug!(generation, "Compiler stderr pass-through ended: {e}");
            }
        });

        let (kill_tx, kill_rx) = oneshot::channel();
        let exit_handle = tokio::spawn(Self::supervise(
            child,
            generation,
            kill_rx,
            reader_handle,
            events,
        ));

        Ok(Self {
            generation,
            writer_tx,
            kill_tx: Some(kill_tx),
            exit_handle,
            _response_file: response_file,
        })
    }

    /// Wait for the child to exit (or kill it on request), let stdout drain,
    /// then report the exit. Stdout chunks therefore always precede the exit
    /// event of their generation.
    async fn supervise(
        mut child: Child,
        generation: u64,
        kill_rx: oneshot::Receiver<()>,
        reader_handle: JoinHandle<()>,
        events: mpsc::UnboundedSender<ProcessEvent>,
    ) {
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = kill_rx => None,
        };
        let status = match exited {
            Some(status) => status,
            None => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(generation, "Compiler kill failed: {e}");
                }
                child.wait().await
            }
        };

        if tokio::time::timeout(STDOUT_DRAIN_TIMEOUT, reader_handle)
            .await
            .is_err()
        {
            tracing::debug!(generation, "Compiler stdout still open after exit");
        }

        let _ = events.send(ProcessEvent::Exited {
            generation,
            status: describe_exit(status),
        });
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn writer(&self) -> mpsc::UnboundedSender<WriterCommand> {
        self.writer_tx.clone()
    }

    /// Kill the process and wait until it has exited.
    pub async fn kill(mut self) {
        let _ = self.writer_tx.send(WriterCommand::Shutdown);
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
        if let Err(e) = (&mut self.exit_handle).await {
            tracing::warn!(generation = self.generation, "Compiler supervisor failed: {e}");
        }
    }
}

/// Owns the single live compiler process.
///
/// Replacement is strictly sequential: the old process is killed and
/// reaped before the new one is spawned.
pub(crate) struct ProcessManager {
    current: Option<RunningCompiler>,
    generation: u64,
    expecting_exit: bool,
    events_tx: mpsc::UnboundedSender<ProcessEvent>,
}

impl ProcessManager {
    pub fn new(events_tx: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        Self {
            current: None,
            generation: 0,
            expecting_exit: false,
            events_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Whether `generation` is the live process.
    pub fn is_current(&self, generation: u64) -> bool {
        self.current
            .as_ref()
            .is_some_and(|running| running.generation() == generation)
    }

    /// Kill the live process, if any, flagging its exit as expected.
    pub async fn stop(&mut self) {
        if let Some(running) = self.current.take() {
            self.expecting_exit = true;
            tracing::info!(generation = running.generation(), "Stopping compiler");
            running.kill().await;
        }
    }

    /// Replace the live process with a fresh one and return its writer.
    pub async fn start(
        &mut self,
        config: &CompilerConfig,
        workspace_root: &Path,
    ) -> Result<mpsc::UnboundedSender<WriterCommand>, SpawnError> {
        self.stop().await;
        self.generation += 1;
        let running = RunningCompiler::spawn(
            self.generation,
            config,
            workspace_root,
            self.events_tx.clone(),
        )?;
        tracing::info!(generation = self.generation, command = %config.command, "Compiler spawned");
        let writer = running.writer();
        self.current = Some(running);
        Ok(writer)
    }

    /// Decide what an exit event means.
    ///
    /// Exits of a process we already replaced or stopped are expected; an
    /// exit of the live process nobody asked for is a crash.
    pub fn classify_exit(&mut self, generation: u64) -> ExitDisposition {
        if self.is_current(generation) {
            self.current = None;
            if std::mem::take(&mut self.expecting_exit) {
                return ExitDisposition::Expected;
            }
            return ExitDisposition::Unexpected;
        }
        self.expecting_exit = false;
        ExitDisposition::Expected
    }
}

//! The request/edit pipeline owned by the bridge actor.
//!
//! Everything here is synchronous: the actor feeds in commands, compiler
//! output and timer expiries together with the current instant, and the
//! pipeline mutates its state, writes to the compiler and emits events.

use ghul_types::{Document, ProblemKind};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::correlation::{CorrelationQueues, RequestKind, Responder};
use crate::decode;
use crate::edit_queue::{EditQueue, QueueState};
use crate::error::{BridgeError, ProtocolError};
use crate::frame::{Command, Frame, FrameBuffer};
use crate::problems::ProblemStore;
use crate::process::WriterCommand;
use crate::protocol::{self, WireRequest};
use crate::types::{BridgeConfig, BridgeEvent, LifecycleEvent};
use crate::watchdog::Watchdog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// No compiler process.
    Stopped,
    /// Spawning disabled by configuration.
    Blocked,
    /// Process spawned, not yet listening.
    Starting,
    /// Accepting edits; no analysis finished yet.
    Listening,
    /// At least one analysis finished; requests are answered.
    Analysed,
    /// Stalled or failed to start. Requests fail until restart.
    Aborted,
}

pub(crate) struct Pipeline {
    phase: Phase,
    edits: EditQueue,
    queues: CorrelationQueues,
    problems: ProblemStore,
    watchdog: Watchdog,
    frames: FrameBuffer,
    writer: Option<mpsc::UnboundedSender<WriterCommand>>,
    events: mpsc::UnboundedSender<BridgeEvent>,
    /// Documents to resend once the next process listens.
    reload: Vec<Document>,
    /// Edit batches sent whose ANALYSED has not arrived yet.
    analyses_pending: usize,
}

impl Pipeline {
    pub fn new(config: &BridgeConfig, events: mpsc::UnboundedSender<BridgeEvent>) -> Self {
        Self {
            phase: Phase::Stopped,
            edits: EditQueue::new(config.edit_debounce),
            queues: CorrelationQueues::new(),
            problems: ProblemStore::new(),
            watchdog: Watchdog::new(config.watchdog_timeout),
            frames: FrameBuffer::new(),
            writer: None,
            events,
            reload: Vec::new(),
            analyses_pending: 0,
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn queue_state(&self) -> QueueState {
        self.edits.state()
    }

    pub fn edit_deadline(&self) -> Option<Instant> {
        self.edits.deadline()
    }

    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    pub fn apply_timing(&mut self, config: &BridgeConfig) {
        self.edits.set_idle_timeout(config.edit_debounce);
        self.watchdog.set_timeout(config.watchdog_timeout);
    }

    fn emit(&self, event: LifecycleEvent) {
        let _ = self.events.send(BridgeEvent::Lifecycle(event));
    }

    fn publish(&self, uri: String, items: Vec<ghul_types::Diagnostic>) {
        let _ = self.events.send(BridgeEvent::Diagnostics { uri, items });
    }

    fn write(&self, message: String) {
        let Some(writer) = &self.writer else {
            return;
        };
        if writer.send(WriterCommand::Send(message)).is_err() {
            tracing::debug!("Compiler writer closed; dropping message");
        }
    }

    fn can_send(&self) -> bool {
        self.writer.is_some() && matches!(self.phase, Phase::Listening | Phase::Analysed)
    }

    // ── lifecycle ───────────────────────────────────────────────────────

    pub fn starting(&mut self) {
        self.phase = Phase::Starting;
        self.emit(LifecycleEvent::Starting);
    }

    /// A fresh process is running; route writes to it.
    pub fn attach(&mut self, writer: mpsc::UnboundedSender<WriterCommand>, now: Instant) {
        self.frames.clear();
        self.writer = Some(writer);
        self.phase = Phase::Starting;
        self.analyses_pending = 0;
        self.watchdog.arm(now);
        self.emit(LifecycleEvent::Running);
    }

    fn detach(&mut self) {
        self.writer = None;
        self.frames.clear();
        self.watchdog.disarm();
        self.analyses_pending = 0;
    }

    pub fn block(&mut self) {
        tracing::info!("Compiler spawning is blocked by configuration");
        self.queues.resolve_all_empty();
        self.detach();
        self.edits.hold();
        self.phase = Phase::Blocked;
        self.emit(LifecycleEvent::Blocked);
    }

    pub fn spawn_failed(&mut self, reason: String) {
        tracing::error!(%reason, "Compiler failed to start");
        self.queues.reject_all(&BridgeError::Aborted);
        self.detach();
        self.edits.hold();
        self.phase = Phase::Aborted;
        self.emit(LifecycleEvent::Aborted { reason });
    }

    /// Forget all state, keeping the latest text of every document for the
    /// next process. Cleared documents are published empty.
    fn reset_for_reload(&mut self) {
        self.keep_for_reload();
        for uri in self.problems.clear() {
            self.publish(uri, Vec::new());
        }
    }

    /// Move every document the edit queue knows into the reload list and
    /// empty the queue.
    fn keep_for_reload(&mut self) {
        let earlier = std::mem::replace(&mut self.reload, self.edits.snapshot());
        self.merge_reload(earlier);
        self.edits.reset();
    }

    /// Add documents to the reload list; texts already there win.
    fn merge_reload(&mut self, documents: Vec<Document>) {
        for document in documents {
            if !self.reload.iter().any(|known| known.uri == document.uri) {
                self.reload.push(document);
            }
        }
    }

    /// The bridge stopped the compiler itself (restart or shutdown).
    pub fn stopped(&mut self) {
        let resolved = self.queues.resolve_all_empty();
        tracing::debug!(resolved, "Compiler stopped");
        self.reset_for_reload();
        self.detach();
        self.phase = Phase::Stopped;
        self.emit(LifecycleEvent::Killed);
    }

    /// The compiler exited on its own. Outstanding requests get empty
    /// results; the caller respawns and the documents are reloaded once the
    /// new process listens.
    pub fn recover(&mut self, status: String) {
        let resolved = self.queues.resolve_all_empty();
        tracing::warn!(%status, resolved, "Compiler exited unexpectedly");
        self.reset_for_reload();
        self.detach();
        self.phase = Phase::Stopped;
        self.emit(LifecycleEvent::Crashed { status });
    }

    // ── edits ───────────────────────────────────────────────────────────

    /// Whole-project load. Sent as one batch as soon as the compiler listens;
    /// documents the editor already supplied keep the editor's text.
    pub fn load(&mut self, documents: Vec<Document>, now: Instant) {
        tracing::info!(documents = documents.len(), "Loading project");
        if self.can_send() {
            self.edits.seed(documents);
            self.send_batch(now);
        } else {
            self.merge_reload(documents);
        }
    }

    pub fn queue_edit(
        &mut self,
        uri: &str,
        version: Option<i64>,
        text: String,
        now: Instant,
    ) -> Result<(), BridgeError> {
        if self.edits.queue_edit(uri, version, text, now)? && !self.can_send() {
            self.edits.hold();
        }
        Ok(())
    }

    /// Send pending edits now, or keep holding them if the compiler cannot
    /// take them yet.
    pub fn flush_edits(&mut self, now: Instant) {
        if self.can_send() {
            self.send_batch(now);
        } else {
            self.edits.hold();
        }
    }

    fn send_batch(&mut self, now: Instant) {
        let Some(batch) = self.edits.take_batch() else {
            return;
        };
        for document in &batch {
            self.problems.clear_parse_problems(&document.uri);
        }
        self.problems.clear_all_analysis_problems();
        tracing::debug!(documents = batch.len(), "Sending edit batch");
        self.write(protocol::encode_edit(&batch));
        self.edits.finish_send();
        self.analyses_pending += 1;
        self.watchdog.arm_if_idle(now);
    }

    // ── requests ────────────────────────────────────────────────────────

    pub fn submit(&mut self, request: WireRequest, responder: Responder, now: Instant) {
        match self.phase {
            Phase::Aborted => {
                responder.fail(BridgeError::Aborted);
                return;
            }
            Phase::Analysed if self.writer.is_some() => {}
            _ => {
                responder.respond_empty();
                return;
            }
        }

        if matches!(
            responder.kind(),
            RequestKind::Completion | RequestKind::SignatureHelp
        ) {
            self.flush_edits(now);
        }

        self.write(request.encode());
        self.queues.expect(responder);
        self.watchdog.arm_if_idle(now);
    }

    pub fn request_compiler_restart(&mut self) {
        if self.can_send() {
            tracing::info!("Requesting compiler restart");
            self.write(WireRequest::Restart.encode());
        } else {
            tracing::debug!(phase = ?self.phase, "Ignoring compiler restart request");
        }
    }

    // ── compiler output ─────────────────────────────────────────────────

    pub fn handle_chunk(&mut self, chunk: &[u8], now: Instant) {
        for result in self.frames.push(chunk) {
            match result {
                Ok(frame) => self.handle_frame(frame, now),
                Err(error) => self.protocol_error(error, now),
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame, now: Instant) {
        if self.phase == Phase::Aborted {
            tracing::debug!(command = frame.command.name(), "Ignoring frame while aborted");
            return;
        }
        tracing::debug!(
            command = frame.command.name(),
            lines = frame.lines.len(),
            "Compiler frame"
        );

        let lines = frame.lines;
        match frame.command {
            Command::Listen => self.on_listen(now),
            Command::DiagParse => self.add_problems(ProblemKind::Parse, &lines),
            Command::DiagAnalysis => self.add_problems(ProblemKind::Analysis, &lines),
            Command::Analysed => self.on_analysed(now),
            Command::Hover => self.respond(RequestKind::Hover, &lines, now),
            Command::Definition => self.respond(RequestKind::Definition, &lines, now),
            Command::Declaration => self.respond(RequestKind::Declaration, &lines, now),
            Command::Completion => self.respond(RequestKind::Completion, &lines, now),
            Command::Signature => self.respond(RequestKind::SignatureHelp, &lines, now),
            Command::Symbols => self.respond(RequestKind::Symbols, &lines, now),
            Command::References => self.respond(RequestKind::References, &lines, now),
            Command::Implementation => self.respond(RequestKind::Implementation, &lines, now),
            Command::Rename => self.respond(RequestKind::Rename, &lines, now),
            Command::Except => self.on_exception(&lines, now),
            Command::Restart => self.on_restart(now),
        }
    }

    /// Rearm while something is still expected from the compiler.
    fn progress(&mut self, now: Instant) {
        if self.analyses_pending > 0 || self.queues.outstanding() > 0 {
            self.watchdog.arm(now);
        } else {
            self.watchdog.disarm();
        }
    }

    fn on_listen(&mut self, now: Instant) {
        tracing::info!(reload = self.reload.len(), "Compiler listening");
        self.phase = Phase::Listening;
        self.emit(LifecycleEvent::Listening);
        let reload = std::mem::take(&mut self.reload);
        self.edits.seed(reload);
        self.send_batch(now);
        self.progress(now);
    }

    fn on_analysed(&mut self, now: Instant) {
        self.phase = Phase::Analysed;
        self.analyses_pending = self.analyses_pending.saturating_sub(1);
        tracing::info!(
            errors = self.problems.error_count(),
            pending = self.analyses_pending,
            "Analysis complete"
        );
        for (uri, items) in self.problems.iter() {
            self.publish(uri.to_string(), items);
        }
        self.emit(LifecycleEvent::Analysed);
        self.progress(now);
    }

    fn add_problems(&mut self, kind: ProblemKind, lines: &[String]) {
        for line in lines {
            match decode::diagnostic(line) {
                Ok(Some((uri, diagnostic))) => self.problems.add(kind, &uri, diagnostic),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(?kind, %error, "Skipping malformed diagnostic");
                }
            }
        }
    }

    fn respond(&mut self, kind: RequestKind, lines: &[String], now: Instant) {
        if self.queues.handle(kind, lines) {
            self.progress(now);
        }
    }

    fn on_exception(&mut self, lines: &[String], now: Instant) {
        let message = lines.join("\n");
        tracing::error!(%message, "Compiler exception");
        self.emit(LifecycleEvent::Exception {
            message: message.clone(),
        });
        self.queues
            .reject_all(&BridgeError::CompilerException(message));
        self.progress(now);
    }

    fn on_restart(&mut self, now: Instant) {
        tracing::info!("Compiler restarted its analysis; reloading documents");
        self.reset_for_reload();
        self.analyses_pending = 0;
        self.phase = Phase::Listening;
        self.emit(LifecycleEvent::Listening);
        let reload = std::mem::take(&mut self.reload);
        self.edits.seed(reload);
        self.send_batch(now);
        self.progress(now);
    }

    fn protocol_error(&mut self, error: ProtocolError, now: Instant) {
        let rejected = self.queues.reject_all(&BridgeError::Protocol(error.clone()));
        tracing::error!(%error, rejected, "Compiler protocol error");
        self.emit(LifecycleEvent::ProtocolError {
            message: error.to_string(),
        });
        self.progress(now);
    }

    /// Terminal until the next explicit restart. The caller stops the
    /// stalled process; every document is kept for the process that
    /// replaces it.
    pub fn watchdog_expired(&mut self) {
        let timeout = self.watchdog.timeout();
        let rejected = self.queues.reject_all(&BridgeError::WatchdogTimeout(timeout));
        tracing::error!(?timeout, rejected, "Compiler made no progress; aborting");
        self.keep_for_reload();
        self.detach();
        self.phase = Phase::Aborted;
        self.emit(LifecycleEvent::Aborted {
            reason: format!("no response from compiler for {timeout:?}"),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ghul_types::Position;
    use tokio::sync::oneshot;

    use super::*;
    use crate::protocol::TextPosition;
    use crate::types::CompilerConfig;

    struct Harness {
        pipeline: Pipeline,
        events: mpsc::UnboundedReceiver<BridgeEvent>,
        writes: mpsc::UnboundedReceiver<WriterCommand>,
        now: Instant,
    }

    impl Harness {
        fn new() -> Self {
            let config = BridgeConfig::new(CompilerConfig::default(), ".")
                .with_watchdog_timeout(Duration::from_secs(10));
            let (events_tx, events) = mpsc::unbounded_channel();
            let (writer_tx, writes) = mpsc::unbounded_channel();
            let mut pipeline = Pipeline::new(&config, events_tx);
            let now = Instant::now();
            pipeline.starting();
            pipeline.attach(writer_tx, now);
            Self {
                pipeline,
                events,
                writes,
                now,
            }
        }

        fn feed(&mut self, raw: &str) {
            self.pipeline.handle_chunk(raw.as_bytes(), self.now);
        }

        fn writes(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(command) = self.writes.try_recv() {
                if let WriterCommand::Send(message) = command {
                    out.push(message);
                }
            }
            out
        }

        fn events(&mut self) -> Vec<BridgeEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        fn analysed(mut self) -> Self {
            self.pipeline
                .load(vec![Document::new("file:///a.ghul", "let a = 1;")], self.now);
            self.feed("LISTEN\n\x0cANALYSED\n\x0c");
            self.writes();
            self.events();
            self
        }

        fn hover(&mut self) -> oneshot::Receiver<Result<Option<ghul_types::Hover>, BridgeError>> {
            let (tx, rx) = oneshot::channel();
            let at = TextPosition::new("file:///a.ghul", Position::new(0, 4));
            self.pipeline
                .submit(WireRequest::Hover(at), Responder::Hover(tx), self.now);
            rx
        }

        fn completion(
            &mut self,
        ) -> oneshot::Receiver<Result<Vec<ghul_types::CompletionItem>, BridgeError>> {
            let (tx, rx) = oneshot::channel();
            let at = TextPosition::new("file:///a.ghul", Position::new(0, 4));
            self.pipeline
                .submit(WireRequest::Completion(at), Responder::Completion(tx), self.now);
            rx
        }
    }

    fn lifecycle(events: &[BridgeEvent]) -> Vec<LifecycleEvent> {
        events
            .iter()
            .filter_map(|event| match event {
                BridgeEvent::Lifecycle(lifecycle) => Some(lifecycle.clone()),
                BridgeEvent::Diagnostics { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_requests_before_analysis_resolve_empty() {
        let mut h = Harness::new();
        let mut rx = h.hover();
        assert_eq!(rx.try_recv().unwrap(), Ok(None));
        assert!(h.writes().is_empty());
    }

    #[test]
    fn test_load_is_sent_once_listening() {
        let mut h = Harness::new();
        h.pipeline
            .load(vec![Document::new("file:///a.ghul", "x")], h.now);
        assert!(h.writes().is_empty(), "nothing goes out before LISTEN");

        h.feed("LISTEN\n\x0c");
        assert_eq!(h.writes(), vec!["#EDIT#\nfile:///a.ghul\n\nx\x0c".to_string()]);
        assert_eq!(h.pipeline.phase(), Phase::Listening);
        assert_eq!(h.pipeline.queue_state(), QueueState::Idle);
    }

    #[test]
    fn test_analysed_publishes_diagnostics() {
        let mut h = Harness::new();
        h.pipeline
            .load(vec![Document::new("file:///a.ghul", "x")], h.now);
        h.feed("LISTEN\n\x0c");
        h.events();

        h.feed("DIAG PARSE\nerror\tfile:///a.ghul\t1\t1\t1\t2\tunexpected token\n\x0c");
        h.feed("ANALYSED\n\x0c");

        let events = h.events();
        let BridgeEvent::Diagnostics { uri, items } = &events[0] else {
            panic!("expected diagnostics first, got {events:?}");
        };
        assert_eq!(uri, "file:///a.ghul");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].message(), "unexpected token");
        assert_eq!(lifecycle(&events), vec![LifecycleEvent::Analysed]);
        assert_eq!(h.pipeline.phase(), Phase::Analysed);
    }

    #[test]
    fn test_new_batch_clears_old_problems() {
        let mut h = Harness::new().analysed();
        h.feed("DIAG ANALYSIS\nwarn\tfile:///b.ghul\t1\t1\t1\t2\tunused\n\x0c");
        h.feed("ANALYSED\n\x0c");
        h.events();

        h.pipeline
            .queue_versioned("file:///a.ghul", 2, "let a = 2;", h.now);
        h.pipeline.flush_edits(h.now);
        h.feed("ANALYSED\n\x0c");

        let cleared: Vec<_> = h
            .events()
            .into_iter()
            .filter_map(|event| match event {
                BridgeEvent::Diagnostics { uri, items } => Some((uri, items.len())),
                BridgeEvent::Lifecycle(_) => None,
            })
            .collect();
        assert_eq!(cleared, vec![("file:///b.ghul".to_string(), 0)]);
    }

    #[test]
    fn test_hover_round_trip() {
        let mut h = Harness::new().analysed();
        let mut rx = h.hover();
        assert_eq!(h.writes(), vec!["#HOVER#\nfile:///a.ghul\n1\n5\n".to_string()]);
        assert!(rx.try_recv().is_err());

        h.feed("HOVER\nint a\n\x0c");
        assert_eq!(rx.try_recv().unwrap().unwrap().unwrap().contents, "int a");
    }

    #[test]
    fn test_completion_flushes_pending_edits_first() {
        let mut h = Harness::new().analysed();
        h.pipeline
            .queue_versioned("file:///a.ghul", 2, "let a = 2;", h.now);
        assert!(h.writes().is_empty(), "edit waits for the debounce");

        let _rx = h.completion();
        let writes = h.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].starts_with("#EDIT#\n"));
        assert_eq!(writes[1], "#COMPLETE#\nfile:///a.ghul\n1\n4\n");
    }

    #[test]
    fn test_unexpected_exit_resolves_empty_and_resets() {
        let mut h = Harness::new().analysed();
        let mut hover = h.hover();
        let mut completion = h.completion();
        h.pipeline
            .queue_versioned("file:///a.ghul", 3, "let a = 3;", h.now);

        h.pipeline.recover("exit status: 1".to_string());
        assert_eq!(hover.try_recv().unwrap(), Ok(None));
        assert_eq!(completion.try_recv().unwrap(), Ok(Vec::new()));
        assert_eq!(h.pipeline.queue_state(), QueueState::Idle);
        assert_eq!(h.pipeline.edit_deadline(), None);
        assert_eq!(h.pipeline.watchdog_deadline(), None);
        assert!(lifecycle(&h.events()).contains(&LifecycleEvent::Crashed {
            status: "exit status: 1".to_string()
        }));

        let (writer_tx, writes) = mpsc::unbounded_channel();
        h.writes = writes;
        h.pipeline.attach(writer_tx, h.now);
        h.feed("LISTEN\n\x0c");
        assert_eq!(
            h.writes(),
            vec!["#EDIT#\nfile:///a.ghul\n\nlet a = 3;\x0c".to_string()]
        );
    }

    #[test]
    fn test_empty_frame_rejects_everything() {
        let mut h = Harness::new().analysed();
        let mut hover = h.hover();
        let mut completion = h.completion();

        h.feed("\x0c");
        assert_eq!(
            hover.try_recv().unwrap(),
            Err(BridgeError::Protocol(ProtocolError::EmptyFrame))
        );
        assert!(matches!(
            completion.try_recv().unwrap(),
            Err(BridgeError::Protocol(ProtocolError::EmptyFrame))
        ));
        assert!(matches!(
            lifecycle(&h.events()).as_slice(),
            [LifecycleEvent::ProtocolError { .. }]
        ));
        assert_eq!(h.pipeline.phase(), Phase::Analysed);
    }

    #[test]
    fn test_exception_rejects_outstanding_requests() {
        let mut h = Harness::new().analysed();
        let mut hover = h.hover();

        h.feed("EXCEPT\nNullReferenceException\n\x0c");
        assert_eq!(
            hover.try_recv().unwrap(),
            Err(BridgeError::CompilerException(
                "NullReferenceException".to_string()
            ))
        );
        assert_eq!(
            lifecycle(&h.events()),
            vec![LifecycleEvent::Exception {
                message: "NullReferenceException".to_string()
            }]
        );
    }

    #[test]
    fn test_watchdog_expiry_aborts_pipeline() {
        let mut h = Harness::new().analysed();
        let mut hover = h.hover();
        assert!(h.pipeline.watchdog_deadline().is_some());

        h.pipeline.watchdog_expired();
        assert_eq!(
            hover.try_recv().unwrap(),
            Err(BridgeError::WatchdogTimeout(Duration::from_secs(10)))
        );
        assert_eq!(h.pipeline.phase(), Phase::Aborted);

        let mut later = h.hover();
        assert_eq!(later.try_recv().unwrap(), Err(BridgeError::Aborted));
        assert!(matches!(
            lifecycle(&h.events()).as_slice(),
            [LifecycleEvent::Aborted { .. }]
        ));
    }

    #[test]
    fn test_progress_disarms_when_nothing_outstanding() {
        let mut h = Harness::new().analysed();
        assert_eq!(h.pipeline.watchdog_deadline(), None);

        let _rx = h.hover();
        assert!(h.pipeline.watchdog_deadline().is_some());
        h.feed("HOVER\n\n\x0c");
        assert_eq!(h.pipeline.watchdog_deadline(), None);
    }

    #[test]
    fn test_incoming_restart_reloads_documents() {
        let mut h = Harness::new().analysed();
        h.feed("DIAG PARSE\nerror\tfile:///a.ghul\t1\t1\t1\t2\tbad\n\x0c");

        h.feed("RESTART\n\x0c");
        let writes = h.writes();
        assert_eq!(writes, vec!["#EDIT#\nfile:///a.ghul\n\nlet a = 1;\x0c".to_string()]);
        assert_eq!(h.pipeline.phase(), Phase::Listening);

        let mut rx = h.hover();
        assert_eq!(rx.try_recv().unwrap(), Ok(None), "not analysed yet");
    }

    #[test]
    fn test_request_compiler_restart_writes_command() {
        let mut h = Harness::new().analysed();
        h.pipeline.request_compiler_restart();
        assert_eq!(h.writes(), vec!["#RESTART#\n".to_string()]);
    }

    #[test]
    fn test_block_resolves_and_reports() {
        let mut h = Harness::new();
        h.pipeline.block();
        assert_eq!(h.pipeline.phase(), Phase::Blocked);
        assert!(lifecycle(&h.events()).contains(&LifecycleEvent::Blocked));
        let mut rx = h.hover();
        assert_eq!(rx.try_recv().unwrap(), Ok(None));
    }

    #[test]
    fn test_signature_help_flushes_pending_edits_first() {
        let mut h = Harness::new().analysed();
        h.pipeline
            .queue_versioned("file:///a.ghul", 2, "f(", h.now);

        let (tx, _rx) = oneshot::channel();
        let at = TextPosition::new("file:///a.ghul", Position::new(0, 2));
        h.pipeline
            .submit(WireRequest::Signature(at), Responder::SignatureHelp(tx), h.now);
        let writes = h.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], "#EDIT#\nfile:///a.ghul\n\nf(\x0c");
        assert!(writes[1].starts_with("#SIGNATURE#\n"));
    }

    #[test]
    fn test_unknown_command_rejects_every_kind() {
        let mut h = Harness::new().analysed();
        let mut hover = h.hover();
        let mut completion = h.completion();

        h.feed("BOGUS\n\x0c");
        let expected = BridgeError::Protocol(ProtocolError::UnknownCommand("BOGUS".to_string()));
        assert_eq!(hover.try_recv().unwrap(), Err(expected.clone()));
        assert_eq!(completion.try_recv().unwrap(), Err(expected));
        assert_eq!(h.pipeline.phase(), Phase::Analysed);
    }

    #[test]
    fn test_missing_terminator_rejects_every_kind() {
        let mut h = Harness::new().analysed();
        let mut hover = h.hover();
        let mut completion = h.completion();

        h.feed("HOVER\nint a\x0c");
        let expected = BridgeError::Protocol(ProtocolError::MissingTerminator("HOVER".to_string()));
        assert_eq!(hover.try_recv().unwrap(), Err(expected.clone()));
        assert_eq!(completion.try_recv().unwrap(), Err(expected));
        assert!(matches!(
            lifecycle(&h.events()).as_slice(),
            [LifecycleEvent::ProtocolError { .. }]
        ));
    }

    #[test]
    fn test_watchdog_covers_every_outstanding_batch() {
        let mut h = Harness::new().analysed();
        h.pipeline
            .queue_versioned("file:///a.ghul", 2, "let a = 2;", h.now);
        h.pipeline.flush_edits(h.now);
        h.pipeline
            .queue_versioned("file:///a.ghul", 3, "let a = 3;", h.now);
        h.pipeline.flush_edits(h.now);
        assert_eq!(h.writes().len(), 2);

        h.feed("ANALYSED\n\x0c");
        assert!(
            h.pipeline.watchdog_deadline().is_some(),
            "second batch is still being analysed"
        );
        h.feed("ANALYSED\n\x0c");
        assert_eq!(h.pipeline.watchdog_deadline(), None);
    }

    #[test]
    fn test_aborted_pipeline_reloads_documents_after_restart() {
        let mut h = Harness::new().analysed();
        h.pipeline
            .queue_versioned("file:///a.ghul", 2, "let a = 2;", h.now);
        h.pipeline.watchdog_expired();
        assert_eq!(h.pipeline.phase(), Phase::Aborted);
        assert_eq!(h.pipeline.watchdog_deadline(), None);

        h.feed("LISTEN\n\x0c");
        assert!(h.writes().is_empty(), "frames are ignored while aborted");

        let (writer_tx, writes) = mpsc::unbounded_channel();
        h.writes = writes;
        h.pipeline.starting();
        h.pipeline.attach(writer_tx, h.now);
        h.feed("LISTEN\n\x0c");
        assert_eq!(
            h.writes(),
            vec!["#EDIT#\nfile:///a.ghul\n\nlet a = 2;\x0c".to_string()]
        );
    }

    #[test]
    fn test_editor_text_queued_before_load_wins() {
        let mut h = Harness::new();
        h.pipeline
            .queue_versioned("file:///a.ghul", 1, "editor", h.now);
        h.pipeline.load(
            vec![
                Document::new("file:///a.ghul", "disk"),
                Document::new("file:///b.ghul", "other"),
            ],
            h.now,
        );
        assert!(h.writes().is_empty());

        h.feed("LISTEN\n\x0c");
        assert_eq!(
            h.writes(),
            vec!["#EDIT#\nfile:///a.ghul\nfile:///b.ghul\n\neditor\x0cother\x0c".to_string()]
        );
    }

    impl Pipeline {
        fn queue_versioned(&mut self, uri: &str, version: i64, text: &str, now: Instant) {
            self.queue_edit(uri, Some(version), text.to_string(), now)
                .unwrap();
        }
    }
}

//! Coalesces bursts of edits into single batched sends.
//!
//! ```text
//!          first edit              edit (timer armed)
//!  Start ─────────────▶ Idle ─────────────────────────▶ WaitingForMoreEdits ◀─┐
//!                        ▲                                   │   │  edit:    │
//!                        │          finish_send              │   └ restart ──┘
//!                        └──────────── Sending ◀─────────────┘     timer
//!                                             take_batch (timer or flush)
//! ```
//!
//! The queue never owns a timer task. It exposes a deadline; the owner
//! sleeps until it and then asks for a batch. Restarting the debounce is
//! just moving the deadline.

use std::collections::BTreeMap;
use std::time::Duration;

use ghul_types::Document;
use tokio::time::Instant;

use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// No document has been queued yet.
    Start,
    Idle,
    WaitingForMoreEdits,
    Sending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingEdit {
    pub uri: String,
    pub version: i64,
    pub text: String,
    pub pending: bool,
}

pub(crate) struct EditQueue {
    state: QueueState,
    /// Latest edit per uri. Entries stay after sending (not pending) so
    /// duplicates can be recognized and the text reloaded after a restart.
    edits: BTreeMap<String, PendingEdit>,
    idle_timeout: Duration,
    deadline: Option<Instant>,
    next_synthetic_version: i64,
}

impl EditQueue {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            state: QueueState::Start,
            edits: BTreeMap::new(),
            idle_timeout,
            deadline: None,
            next_synthetic_version: -1,
        }
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    /// When the debounce timer fires, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn set_idle_timeout(&mut self, idle_timeout: Duration) {
        self.idle_timeout = idle_timeout;
    }

    /// Versions for edits whose source supplies none count down from -1,
    /// so they never collide with editor versions.
    fn synthetic_version(&mut self) -> i64 {
        let version = self.next_synthetic_version;
        self.next_synthetic_version -= 1;
        version
    }

    /// Store the latest text for `uri` and advance the state machine.
    ///
    /// Returns `Ok(false)` when the edit repeats the stored version and text
    /// exactly; nothing changes then, not even the timer.
    pub fn queue_edit(
        &mut self,
        uri: &str,
        version: Option<i64>,
        text: String,
        now: Instant,
    ) -> Result<bool, BridgeError> {
        if self.state == QueueState::Sending {
            return Err(BridgeError::InvariantViolation(format!(
                "edit for {uri} arrived while a batch was being sent"
            )));
        }

        if let Some(version) = version
            && let Some(existing) = self.edits.get(uri)
            && existing.version == version
            && existing.text == text
        {
            return Ok(false);
        }

        let version = match version {
            Some(version) => version,
            None => self.synthetic_version(),
        };

        match self.state {
            QueueState::Start => {
                // The initial project load is sent as its own batch.
                self.state = QueueState::Idle;
            }
            _ => {
                self.state = QueueState::WaitingForMoreEdits;
                self.deadline = Some(now + self.idle_timeout);
            }
        }

        self.edits.insert(
            uri.to_string(),
            PendingEdit {
                uri: uri.to_string(),
                version,
                text,
                pending: true,
            },
        );
        Ok(true)
    }

    /// Queue documents for an explicit whole-project batch. Documents the
    /// editor already supplied keep the editor's text.
    pub fn seed(&mut self, documents: Vec<Document>) {
        for document in documents {
            if self.edits.contains_key(&document.uri) {
                continue;
            }
            let version = self.synthetic_version();
            self.edits.insert(
                document.uri.clone(),
                PendingEdit {
                    uri: document.uri,
                    version,
                    text: document.text,
                    pending: true,
                },
            );
        }
        if self.state == QueueState::Start {
            self.state = QueueState::Idle;
        }
    }

    /// Move every pending edit into one batch and enter `Sending`.
    ///
    /// Returns `None`, leaving the queue idle, when nothing is pending. The
    /// caller must call [`EditQueue::finish_send`] after writing the batch.
    pub fn take_batch(&mut self) -> Option<Vec<Document>> {
        self.deadline = None;

        let batch: Vec<Document> = self
            .edits
            .values_mut()
            .filter(|edit| edit.pending)
            .map(|edit| {
                edit.pending = false;
                Document::new(edit.uri.clone(), edit.text.clone())
            })
            .collect();

        if batch.is_empty() {
            if self.state == QueueState::WaitingForMoreEdits {
                self.state = QueueState::Idle;
            }
            return None;
        }

        self.state = QueueState::Sending;
        Some(batch)
    }

    pub fn finish_send(&mut self) {
        debug_assert_eq!(self.state, QueueState::Sending);
        self.state = QueueState::Idle;
    }

    /// Stop the debounce timer without sending; pending edits stay pending.
    pub fn hold(&mut self) {
        self.deadline = None;
        if self.state == QueueState::WaitingForMoreEdits {
            self.state = QueueState::Idle;
        }
    }

    /// Forget every edit and return to `Idle`.
    pub fn reset(&mut self) {
        self.edits.clear();
        self.deadline = None;
        self.state = QueueState::Idle;
    }

    /// Latest known text of every document, sent or not.
    pub fn snapshot(&self) -> Vec<Document> {
        self.edits
            .values()
            .map(|edit| Document::new(edit.uri.clone(), edit.text.clone()))
            .collect()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn pending_count(&self) -> usize {
        self.edits.values().filter(|edit| edit.pending).count()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, uri: &str) -> Option<&PendingEdit> {
        self.edits.get(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn queue() -> EditQueue {
        EditQueue::new(TIMEOUT)
    }

    fn texts(batch: &[Document]) -> Vec<(&str, &str)> {
        batch
            .iter()
            .map(|d| (d.uri.as_str(), d.text.as_str()))
            .collect()
    }

    #[test]
    fn test_first_edit_moves_start_to_idle_without_timer() {
        let mut queue = queue();
        let now = Instant::now();
        assert_eq!(queue.state(), QueueState::Start);

        assert!(queue.queue_edit("a", Some(1), "x".into(), now).unwrap());
        assert_eq!(queue.state(), QueueState::Idle);
        assert_eq!(queue.deadline(), None);
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn test_edit_in_idle_arms_timer() {
        let mut queue = queue();
        let now = Instant::now();
        queue.seed(Vec::new());
        assert_eq!(queue.state(), QueueState::Idle);

        queue.queue_edit("a", Some(1), "x".into(), now).unwrap();
        assert_eq!(queue.state(), QueueState::WaitingForMoreEdits);
        assert_eq!(queue.deadline(), Some(now + TIMEOUT));
    }

    #[test]
    fn test_each_edit_restarts_timer() {
        let mut queue = queue();
        let now = Instant::now();
        queue.seed(Vec::new());

        queue.queue_edit("a", Some(1), "x".into(), now).unwrap();
        let later = now + Duration::from_millis(60);
        queue.queue_edit("b", Some(1), "y".into(), later).unwrap();
        assert_eq!(queue.deadline(), Some(later + TIMEOUT));
        assert_eq!(queue.state(), QueueState::WaitingForMoreEdits);
    }

    #[test]
    fn test_burst_becomes_one_batch_with_latest_text() {
        let mut queue = queue();
        let now = Instant::now();
        queue.seed(Vec::new());

        queue.queue_edit("a", Some(1), "a1".into(), now).unwrap();
        queue.queue_edit("b", Some(1), "b1".into(), now).unwrap();
        queue.queue_edit("a", Some(2), "a2".into(), now).unwrap();

        let batch = queue.take_batch().unwrap();
        assert_eq!(queue.state(), QueueState::Sending);
        assert_eq!(texts(&batch), vec![("a", "a2"), ("b", "b1")]);

        queue.finish_send();
        assert_eq!(queue.state(), QueueState::Idle);
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.take_batch().is_none(), "sent edits are not resent");
    }

    #[test]
    fn test_duplicate_edit_is_noop() {
        let mut queue = queue();
        let now = Instant::now();
        queue.seed(Vec::new());
        queue.queue_edit("a", Some(3), "same".into(), now).unwrap();
        let deadline = queue.deadline();

        let later = now + Duration::from_millis(50);
        assert!(!queue.queue_edit("a", Some(3), "same".into(), later).unwrap());
        assert_eq!(queue.deadline(), deadline, "timer must not restart");
    }

    #[test]
    fn test_duplicate_of_sent_edit_is_noop() {
        let mut queue = queue();
        let now = Instant::now();
        queue.seed(Vec::new());
        queue.queue_edit("a", Some(3), "same".into(), now).unwrap();
        queue.take_batch().unwrap();
        queue.finish_send();

        assert!(!queue.queue_edit("a", Some(3), "same".into(), now).unwrap());
        assert_eq!(queue.state(), QueueState::Idle);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_same_version_new_text_is_stored() {
        let mut queue = queue();
        let now = Instant::now();
        queue.queue_edit("a", Some(3), "one".into(), now).unwrap();
        assert!(queue.queue_edit("a", Some(3), "two".into(), now).unwrap());
        assert_eq!(queue.get("a").unwrap().text, "two");
    }

    #[test]
    fn test_unversioned_edits_count_down() {
        let mut queue = queue();
        let now = Instant::now();
        queue.queue_edit("a", None, "x".into(), now).unwrap();
        assert_eq!(queue.get("a").unwrap().version, -1);
        queue.queue_edit("a", None, "x".into(), now).unwrap();
        assert_eq!(queue.get("a").unwrap().version, -2);
    }

    #[test]
    fn test_edit_while_sending_is_invariant_violation() {
        let mut queue = queue();
        let now = Instant::now();
        queue.queue_edit("a", Some(1), "x".into(), now).unwrap();
        queue.take_batch().unwrap();

        let err = queue
            .queue_edit("b", Some(1), "y".into(), now)
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvariantViolation(_)));
    }

    #[test]
    fn test_flush_while_waiting_bypasses_timer() {
        let mut queue = queue();
        let now = Instant::now();
        queue.seed(Vec::new());
        queue.queue_edit("a", Some(1), "x".into(), now).unwrap();

        let batch = queue.take_batch().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(queue.deadline(), None);
        queue.finish_send();
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[test]
    fn test_take_batch_with_nothing_pending() {
        let mut queue = queue();
        assert!(queue.take_batch().is_none());
        assert_eq!(queue.state(), QueueState::Start);
    }

    #[test]
    fn test_seed_keeps_editor_text() {
        let mut queue = queue();
        let now = Instant::now();
        queue.queue_edit("a", Some(4), "from editor".into(), now).unwrap();
        queue.seed(vec![
            Document::new("a", "from disk"),
            Document::new("b", "only on disk"),
        ]);

        let batch = queue.take_batch().unwrap();
        assert_eq!(
            texts(&batch),
            vec![("a", "from editor"), ("b", "only on disk")]
        );
    }

    #[test]
    fn test_hold_keeps_edits_pending() {
        let mut queue = queue();
        let now = Instant::now();
        queue.seed(Vec::new());
        queue.queue_edit("a", Some(1), "x".into(), now).unwrap();

        queue.hold();
        assert_eq!(queue.deadline(), None);
        assert_eq!(queue.state(), QueueState::Idle);
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn test_reset_empties_queue() {
        let mut queue = queue();
        let now = Instant::now();
        queue.seed(Vec::new());
        queue.queue_edit("a", Some(1), "x".into(), now).unwrap();

        queue.reset();
        assert!(queue.is_empty());
        assert_eq!(queue.state(), QueueState::Idle);
        assert_eq!(queue.deadline(), None);
    }

    #[test]
    fn test_snapshot_includes_sent_documents() {
        let mut queue = queue();
        let now = Instant::now();
        queue.queue_edit("a", Some(1), "x".into(), now).unwrap();
        queue.take_batch().unwrap();
        queue.finish_send();
        queue.queue_edit("b", Some(1), "y".into(), now).unwrap();

        assert_eq!(texts(&queue.snapshot()), vec![("a", "x"), ("b", "y")]);
    }
}

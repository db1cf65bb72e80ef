//! Debounced persistence of local edits.
//!
//! One [`DebouncedWriter`] per contested field. It coalesces bursts of local
//! edits into a single trailing-edge write, skips writes whose content is
//! already persisted, and keeps unsaved content after a failed write so the
//! next edit retries with the latest value. It never performs I/O itself:
//! the owner polls it for due writes and reports their outcome, which keeps
//! every transition deterministic under an injected clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum WriterState {
    Idle,
    PendingWrite {
        content: String,
        deadline: Instant,
    },
    Writing {
        content: String,
        /// Edit that arrived while the write was in flight
        queued: Option<(String, Instant)>,
    },
    /// Last write failed; content is still unsaved until the next `save`
    Failed {
        content: String,
    },
}

/// What a `save` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Content already persisted (or already being written); nothing to do
    Unchanged,
    /// Write scheduled for `deadline`, replacing any earlier pending write
    Scheduled { deadline: Instant },
    /// A write is in flight; this content is written after it completes
    Queued,
}

/// Result of the write handed out by `poll_due` or `flush`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Saved,
    Failed,
}

/// Save indicator surfaced to UIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Saved,
    Pending,
    Saving,
    Failed,
}

#[derive(Debug, Clone)]
pub struct DebouncedWriter {
    window: Duration,
    state: WriterState,
    last_persisted: String,
    last_saved_at: Option<i64>,
    held: bool,
}

impl DebouncedWriter {
    /// `persisted` is the value currently stored in the backing store
    pub fn new(window: Duration, persisted: impl Into<String>) -> Self {
        Self {
            window,
            state: WriterState::Idle,
            last_persisted: persisted.into(),
            last_saved_at: None,
            held: false,
        }
    }

    /// Record a local edit; restarts the debounce window
    pub fn save(&mut self, content: impl Into<String>, now: Instant) -> SaveOutcome {
        let content = content.into();
        let deadline = now + self.window;

        if let WriterState::Writing {
            content: in_flight,
            queued,
        } = &mut self.state
        {
            if *in_flight == content {
                *queued = None;
                return SaveOutcome::Unchanged;
            }
            *queued = Some((content, deadline));
            return SaveOutcome::Queued;
        }

        if content == self.last_persisted {
            if self.state != WriterState::Idle {
                tracing::debug!("Edit reverted to persisted value; cancelling pending write");
            }
            self.state = WriterState::Idle;
            return SaveOutcome::Unchanged;
        }

        self.state = WriterState::PendingWrite { content, deadline };
        SaveOutcome::Scheduled { deadline }
    }

    /// Take the content of a write whose quiet period has elapsed
    pub fn poll_due(&mut self, now: Instant) -> Option<String> {
        if self.held {
            return None;
        }
        match &self.state {
            WriterState::PendingWrite { deadline, .. } if *deadline <= now => {
                let WriterState::PendingWrite { content, .. } =
                    std::mem::replace(&mut self.state, WriterState::Idle)
                else {
                    return None;
                };
                self.state = WriterState::Writing {
                    content: content.clone(),
                    queued: None,
                };
                Some(content)
            }
            _ => None,
        }
    }

    /// Report how the in-flight write went; `now_ms` becomes the last saved
    /// time on success
    pub fn complete(&mut self, outcome: WriteOutcome, now_ms: i64) {
        match outcome {
            WriteOutcome::Saved => self.complete_success(now_ms),
            WriteOutcome::Failed => self.complete_failure(),
        }
    }

    fn complete_success(&mut self, saved_at: i64) {
        let WriterState::Writing { content, queued } =
            std::mem::replace(&mut self.state, WriterState::Idle)
        else {
            return;
        };
        self.last_persisted = content;
        self.last_saved_at = Some(saved_at);
        if let Some((next, deadline)) = queued {
            if next != self.last_persisted {
                self.state = WriterState::PendingWrite {
                    content: next,
                    deadline,
                };
            }
        }
    }

    // last_persisted stays put; no retry unless newer content was queued.
    fn complete_failure(&mut self) {
        let WriterState::Writing { content, queued } =
            std::mem::replace(&mut self.state, WriterState::Idle)
        else {
            return;
        };
        self.state = match queued {
            Some((next, deadline)) => WriterState::PendingWrite {
                content: next,
                deadline,
            },
            None => WriterState::Failed { content },
        };
    }

    /// Take unsaved content for an immediate write, ignoring the window and
    /// any hold
    pub fn flush(&mut self) -> Option<String> {
        let content = match std::mem::replace(&mut self.state, WriterState::Idle) {
            WriterState::PendingWrite { content, .. } | WriterState::Failed { content } => content,
            writing @ WriterState::Writing { .. } => {
                self.state = writing;
                return None;
            }
            WriterState::Idle => return None,
        };
        self.state = WriterState::Writing {
            content: content.clone(),
            queued: None,
        };
        Some(content)
    }

    /// Drop any unsaved content
    pub fn discard(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, WriterState::Idle) {
            WriterState::PendingWrite { content, .. } | WriterState::Failed { content } => {
                Some(content)
            }
            WriterState::Writing { content, queued } => {
                // The in-flight write cannot be recalled; only the queue goes.
                self.state = WriterState::Writing {
                    content,
                    queued: None,
                };
                queued.map(|(next, _)| next)
            }
            WriterState::Idle => None,
        }
    }

    /// Another writer persisted `value`; pending content equal to it has
    /// nothing left to write
    pub fn observe_remote(&mut self, value: &str) {
        value.clone_into(&mut self.last_persisted);
        let converged = match &self.state {
            WriterState::PendingWrite { content, .. } | WriterState::Failed { content } => {
                content == value
            }
            _ => false,
        };
        if converged {
            self.state = WriterState::Idle;
        }
    }

    /// Replace unsaved content with `value`, writing it only if the store
    /// does not already hold it
    pub fn adopt(&mut self, value: impl Into<String>, now: Instant) -> SaveOutcome {
        self.discard();
        self.save(value, now)
    }

    /// Keep due writes from firing (used while a conflict is outstanding)
    pub fn hold(&mut self) {
        self.held = true;
    }

    /// Lift a hold; a pending write gets a fresh quiet period
    pub fn release(&mut self, now: Instant) {
        if !self.held {
            return;
        }
        self.held = false;
        if let WriterState::PendingWrite { deadline, .. } = &mut self.state {
            *deadline = now + self.window;
        }
    }

    /// Content typed locally but not yet confirmed by the backing store
    pub fn unsaved(&self) -> Option<&str> {
        match &self.state {
            WriterState::Idle => None,
            WriterState::PendingWrite { content, .. } | WriterState::Failed { content } => {
                Some(content)
            }
            WriterState::Writing { content, queued } => Some(
                queued
                    .as_ref()
                    .map_or(content.as_str(), |(next, _)| next.as_str()),
            ),
        }
    }

    /// When the next write becomes due, if one is scheduled and not held
    pub const fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            WriterState::PendingWrite { deadline, .. } if !self.held => Some(*deadline),
            _ => None,
        }
    }

    pub fn last_persisted(&self) -> &str {
        &self.last_persisted
    }

    /// Unix ms of the last successful write by this writer
    pub const fn last_saved_at(&self) -> Option<i64> {
        self.last_saved_at
    }

    pub const fn status(&self) -> SaveStatus {
        match self.state {
            WriterState::Idle => SaveStatus::Saved,
            WriterState::PendingWrite { .. } => SaveStatus::Pending,
            WriterState::Writing { .. } => SaveStatus::Saving,
            WriterState::Failed { .. } => SaveStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(1);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn burst_of_saves_yields_one_write_with_last_value() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "");

        writer.save("H", t0);
        writer.save("He", t0 + ms(200));
        writer.save("Hel", t0 + ms(400));
        writer.save("Hello", t0 + ms(600));

        // Timer restarted on every call: nothing due one window after the first.
        assert_eq!(writer.poll_due(t0 + ms(1000)), None);
        assert_eq!(writer.next_deadline(), Some(t0 + ms(1600)));
        assert_eq!(writer.poll_due(t0 + ms(1600)).as_deref(), Some("Hello"));
        assert_eq!(writer.poll_due(t0 + ms(5000)), None);

        writer.complete(WriteOutcome::Saved, 42);
        assert_eq!(writer.last_persisted(), "Hello");
        assert_eq!(writer.last_saved_at(), Some(42));
        assert_eq!(writer.status(), SaveStatus::Saved);
    }

    #[test]
    fn saving_persisted_content_is_a_no_op() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "");
        writer.save("Hello", t0);
        writer.poll_due(t0 + WINDOW).unwrap();
        writer.complete(WriteOutcome::Saved, 1);

        for step in 0..5 {
            assert_eq!(
                writer.save("Hello", t0 + WINDOW + ms(step * 100)),
                SaveOutcome::Unchanged
            );
        }
        assert_eq!(writer.poll_due(t0 + WINDOW * 10), None);
        assert_eq!(writer.unsaved(), None);
    }

    #[test]
    fn reverting_to_persisted_value_cancels_pending_write() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "draft");
        writer.save("draft!", t0);
        assert_eq!(writer.save("draft", t0 + ms(100)), SaveOutcome::Unchanged);
        assert_eq!(writer.poll_due(t0 + WINDOW * 2), None);
    }

    #[test]
    fn failure_keeps_content_and_waits_for_next_save() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "");
        writer.save("Hello", t0);
        writer.poll_due(t0 + WINDOW).unwrap();
        writer.complete(WriteOutcome::Failed, 0);

        assert_eq!(writer.status(), SaveStatus::Failed);
        assert_eq!(writer.unsaved(), Some("Hello"));
        assert_eq!(writer.last_persisted(), "");
        assert_eq!(writer.last_saved_at(), None);
        // Not auto-rescheduled.
        assert_eq!(writer.next_deadline(), None);
        assert_eq!(writer.poll_due(t0 + WINDOW * 10), None);

        // The next edit restarts the cycle with the latest content.
        let t1 = t0 + WINDOW * 10;
        assert!(matches!(
            writer.save("Hello!", t1),
            SaveOutcome::Scheduled { .. }
        ));
        assert_eq!(writer.poll_due(t1 + WINDOW).as_deref(), Some("Hello!"));
    }

    #[test]
    fn edit_during_write_is_queued_behind_it() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "");
        writer.save("a", t0);
        writer.poll_due(t0 + WINDOW).unwrap();

        assert_eq!(writer.save("ab", t0 + WINDOW + ms(10)), SaveOutcome::Queued);
        assert_eq!(writer.unsaved(), Some("ab"));
        writer.complete(WriteOutcome::Saved, 7);

        assert_eq!(writer.last_persisted(), "a");
        assert_eq!(writer.next_deadline(), Some(t0 + WINDOW * 2 + ms(10)));
        assert_eq!(
            writer.poll_due(t0 + WINDOW * 2 + ms(10)).as_deref(),
            Some("ab")
        );
    }

    #[test]
    fn queued_edit_survives_failed_write() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "");
        writer.save("a", t0);
        writer.poll_due(t0 + WINDOW).unwrap();
        writer.save("ab", t0 + WINDOW);
        writer.complete(WriteOutcome::Failed, 0);

        assert_eq!(writer.status(), SaveStatus::Pending);
        assert_eq!(writer.unsaved(), Some("ab"));
    }

    #[test]
    fn hold_blocks_due_writes_until_release() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "");
        writer.save("local", t0);
        writer.hold();

        assert_eq!(writer.next_deadline(), None);
        assert_eq!(writer.poll_due(t0 + WINDOW * 5), None);

        let t1 = t0 + WINDOW * 5;
        writer.release(t1);
        assert_eq!(writer.poll_due(t1), None);
        assert_eq!(writer.poll_due(t1 + WINDOW).as_deref(), Some("local"));
    }

    #[test]
    fn flush_ignores_window_and_hold() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "");
        writer.save("bye", t0);
        writer.hold();

        assert_eq!(writer.flush().as_deref(), Some("bye"));
        assert_eq!(writer.status(), SaveStatus::Saving);
        assert_eq!(writer.flush(), None);
    }

    #[test]
    fn discard_drops_unsaved_content() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "");
        writer.save("oops", t0);

        assert_eq!(writer.discard().as_deref(), Some("oops"));
        assert_eq!(writer.poll_due(t0 + WINDOW), None);
        assert_eq!(writer.status(), SaveStatus::Saved);
    }

    #[test]
    fn observe_remote_converges_equal_pending_value() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "old");
        writer.save("same", t0);
        writer.observe_remote("same");

        assert_eq!(writer.unsaved(), None);
        assert_eq!(writer.last_persisted(), "same");
    }

    #[test]
    fn observe_remote_keeps_diverging_pending_value() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "old");
        writer.save("mine", t0);
        writer.observe_remote("theirs");

        assert_eq!(writer.unsaved(), Some("mine"));
        assert_eq!(writer.last_persisted(), "theirs");
    }

    #[test]
    fn adopt_remote_value_already_persisted_needs_no_write() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "old");
        writer.save("mine", t0);
        writer.observe_remote("theirs");

        assert_eq!(writer.adopt("theirs", t0), SaveOutcome::Unchanged);
        assert_eq!(writer.unsaved(), None);
    }

    #[test]
    fn adopt_new_value_schedules_write() {
        let t0 = Instant::now();
        let mut writer = DebouncedWriter::new(WINDOW, "old");
        writer.save("mine", t0);

        assert!(matches!(
            writer.adopt("merged", t0),
            SaveOutcome::Scheduled { .. }
        ));
        assert_eq!(writer.unsaved(), Some("merged"));
    }
}

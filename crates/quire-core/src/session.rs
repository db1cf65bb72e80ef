//! Collaborative editing session for one document.
//!
//! [`CollabSession`] is the surface UIs talk to. Opening a session loads the
//! document, subscribes to its change feed and signal topic, announces
//! presence, and spawns a driver task. The driver is the only event loop for
//! the document: it reconciles remote changes, tracks remote participants,
//! fires debounced writes, expires typing indicators, and sends heartbeats.
//! UI-facing calls mutate the shared state directly and wake the driver so it
//! can reschedule its next deadline.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};

use crate::broadcast::Broadcaster;
use crate::config::{CloseBehavior, CollabConfig};
use crate::conflict::{ConflictDetector, ResolvedConflict};
use crate::context::AppContext;
use crate::listener::{
    FieldOutcome, PendingEdit, PendingEdits, Reconciliation, RemoteChangeListener,
};
use crate::models::{
    ChangeEvent, Conflict, ConflictId, Document, DocumentId, DocumentPatch, Field,
    ParticipantView, Resolution, UserId, UserProfile,
};
use crate::presence::{PresenceChange, PresenceTracker};
use crate::protocol::{ChannelMessage, Signal, SignalEnvelope};
use crate::store::DocumentStore;
use crate::util::unix_millis_now;
use crate::writer::{DebouncedWriter, SaveOutcome, SaveStatus, WriteOutcome};
use crate::{Error, Result};

/// Upper bound on how long the driver sleeps with nothing scheduled
const IDLE_WAKE: Duration = Duration::from_secs(3600);

/// Notice surfaced to UIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    ParticipantJoined {
        user: UserId,
        display_name: String,
    },
    ParticipantLeft {
        user: UserId,
    },
    CursorMoved {
        user: UserId,
        offset: usize,
    },
    TypingStarted {
        user: UserId,
    },
    TypingStopped {
        user: UserId,
    },
    Saved {
        at: i64,
    },
    SaveFailed {
        message: String,
    },
    /// A remote value replaced local state ("Note content updated")
    RemoteApplied {
        field: Field,
        writer: UserId,
    },
    ConflictDetected {
        conflict: Conflict,
    },
    ConflictResolved {
        id: ConflictId,
        field: Field,
        resolution: Resolution,
    },
    ConflictDismissed {
        id: ConflictId,
        field: Field,
    },
    /// Local field value replaced by a conflict resolution
    ContentReplaced {
        field: Field,
        value: String,
    },
}

impl SessionEvent {
    /// Short human-readable notice
    pub fn notice(&self) -> String {
        match self {
            Self::ParticipantJoined { display_name, .. } => format!("{display_name} joined"),
            Self::ParticipantLeft { user } => format!("{user} left"),
            Self::CursorMoved { user, offset } => format!("{user} moved to {offset}"),
            Self::TypingStarted { user } => format!("{user} is typing"),
            Self::TypingStopped { user } => format!("{user} stopped typing"),
            Self::Saved { .. } => "Saved".to_string(),
            Self::SaveFailed { message } => format!("Save failed: {message}"),
            Self::RemoteApplied { field, .. } => format!("Note {field} updated"),
            Self::ConflictDetected { conflict } => format!(
                "{} changed the {} while you were editing",
                conflict.remote_user_name, conflict.field
            ),
            Self::ConflictResolved {
                field, resolution, ..
            } => format!("Kept {resolution} {field}"),
            Self::ConflictDismissed { field, .. } => format!("Dismissed {field} conflict"),
            Self::ContentReplaced { field, .. } => format!("Note {field} replaced"),
        }
    }
}

/// Everything a UI renders, captured at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub document: Document,
    pub editing_users: Vec<ParticipantView>,
    pub is_editing: bool,
    pub last_saved: Option<i64>,
    pub conflicts: Vec<Conflict>,
    pub save_status: SaveStatus,
}

/// One debounced writer per contested field
#[derive(Debug)]
struct FieldWriters {
    title: DebouncedWriter,
    content: DebouncedWriter,
}

impl FieldWriters {
    fn new(window: Duration, document: &Document) -> Self {
        Self {
            title: DebouncedWriter::new(window, document.title.clone()),
            content: DebouncedWriter::new(window, document.content.clone()),
        }
    }

    const fn get(&self, field: Field) -> &DebouncedWriter {
        match field {
            Field::Title => &self.title,
            Field::Content => &self.content,
        }
    }

    fn get_mut(&mut self, field: Field) -> &mut DebouncedWriter {
        match field {
            Field::Title => &mut self.title,
            Field::Content => &mut self.content,
        }
    }

    fn pending_edits(&self) -> PendingEdits {
        Field::ALL
            .into_iter()
            .filter_map(|field| {
                let writer = self.get(field);
                writer.unsaved().map(|unsaved| {
                    (
                        field,
                        PendingEdit {
                            persisted: writer.last_persisted().to_string(),
                            unsaved: unsaved.to_string(),
                        },
                    )
                })
            })
            .collect()
    }

    fn next_deadline(&self) -> Option<Instant> {
        [self.title.next_deadline(), self.content.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Most pressing status across fields
    fn status(&self) -> SaveStatus {
        let statuses = [self.title.status(), self.content.status()];
        [SaveStatus::Failed, SaveStatus::Saving, SaveStatus::Pending]
            .into_iter()
            .find(|status| statuses.contains(status))
            .unwrap_or(SaveStatus::Saved)
    }
}

#[derive(Debug)]
struct SessionState {
    document: Document,
    writers: FieldWriters,
    presence: PresenceTracker,
    conflicts: ConflictDetector,
    listener: RemoteChangeListener,
    is_editing: bool,
    closed: bool,
    last_saved: Option<i64>,
}

impl SessionState {
    fn next_deadline(&self) -> Option<Instant> {
        [self.writers.next_deadline(), self.presence.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Command {
    /// Shared state changed; recompute the next deadline
    Wake,
    Close(oneshot::Sender<()>),
}

/// Handle to an open document
pub struct CollabSession {
    document_id: DocumentId,
    identity: UserProfile,
    state: Arc<Mutex<SessionState>>,
    broadcaster: Broadcaster,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl CollabSession {
    /// Open `document_id` for collaborative editing
    pub async fn open(context: &AppContext, document_id: DocumentId) -> Result<Self> {
        let config = &context.config;
        let identity = context.identity.clone();

        // Subscribe before loading so no update slips in between.
        let changes = match context.store.subscribe(document_id).await {
            Ok(rx) => Some(rx),
            Err(error) => {
                tracing::warn!("Change feed for {} unavailable: {}", document_id, error);
                None
            }
        };
        let signals = match context.channel.subscribe(&document_id.topic()).await {
            Ok(rx) => Some(rx),
            Err(error) => {
                tracing::warn!("Signal topic for {} unavailable: {}", document_id, error);
                None
            }
        };

        let document = context
            .store
            .select(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(document_id.to_string()))?;

        let state = Arc::new(Mutex::new(SessionState {
            writers: FieldWriters::new(config.debounce(), &document),
            document,
            presence: PresenceTracker::new(config.presence_timeout(), config.typing_expiry()),
            conflicts: ConflictDetector::new(config.merge_separator.clone()),
            listener: RemoteChangeListener::new(identity.id.clone()),
            is_editing: false,
            closed: false,
            last_saved: None,
        }));

        let broadcaster = Broadcaster::new(context.channel.clone(), identity.clone());

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.broadcast_capacity.max(1));

        let driver = Driver {
            document_id,
            identity: identity.clone(),
            state: state.clone(),
            store: context.store.clone(),
            broadcaster: broadcaster.clone(),
            events: events.clone(),
            config: config.clone(),
        };
        let handle = tokio::spawn(driver.run(command_rx, changes, signals));

        tracing::info!("Opened collaborative session for {}", document_id);
        Ok(Self {
            document_id,
            identity,
            state,
            broadcaster,
            commands,
            events,
            driver: Mutex::new(Some(handle)),
        })
    }

    pub const fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub const fn identity(&self) -> &UserProfile {
        &self.identity
    }

    /// Receive notices for this session
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Remote participants currently on the document
    pub fn editing_users(&self) -> Vec<ParticipantView> {
        lock(&self.state)
            .presence
            .list(self.document_id, Instant::now())
    }

    pub fn is_editing(&self) -> bool {
        lock(&self.state).is_editing
    }

    /// Unix ms of this session's last successful write
    pub fn last_saved(&self) -> Option<i64> {
        lock(&self.state).last_saved
    }

    pub fn conflicts(&self) -> Vec<Conflict> {
        lock(&self.state).conflicts.list().to_vec()
    }

    /// Local view of the document, including unsaved edits
    pub fn document(&self) -> Document {
        lock(&self.state).document.clone()
    }

    pub fn save_status(&self) -> SaveStatus {
        lock(&self.state).writers.status()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = lock(&self.state);
        SessionSnapshot {
            document: state.document.clone(),
            editing_users: state.presence.list(self.document_id, Instant::now()),
            is_editing: state.is_editing,
            last_saved: state.last_saved,
            conflicts: state.conflicts.list().to_vec(),
            save_status: state.writers.status(),
        }
    }

    /// Join presence so peers see this user and signals flow both ways.
    /// Saving works without it.
    pub async fn start_editing(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            state.ensure_open()?;
            if state.is_editing {
                return Ok(());
            }
            state.is_editing = true;
        }
        self.broadcaster.announce_join(self.document_id).await;
        self.wake();
        Ok(())
    }

    /// Leave presence and forget the roster. Remote document changes are
    /// still reconciled and pending writes still fire.
    pub async fn stop_editing(&self) -> Result<()> {
        let departed = {
            let mut state = lock(&self.state);
            state.ensure_open()?;
            if !state.is_editing {
                return Ok(());
            }
            state.is_editing = false;
            state.presence.clear(self.document_id)
        };
        for user in departed {
            self.emit(SessionEvent::ParticipantLeft { user });
        }
        self.broadcaster.announce_leave(self.document_id).await;
        self.wake();
        Ok(())
    }

    /// Record a local content edit; the write happens after the debounce
    /// window
    pub fn save_note_content(&self, content: impl Into<String>) -> Result<SaveOutcome> {
        self.save_field(Field::Content, content)
    }

    pub fn save_note_title(&self, title: impl Into<String>) -> Result<SaveOutcome> {
        self.save_field(Field::Title, title)
    }

    pub fn save_field(&self, field: Field, value: impl Into<String>) -> Result<SaveOutcome> {
        let value = value.into();
        let outcome = {
            let mut state = lock(&self.state);
            state.ensure_open()?;
            state.document.set_field(field, value.clone());
            state.writers.get_mut(field).save(value, Instant::now())
        };
        self.wake();
        Ok(outcome)
    }

    /// Share the local cursor offset; returns whether the channel accepted it
    pub async fn broadcast_cursor_move(&self, offset: usize) -> bool {
        if !self.is_active() {
            return false;
        }
        self.broadcaster
            .broadcast_cursor(self.document_id, offset)
            .await
    }

    /// Tell peers the local user is typing
    pub async fn broadcast_user_typing(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.broadcaster.broadcast_typing(self.document_id).await
    }

    /// Settle an outstanding conflict
    pub fn resolve_conflict(
        &self,
        id: ConflictId,
        resolution: Resolution,
    ) -> Result<ResolvedConflict> {
        let mut events = Vec::new();
        let resolved = {
            let mut state = lock(&self.state);
            state.ensure_open()?;
            let resolved = state.conflicts.resolve(id, resolution)?;
            let now = Instant::now();
            let writer = state.writers.get_mut(resolved.field);
            if let Some(value) = &resolved.value {
                writer.adopt(value.clone(), now);
            }
            writer.release(now);
            if let Some(value) = &resolved.value {
                state.document.set_field(resolved.field, value.clone());
                events.push(SessionEvent::ContentReplaced {
                    field: resolved.field,
                    value: value.clone(),
                });
            }
            resolved
        };

        tracing::info!(
            "Resolved {} conflict on {} with {}",
            resolved.field,
            self.document_id,
            resolution
        );
        events.push(SessionEvent::ConflictResolved {
            id,
            field: resolved.field,
            resolution,
        });
        for event in events {
            self.emit(event);
        }
        self.wake();
        Ok(resolved)
    }

    /// Drop a conflict without changing either value; the held local edit
    /// is released
    pub fn dismiss_conflict(&self, id: ConflictId) -> Result<Conflict> {
        let conflict = {
            let mut state = lock(&self.state);
            state.ensure_open()?;
            let conflict = state.conflicts.dismiss(id)?;
            state
                .writers
                .get_mut(conflict.field)
                .release(Instant::now());
            conflict
        };
        self.emit(SessionEvent::ConflictDismissed {
            id,
            field: conflict.field,
        });
        self.wake();
        Ok(conflict)
    }

    /// Settle pending writes per the configured close behavior, announce
    /// departure, and stop the driver
    pub async fn close(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Close(reply))
            .map_err(|_| Error::SessionClosed)?;
        done.await.map_err(|_| Error::SessionClosed)?;

        let handle = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                tracing::warn!("Session driver for {} ended abnormally: {}", self.document_id, error);
            }
        }
        tracing::info!("Closed collaborative session for {}", self.document_id);
        Ok(())
    }

    fn is_active(&self) -> bool {
        let state = lock(&self.state);
        !state.closed && state.is_editing
    }

    fn wake(&self) {
        // The driver is gone only after close.
        let _ = self.commands.send(Command::Wake);
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// What woke the driver
enum Wakeup {
    Command(Option<Command>),
    Change(std::result::Result<ChangeEvent, RecvError>),
    Signal(std::result::Result<ChannelMessage, RecvError>),
    Timer,
}

struct Driver {
    document_id: DocumentId,
    identity: UserProfile,
    state: Arc<Mutex<SessionState>>,
    store: Arc<dyn DocumentStore>,
    broadcaster: Broadcaster,
    events: broadcast::Sender<SessionEvent>,
    config: CollabConfig,
}

impl Driver {
    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut changes: Option<broadcast::Receiver<ChangeEvent>>,
        mut signals: Option<broadcast::Receiver<ChannelMessage>>,
    ) {
        let mut next_heartbeat = Instant::now() + self.config.heartbeat_interval();

        loop {
            let deadline = lock(&self.state)
                .next_deadline()
                .map_or(next_heartbeat, |deadline| deadline.min(next_heartbeat))
                .min(Instant::now() + IDLE_WAKE);

            let wakeup = tokio::select! {
                command = commands.recv() => Wakeup::Command(command),
                change = recv_from(&mut changes) => Wakeup::Change(change),
                frame = recv_from(&mut signals) => Wakeup::Signal(frame),
                () = sleep_until(deadline) => Wakeup::Timer,
            };

            match wakeup {
                Wakeup::Command(Some(Command::Wake)) | Wakeup::Timer => {}
                Wakeup::Command(Some(Command::Close(reply))) => {
                    self.shutdown().await;
                    let _ = reply.send(());
                    return;
                }
                Wakeup::Command(None) => {
                    // Handle dropped without close.
                    self.shutdown().await;
                    return;
                }
                Wakeup::Change(Ok(event)) => self.handle_change(&event),
                Wakeup::Change(Err(RecvError::Lagged(missed))) => {
                    tracing::warn!(
                        "Missed {} change events for {}",
                        missed,
                        self.document_id
                    );
                }
                Wakeup::Change(Err(RecvError::Closed)) => {
                    tracing::warn!("Change feed for {} closed", self.document_id);
                    changes = None;
                }
                Wakeup::Signal(Ok(frame)) => self.handle_signal(&frame).await,
                Wakeup::Signal(Err(RecvError::Lagged(missed))) => {
                    tracing::debug!("Missed {} signals for {}", missed, self.document_id);
                }
                Wakeup::Signal(Err(RecvError::Closed)) => {
                    tracing::warn!("Signal topic for {} closed", self.document_id);
                    signals = None;
                }
            }

            let now = Instant::now();
            self.run_due(now).await;
            if now >= next_heartbeat {
                let editing = lock(&self.state).is_editing;
                if editing {
                    self.broadcaster.heartbeat(self.document_id).await;
                }
                next_heartbeat = now + self.config.heartbeat_interval();
            }
        }
    }

    /// Fire due writes and expire stale presence
    async fn run_due(&self, now: Instant) {
        let (due, events) = {
            let mut state = lock(&self.state);
            let due: Vec<(Field, String)> = Field::ALL
                .into_iter()
                .filter_map(|field| {
                    state
                        .writers
                        .get_mut(field)
                        .poll_due(now)
                        .map(|content| (field, content))
                })
                .collect();

            let mut events = Vec::new();
            for (document_id, user) in state.presence.expire_typing(now) {
                if document_id == self.document_id {
                    events.push(SessionEvent::TypingStopped { user });
                }
            }
            for (document_id, user) in state.presence.prune(now) {
                if document_id == self.document_id {
                    events.push(SessionEvent::ParticipantLeft { user });
                }
            }
            (due, events)
        };

        for event in events {
            self.emit(event);
        }
        if !due.is_empty() {
            self.write(due).await;
        }
    }

    async fn write(&self, fields: Vec<(Field, String)>) {
        let mut patch = DocumentPatch::default();
        for (field, content) in &fields {
            patch.set(*field, content.clone());
        }

        let result = self
            .store
            .update(self.document_id, &patch, &self.identity.id)
            .await;
        let now_ms = unix_millis_now();

        let event = {
            let mut state = lock(&self.state);
            let outcome = if result.is_ok() {
                WriteOutcome::Saved
            } else {
                WriteOutcome::Failed
            };
            for (field, _) in &fields {
                state.writers.get_mut(*field).complete(outcome, now_ms);
            }
            match result {
                Ok(saved) => {
                    state.last_saved = Some(now_ms);
                    state.document.updated_at = saved.updated_at;
                    state.document.updated_by = saved.updated_by;
                    state.document.tags = saved.tags;
                    tracing::info!("Saved {}", self.document_id);
                    SessionEvent::Saved { at: now_ms }
                }
                Err(error) => {
                    tracing::error!("Failed to save {}: {}", self.document_id, error);
                    SessionEvent::SaveFailed {
                        message: error.to_string(),
                    }
                }
            }
        };
        self.emit(event);
    }

    fn handle_change(&self, event: &ChangeEvent) {
        if event.document_id != self.document_id {
            return;
        }
        let mut events = Vec::new();
        {
            let mut state = lock(&self.state);
            let pending = state.writers.pending_edits();
            let reconciliation = state.listener.reconcile(event, &state.document, &pending);
            let Reconciliation::Remote { document, outcomes } = reconciliation else {
                return;
            };
            state.document = document;

            let now_ms = unix_millis_now();
            for outcome in outcomes {
                let field = outcome.field();
                let remote_value = event.document.field(field);
                state.writers.get_mut(field).observe_remote(remote_value);
                match outcome {
                    FieldOutcome::Applied { field, .. } => {
                        tracing::debug!("Applied remote {} to {}", field, self.document_id);
                        events.push(SessionEvent::RemoteApplied {
                            field,
                            writer: event.writer.clone(),
                        });
                    }
                    FieldOutcome::Conflict {
                        field,
                        local,
                        remote,
                    } => {
                        let editor = state
                            .presence
                            .get(self.document_id, &event.writer)
                            .map_or_else(
                                || UserProfile::new(event.writer.clone()),
                                |participant| participant.profile.clone(),
                            );
                        if let Some(conflict) =
                            state.conflicts.detect(field, &local, &remote, &editor, now_ms)
                        {
                            state.writers.get_mut(field).hold();
                            tracing::info!(
                                "Conflict on {} of {} with {}",
                                field,
                                self.document_id,
                                editor.display_name()
                            );
                            events.push(SessionEvent::ConflictDetected { conflict });
                        }
                    }
                    FieldOutcome::Converged { field } => {
                        tracing::debug!("Local {} already matches remote", field);
                    }
                }
            }
        }
        for event in events {
            self.emit(event);
        }
    }

    async fn handle_signal(&self, frame: &ChannelMessage) {
        let envelope = match SignalEnvelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::debug!("Dropping malformed {} frame: {}", frame.event, error);
                return;
            }
        };
        if envelope.sender_id() == &self.identity.id {
            return;
        }

        let (event, answer_join) = {
            let mut state = lock(&self.state);
            if !state.is_editing {
                return;
            }
            let now = Instant::now();
            let sender = &envelope.sender;
            let change = match envelope.signal {
                Signal::Join | Signal::Heartbeat => {
                    state.presence.heartbeat(self.document_id, sender, now)
                }
                Signal::Leave => state.presence.leave(self.document_id, &sender.id),
                Signal::CursorMove { offset } => {
                    state
                        .presence
                        .record_cursor(self.document_id, sender, offset, now)
                }
                Signal::UserTyping => state.presence.record_typing(self.document_id, sender, now),
            };
            let event = match change {
                PresenceChange::Joined(user) => Some(SessionEvent::ParticipantJoined {
                    user,
                    display_name: sender.display_name().to_string(),
                }),
                PresenceChange::Left(user) => Some(SessionEvent::ParticipantLeft { user }),
                PresenceChange::CursorMoved { user, offset } => {
                    Some(SessionEvent::CursorMoved { user, offset })
                }
                PresenceChange::TypingStarted(user) => Some(SessionEvent::TypingStarted { user }),
                PresenceChange::TypingStopped(user) => Some(SessionEvent::TypingStopped { user }),
                PresenceChange::Refreshed(_) | PresenceChange::Unchanged => None,
            };
            (event, envelope.signal == Signal::Join)
        };

        if let Some(event) = event {
            self.emit(event);
        }
        if answer_join {
            // Let the newcomer see us without waiting a heartbeat interval.
            self.broadcaster.heartbeat(self.document_id).await;
        }
    }

    async fn shutdown(&self) {
        let (fields, was_editing) = {
            let mut state = lock(&self.state);
            state.closed = true;
            let fields: Vec<(Field, String)> = match self.config.close_behavior {
                CloseBehavior::Flush => {
                    if !state.conflicts.is_empty() {
                        tracing::warn!(
                            "Flushing {} with {} unresolved conflicts",
                            self.document_id,
                            state.conflicts.list().len()
                        );
                    }
                    Field::ALL
                        .into_iter()
                        .filter_map(|field| {
                            state
                                .writers
                                .get_mut(field)
                                .flush()
                                .map(|content| (field, content))
                        })
                        .collect()
                }
                CloseBehavior::Discard => {
                    for field in Field::ALL {
                        if state.writers.get_mut(field).discard().is_some() {
                            tracing::info!("Discarded unsaved {} of {}", field, self.document_id);
                        }
                    }
                    Vec::new()
                }
            };
            (fields, state.is_editing)
        };

        if !fields.is_empty() {
            self.write(fields).await;
        }
        if was_editing {
            self.broadcaster.announce_leave(self.document_id).await;
        }

        let mut state = lock(&self.state);
        state.is_editing = false;
        state.presence.clear(self.document_id);
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Receive from an optional subscription; an absent one never yields
async fn recv_from<T: Clone>(
    rx: &mut Option<broadcast::Receiver<T>>,
) -> std::result::Result<T, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

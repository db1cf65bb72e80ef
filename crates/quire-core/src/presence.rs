//! Presence tracking for documents being edited.
//!
//! Holds the ephemeral roster of remote participants per document: who is
//! here, where their cursor is, and whether they are typing. Liveness is
//! heartbeat based; participants not heard from within the presence timeout
//! are pruned. Typing indicators expire after a fixed quiet period and are
//! reset, never stacked, by each new typing signal.
//!
//! Every mutation returns a [`PresenceChange`] so the caller can fan the
//! change out to its observers.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::models::{DocumentId, EditingParticipant, ParticipantView, UserId, UserProfile};

/// Observable result of a roster mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    Joined(UserId),
    Left(UserId),
    CursorMoved { user: UserId, offset: usize },
    TypingStarted(UserId),
    TypingStopped(UserId),
    Refreshed(UserId),
    Unchanged,
}

/// Roster of remote participants, keyed by document
#[derive(Debug)]
pub struct PresenceTracker {
    documents: HashMap<DocumentId, HashMap<UserId, EditingParticipant>>,
    presence_timeout: Duration,
    typing_expiry: Duration,
}

impl PresenceTracker {
    #[must_use]
    pub fn new(presence_timeout: Duration, typing_expiry: Duration) -> Self {
        Self {
            documents: HashMap::new(),
            presence_timeout,
            typing_expiry,
        }
    }

    /// Register a participant as viewing a document
    pub fn join(
        &mut self,
        document_id: DocumentId,
        profile: &UserProfile,
        now: Instant,
    ) -> PresenceChange {
        let roster = self.documents.entry(document_id).or_default();
        if let Some(existing) = roster.get_mut(&profile.id) {
            existing.touch(profile, now);
            return PresenceChange::Refreshed(profile.id.clone());
        }

        roster.insert(
            profile.id.clone(),
            EditingParticipant::new(profile.clone(), now),
        );
        tracing::debug!("{} joined document {}", profile.display_name(), document_id);
        PresenceChange::Joined(profile.id.clone())
    }

    /// Remove a participant from a document
    pub fn leave(&mut self, document_id: DocumentId, user: &UserId) -> PresenceChange {
        let Some(roster) = self.documents.get_mut(&document_id) else {
            return PresenceChange::Unchanged;
        };
        let removed = roster.remove(user);
        if roster.is_empty() {
            self.documents.remove(&document_id);
        }
        if removed.is_some() {
            tracing::debug!("{} left document {}", user, document_id);
            PresenceChange::Left(user.clone())
        } else {
            PresenceChange::Unchanged
        }
    }

    /// Re-announcement from a participant; joins them if unknown
    pub fn heartbeat(
        &mut self,
        document_id: DocumentId,
        profile: &UserProfile,
        now: Instant,
    ) -> PresenceChange {
        self.join(document_id, profile, now)
    }

    /// Store the sender's cursor offset unconditionally (last-write-wins)
    pub fn record_cursor(
        &mut self,
        document_id: DocumentId,
        profile: &UserProfile,
        offset: usize,
        now: Instant,
    ) -> PresenceChange {
        let participant = self.upsert(document_id, profile, now);
        participant.cursor_position = Some(offset);
        PresenceChange::CursorMoved {
            user: profile.id.clone(),
            offset,
        }
    }

    /// Mark the sender as typing and restart their expiry window
    pub fn record_typing(
        &mut self,
        document_id: DocumentId,
        profile: &UserProfile,
        now: Instant,
    ) -> PresenceChange {
        let expiry = self.typing_expiry;
        let participant = self.upsert(document_id, profile, now);
        let was_typing = participant.is_typing(now);
        participant.typing_until = Some(now + expiry);
        if was_typing {
            PresenceChange::Refreshed(profile.id.clone())
        } else {
            PresenceChange::TypingStarted(profile.id.clone())
        }
    }

    /// Clear typing indicators whose quiet period has elapsed
    pub fn expire_typing(&mut self, now: Instant) -> Vec<(DocumentId, UserId)> {
        let mut stopped = Vec::new();
        for (document_id, roster) in &mut self.documents {
            for participant in roster.values_mut() {
                if participant
                    .typing_until
                    .is_some_and(|deadline| deadline <= now)
                {
                    participant.typing_until = None;
                    stopped.push((*document_id, participant.id().clone()));
                }
            }
        }
        stopped
    }

    /// Drop participants not heard from within the presence timeout
    pub fn prune(&mut self, now: Instant) -> Vec<(DocumentId, UserId)> {
        let timeout = self.presence_timeout;
        let mut pruned = Vec::new();
        for (document_id, roster) in &mut self.documents {
            roster.retain(|user, participant| {
                let alive = now.saturating_duration_since(participant.last_seen) < timeout;
                if !alive {
                    pruned.push((*document_id, user.clone()));
                }
                alive
            });
        }
        self.documents.retain(|_, roster| !roster.is_empty());
        for (document_id, user) in &pruned {
            tracing::debug!("Pruned stale participant {} from {}", user, document_id);
        }
        pruned
    }

    /// Current live set for a document, ordered by join time
    #[must_use]
    pub fn list(&self, document_id: DocumentId, now: Instant) -> Vec<ParticipantView> {
        let Some(roster) = self.documents.get(&document_id) else {
            return Vec::new();
        };
        let mut participants = roster.values().collect::<Vec<_>>();
        participants.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.id().cmp(b.id()))
        });
        participants
            .into_iter()
            .map(|participant| participant.view(now))
            .collect()
    }

    #[must_use]
    pub fn get(&self, document_id: DocumentId, user: &UserId) -> Option<&EditingParticipant> {
        self.documents.get(&document_id)?.get(user)
    }

    /// Forget everyone on a document
    pub fn clear(&mut self, document_id: DocumentId) -> Vec<UserId> {
        self.documents
            .remove(&document_id)
            .map(|roster| roster.into_keys().collect())
            .unwrap_or_default()
    }

    /// Earliest instant at which a typing indicator expires or a participant
    /// becomes stale
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.documents
            .values()
            .flat_map(HashMap::values)
            .flat_map(|participant| {
                [
                    participant.typing_until,
                    Some(participant.last_seen + self.presence_timeout),
                ]
            })
            .flatten()
            .min()
    }

    fn upsert(
        &mut self,
        document_id: DocumentId,
        profile: &UserProfile,
        now: Instant,
    ) -> &mut EditingParticipant {
        let participant = self
            .documents
            .entry(document_id)
            .or_default()
            .entry(profile.id.clone())
            .or_insert_with(|| EditingParticipant::new(profile.clone(), now));
        participant.touch(profile, now);
        participant
    }
}

/// "No one else editing" or "N editing"
#[must_use]
pub fn editing_summary(participants: &[ParticipantView]) -> String {
    if participants.is_empty() {
        "No one else editing".to_string()
    } else {
        format!("{} editing", participants.len())
    }
}

/// "Alice, Bob typing..." when anyone is typing
#[must_use]
pub fn typing_summary(participants: &[ParticipantView]) -> Option<String> {
    let typing = participants
        .iter()
        .filter(|participant| participant.is_typing)
        .map(|participant| participant.display_name.as_str())
        .collect::<Vec<_>>();
    if typing.is_empty() {
        None
    } else {
        Some(format!("{} typing...", typing.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(45);
    const TYPING: Duration = Duration::from_secs(2);

    fn tracker() -> PresenceTracker {
        PresenceTracker::new(TIMEOUT, TYPING)
    }

    fn profile(id: &str, name: &str) -> UserProfile {
        UserProfile::new(id).with_full_name(name)
    }

    #[test]
    fn join_leave_list() {
        let mut presence = tracker();
        let doc = DocumentId::new();
        let now = Instant::now();

        assert_eq!(
            presence.join(doc, &profile("a", "Alice"), now),
            PresenceChange::Joined(UserId::new("a"))
        );
        presence.join(doc, &profile("b", "Bob"), now);
        assert_eq!(presence.list(doc, now).len(), 2);

        assert_eq!(
            presence.leave(doc, &UserId::new("a")),
            PresenceChange::Left(UserId::new("a"))
        );
        assert_eq!(presence.leave(doc, &UserId::new("a")), PresenceChange::Unchanged);
        let remaining = presence.list(doc, now);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].display_name, "Bob");
    }

    #[test]
    fn rosters_are_isolated_per_document() {
        let mut presence = tracker();
        let (doc_a, doc_b) = (DocumentId::new(), DocumentId::new());
        let now = Instant::now();

        presence.join(doc_a, &profile("a", "Alice"), now);
        assert_eq!(presence.list(doc_a, now).len(), 1);
        assert!(presence.list(doc_b, now).is_empty());
    }

    #[test]
    fn rejoin_refreshes_instead_of_duplicating() {
        let mut presence = tracker();
        let doc = DocumentId::new();
        let now = Instant::now();

        presence.join(doc, &profile("a", "Alice"), now);
        let change = presence.join(doc, &profile("a", "Alice L."), now + Duration::from_secs(1));
        assert_eq!(change, PresenceChange::Refreshed(UserId::new("a")));
        let roster = presence.list(doc, now);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].display_name, "Alice L.");
    }

    #[test]
    fn cursor_is_last_write_wins_and_joins_unknown_sender() {
        let mut presence = tracker();
        let doc = DocumentId::new();
        let now = Instant::now();
        let bob = profile("b", "Bob");

        presence.record_cursor(doc, &bob, 10, now);
        presence.record_cursor(doc, &bob, 4, now);

        let participant = presence.get(doc, &bob.id).unwrap();
        assert_eq!(participant.cursor_position, Some(4));
    }

    #[test]
    fn typing_expires_after_quiet_period() {
        let mut presence = tracker();
        let doc = DocumentId::new();
        let t0 = Instant::now();
        let bob = profile("b", "Bob");

        assert_eq!(
            presence.record_typing(doc, &bob, t0),
            PresenceChange::TypingStarted(bob.id.clone())
        );
        assert!(presence.list(doc, t0 + Duration::from_millis(1999))[0].is_typing);
        assert!(presence
            .expire_typing(t0 + Duration::from_millis(1999))
            .is_empty());

        let stopped = presence.expire_typing(t0 + TYPING);
        assert_eq!(stopped, vec![(doc, bob.id.clone())]);
        assert!(!presence.list(doc, t0 + TYPING)[0].is_typing);
    }

    #[test]
    fn typing_timer_resets_not_stacks() {
        let mut presence = tracker();
        let doc = DocumentId::new();
        let t0 = Instant::now();
        let bob = profile("b", "Bob");

        presence.record_typing(doc, &bob, t0);
        let change = presence.record_typing(doc, &bob, t0 + Duration::from_millis(1500));
        assert_eq!(change, PresenceChange::Refreshed(bob.id.clone()));

        // Original deadline passes; the reset one has not.
        assert!(presence.expire_typing(t0 + TYPING).is_empty());
        assert_eq!(
            presence.get(doc, &bob.id).unwrap().typing_until,
            Some(t0 + Duration::from_millis(3500))
        );
        assert_eq!(presence.expire_typing(t0 + Duration::from_millis(3500)).len(), 1);
    }

    #[test]
    fn prune_drops_silent_participants() {
        let mut presence = tracker();
        let doc = DocumentId::new();
        let t0 = Instant::now();

        presence.join(doc, &profile("a", "Alice"), t0);
        presence.join(doc, &profile("b", "Bob"), t0);
        presence.heartbeat(doc, &profile("b", "Bob"), t0 + Duration::from_secs(30));

        let pruned = presence.prune(t0 + TIMEOUT);
        assert_eq!(pruned, vec![(doc, UserId::new("a"))]);
        assert_eq!(presence.list(doc, t0 + TIMEOUT).len(), 1);
    }

    #[test]
    fn next_deadline_prefers_earliest_typing_expiry() {
        let mut presence = tracker();
        let doc = DocumentId::new();
        let t0 = Instant::now();

        assert_eq!(presence.next_deadline(), None);
        presence.join(doc, &profile("a", "Alice"), t0);
        assert_eq!(presence.next_deadline(), Some(t0 + TIMEOUT));
        presence.record_typing(doc, &profile("a", "Alice"), t0);
        assert_eq!(presence.next_deadline(), Some(t0 + TYPING));
    }

    #[test]
    fn clear_returns_everyone() {
        let mut presence = tracker();
        let doc = DocumentId::new();
        let now = Instant::now();
        presence.join(doc, &profile("a", "Alice"), now);
        presence.join(doc, &profile("b", "Bob"), now);

        let mut cleared = presence.clear(doc);
        cleared.sort();
        assert_eq!(cleared, vec![UserId::new("a"), UserId::new("b")]);
        assert!(presence.list(doc, now).is_empty());
    }

    #[test]
    fn summaries_match_status_bar_copy() {
        let mut presence = tracker();
        let doc = DocumentId::new();
        let now = Instant::now();
        assert_eq!(editing_summary(&presence.list(doc, now)), "No one else editing");

        presence.join(doc, &profile("a", "Alice"), now);
        presence.record_typing(doc, &profile("b", "Bob"), now);
        let roster = presence.list(doc, now);
        assert_eq!(editing_summary(&roster), "2 editing");
        assert_eq!(typing_summary(&roster).as_deref(), Some("Bob typing..."));
    }
}

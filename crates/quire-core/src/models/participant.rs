//! Editing participant model

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::{participant_color, UserId, UserProfile};

/// A remote user currently viewing or editing a document.
///
/// Lives only in the in-memory session state of each client. The typing flag
/// is derived from `typing_until`; nothing here is authoritative.
#[derive(Debug, Clone)]
pub struct EditingParticipant {
    pub profile: UserProfile,
    /// Last known cursor offset (last-write-wins per sender)
    pub cursor_position: Option<usize>,
    /// Typing indicator stays on until this instant
    pub typing_until: Option<Instant>,
    /// Monotonic instant of the last signal from this participant
    pub last_seen: Instant,
    /// Unix ms of the last signal, for display
    pub last_seen_at: i64,
    /// Unix ms when the participant was first seen on this document
    pub joined_at: i64,
}

impl EditingParticipant {
    #[must_use]
    pub fn new(profile: UserProfile, now: Instant) -> Self {
        let now_ms = chrono::Utc::now().timestamp_millis();
        Self {
            profile,
            cursor_position: None,
            typing_until: None,
            last_seen: now,
            last_seen_at: now_ms,
            joined_at: now_ms,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &UserId {
        &self.profile.id
    }

    /// Whether the typing indicator is still live at `now`
    #[must_use]
    pub fn is_typing(&self, now: Instant) -> bool {
        self.typing_until.is_some_and(|deadline| deadline > now)
    }

    /// Record that a signal arrived; profile metadata is refreshed from it
    pub fn touch(&mut self, profile: &UserProfile, now: Instant) {
        if &self.profile != profile {
            self.profile = profile.clone();
        }
        self.last_seen = now;
        self.last_seen_at = chrono::Utc::now().timestamp_millis();
    }

    /// Serializable view for UIs
    #[must_use]
    pub fn view(&self, now: Instant) -> ParticipantView {
        ParticipantView {
            id: self.profile.id.clone(),
            display_name: self.profile.display_name().to_string(),
            email: self.profile.email.clone(),
            full_name: self.profile.full_name.clone(),
            avatar_url: self.profile.avatar_url.clone(),
            color: participant_color(&self.profile.id).to_string(),
            cursor_position: self.cursor_position,
            is_typing: self.is_typing(now),
            last_seen_at: self.last_seen_at,
        }
    }
}

/// Snapshot of a participant as surfaced to UIs (`editingUsers`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub color: String,
    pub cursor_position: Option<usize>,
    pub is_typing: bool,
    pub last_seen_at: i64,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn typing_is_derived_from_deadline() {
        let now = Instant::now();
        let mut participant = EditingParticipant::new(UserProfile::new("u1"), now);
        assert!(!participant.is_typing(now));

        participant.typing_until = Some(now + Duration::from_secs(2));
        assert!(participant.is_typing(now + Duration::from_secs(1)));
        assert!(!participant.is_typing(now + Duration::from_secs(2)));
    }

    #[test]
    fn touch_refreshes_profile() {
        let now = Instant::now();
        let mut participant = EditingParticipant::new(UserProfile::new("u1"), now);
        let renamed = UserProfile::new("u1").with_full_name("Ada");
        participant.touch(&renamed, now + Duration::from_secs(5));

        assert_eq!(participant.profile.display_name(), "Ada");
        assert_eq!(participant.last_seen, now + Duration::from_secs(5));
    }

    #[test]
    fn view_carries_color_and_name() {
        let now = Instant::now();
        let participant =
            EditingParticipant::new(UserProfile::new("u1").with_email("u1@example.com"), now);
        let view = participant.view(now);
        assert_eq!(view.display_name, "u1@example.com");
        assert!(view.color.starts_with('#'));
        assert!(!view.is_typing);
    }
}

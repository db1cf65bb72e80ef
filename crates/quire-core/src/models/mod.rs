//! Data models for Quire

mod change;
mod conflict;
mod document;
mod participant;
mod user;

pub use change::ChangeEvent;
pub use conflict::{Conflict, ConflictId, Resolution};
pub use document::{normalize_tags, Document, DocumentId, DocumentPatch, Field};
pub use participant::{EditingParticipant, ParticipantView};
pub use user::{participant_color, UserId, UserProfile};

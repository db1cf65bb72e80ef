//! quire-core - Core library for Quire
//!
//! Collaborative editing of shared notes: presence and typing indicators
//! over a realtime channel, debounced persistence to a backing store,
//! reconciliation of remote changes, and field-level conflict resolution.
//! UIs talk to a [`CollabSession`] opened from an [`AppContext`].

pub mod broadcast;
pub mod channel;
pub mod config;
pub mod conflict;
pub mod context;
pub mod error;
pub mod listener;
pub mod models;
pub mod presence;
pub mod protocol;
pub mod session;
pub mod store;
pub mod util;
pub mod writer;

pub use config::{CloseBehavior, CollabConfig, IdentityConfig};
pub use context::AppContext;
pub use error::{Error, Result};
pub use models::{
    ChangeEvent, Conflict, ConflictId, Document, DocumentId, DocumentPatch, Field,
    ParticipantView, Resolution, UserId, UserProfile,
};
pub use session::{CollabSession, SessionEvent, SessionSnapshot};
pub use writer::SaveStatus;

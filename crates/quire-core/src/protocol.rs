//! Ephemeral broadcast signals exchanged on a document's realtime topic.
//!
//! Every frame is a named event with a JSON payload. The payload always
//! carries the sender's `user_id` (for echo suppression) and `user_info`
//! (so presence renders without a secondary lookup). Frames are validated
//! here, at the subscriber boundary; anything malformed is rejected with a
//! [`ProtocolError`] and dropped by the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{UserId, UserProfile};
use crate::util::normalize_text_option;

pub const EVENT_CURSOR_MOVE: &str = "cursor-move";
pub const EVENT_USER_TYPING: &str = "user-typing";
pub const EVENT_PRESENCE_JOIN: &str = "presence-join";
pub const EVENT_PRESENCE_LEAVE: &str = "presence-leave";
pub const EVENT_PRESENCE_HEARTBEAT: &str = "presence-heartbeat";

/// Raw frame as carried by the realtime channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub event: String,
    pub payload: Value,
}

impl ChannelMessage {
    #[must_use]
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Signal kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    CursorMove { offset: usize },
    UserTyping,
    Join,
    Leave,
    Heartbeat,
}

impl Signal {
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::CursorMove { .. } => EVENT_CURSOR_MOVE,
            Self::UserTyping => EVENT_USER_TYPING,
            Self::Join => EVENT_PRESENCE_JOIN,
            Self::Leave => EVENT_PRESENCE_LEAVE,
            Self::Heartbeat => EVENT_PRESENCE_HEARTBEAT,
        }
    }
}

/// A validated signal together with its sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEnvelope {
    pub sender: UserProfile,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error("payload is not a JSON object: {0}")]
    InvalidPayload(String),
    #[error("payload is missing user_id")]
    MissingSender,
    #[error("payload is missing user_info")]
    MissingUserInfo,
    #[error("cursor-move payload has no valid cursor_position")]
    InvalidCursor,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireUserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePayload {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user_info: Option<WireUserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cursor_position: Option<i64>,
}

impl SignalEnvelope {
    #[must_use]
    pub const fn new(sender: UserProfile, signal: Signal) -> Self {
        Self { sender, signal }
    }

    #[must_use]
    pub const fn sender_id(&self) -> &UserId {
        &self.sender.id
    }

    /// Encode into a channel frame
    #[must_use]
    pub fn encode(&self) -> ChannelMessage {
        let cursor_position = match self.signal {
            Signal::CursorMove { offset } => Some(i64::try_from(offset).unwrap_or(i64::MAX)),
            _ => None,
        };
        let payload = WirePayload {
            user_id: Some(self.sender.id.to_string()),
            user_info: Some(WireUserInfo {
                email: self.sender.email.clone(),
                full_name: self.sender.full_name.clone(),
                avatar_url: self.sender.avatar_url.clone(),
            }),
            cursor_position,
        };
        let payload = serde_json::to_value(payload).unwrap_or(Value::Null);
        ChannelMessage::new(self.signal.event_name(), payload)
    }

    /// Validate and decode a channel frame
    pub fn decode(message: &ChannelMessage) -> Result<Self, ProtocolError> {
        if !message.payload.is_object() {
            return Err(ProtocolError::InvalidPayload(message.payload.to_string()));
        }
        let payload: WirePayload = serde_json::from_value(message.payload.clone())
            .map_err(|error| ProtocolError::InvalidPayload(error.to_string()))?;

        let user_id =
            normalize_text_option(payload.user_id).ok_or(ProtocolError::MissingSender)?;
        let info = payload.user_info.ok_or(ProtocolError::MissingUserInfo)?;

        let signal = match message.event.as_str() {
            EVENT_CURSOR_MOVE => {
                let offset = payload
                    .cursor_position
                    .and_then(|position| usize::try_from(position).ok())
                    .ok_or(ProtocolError::InvalidCursor)?;
                Signal::CursorMove { offset }
            }
            EVENT_USER_TYPING => Signal::UserTyping,
            EVENT_PRESENCE_JOIN => Signal::Join,
            EVENT_PRESENCE_LEAVE => Signal::Leave,
            EVENT_PRESENCE_HEARTBEAT => Signal::Heartbeat,
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };

        let sender = UserProfile {
            id: UserId::new(user_id),
            email: normalize_text_option(info.email),
            full_name: normalize_text_option(info.full_name),
            avatar_url: normalize_text_option(info.avatar_url),
        };
        Ok(Self { sender, signal })
    }
}

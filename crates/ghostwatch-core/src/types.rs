use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Suffix the platform uses for multi-party conversation ids.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Whether a conversation id names a multi-party conversation.
pub fn is_group_chat(chat_id: &str) -> bool {
    chat_id.ends_with(GROUP_SUFFIX)
}

/// User part of a platform identity (`254700000001@s.whatsapp.net` → `254700000001`).
pub fn user_part(identity: &str) -> &str {
    identity.split('@').next().unwrap_or(identity)
}

/// Account number of the agent's own identity, without device suffix
/// (`254700000001:12@s.whatsapp.net` → `254700000001`).
pub fn account_number(identity: &str) -> &str {
    let user = user_part(identity);
    user.split(':').next().unwrap_or(user)
}

/// Kind of media a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Sticker,
}

impl MediaKind {
    /// File extension used when the media is materialized to disk.
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Sticker => "webp",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Sticker => "sticker",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media referenced by an inbound message. `handle` is opaque to the guard
/// and only meaningful to the [`MediaSource`](crate::MediaSource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub handle: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Body of an inbound message as delivered by the platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain conversation text.
    Text { text: String },
    /// Extended text (quoted reply, link preview).
    ExtendedText {
        text: String,
        #[serde(default)]
        quoted_id: Option<String>,
    },
    /// Media with optional caption.
    Media(MediaAttachment),
    /// Protocol/system message. Never archived.
    Protocol,
}

impl MessageContent {
    /// Plain text carried by the message: direct text, extended text, or caption.
    pub fn text(&self) -> &str {
        match self {
            MessageContent::Text { text } | MessageContent::ExtendedText { text, .. } => text,
            MessageContent::Media(media) => media.caption.as_deref().unwrap_or(""),
            MessageContent::Protocol => "",
        }
    }

    pub fn media(&self) -> Option<&MediaAttachment> {
        match self {
            MessageContent::Media(media) => Some(media),
            _ => None,
        }
    }
}

/// An inbound message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message id.
    pub id: String,
    /// Conversation the message was posted in.
    pub chat_id: String,
    /// Author identity. Equal to `chat_id` in one-to-one conversations.
    pub sender_id: String,
    /// Sent from the agent's own account.
    #[serde(default)]
    pub from_me: bool,
    pub content: MessageContent,
}

impl InboundMessage {
    pub fn is_group(&self) -> bool {
        is_group_chat(&self.chat_id)
    }
}

/// A deletion (revocation) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEvent {
    /// Id of the revoked message, if the platform resolved one.
    #[serde(default)]
    pub revoked_message_id: Option<String>,
    /// Identity of whoever performed the deletion, if known.
    #[serde(default)]
    pub deleter_id: Option<String>,
    pub chat_id: String,
}

use std::path::PathBuf;

use crate::types::{InboundMessage, MediaKind};

/// Media materialized in the vault for an archived message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMedia {
    pub kind: MediaKind,
    pub path: PathBuf,
}

/// Cached representation of a message, kept only to support a later
/// revocation match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMessage {
    /// Platform message id (archive key).
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    /// Extracted text, possibly empty when the entry is media-only.
    pub text: String,
    pub media: Option<ArchivedMedia>,
    /// When the message was captured (Unix ms).
    pub captured_at: u64,
}

impl ArchivedMessage {
    /// Text-only entry for an inbound message. `None` when the message
    /// carries no text; a media-only entry is created once the media lands.
    pub fn from_text(msg: &InboundMessage, now: u64) -> Option<Self> {
        let text = msg.content.text();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            id: msg.id.clone(),
            chat_id: msg.chat_id.clone(),
            sender_id: msg.sender_id.clone(),
            text: text.to_string(),
            media: None,
            captured_at: now,
        })
    }

    /// Whether the entry has outlived `ttl_ms`.
    pub fn is_expired(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.captured_at) >= ttl_ms
    }

    pub fn media_path(&self) -> Option<&PathBuf> {
        self.media.as_ref().map(|m| &m.path)
    }
}

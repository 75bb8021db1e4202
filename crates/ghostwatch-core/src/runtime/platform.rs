use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::{MediaAttachment, MediaKind};

/// A text message to post into a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundText {
    pub text: String,
    /// Identities the platform should render as mentions.
    #[serde(default)]
    pub mentions: Vec<String>,
}

impl OutboundText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mentions: Vec::new(),
        }
    }
}

/// A media file to post into a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMedia {
    pub kind: MediaKind,
    pub path: PathBuf,
    pub caption: String,
    #[serde(default)]
    pub mentions: Vec<String>,
}

/// Send capability of the platform adapter.
///
/// In production: the messaging socket. In tests: a recorder.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: &str, message: &OutboundText) -> Result<(), String>;

    async fn send_media(&self, chat_id: &str, media: &OutboundMedia) -> Result<(), String>;
}

/// Media download capability of the platform adapter.
#[async_trait::async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, media: &MediaAttachment) -> Result<Bytes, String>;
}

// ── Mocks (tests) ───────────────────────────────────────────────────

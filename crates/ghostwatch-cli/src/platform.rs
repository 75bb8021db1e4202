//! Stand-in platform adapter: sends become stdout lines, media handles are
//! local file paths.

use bytes::Bytes;
use ghostwatch_core::{MediaAttachment, MediaSource, Messenger, OutboundMedia, OutboundText};

use crate::lines::{emit, OutputLine};

pub struct StdoutMessenger;

#[async_trait::async_trait]
impl Messenger for StdoutMessenger {
    async fn send_text(&self, chat_id: &str, message: &OutboundText) -> Result<(), String> {
        emit(&OutputLine::SendText {
            chat_id,
            text: &message.text,
            mentions: &message.mentions,
        });
        Ok(())
    }

    async fn send_media(&self, chat_id: &str, media: &OutboundMedia) -> Result<(), String> {
        emit(&OutputLine::SendMedia {
            chat_id,
            kind: media.kind,
            path: &media.path,
            caption: &media.caption,
            mentions: &media.mentions,
        });
        Ok(())
    }
}

/// Reads the media handle as a path on the local filesystem.
pub struct FileMediaSource;

#[async_trait::async_trait]
impl MediaSource for FileMediaSource {
    async fn fetch(&self, media: &MediaAttachment) -> Result<Bytes, String> {
        tokio::fs::read(&media.handle)
            .await
            .map(Bytes::from)
            .map_err(|e| format!("{}: {e}", media.handle))
    }
}

use std::path::PathBuf;

use crate::revocation::Notification;
use crate::types::{InboundMessage, MediaAttachment};

use super::{GuardEvent, OutboundText};

/// A media download the loop wants done off the event path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub message_id: String,
    pub chat_id: String,
    pub sender_id: String,
    /// A text entry was already archived for this message.
    pub had_text: bool,
    /// Arrival time of the message (Unix ms).
    pub captured_at: u64,
    pub attachment: MediaAttachment,
}

/// Completion of a [`CaptureRequest`], fed back into the loop.
#[derive(Debug)]
pub struct CaptureResult {
    pub request: CaptureRequest,
    pub outcome: Result<PathBuf, String>,
}

/// Intent produced by the pure logic of `GuardState`.
///
/// Every `handle_*` / `tick_*` method returns `Vec<GuardEffect>`; the
/// executor carries them out against the platform and the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEffect {
    /// Post text into a conversation.
    SendText {
        chat_id: String,
        message: OutboundText,
    },

    /// Post a revocation notification: the text, then the archived media
    /// if its file still exists (a failed upload posts a warning instead),
    /// then delete the media file.
    Notify(Notification),

    /// Best-effort delete of a vault file.
    RemoveFile(PathBuf),

    /// Download media in the background and report back.
    CaptureMedia(CaptureRequest),

    /// Hand an admitted message to the command dispatcher.
    Dispatch(InboundMessage),

    /// Emit an observation event.
    Emit(GuardEvent),
}

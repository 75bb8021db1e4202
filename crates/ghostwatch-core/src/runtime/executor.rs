//! Effect executor: the only place that touches the platform and the vault.
//!
//! Takes the `GuardEffect`s produced by `GuardState` and carries them out:
//! - Dispatch / Emit -> `try_send` on the app channels (never blocks the loop)
//! - CaptureMedia -> spawned download + write, result fed back to the loop
//! - SendText / Notify / RemoveFile -> one spawned task per batch, in order
//!
//! Spawned tasks are tracked so shutdown can wait for them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::GuardError;
use crate::metrics::GuardMetrics;
use crate::revocation::Notification;
use crate::types::InboundMessage;
use crate::vault::MediaVault;

use super::effect::{CaptureRequest, CaptureResult, GuardEffect};
use super::{GuardEvent, MediaSource, Messenger, OutboundText};

pub(super) struct Executor<M, S> {
    messenger: Arc<M>,
    source: Arc<S>,
    vault: MediaVault,
    dispatch_tx: mpsc::Sender<InboundMessage>,
    event_tx: mpsc::Sender<GuardEvent>,
    capture_tx: mpsc::Sender<CaptureResult>,
    metrics: Arc<GuardMetrics>,
    tasks: JoinSet<()>,
}

impl<M, S> Executor<M, S>
where
    M: Messenger + 'static,
    S: MediaSource + 'static,
{
    pub(super) fn new(
        messenger: Arc<M>,
        source: Arc<S>,
        vault: MediaVault,
        dispatch_tx: mpsc::Sender<InboundMessage>,
        event_tx: mpsc::Sender<GuardEvent>,
        capture_tx: mpsc::Sender<CaptureResult>,
        metrics: Arc<GuardMetrics>,
    ) -> Self {
        Self {
            messenger,
            source,
            vault,
            dispatch_tx,
            event_tx,
            capture_tx,
            metrics,
            tasks: JoinSet::new(),
        }
    }

    /// Execute a batch of effects without waiting on any platform call.
    pub(super) fn execute(&mut self, effects: Vec<GuardEffect>) {
        self.reap_finished();

        let mut io = Vec::new();
        for effect in effects {
            match effect {
                GuardEffect::Dispatch(msg) => {
                    if let Err(e) = self.dispatch_tx.try_send(msg) {
                        tracing::warn!("executor: dispatch channel unavailable: {e}");
                    }
                }
                GuardEffect::Emit(event) => {
                    // Observation only: a full channel drops the event.
                    let _ = self.event_tx.try_send(event);
                }
                GuardEffect::CaptureMedia(request) => self.spawn_capture(request),
                other => io.push(other),
            }
        }
        if io.is_empty() {
            return;
        }

        let messenger = self.messenger.clone();
        let event_tx = self.event_tx.clone();
        let metrics = self.metrics.clone();
        self.tasks.spawn(async move {
            for effect in io {
                run_io(effect, messenger.as_ref(), &event_tx, &metrics).await;
            }
        });
    }

    /// Number of spawned tasks not yet joined.
    pub(super) fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next spawned task. `None` once nothing is in flight.
    pub(super) async fn join_next(&mut self) -> Option<()> {
        let joined = self.tasks.join_next().await?;
        if let Err(e) = joined {
            tracing::warn!("executor: task failed: {e}");
        }
        Some(())
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(e) = joined {
                tracing::warn!("executor: task failed: {e}");
            }
        }
    }

    fn spawn_capture(&mut self, request: CaptureRequest) {
        let source = self.source.clone();
        let vault = self.vault.clone();
        let capture_tx = self.capture_tx.clone();
        self.tasks.spawn(async move {
            let outcome = vault
                .persist(source.as_ref(), &request.attachment, &request.message_id)
                .await
                .map_err(|e| e.to_string());
            if capture_tx
                .send(CaptureResult { request, outcome })
                .await
                .is_err()
            {
                tracing::debug!("executor: runtime gone before capture completed");
            }
        });
    }
}

async fn run_io<M: Messenger + ?Sized>(
    effect: GuardEffect,
    messenger: &M,
    event_tx: &mpsc::Sender<GuardEvent>,
    metrics: &GuardMetrics,
) {
    match effect {
        GuardEffect::SendText { chat_id, message } => {
            if let Err(e) = messenger.send_text(&chat_id, &message).await {
                tracing::warn!(chat_id, "executor: send failed: {e}");
                let _ = event_tx.try_send(GuardEvent::Error {
                    description: format!("send to {chat_id} failed: {e}"),
                });
            }
        }
        GuardEffect::Notify(notification) => {
            notify(notification, messenger, event_tx, metrics).await;
        }
        GuardEffect::RemoveFile(path) => remove_file(&path, event_tx).await,
        GuardEffect::CaptureMedia(_) | GuardEffect::Dispatch(_) | GuardEffect::Emit(_) => {}
    }
}

/// Post the notification text, re-upload the media if its file survived,
/// then delete the file whatever happened.
async fn notify<M: Messenger + ?Sized>(
    notification: Notification,
    messenger: &M,
    event_tx: &mpsc::Sender<GuardEvent>,
    metrics: &GuardMetrics,
) {
    let Notification {
        chat_id,
        text,
        media,
    } = notification;

    match messenger.send_text(&chat_id, &text).await {
        Ok(()) => {
            metrics.notifications_sent.inc();
            let _ = event_tx.try_send(GuardEvent::NotificationSent {
                chat_id: chat_id.clone(),
            });
        }
        Err(e) => {
            tracing::warn!(chat_id, "executor: notification send failed: {e}");
            let _ = event_tx.try_send(GuardEvent::Error {
                description: format!("notification to {chat_id} failed: {e}"),
            });
        }
    }

    let Some(media) = media else {
        return;
    };
    if !MediaVault::exists(&media.path).await {
        tracing::debug!(path = %media.path.display(), "executor: media file gone, text-only notification");
        return;
    }

    match messenger.send_media(&chat_id, &media).await {
        Ok(()) => {
            let _ = event_tx.try_send(GuardEvent::MediaResent {
                chat_id: chat_id.clone(),
                path: media.path.clone(),
            });
        }
        Err(reason) => {
            let err = GuardError::MediaSend(reason.clone());
            tracing::warn!(chat_id, kind = %media.kind, "executor: {err}");
            let warning = OutboundText::plain(format!(
                "⚠️ Failed to send deleted {}. {reason}",
                media.kind
            ));
            if let Err(e) = messenger.send_text(&chat_id, &warning).await {
                tracing::warn!(chat_id, "executor: fallback warning failed: {e}");
            }
            let _ = event_tx.try_send(GuardEvent::MediaResendFailed { chat_id, reason });
        }
    }

    remove_file(&media.path, event_tx).await;
}

async fn remove_file(path: &std::path::Path, event_tx: &mpsc::Sender<GuardEvent>) {
    match MediaVault::remove(path).await {
        Ok(true) => {
            tracing::debug!(path = %path.display(), "executor: media file removed");
            let _ = event_tx.try_send(GuardEvent::FileRemoved {
                path: path.to_path_buf(),
            });
        }
        Ok(false) => {}
        Err(e) => tracing::warn!("executor: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::runtime::platform::mock::{MockMediaSource, MockMessenger, Sent};
    use crate::runtime::OutboundMedia;
    use crate::types::MediaKind;

    const GROUP: &str = "120363000000000001@g.us";

    fn notification(path: Option<PathBuf>) -> Notification {
        Notification {
            chat_id: GROUP.into(),
            text: OutboundText::plain("deleted"),
            media: path.map(|path| OutboundMedia {
                kind: MediaKind::Image,
                path,
                caption: "caption".into(),
                mentions: Vec::new(),
            }),
        }
    }

    #[tokio::test]
    async fn notify_resends_then_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("M3.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let messenger = MockMessenger::new();
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let metrics = GuardMetrics::new();

        notify(notification(Some(path.clone())), &messenger, &event_tx, &metrics).await;

        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], Sent::Text { message, .. } if message.text == "deleted"));
        assert!(matches!(&sent[1], Sent::Media { media, .. } if media.path == path));
        assert!(!path.exists());
        assert_eq!(metrics.notifications_sent.get(), 1);

        assert_eq!(
            event_rx.recv().await.unwrap(),
            GuardEvent::NotificationSent {
                chat_id: GROUP.into()
            }
        );
    }

    #[tokio::test]
    async fn notify_with_missing_file_sends_text_only() {
        let dir = tempfile::tempdir().unwrap();
        let messenger = MockMessenger::new();
        let (event_tx, _event_rx) = mpsc::channel(16);

        notify(
            notification(Some(dir.path().join("gone.jpg"))),
            &messenger,
            &event_tx,
            &GuardMetrics::new(),
        )
        .await;

        assert_eq!(messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_resend_posts_warning_and_still_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("M3.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let messenger = MockMessenger::new();
        messenger.set_fail_media(true);
        let (event_tx, _event_rx) = mpsc::channel(16);

        notify(notification(Some(path.clone())), &messenger, &event_tx, &GuardMetrics::new()).await;

        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        let Sent::Text { message, .. } = &sent[1] else {
            panic!("expected fallback text, got {sent:?}");
        };
        assert_eq!(
            message.text,
            "⚠️ Failed to send deleted image. mock: media upload rejected"
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn capture_result_is_fed_back() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockMediaSource::new();
        source.insert("h1", b"jpeg");
        let (dispatch_tx, _dispatch_rx) = mpsc::channel(4);
        let (event_tx, _event_rx) = mpsc::channel(4);
        let (capture_tx, mut capture_rx) = mpsc::channel(4);

        let mut executor = Executor::new(
            Arc::new(MockMessenger::new()),
            Arc::new(source),
            MediaVault::new(dir.path()),
            dispatch_tx,
            event_tx,
            capture_tx,
            Arc::new(GuardMetrics::new()),
        );
        executor.execute(vec![GuardEffect::CaptureMedia(CaptureRequest {
            message_id: "M3".into(),
            chat_id: GROUP.into(),
            sender_id: "254700000002@s.whatsapp.net".into(),
            had_text: false,
            captured_at: 0,
            attachment: crate::types::MediaAttachment {
                kind: MediaKind::Image,
                handle: "h1".into(),
                caption: None,
            },
        })]);

        let result = capture_rx.recv().await.unwrap();
        assert_eq!(result.outcome, Ok(dir.path().join("M3.jpg")));
        assert_eq!(std::fs::read(dir.path().join("M3.jpg")).unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn join_next_waits_for_spawned_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("M7.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let (dispatch_tx, _dispatch_rx) = mpsc::channel(4);
        let (event_tx, _event_rx) = mpsc::channel(4);
        let (capture_tx, _capture_rx) = mpsc::channel(4);
        let messenger = Arc::new(MockMessenger::new());

        let mut executor = Executor::new(
            messenger.clone(),
            Arc::new(MockMediaSource::new()),
            MediaVault::new(dir.path()),
            dispatch_tx,
            event_tx,
            capture_tx,
            Arc::new(GuardMetrics::new()),
        );
        executor.execute(vec![
            GuardEffect::SendText {
                chat_id: GROUP.into(),
                message: OutboundText::plain("hello"),
            },
            GuardEffect::RemoveFile(path.clone()),
        ]);
        assert_eq!(executor.in_flight(), 1);

        while executor.join_next().await.is_some() {}
        assert_eq!(executor.in_flight(), 0);
        assert_eq!(messenger.sent().len(), 1);
        assert!(!path.exists());
    }
}

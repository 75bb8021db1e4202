/// Guard runtime: wires every guard component into a live event loop.
///
/// The runtime owns a [`GuardState`] and a platform adapter (a
/// [`Messenger`] and a [`MediaSource`]). It exposes a channel-based API so
/// the socket adapter and the command dispatcher never touch archive,
/// limiter, or vault internals.
mod effect;
mod executor;
mod r#loop;
pub mod platform;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::config::GuardConfig;
use crate::error::GuardError;
use crate::metrics::{GuardMetrics, MetricsSnapshot};
use crate::ratelimit::RateDecision;
use crate::reaper::Reaper;
use crate::types::{InboundMessage, RevocationEvent};

pub use effect::{CaptureRequest, CaptureResult, GuardEffect};
pub use platform::{MediaSource, Messenger, OutboundMedia, OutboundText};
pub use state::{wait_hint, GuardState};

// ── Commands (app → runtime) ──────────────────────────────────────────

/// Commands the adapter sends to the runtime event loop.
pub enum GuardCommand {
    /// Flip the persisted feature switch.
    SetEnabled {
        enabled: bool,
        reply: oneshot::Sender<Result<(), String>>,
    },
    /// Owner `antidelete` command; the reply is posted into `chat_id`.
    Toggle {
        chat_id: String,
        from_owner: bool,
        arg: Option<String>,
    },
    /// Query: current feature switch.
    IsEnabled { reply: oneshot::Sender<bool> },
    /// Admission check for an arbitrary key (records the request).
    IsLimited {
        key: String,
        reply: oneshot::Sender<RateDecision>,
    },
    /// Query: number of archived entries.
    ArchiveLen { reply: oneshot::Sender<usize> },
    /// Graceful shutdown; acknowledged once in-flight I/O has drained.
    Shutdown { reply: oneshot::Sender<()> },
}

// ── Events (runtime → app) ───────────────────────────────────────────

/// Observations the adapter may want to log or assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    /// A message was written to the archive.
    Archived { message_id: String },
    /// Media bytes were written to the vault and attached to the entry.
    MediaCaptured { message_id: String, path: PathBuf },
    /// Media download or write failed; the entry stays text-only.
    MediaCaptureFailed { message_id: String, reason: String },
    /// An inbound message was rejected by the limiter.
    RateLimited { chat_id: String, time_to_wait: Duration },
    /// A revocation event was classified.
    Revocation {
        message_id: Option<String>,
        outcome: &'static str,
    },
    /// A revocation notification text was posted.
    NotificationSent { chat_id: String },
    /// Archived media was re-uploaded after a revocation.
    MediaResent { chat_id: String, path: PathBuf },
    /// Re-upload failed; a warning text was posted instead.
    MediaResendFailed { chat_id: String, reason: String },
    /// A vault file was deleted.
    FileRemoved { path: PathBuf },
    /// Archive entries dropped by the TTL sweep.
    ArchiveExpired { count: usize },
    /// The feature switch changed.
    EnabledChanged { enabled: bool },
    /// Non-fatal error.
    Error { description: String },
}

// ── GuardHandle (app-facing API) ──────────────────────────────────────

/// Handle to a running [`GuardRuntime`].
///
/// Cheap to clone. Event submission never waits on the loop's work, only on
/// channel capacity.
#[derive(Clone)]
pub struct GuardHandle {
    cmd_tx: mpsc::Sender<GuardCommand>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    revocation_tx: mpsc::Sender<RevocationEvent>,
    metrics: Arc<GuardMetrics>,
}

impl GuardHandle {
    /// Feed an inbound platform message through admission and archiving.
    pub async fn submit_message(&self, msg: InboundMessage) -> Result<(), GuardError> {
        self.inbound_tx
            .send(msg)
            .await
            .map_err(|_| GuardError::Shutdown)
    }

    /// Feed a deletion event to the revocation matcher.
    pub async fn submit_revocation(&self, event: RevocationEvent) -> Result<(), GuardError> {
        self.revocation_tx
            .send(event)
            .await
            .map_err(|_| GuardError::Shutdown)
    }

    /// Persist a new feature switch value.
    ///
    /// Returns the save error text if the config file could not be written;
    /// the switch is unchanged in that case.
    pub async fn set_enabled(&self, enabled: bool) -> Result<Result<(), String>, GuardError> {
        let (tx, rx) = oneshot::channel();
        self.send(GuardCommand::SetEnabled { enabled, reply: tx })
            .await?;
        rx.await.map_err(|_| GuardError::Shutdown)
    }

    /// Run the owner `antidelete` command for a conversation.
    pub async fn toggle(
        &self,
        chat_id: impl Into<String>,
        from_owner: bool,
        arg: Option<String>,
    ) -> Result<(), GuardError> {
        self.send(GuardCommand::Toggle {
            chat_id: chat_id.into(),
            from_owner,
            arg,
        })
        .await
    }

    pub async fn is_enabled(&self) -> Result<bool, GuardError> {
        let (tx, rx) = oneshot::channel();
        self.send(GuardCommand::IsEnabled { reply: tx }).await?;
        rx.await.map_err(|_| GuardError::Shutdown)
    }

    /// Admission check for `key`. Records the request like any inbound event.
    pub async fn is_limited(&self, key: impl Into<String>) -> Result<RateDecision, GuardError> {
        let (tx, rx) = oneshot::channel();
        self.send(GuardCommand::IsLimited {
            key: key.into(),
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| GuardError::Shutdown)
    }

    pub async fn archive_len(&self) -> Result<usize, GuardError> {
        let (tx, rx) = oneshot::channel();
        self.send(GuardCommand::ArchiveLen { reply: tx }).await?;
        rx.await.map_err(|_| GuardError::Shutdown)
    }

    /// Counter snapshot. Reads the shared atomics, no round-trip.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Graceful shutdown.
    ///
    /// Returns after queued events are handled and in-flight sends, file
    /// removals and captures have finished (bounded by
    /// [`GuardConfig::shutdown_grace`]). Returns at once if the runtime is
    /// already gone.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(GuardCommand::Shutdown { reply: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn send(&self, cmd: GuardCommand) -> Result<(), GuardError> {
        self.cmd_tx.send(cmd).await.map_err(|_| GuardError::Shutdown)
    }
}

// ── GuardChannels ─────────────────────────────────────────────────────

/// Channels returned to the adapter when the runtime starts.
pub struct GuardChannels {
    /// Handle to feed events and send commands.
    pub handle: GuardHandle,
    /// Admitted inbound messages, for the command dispatcher.
    pub dispatch: mpsc::Receiver<InboundMessage>,
    /// Guard observations.
    pub events: mpsc::Receiver<GuardEvent>,
}

// ── GuardRuntime ──────────────────────────────────────────────────────

/// The guard runtime. Spawn it and communicate via channels.
pub struct GuardRuntime;

impl GuardRuntime {
    /// Start the guard event loop and the scratch-dir reaper.
    ///
    /// Must be called from within a tokio runtime. The reaper is stopped
    /// when the loop exits.
    pub fn spawn<M, S>(config: GuardConfig, messenger: Arc<M>, source: Arc<S>) -> GuardChannels
    where
        M: Messenger + 'static,
        S: MediaSource + 'static,
    {
        let capacity = config.channel_capacity.max(1);
        let metrics = Arc::new(GuardMetrics::new());

        // App → runtime
        let (cmd_tx, cmd_rx) = mpsc::channel::<GuardCommand>(capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(capacity);
        let (revocation_tx, revocation_rx) = mpsc::channel::<RevocationEvent>(capacity);

        // Runtime → app
        let (dispatch_tx, dispatch_rx) = mpsc::channel::<InboundMessage>(capacity);
        let (event_tx, event_rx) = mpsc::channel::<GuardEvent>(capacity * 4);

        // Capture tasks → runtime
        let (capture_tx, capture_rx) = mpsc::channel::<CaptureResult>(capacity);

        let reaper = Reaper::new(config.scratch_dir.clone(), config.media_max_age)
            .spawn(config.reaper_interval, metrics.clone());

        let sweep_interval = config.archive_sweep_interval;
        let shutdown_grace = config.shutdown_grace;
        let state = GuardState::new(config, metrics.clone());
        let executor = executor::Executor::new(
            messenger,
            source,
            state.vault().clone(),
            dispatch_tx,
            event_tx,
            capture_tx,
            metrics.clone(),
        );

        tokio::spawn(r#loop::guard_loop(
            state,
            executor,
            r#loop::Inputs {
                cmd_rx,
                inbound_rx,
                revocation_rx,
                capture_rx,
            },
            sweep_interval,
            shutdown_grace,
            reaper,
        ));

        GuardChannels {
            handle: GuardHandle {
                cmd_tx,
                inbound_tx,
                revocation_tx,
                metrics,
            },
            dispatch: dispatch_rx,
            events: event_rx,
        }
    }
}

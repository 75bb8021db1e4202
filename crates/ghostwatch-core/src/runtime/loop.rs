/// The guard event loop.
///
/// A single task owns the `GuardState` and multiplexes over inbound
/// messages, revocations, finished media captures, handle commands, and the
/// archive sweep timer. Every mutation of archive, limiter, and switch
/// happens here, one event at a time.
///
/// On shutdown the loop handles whatever was already queued, then waits for
/// the executor's in-flight I/O before acknowledging.
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::MIN_INTERVAL;
use crate::types::{now_ms, InboundMessage, RevocationEvent};

use super::effect::CaptureResult;
use super::executor::Executor;
use super::state::GuardState;
use super::{GuardCommand, MediaSource, Messenger};

/// Receivers feeding the loop.
pub(super) struct Inputs {
    pub(super) cmd_rx: mpsc::Receiver<GuardCommand>,
    pub(super) inbound_rx: mpsc::Receiver<InboundMessage>,
    pub(super) revocation_rx: mpsc::Receiver<RevocationEvent>,
    pub(super) capture_rx: mpsc::Receiver<CaptureResult>,
}

pub(super) async fn guard_loop<M, S>(
    mut state: GuardState,
    mut executor: Executor<M, S>,
    inputs: Inputs,
    sweep_interval: Duration,
    shutdown_grace: Duration,
    reaper: JoinHandle<()>,
) where
    M: Messenger + 'static,
    S: MediaSource + 'static,
{
    let Inputs {
        mut cmd_rx,
        mut inbound_rx,
        mut revocation_rx,
        mut capture_rx,
    } = inputs;

    let mut archive_sweep = tokio::time::interval(sweep_interval.max(MIN_INTERVAL));
    // Skip the immediate first tick
    archive_sweep.tick().await;

    let enabled = state.enabled();
    tracing::info!(
        scratch_dir = %state.vault().dir().display(),
        enabled,
        "guard: runtime started"
    );

    let mut ack: Option<oneshot::Sender<()>> = None;

    loop {
        tokio::select! {
            // ── 1. Inbound messages ─────────────────────────────
            Some(msg) = inbound_rx.recv() => {
                let effects = state.handle_inbound(msg, now_ms());
                executor.execute(effects);
            }

            // ── 2. Revocations ──────────────────────────────────
            Some(event) = revocation_rx.recv() => {
                let effects = state.handle_revocation(&event, now_ms());
                executor.execute(effects);
            }

            // ── 3. Finished media captures ──────────────────────
            Some(result) = capture_rx.recv() => {
                let effects = state.handle_media_captured(result);
                executor.execute(effects);
            }

            // ── 4. Handle commands ──────────────────────────────
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    tracing::debug!("guard: all handles dropped");
                    break;
                };
                match cmd {
                    GuardCommand::SetEnabled { enabled, reply } => {
                        let result = match state.set_enabled(enabled) {
                            Ok(effects) => {
                                executor.execute(effects);
                                Ok(())
                            }
                            Err(e) => {
                                tracing::warn!("guard: {e}");
                                Err(e.to_string())
                            }
                        };
                        let _ = reply.send(result);
                    }
                    GuardCommand::Toggle { chat_id, from_owner, arg } => {
                        let effects = state.handle_toggle(&chat_id, from_owner, arg.as_deref());
                        executor.execute(effects);
                    }
                    GuardCommand::IsEnabled { reply } => {
                        let _ = reply.send(state.enabled());
                    }
                    GuardCommand::IsLimited { key, reply } => {
                        let _ = reply.send(state.is_limited(&key, now_ms()));
                    }
                    GuardCommand::ArchiveLen { reply } => {
                        let _ = reply.send(state.archive().len());
                    }
                    GuardCommand::Shutdown { reply } => {
                        tracing::info!("guard: shutting down");
                        ack = Some(reply);
                        break;
                    }
                }
            }

            // ── 5. Archive TTL sweep ────────────────────────────
            _ = archive_sweep.tick() => {
                let effects = state.tick_archive(now_ms());
                executor.execute(effects);
            }
        }
    }

    reaper.abort();

    // Events submitted before the shutdown request still get handled.
    while let Ok(msg) = inbound_rx.try_recv() {
        let effects = state.handle_inbound(msg, now_ms());
        executor.execute(effects);
    }
    while let Ok(event) = revocation_rx.try_recv() {
        let effects = state.handle_revocation(&event, now_ms());
        executor.execute(effects);
    }

    let in_flight = executor.in_flight();
    let pending = drain(&mut state, &mut executor, &mut capture_rx);
    if tokio::time::timeout(shutdown_grace, pending).await.is_err() {
        tracing::warn!(
            in_flight = executor.in_flight(),
            "guard: shutdown grace elapsed, abandoning in-flight I/O"
        );
    } else if in_flight > 0 {
        tracing::debug!(in_flight, "guard: in-flight I/O drained");
    }

    if let Some(ack) = ack {
        let _ = ack.send(());
    }
}

/// Join every executor task, feeding captures that land meanwhile back
/// through the state (which may spawn more I/O).
async fn drain<M, S>(
    state: &mut GuardState,
    executor: &mut Executor<M, S>,
    capture_rx: &mut mpsc::Receiver<CaptureResult>,
) where
    M: Messenger + 'static,
    S: MediaSource + 'static,
{
    loop {
        tokio::select! {
            biased;
            Some(result) = capture_rx.recv() => {
                let effects = state.handle_media_captured(result);
                executor.execute(effects);
            }
            joined = executor.join_next() => {
                // A capture task sends its result before it completes.
                if joined.is_none() && capture_rx.is_empty() {
                    break;
                }
            }
        }
    }
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::archive::{ArchivedMedia, ArchivedMessage, MessageArchive};
use crate::config::{ConfigStore, GuardConfig};
use crate::error::GuardError;
use crate::metrics::GuardMetrics;
use crate::ratelimit::{AdmissionGate, RateDecision};
use crate::revocation::{RevocationMatcher, RevocationOutcome};
use crate::toggle::{self, ToggleCommand};
use crate::types::{InboundMessage, RevocationEvent};
use crate::vault::MediaVault;

use super::effect::{CaptureRequest, CaptureResult, GuardEffect};
use super::{GuardEvent, OutboundText};

/// Reply posted into a limited one-to-one conversation.
pub fn wait_hint(time_to_wait: Duration) -> String {
    let secs = time_to_wait.as_millis().div_ceil(1000);
    format!("⏳ Please wait {secs} seconds before sending another message.")
}

/// Complete guard state: pure logic, no async, no platform calls.
///
/// Every `handle_*` / `tick_*` method returns `Vec<GuardEffect>`. The only
/// I/O performed here is the few-byte feature switch file, read on first
/// use and written on toggle.
pub struct GuardState {
    config: GuardConfig,
    feature: ConfigStore,
    gate: AdmissionGate,
    archive: MessageArchive,
    matcher: RevocationMatcher,
    vault: MediaVault,
    metrics: Arc<GuardMetrics>,
}

impl GuardState {
    pub fn new(config: GuardConfig, metrics: Arc<GuardMetrics>) -> Self {
        Self {
            feature: ConfigStore::new(config.feature_config_path.clone()),
            gate: AdmissionGate::new(config.group_limit, config.direct_limit),
            archive: MessageArchive::new(config.archive_capacity, config.archive_ttl),
            matcher: RevocationMatcher::new(&config),
            vault: MediaVault::new(config.scratch_dir.clone()),
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn vault(&self) -> &MediaVault {
        &self.vault
    }

    pub fn archive(&self) -> &MessageArchive {
        &self.archive
    }

    pub fn metrics(&self) -> &Arc<GuardMetrics> {
        &self.metrics
    }

    /// Feature switch, loaded from disk on first call.
    pub fn enabled(&mut self) -> bool {
        self.feature.enabled()
    }

    /// Persist a new switch value.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<Vec<GuardEffect>, GuardError> {
        self.feature.set_enabled(enabled)?;
        tracing::info!(enabled, "guard: antidelete switched");
        Ok(vec![GuardEffect::Emit(GuardEvent::EnabledChanged { enabled })])
    }

    /// Raw admission check for an arbitrary key. Records the request.
    pub fn is_limited(&mut self, key: &str, now: u64) -> RateDecision {
        self.gate.check(key, now)
    }

    // ── Inbound messages ──────────────────────────────────────────────

    /// Admission, then archiving, then hand-off to the dispatcher.
    ///
    /// A limited message goes no further: multi-party conversations drop
    /// it silently, one-to-one conversations get a wait hint.
    pub fn handle_inbound(&mut self, msg: InboundMessage, now: u64) -> Vec<GuardEffect> {
        let decision = self.gate.check(&msg.chat_id, now);
        if decision.limited {
            self.metrics.rate_limited.inc();
            let mut effects = Vec::new();
            if !msg.is_group() {
                effects.push(GuardEffect::SendText {
                    chat_id: msg.chat_id.clone(),
                    message: OutboundText::plain(wait_hint(decision.time_to_wait)),
                });
            }
            effects.push(GuardEffect::Emit(GuardEvent::RateLimited {
                chat_id: msg.chat_id,
                time_to_wait: decision.time_to_wait,
            }));
            return effects;
        }

        self.metrics.admitted.inc();
        let mut effects = self.store(&msg, now);
        effects.push(GuardEffect::Dispatch(msg));
        effects
    }

    /// Archive a message if the feature is on.
    ///
    /// Text is recorded immediately; media is requested as a background
    /// capture whose completion comes back through
    /// [`handle_media_captured`](Self::handle_media_captured).
    pub fn store(&mut self, msg: &InboundMessage, now: u64) -> Vec<GuardEffect> {
        if !self.enabled() {
            return Vec::new();
        }
        let attachment = msg.content.media().cloned();
        let entry = ArchivedMessage::from_text(msg, now);
        if entry.is_none() && attachment.is_none() {
            tracing::debug!(message_id = %msg.id, "guard: nothing to archive");
            return Vec::new();
        }

        let mut effects = Vec::new();
        let incoming_path = attachment
            .as_ref()
            .map(|media| self.vault.path_for(&msg.id, media.kind));
        let had_text = entry.is_some();

        if let Some(entry) = entry {
            let displaced = self.archive.insert(entry);
            self.release(displaced, incoming_path.as_ref(), &mut effects);
            self.metrics.archived.inc();
            effects.push(GuardEffect::Emit(GuardEvent::Archived {
                message_id: msg.id.clone(),
            }));
        }

        if let Some(attachment) = attachment {
            effects.push(GuardEffect::CaptureMedia(CaptureRequest {
                message_id: msg.id.clone(),
                chat_id: msg.chat_id.clone(),
                sender_id: msg.sender_id.clone(),
                had_text,
                captured_at: now,
                attachment,
            }));
        }
        effects
    }

    /// Fold a finished media capture back into the archive.
    pub fn handle_media_captured(&mut self, result: CaptureResult) -> Vec<GuardEffect> {
        let CaptureResult { request, outcome } = result;

        let path = match outcome {
            Ok(path) => path,
            Err(reason) => {
                self.metrics.media_failures.inc();
                tracing::warn!(message_id = %request.message_id, "guard: media capture failed: {reason}");
                return vec![GuardEffect::Emit(GuardEvent::MediaCaptureFailed {
                    message_id: request.message_id,
                    reason,
                })];
            }
        };

        if !self.enabled() {
            tracing::debug!(message_id = %request.message_id, "guard: disabled since capture, dropping file");
            return vec![GuardEffect::RemoveFile(path)];
        }

        let media = ArchivedMedia {
            kind: request.attachment.kind,
            path: path.clone(),
        };
        let mut effects = Vec::new();

        match self.archive.attach_media(&request.message_id, media) {
            Ok(()) => {}
            Err(media) if !request.had_text => {
                let entry = ArchivedMessage {
                    id: request.message_id.clone(),
                    chat_id: request.chat_id,
                    sender_id: request.sender_id,
                    text: String::new(),
                    media: Some(media),
                    captured_at: request.captured_at,
                };
                let displaced = self.archive.insert(entry);
                self.release(displaced, Some(&path), &mut effects);
                self.metrics.archived.inc();
                effects.push(GuardEffect::Emit(GuardEvent::Archived {
                    message_id: request.message_id.clone(),
                }));
            }
            Err(_) => {
                // Entry was revoked or evicted while the download ran.
                tracing::debug!(message_id = %request.message_id, "guard: orphaned capture");
                return vec![GuardEffect::RemoveFile(path)];
            }
        }

        self.metrics.media_captured.inc();
        effects.push(GuardEffect::Emit(GuardEvent::MediaCaptured {
            message_id: request.message_id,
            path,
        }));
        effects
    }

    // ── Revocations ───────────────────────────────────────────────────

    /// Classify a deletion event and turn the outcome into effects.
    pub fn handle_revocation(&mut self, event: &RevocationEvent, now: u64) -> Vec<GuardEffect> {
        let enabled = self.enabled();
        let outcome = self.matcher.evaluate(&mut self.archive, enabled, event, now);
        let label = outcome.label();
        let mut effects = Vec::new();

        match outcome {
            RevocationOutcome::NotFound => {
                self.metrics.revocation_misses.inc();
                tracing::debug!(message_id = ?event.revoked_message_id, "guard: revocation without archive entry");
            }
            RevocationOutcome::UnknownDeleter { message_id } => {
                tracing::debug!(message_id, "guard: revocation with unknown deleter");
            }
            RevocationOutcome::SelfDeleted { entry } => {
                self.metrics.self_deletions.inc();
                tracing::debug!(message_id = %entry.id, "guard: self-deletion, evicted silently");
                effects.extend(entry.media.map(|m| GuardEffect::RemoveFile(m.path)));
            }
            RevocationOutcome::Matched {
                entry,
                deleter_id,
                notification: Some(notification),
            } => {
                tracing::info!(
                    message_id = %entry.id,
                    chat_id = %entry.chat_id,
                    deleter = %deleter_id,
                    "guard: deleted message detected"
                );
                effects.push(GuardEffect::Notify(notification));
            }
            RevocationOutcome::Matched {
                entry,
                notification: None,
                ..
            } => {
                tracing::debug!(message_id = %entry.id, "guard: one-to-one revocation, not notified");
                effects.extend(entry.media.map(|m| GuardEffect::RemoveFile(m.path)));
            }
        }

        effects.push(GuardEffect::Emit(GuardEvent::Revocation {
            message_id: event.revoked_message_id.clone(),
            outcome: label,
        }));
        effects
    }

    // ── Owner command ─────────────────────────────────────────────────

    /// Run the `antidelete` command and reply into `chat_id`.
    pub fn handle_toggle(
        &mut self,
        chat_id: &str,
        from_owner: bool,
        arg: Option<&str>,
    ) -> Vec<GuardEffect> {
        let mut effects = Vec::new();
        let reply = if !from_owner {
            toggle::NOT_OWNER_REPLY.to_string()
        } else {
            match ToggleCommand::parse(arg) {
                ToggleCommand::Status => {
                    let enabled = self.enabled();
                    toggle::status_reply(enabled, &self.config.command_prefix)
                }
                ToggleCommand::Enable | ToggleCommand::Disable => {
                    let enabled = ToggleCommand::parse(arg) == ToggleCommand::Enable;
                    match self.set_enabled(enabled) {
                        Ok(emitted) => {
                            effects.extend(emitted);
                            toggle::updated_reply(enabled)
                        }
                        Err(e) => {
                            tracing::warn!("guard: toggle failed: {e}");
                            toggle::SAVE_FAILED_REPLY.to_string()
                        }
                    }
                }
                ToggleCommand::Invalid => toggle::invalid_reply(&self.config.command_prefix),
            }
        };

        effects.insert(
            0,
            GuardEffect::SendText {
                chat_id: chat_id.to_string(),
                message: OutboundText::plain(reply),
            },
        );
        effects
    }

    // ── Timers ────────────────────────────────────────────────────────

    /// Drop expired archive entries and drained limiter keys.
    pub fn tick_archive(&mut self, now: u64) -> Vec<GuardEffect> {
        let expired = self.archive.sweep_expired(now);
        let pruned = self.gate.prune_idle(now);
        if pruned > 0 {
            tracing::debug!(pruned, "guard: idle limiter keys pruned");
        }
        if expired.is_empty() {
            return Vec::new();
        }

        let count = expired.len();
        self.metrics.archive_expired.inc_by(count as u64);
        tracing::debug!(count, "guard: archive entries expired");

        let mut effects: Vec<GuardEffect> = expired
            .into_iter()
            .filter_map(|entry| entry.media.map(|m| GuardEffect::RemoveFile(m.path)))
            .collect();
        effects.push(GuardEffect::Emit(GuardEvent::ArchiveExpired { count }));
        effects
    }

    /// Queue deletion of media owned by displaced entries, except a path
    /// about to be (re)written for the incoming message.
    fn release(
        &self,
        displaced: Vec<ArchivedMessage>,
        keep: Option<&PathBuf>,
        effects: &mut Vec<GuardEffect>,
    ) {
        for entry in displaced {
            if let Some(media) = entry.media {
                if Some(&media.path) != keep {
                    effects.push(GuardEffect::RemoveFile(media.path));
                }
            }
        }
    }
}

/// Integration tests: guard state lifecycle.
///
/// Drives `GuardState` directly, without runtime or platform. Media captures
/// are simulated by feeding `CaptureResult`s back in, the way the executor
/// would after a download.
///
/// Scenarios: text match in a group, self-deletion, media capture then
/// revocation, direct conversation, limiter in front of the archive.
use std::path::Path;
use std::sync::Arc;

use ghostwatch_core::{
    CaptureRequest, CaptureResult, ConfigStore, GuardConfig, GuardEffect, GuardEvent,
    GuardMetrics, GuardState, InboundMessage, MediaAttachment, MediaKind, MessageContent,
    RevocationEvent,
};

const BOT: &str = "254700000001:12@s.whatsapp.net";
const ALICE: &str = "254711111111@s.whatsapp.net";
const BOB: &str = "254722222222@s.whatsapp.net";
const GROUP: &str = "120363111111111111@g.us";

fn guard(dir: &Path) -> GuardState {
    let config = GuardConfig::new()
        .scratch_dir(dir.join("media"))
        .feature_config_path(dir.join("data").join("antidelete.json"))
        .self_id(BOT);
    let mut state = GuardState::new(config, Arc::new(GuardMetrics::new()));
    state.set_enabled(true).unwrap();
    state
}

fn text(id: &str, chat_id: &str, sender: &str, body: &str) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        chat_id: chat_id.into(),
        sender_id: sender.into(),
        from_me: false,
        content: MessageContent::Text { text: body.into() },
    }
}

fn revoke(id: &str, deleter: Option<&str>, chat_id: &str) -> RevocationEvent {
    RevocationEvent {
        revoked_message_id: Some(id.into()),
        deleter_id: deleter.map(Into::into),
        chat_id: chat_id.into(),
    }
}

fn notifications(effects: &[GuardEffect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, GuardEffect::Notify(_)))
        .count()
}

/// Store "M1", revoke it from a third party: one notification, then gone.
#[test]
fn text_match_notifies_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = guard(dir.path());

    // ── Step 1: message arrives ─────────────────────────────────────────
    let effects = state.handle_inbound(text("M1", GROUP, ALICE, "meet at 6"), 1_000);
    assert!(effects.contains(&GuardEffect::Emit(GuardEvent::Archived {
        message_id: "M1".into()
    })));

    // ── Step 2: Bob deletes it ──────────────────────────────────────────
    let effects = state.handle_revocation(&revoke("M1", Some(BOB), GROUP), 2_000);
    assert_eq!(notifications(&effects), 1);
    let GuardEffect::Notify(n) = &effects[0] else {
        panic!("expected Notify");
    };
    assert_eq!(n.chat_id, GROUP);
    assert!(n.text.text.contains("*💬 Message:*\nmeet at 6"));
    assert!(n.text.text.contains("*👤 Sender:* @254711111111"));
    assert!(n.text.text.contains("*🗑️ Deleted By:* @254722222222"));

    // ── Step 3: a repeated revocation is a no-op ────────────────────────
    let effects = state.handle_revocation(&revoke("M1", Some(BOB), GROUP), 3_000);
    assert_eq!(notifications(&effects), 0);
    assert!(state.archive().is_empty());
}

/// The agent deleting its own message evicts silently.
#[test]
fn self_deletion_is_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = guard(dir.path());
    state.handle_inbound(text("M2", GROUP, BOT, "typo"), 0);

    let effects = state.handle_revocation(
        &revoke("M2", Some("254700000001@s.whatsapp.net"), GROUP),
        10,
    );
    assert_eq!(notifications(&effects), 0);
    assert!(effects.contains(&GuardEffect::Emit(GuardEvent::Revocation {
        message_id: Some("M2".into()),
        outcome: "self_deleted",
    })));
    assert!(!state.archive().contains("M2"));
}

/// A revocation without a deleter leaves the entry for a later, complete event.
#[test]
fn unknown_deleter_keeps_entry_for_retry() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = guard(dir.path());
    state.handle_inbound(text("M1", GROUP, ALICE, "hello"), 0);

    let effects = state.handle_revocation(&revoke("M1", None, GROUP), 10);
    assert_eq!(notifications(&effects), 0);
    assert!(state.archive().contains("M1"));

    let effects = state.handle_revocation(&revoke("M1", Some(BOB), GROUP), 20);
    assert_eq!(notifications(&effects), 1);
}

/// Image "M3": captured, attached, revoked; the notification carries the file.
#[test]
fn media_capture_then_revocation() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = guard(dir.path());

    let msg = InboundMessage {
        id: "M3".into(),
        chat_id: GROUP.into(),
        sender_id: ALICE.into(),
        from_me: false,
        content: MessageContent::Media(MediaAttachment {
            kind: MediaKind::Video,
            handle: "blob-3".into(),
            caption: None,
        }),
    };
    let effects = state.handle_inbound(msg, 0);
    let request: CaptureRequest = effects
        .iter()
        .find_map(|e| match e {
            GuardEffect::CaptureMedia(r) => Some(r.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(request.attachment.handle, "blob-3");

    let path = state.vault().path_for("M3", MediaKind::Video);
    assert!(path.ends_with("M3.mp4"));
    state.handle_media_captured(CaptureResult {
        request,
        outcome: Ok(path.clone()),
    });

    let effects = state.handle_revocation(&revoke("M3", Some(BOB), GROUP), 5);
    let GuardEffect::Notify(n) = &effects[0] else {
        panic!("expected Notify, got {effects:?}");
    };
    let media = n.media.as_ref().unwrap();
    assert_eq!(media.path, path);
    assert_eq!(
        media.caption,
        "*📎 Deleted video*\nFrom: @254711111111\nDeleted by: @254722222222"
    );
    assert!(!n.text.text.contains("Message:"));
}

/// One-to-one conversations are archived and matched, never notified.
#[test]
fn direct_conversation_is_never_notified() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = guard(dir.path());
    state.handle_inbound(text("D1", ALICE, ALICE, "psst"), 0);

    let effects = state.handle_revocation(&revoke("D1", Some(ALICE), ALICE), 10);
    assert_eq!(notifications(&effects), 0);
    assert!(state.archive().is_empty());
}

/// Nothing downstream of a limited message runs: no archive, no dispatch.
#[test]
fn limiter_guards_the_archive() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = guard(dir.path());

    for i in 0..5 {
        let effects = state.handle_inbound(text(&format!("G{i}"), GROUP, ALICE, "spam"), 0);
        assert!(effects
            .iter()
            .any(|e| matches!(e, GuardEffect::Dispatch(_))));
    }
    let effects = state.handle_inbound(text("G5", GROUP, ALICE, "spam"), 1_000);
    assert!(!effects
        .iter()
        .any(|e| matches!(e, GuardEffect::Dispatch(_) | GuardEffect::SendText { .. })));
    assert!(!state.archive().contains("G5"));

    // Window has moved on.
    let effects = state.handle_inbound(text("G6", GROUP, ALICE, "ok"), 10_001);
    assert!(effects
        .iter()
        .any(|e| matches!(e, GuardEffect::Dispatch(_))));
    assert_eq!(state.archive().len(), 6);
}

/// The switch survives a restart; corrupt content reads as disabled.
#[test]
fn feature_switch_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("antidelete.json");
    drop(guard(dir.path()));

    let mut store = ConfigStore::new(&path);
    assert!(store.enabled());

    std::fs::write(&path, "{ not json").unwrap();
    let mut store = ConfigStore::new(&path);
    assert!(!store.enabled());
}

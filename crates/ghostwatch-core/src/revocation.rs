/// RevocationMatcher: decides what a deletion event means.
///
/// Pure: looks the revoked id up in the archive, classifies the event, and
/// renders the notification. Sending, media re-upload, and file cleanup are
/// left to the caller, which turns the [`RevocationOutcome`] into effects.
///
/// Per event, terminal on each branch:
/// 1. feature disabled, no id, or no archive entry → `NotFound`
/// 2. deleter unknown → `UnknownDeleter` (entry kept)
/// 3. deleter is the agent itself → `SelfDeleted` (entry evicted)
/// 4. otherwise → `Matched` (entry evicted; notification only in groups)
use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::archive::{ArchivedMessage, MessageArchive};
use crate::config::{GuardConfig, SelfMatchPolicy};
use crate::runtime::{OutboundMedia, OutboundText};
use crate::types::{account_number, is_group_chat, user_part, RevocationEvent};

/// Notification for a matched revocation in a multi-party conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub chat_id: String,
    pub text: OutboundText,
    /// Re-upload of the archived media, if the entry had any.
    pub media: Option<OutboundMedia>,
}

/// Result of matching one revocation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// Disabled, unresolvable id, or no archive entry.
    NotFound,
    /// The deleter could not be identified. The entry is left in place.
    UnknownDeleter { message_id: String },
    /// The agent deleted its own message. Evicted silently.
    SelfDeleted { entry: ArchivedMessage },
    /// A third party deleted the message. Evicted; `notification` is `None`
    /// for one-to-one conversations.
    Matched {
        entry: ArchivedMessage,
        deleter_id: String,
        notification: Option<Notification>,
    },
}

impl RevocationOutcome {
    /// Short label for logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            RevocationOutcome::NotFound => "not_found",
            RevocationOutcome::UnknownDeleter { .. } => "unknown_deleter",
            RevocationOutcome::SelfDeleted { .. } => "self_deleted",
            RevocationOutcome::Matched {
                notification: Some(_),
                ..
            } => "matched",
            RevocationOutcome::Matched {
                notification: None, ..
            } => "matched_silent",
        }
    }

    /// The evicted entry, if this outcome evicted one.
    pub fn evicted(&self) -> Option<&ArchivedMessage> {
        match self {
            RevocationOutcome::SelfDeleted { entry } | RevocationOutcome::Matched { entry, .. } => {
                Some(entry)
            }
            _ => None,
        }
    }
}

pub struct RevocationMatcher {
    self_account: String,
    self_match: SelfMatchPolicy,
    text_budget: usize,
    offset: FixedOffset,
}

impl RevocationMatcher {
    pub fn new(config: &GuardConfig) -> Self {
        let offset = FixedOffset::east_opt(config.utc_offset_secs).unwrap_or_else(|| {
            tracing::warn!(
                offset_secs = config.utc_offset_secs,
                "revocation: invalid utc offset, using UTC"
            );
            Utc.fix()
        });
        Self {
            self_account: account_number(&config.self_id).to_string(),
            self_match: config.self_match,
            text_budget: config.text_budget,
            offset,
        }
    }

    /// Classify `event` and evict the matched entry (at most once per id).
    pub fn evaluate(
        &self,
        archive: &mut MessageArchive,
        enabled: bool,
        event: &RevocationEvent,
        now: u64,
    ) -> RevocationOutcome {
        if !enabled {
            return RevocationOutcome::NotFound;
        }
        let Some(message_id) = event.revoked_message_id.as_deref().filter(|id| !id.is_empty())
        else {
            return RevocationOutcome::NotFound;
        };
        if !archive.contains(message_id) {
            return RevocationOutcome::NotFound;
        }

        let Some(deleter_id) = event.deleter_id.as_deref().filter(|d| !d.is_empty()) else {
            return RevocationOutcome::UnknownDeleter {
                message_id: message_id.to_string(),
            };
        };

        let Some(entry) = archive.evict(message_id) else {
            return RevocationOutcome::NotFound;
        };

        if self.is_self(deleter_id) {
            return RevocationOutcome::SelfDeleted { entry };
        }

        let notification = is_group_chat(&entry.chat_id).then(|| self.render(&entry, deleter_id, now));
        RevocationOutcome::Matched {
            entry,
            deleter_id: deleter_id.to_string(),
            notification,
        }
    }

    /// Whether `deleter_id` is the agent's own account under the configured policy.
    /// An unconfigured self identity never matches.
    pub fn is_self(&self, deleter_id: &str) -> bool {
        if self.self_account.is_empty() {
            return false;
        }
        match self.self_match {
            SelfMatchPolicy::Substring => deleter_id.contains(&self.self_account),
            SelfMatchPolicy::Exact => account_number(deleter_id) == self.self_account,
        }
    }

    /// Render the notification text (and media re-upload) for a matched entry.
    pub fn render(&self, entry: &ArchivedMessage, deleter_id: &str, now: u64) -> Notification {
        let sender_name = user_part(&entry.sender_id);
        let deleter_name = user_part(deleter_id);

        let mut text = format!(
            "*🚨 DELETED MESSAGE DETECTED*\n\n\
             *👤 Sender:* @{sender_name}\n\
             *🗑️ Deleted By:* @{deleter_name}\n\
             *🕒 Time:* {}\n",
            self.format_time(now)
        );

        if !entry.text.is_empty() {
            text.push_str("\n*💬 Message:*\n");
            let mut chars = entry.text.chars();
            text.extend(chars.by_ref().take(self.text_budget));
            if chars.next().is_some() {
                text.push_str("...");
            }
        }

        let media = entry.media.as_ref().map(|media| OutboundMedia {
            kind: media.kind,
            path: media.path.clone(),
            caption: format!(
                "*📎 Deleted {}*\nFrom: @{sender_name}\nDeleted by: @{deleter_name}",
                media.kind
            ),
            mentions: vec![entry.sender_id.clone(), deleter_id.to_string()],
        });

        Notification {
            chat_id: entry.chat_id.clone(),
            text: OutboundText {
                text,
                mentions: vec![deleter_id.to_string(), entry.sender_id.clone()],
            },
            media,
        }
    }

    /// `MM/DD/YYYY, hh:mm:ss AM` in the configured offset.
    pub fn format_time(&self, now_ms: u64) -> String {
        let utc = DateTime::<Utc>::from_timestamp_millis(now_ms as i64).unwrap_or_default();
        utc.with_timezone(&self.offset)
            .format("%m/%d/%Y, %I:%M:%S %p")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::archive::ArchivedMedia;
    use crate::types::MediaKind;

    const BOT: &str = "254700000001:7@s.whatsapp.net";
    const ALICE: &str = "254700000002@s.whatsapp.net";
    const BOB: &str = "254700000003@s.whatsapp.net";
    const GROUP: &str = "120363000000000001@g.us";

    fn matcher() -> RevocationMatcher {
        RevocationMatcher::new(&GuardConfig::new().self_id(BOT))
    }

    fn archive_with(entry: ArchivedMessage) -> MessageArchive {
        let mut archive = MessageArchive::new(16, Duration::from_secs(3600));
        archive.insert(entry);
        archive
    }

    fn entry(id: &str, chat_id: &str, text: &str) -> ArchivedMessage {
        ArchivedMessage {
            id: id.into(),
            chat_id: chat_id.into(),
            sender_id: ALICE.into(),
            text: text.into(),
            media: None,
            captured_at: 0,
        }
    }

    fn revoke(id: &str, deleter: Option<&str>, chat_id: &str) -> RevocationEvent {
        RevocationEvent {
            revoked_message_id: Some(id.into()),
            deleter_id: deleter.map(Into::into),
            chat_id: chat_id.into(),
        }
    }

    #[test]
    fn group_revocation_notifies_once() {
        let m = matcher();
        let mut archive = archive_with(entry("M1", GROUP, "secret plans"));

        let outcome = m.evaluate(&mut archive, true, &revoke("M1", Some(BOB), GROUP), 0);
        let RevocationOutcome::Matched {
            notification: Some(n),
            ..
        } = &outcome
        else {
            panic!("expected notification, got {outcome:?}");
        };
        assert_eq!(n.chat_id, GROUP);
        assert!(n.text.text.contains("secret plans"));
        assert!(n.text.text.contains("@254700000002"));
        assert!(n.text.text.contains("@254700000003"));
        assert_eq!(n.text.mentions, vec![BOB.to_string(), ALICE.to_string()]);
        assert!(n.media.is_none());

        let again = m.evaluate(&mut archive, true, &revoke("M1", Some(BOB), GROUP), 0);
        assert_eq!(again, RevocationOutcome::NotFound);
    }

    #[test]
    fn self_deletion_is_silent() {
        let m = matcher();
        let mut archive = archive_with(entry("M2", GROUP, "oops"));

        let outcome = m.evaluate(
            &mut archive,
            true,
            &revoke("M2", Some("254700000001@s.whatsapp.net"), GROUP),
            0,
        );
        assert!(matches!(outcome, RevocationOutcome::SelfDeleted { .. }));
        assert!(archive.is_empty());
    }

    #[test]
    fn direct_chat_matches_without_notification() {
        let m = matcher();
        let mut archive = archive_with(entry("M1", ALICE, "hi"));
        let outcome = m.evaluate(&mut archive, true, &revoke("M1", Some(ALICE), ALICE), 0);
        assert!(matches!(
            outcome,
            RevocationOutcome::Matched {
                notification: None,
                ..
            }
        ));
        assert_eq!(outcome.label(), "matched_silent");
        assert!(archive.is_empty());
    }

    #[test]
    fn disabled_or_unresolvable_is_noop() {
        let m = matcher();
        let mut archive = archive_with(entry("M1", GROUP, "hi"));

        assert_eq!(
            m.evaluate(&mut archive, false, &revoke("M1", Some(BOB), GROUP), 0),
            RevocationOutcome::NotFound
        );
        let no_id = RevocationEvent {
            revoked_message_id: None,
            deleter_id: Some(BOB.into()),
            chat_id: GROUP.into(),
        };
        assert_eq!(m.evaluate(&mut archive, true, &no_id, 0), RevocationOutcome::NotFound);
        assert_eq!(
            m.evaluate(&mut archive, true, &revoke("other", Some(BOB), GROUP), 0),
            RevocationOutcome::NotFound
        );
        assert!(archive.contains("M1"));
    }

    #[test]
    fn unknown_deleter_keeps_entry() {
        let m = matcher();
        let mut archive = archive_with(entry("M1", GROUP, "hi"));
        let outcome = m.evaluate(&mut archive, true, &revoke("M1", None, GROUP), 0);
        assert_eq!(
            outcome,
            RevocationOutcome::UnknownDeleter {
                message_id: "M1".into()
            }
        );
        assert!(archive.contains("M1"));
    }

    #[test]
    fn substring_policy_can_misclassify() {
        // Deleter's number merely contains the agent's number.
        let m = RevocationMatcher::new(&GuardConfig::new().self_id("2547000:1@s.whatsapp.net"));
        assert!(m.is_self("254700099@s.whatsapp.net"));

        let exact = RevocationMatcher::new(
            &GuardConfig::new()
                .self_id("2547000:1@s.whatsapp.net")
                .self_match(SelfMatchPolicy::Exact),
        );
        assert!(!exact.is_self("254700099@s.whatsapp.net"));
        assert!(exact.is_self("2547000@s.whatsapp.net"));
    }

    #[test]
    fn unconfigured_self_never_matches() {
        let m = RevocationMatcher::new(&GuardConfig::new());
        assert!(!m.is_self(BOB));
    }

    #[test]
    fn long_text_is_truncated() {
        let m = RevocationMatcher::new(&GuardConfig::new().self_id(BOT).text_budget(5));
        let n = m.render(&entry("M1", GROUP, "abcdefgh"), BOB, 0);
        assert!(n.text.text.ends_with("\n*💬 Message:*\nabcde..."));

        let n = m.render(&entry("M1", GROUP, "abcde"), BOB, 0);
        assert!(n.text.text.ends_with("abcde"));
    }

    #[test]
    fn media_resend_caption() {
        let m = matcher();
        let mut e = entry("M3", GROUP, "");
        e.media = Some(ArchivedMedia {
            kind: MediaKind::Image,
            path: PathBuf::from("/scratch/M3.jpg"),
        });
        let n = m.render(&e, BOB, 0);
        assert!(!n.text.text.contains("Message:"));

        let media = n.media.unwrap();
        assert_eq!(media.path, PathBuf::from("/scratch/M3.jpg"));
        assert_eq!(
            media.caption,
            "*📎 Deleted image*\nFrom: @254700000002\nDeleted by: @254700000003"
        );
        assert_eq!(media.mentions, vec![ALICE.to_string(), BOB.to_string()]);
    }

    #[test]
    fn time_uses_configured_offset() {
        let m = matcher();
        // 2024-01-01T00:00:00Z is 03:00 in UTC+3.
        assert_eq!(m.format_time(1_704_067_200_000), "01/01/2024, 03:00:00 AM");

        let utc = RevocationMatcher::new(&GuardConfig::new().utc_offset_secs(0));
        assert_eq!(utc.format_time(1_704_110_400_000), "01/01/2024, 12:00:00 PM");
    }
}

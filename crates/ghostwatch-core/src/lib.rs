//! ghostwatch guard layer.
//!
//! Message-lifecycle guard for a chat agent: a sliding-window admission
//! gate in front of all inbound traffic, an ephemeral archive of recent
//! messages and their media, and a revocation matcher that re-posts
//! deleted messages into multi-party conversations.
//!
//! Platform I/O stays behind the [`Messenger`] and [`MediaSource`] traits;
//! [`GuardRuntime`] drives everything from one event loop.

pub mod archive;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ratelimit;
pub mod reaper;
pub mod revocation;
pub mod runtime;
pub mod toggle;
pub mod types;
pub mod vault;

pub use archive::{ArchivedMedia, ArchivedMessage, MessageArchive};
pub use config::{ConfigStore, FeatureConfig, GuardConfig, SelfMatchPolicy, MIN_INTERVAL};
pub use error::GuardError;
pub use metrics::{Counter, GuardMetrics, MetricsSnapshot};
pub use ratelimit::{AdmissionGate, RateDecision, RateLimitPolicy, RateLimiter};
pub use reaper::{ReapReport, Reaper};
pub use revocation::{Notification, RevocationMatcher, RevocationOutcome};
pub use runtime::{
    CaptureRequest, CaptureResult, GuardChannels, GuardCommand, GuardEffect, GuardEvent,
    GuardHandle, GuardRuntime, GuardState, MediaSource, Messenger, OutboundMedia, OutboundText,
};
pub use toggle::ToggleCommand;
pub use types::{
    account_number, is_group_chat, now_ms, user_part, InboundMessage, MediaAttachment, MediaKind,
    MessageContent, RevocationEvent,
};
pub use vault::MediaVault;

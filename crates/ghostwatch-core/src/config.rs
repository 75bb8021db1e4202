//! Guard configuration.
//!
//! Two layers:
//! - [`FeatureConfig`] / [`ConfigStore`]: the single persisted switch
//!   (`{"enabled": bool}`), loaded at first use and saved on every toggle.
//! - [`GuardConfig`]: in-process tuning (limits, intervals, identity),
//!   built with defaults and a consuming builder.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GuardError;
use crate::ratelimit::RateLimitPolicy;

/// Shortest accepted timer period. `tokio::time::interval` rejects zero.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

// ── FeatureConfig ────────────────────────────────────────────────────────

/// The persisted feature switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// JSON file backing [`FeatureConfig`].
///
/// Synchronous by design: the file is a few bytes and is only touched on
/// first use and on toggle.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    cached: Option<FeatureConfig>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file. A missing file is not an error and yields the default.
    pub fn load(&self) -> Result<FeatureConfig, GuardError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(FeatureConfig::default());
            }
            Err(source) => {
                return Err(GuardError::ConfigIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| GuardError::ConfigParse {
            path: self.path.clone(),
            source,
        })
    }

    /// Read the file, falling back to `{enabled: false}` on any failure.
    pub fn load_or_default(&self) -> FeatureConfig {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("config: {e}; falling back to disabled");
                FeatureConfig::default()
            }
        }
    }

    /// Write the whole config, creating the parent directory if needed.
    pub fn save(&self, config: &FeatureConfig) -> Result<(), GuardError> {
        let io_err = |source| GuardError::ConfigIo {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(config).map_err(|source| {
            GuardError::ConfigParse {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(io_err)
    }

    /// Current switch value, loading from disk on first call.
    pub fn enabled(&mut self) -> bool {
        if let Some(config) = self.cached {
            return config.enabled;
        }
        let config = self.load_or_default();
        self.cached = Some(config);
        config.enabled
    }

    /// Flip the switch and persist it. The in-memory value only changes
    /// once the write succeeded.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), GuardError> {
        let config = FeatureConfig { enabled };
        self.save(&config)?;
        self.cached = Some(config);
        Ok(())
    }
}

// ── GuardConfig ──────────────────────────────────────────────────────────

/// How the deleter identity is compared with the agent's own account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelfMatchPolicy {
    /// Deleter identity contains the agent's account number anywhere.
    #[default]
    Substring,
    /// Deleter's account number equals the agent's account number.
    Exact,
}

/// Runtime tuning for the guard.
///
/// ```rust
/// use std::time::Duration;
/// use ghostwatch_core::GuardConfig;
///
/// let config = GuardConfig::new()
///     .self_id("254700000001:3@s.whatsapp.net")
///     .archive_capacity(1_000)
///     .archive_ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Directory media files are materialized into.
    pub scratch_dir: PathBuf,
    /// Location of the persisted [`FeatureConfig`].
    pub feature_config_path: PathBuf,
    /// Admission policy for multi-party conversations.
    pub group_limit: RateLimitPolicy,
    /// Admission policy for one-to-one conversations.
    pub direct_limit: RateLimitPolicy,
    /// Reaper sweep period.
    pub reaper_interval: Duration,
    /// Age after which the reaper deletes a media file.
    pub media_max_age: Duration,
    /// Maximum archived messages before least-recently-stored eviction.
    pub archive_capacity: usize,
    /// Age after which an archived message is dropped.
    pub archive_ttl: Duration,
    /// Period of the archive TTL sweep.
    pub archive_sweep_interval: Duration,
    /// Character budget for the original text in a notification.
    pub text_budget: usize,
    /// Offset applied when formatting notification timestamps.
    pub utc_offset_secs: i32,
    /// The agent's own platform identity.
    pub self_id: String,
    pub self_match: SelfMatchPolicy,
    /// Prefix shown in command usage replies.
    pub command_prefix: String,
    /// Buffer size of the runtime's channels.
    pub channel_capacity: usize,
    /// How long shutdown waits for in-flight sends and captures.
    pub shutdown_grace: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardConfig {
    /// Create a config with defaults.
    ///
    /// If `GHOSTWATCH_SCRATCH_DIR` is set it replaces the default scratch
    /// directory (`<tmp>/ghostwatch-media`).
    pub fn new() -> Self {
        let scratch_dir = std::env::var_os("GHOSTWATCH_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("ghostwatch-media"));

        Self {
            scratch_dir,
            feature_config_path: PathBuf::from("data/antidelete.json"),
            group_limit: RateLimitPolicy::GROUP,
            direct_limit: RateLimitPolicy::DIRECT,
            reaper_interval: Duration::from_secs(60 * 60),
            media_max_age: Duration::from_secs(24 * 60 * 60),
            archive_capacity: 5_000,
            archive_ttl: Duration::from_secs(24 * 60 * 60),
            archive_sweep_interval: Duration::from_secs(300),
            text_budget: 1000,
            utc_offset_secs: 3 * 60 * 60,
            self_id: String::new(),
            self_match: SelfMatchPolicy::Substring,
            command_prefix: ".".to_string(),
            channel_capacity: 256,
            shutdown_grace: Duration::from_secs(10),
        }
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn feature_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.feature_config_path = path.into();
        self
    }

    pub fn group_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.group_limit = policy;
        self
    }

    pub fn direct_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.direct_limit = policy;
        self
    }

    /// Clamped to [`MIN_INTERVAL`].
    pub fn reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = interval.max(MIN_INTERVAL);
        self
    }

    pub fn media_max_age(mut self, age: Duration) -> Self {
        self.media_max_age = age;
        self
    }

    /// Clamped to at least one entry.
    pub fn archive_capacity(mut self, capacity: usize) -> Self {
        self.archive_capacity = capacity.max(1);
        self
    }

    pub fn archive_ttl(mut self, ttl: Duration) -> Self {
        self.archive_ttl = ttl;
        self
    }

    /// Clamped to [`MIN_INTERVAL`].
    pub fn archive_sweep_interval(mut self, interval: Duration) -> Self {
        self.archive_sweep_interval = interval.max(MIN_INTERVAL);
        self
    }

    pub fn text_budget(mut self, chars: usize) -> Self {
        self.text_budget = chars;
        self
    }

    pub fn utc_offset_secs(mut self, secs: i32) -> Self {
        self.utc_offset_secs = secs;
        self
    }

    pub fn self_id(mut self, id: impl Into<String>) -> Self {
        self.self_id = id.into();
        self
    }

    pub fn self_match(mut self, policy: SelfMatchPolicy) -> Self {
        self.self_match = policy;
        self
    }

    pub fn command_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.command_prefix = prefix.into();
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

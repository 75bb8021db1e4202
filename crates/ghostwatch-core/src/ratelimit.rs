/// Sliding-window admission control.
///
/// Every call is both a check and a record: an admitted event is appended
/// to its key's window, a limited one is not. Timestamps are Unix ms and
/// injected by the caller so the limiter stays deterministic under test.
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::types::{is_group_chat, now_ms};

/// Only every Nth limited hit per key is logged.
const LOG_EVERY_N_HITS: u64 = 10;

/// Limit of `max_requests` admitted events per trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: usize,
    pub window: Duration,
}

impl RateLimitPolicy {
    /// Multi-party conversations: 5 events per 10 seconds.
    pub const GROUP: Self = Self::new(5, Duration::from_secs(10));

    /// One-to-one conversations: 10 events per 10 seconds.
    pub const DIRECT: Self = Self::new(10, Duration::from_secs(10));

    pub const fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub limited: bool,
    /// Time until the oldest event in the window leaves it. Zero when admitted.
    pub time_to_wait: Duration,
}

impl RateDecision {
    pub fn admitted() -> Self {
        Self {
            limited: false,
            time_to_wait: Duration::ZERO,
        }
    }

    pub fn limited(time_to_wait: Duration) -> Self {
        Self {
            limited: true,
            time_to_wait,
        }
    }
}

/// Per-key sliding window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: HashMap<String, VecDeque<u64>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: HashMap::new(),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Check and record against the wall clock.
    pub fn is_limited(&mut self, key: &str) -> RateDecision {
        self.is_limited_at(key, now_ms())
    }

    /// Check and record at `now` (Unix ms).
    pub fn is_limited_at(&mut self, key: &str, now: u64) -> RateDecision {
        let window_ms = self.policy.window.as_millis() as u64;

        let timestamps = self.windows.entry(key.to_string()).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.saturating_sub(oldest) >= window_ms {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.policy.max_requests {
            let wait_ms = timestamps
                .front()
                .map(|&oldest| window_ms.saturating_sub(now.saturating_sub(oldest)))
                .unwrap_or(window_ms);
            return RateDecision::limited(Duration::from_millis(wait_ms));
        }

        timestamps.push_back(now);
        RateDecision::admitted()
    }

    /// Drop keys whose window has fully drained. Returns the number removed.
    pub fn prune_idle(&mut self, now: u64) -> usize {
        let window_ms = self.policy.window.as_millis() as u64;
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&newest| now.saturating_sub(newest) < window_ms)
        });
        before - self.windows.len()
    }

    /// Number of keys currently tracked.
    pub fn key_count(&self) -> usize {
        self.windows.len()
    }

    /// Events recorded in `key`'s window (not pruned to `now`).
    pub fn window_len(&self, key: &str) -> usize {
        self.windows.get(key).map_or(0, VecDeque::len)
    }
}

/// The single admission gate: picks the group or direct limiter by
/// conversation id and throttles the logging of repeated hits.
#[derive(Debug)]
pub struct AdmissionGate {
    group: RateLimiter,
    direct: RateLimiter,
    hits: HashMap<String, u64>,
}

impl AdmissionGate {
    pub fn new(group: RateLimitPolicy, direct: RateLimitPolicy) -> Self {
        Self {
            group: RateLimiter::new(group),
            direct: RateLimiter::new(direct),
            hits: HashMap::new(),
        }
    }

    /// Admission check keyed by conversation id.
    pub fn check(&mut self, chat_id: &str, now: u64) -> RateDecision {
        let group = is_group_chat(chat_id);
        let limiter = if group { &mut self.group } else { &mut self.direct };
        let decision = limiter.is_limited_at(chat_id, now);

        if decision.limited {
            let count = self.hits.entry(chat_id.to_string()).or_insert(0);
            *count += 1;
            if *count % LOG_EVERY_N_HITS == 1 {
                tracing::warn!(
                    chat_id,
                    hits = *count,
                    wait_ms = decision.time_to_wait.as_millis() as u64,
                    "ratelimit: conversation limited"
                );
            }
        }
        decision
    }

    /// Number of limited hits seen for a conversation.
    pub fn hit_count(&self, chat_id: &str) -> u64 {
        self.hits.get(chat_id).copied().unwrap_or(0)
    }

    /// Prune drained windows in both limiters and forget their hit counts.
    pub fn prune_idle(&mut self, now: u64) -> usize {
        let removed = self.group.prune_idle(now) + self.direct.prune_idle(now);
        let (group, direct) = (&self.group, &self.direct);
        self.hits
            .retain(|key, _| group.window_len(key) > 0 || direct.window_len(key) > 0);
        removed
    }

    pub fn key_count(&self) -> usize {
        self.group.key_count() + self.direct.key_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_max_then_limits() {
        let mut limiter = RateLimiter::new(RateLimitPolicy::new(5, Duration::from_millis(10_000)));
        for _ in 0..5 {
            assert!(!limiter.is_limited_at("group1", 0).limited);
        }

        let decision = limiter.is_limited_at("group1", 1_000);
        assert!(decision.limited);
        assert_eq!(decision.time_to_wait, Duration::from_millis(9_000));

        assert!(!limiter.is_limited_at("group1", 10_001).limited);
    }

    #[test]
    fn limited_call_is_not_recorded() {
        let mut limiter = RateLimiter::new(RateLimitPolicy::new(1, Duration::from_secs(10)));
        assert!(!limiter.is_limited_at("k", 0).limited);
        assert!(limiter.is_limited_at("k", 5_000).limited);
        assert!(limiter.is_limited_at("k", 9_999).limited);
        assert_eq!(limiter.window_len("k"), 1);
        assert!(!limiter.is_limited_at("k", 10_000).limited);
    }

    #[test]
    fn keys_are_independent() {
        let mut limiter = RateLimiter::new(RateLimitPolicy::new(1, Duration::from_secs(10)));
        assert!(!limiter.is_limited_at("a", 0).limited);
        assert!(!limiter.is_limited_at("b", 0).limited);
        assert!(limiter.is_limited_at("a", 1).limited);
    }

    #[test]
    fn zero_budget_always_limits() {
        let mut limiter = RateLimiter::new(RateLimitPolicy::new(0, Duration::from_secs(10)));
        let decision = limiter.is_limited_at("k", 0);
        assert!(decision.limited);
        assert_eq!(decision.time_to_wait, Duration::from_secs(10));
    }

    #[test]
    fn prune_idle_drops_drained_keys() {
        let mut limiter = RateLimiter::new(RateLimitPolicy::new(3, Duration::from_secs(10)));
        limiter.is_limited_at("old", 0);
        limiter.is_limited_at("fresh", 9_000);
        assert_eq!(limiter.prune_idle(12_000), 1);
        assert_eq!(limiter.key_count(), 1);
        assert_eq!(limiter.window_len("fresh"), 1);
    }

    #[test]
    fn gate_uses_group_and_direct_policies() {
        let mut gate = AdmissionGate::new(RateLimitPolicy::GROUP, RateLimitPolicy::DIRECT);

        for _ in 0..5 {
            assert!(!gate.check("g1@g.us", 0).limited);
        }
        assert!(gate.check("g1@g.us", 0).limited);

        for _ in 0..10 {
            assert!(!gate.check("254700000002@s.whatsapp.net", 0).limited);
        }
        assert!(gate.check("254700000002@s.whatsapp.net", 0).limited);
    }

    #[test]
    fn gate_counts_hits_and_forgets_on_prune() {
        let mut gate = AdmissionGate::new(
            RateLimitPolicy::new(1, Duration::from_secs(10)),
            RateLimitPolicy::DIRECT,
        );
        gate.check("g1@g.us", 0);
        gate.check("g1@g.us", 1);
        gate.check("g1@g.us", 2);
        assert_eq!(gate.hit_count("g1@g.us"), 2);

        gate.prune_idle(20_000);
        assert_eq!(gate.hit_count("g1@g.us"), 0);
        assert_eq!(gate.key_count(), 0);
    }
}

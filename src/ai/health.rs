//! Provider Health Tracker
//!
//! In-memory, process-lifetime registry of per-provider outcomes. Tracks
//! success/failure/rate-limit counters, a response-time moving average, and
//! a temporary skip state for providers that keep rate-limiting. The data is
//! an optimization hint, not a correctness requirement: a fresh process
//! starts unbiased and converges from observed traffic.
//!
//! Backed by `DashMap` so a dispatcher that ever runs chunks concurrently
//! does not race on the counters. Injected explicitly (not a global) with a
//! `reset()` for test isolation.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::constants::health as health_constants;

/// Per-provider outcome counters and timing
#[derive(Debug, Clone)]
pub struct ProviderStats {
    /// Human-readable provider name
    pub name: String,
    pub success_count: u32,
    pub failure_count: u32,
    pub rate_limit_count: u32,
    pub last_used: Option<Instant>,
    /// Set after 3 consecutive rate limits; cleared on success or cool-down
    pub is_rate_limited: bool,
    /// Exponential moving average, new-sample weight 0.3
    pub avg_response_time_ms: f64,
    pub last_rate_limit: Option<Instant>,
}

impl ProviderStats {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success_count: 0,
            failure_count: 0,
            rate_limit_count: 0,
            last_used: None,
            is_rate_limited: false,
            avg_response_time_ms: 0.0,
            last_rate_limit: None,
        }
    }

    fn total_attempts(&self) -> u32 {
        self.success_count + self.failure_count + self.rate_limit_count
    }

    /// Success rate across all recorded attempts; 0/0 counts as 0
    pub fn success_rate(&self) -> f64 {
        let total = self.total_attempts();
        if total == 0 {
            0.0
        } else {
            f64::from(self.success_count) / f64::from(total)
        }
    }

    /// Fraction of attempts that failed or rate-limited; 0/0 counts as 0
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_attempts();
        if total == 0 {
            0.0
        } else {
            f64::from(self.failure_count + self.rate_limit_count) / f64::from(total)
        }
    }
}

/// Thread-safe registry of provider health
pub struct ProviderHealthTracker {
    stats: DashMap<String, ProviderStats>,
    cooldown: Duration,
}

impl Default for ProviderHealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderHealthTracker {
    pub fn new() -> Self {
        Self::with_cooldown(Duration::from_secs(
            health_constants::RATE_LIMIT_COOLDOWN_SECS,
        ))
    }

    /// Tracker with a custom skip cool-down (used by tests)
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            stats: DashMap::new(),
            cooldown,
        }
    }

    /// Record a successful call and its round-trip time
    pub fn record_success(&self, provider: &str, elapsed: Duration) {
        let mut entry = self
            .stats
            .entry(provider.to_string())
            .or_insert_with(|| ProviderStats::new(provider));

        entry.success_count += 1;
        entry.last_used = Some(Instant::now());
        entry.is_rate_limited = false;

        let sample = elapsed.as_millis() as f64;
        let weight = health_constants::RESPONSE_TIME_EMA_WEIGHT;
        entry.avg_response_time_ms = if entry.avg_response_time_ms == 0.0 {
            sample
        } else {
            entry.avg_response_time_ms * (1.0 - weight) + sample * weight
        };

        debug!(
            provider,
            successes = entry.success_count,
            avg_ms = entry.avg_response_time_ms as u64,
            "recorded success"
        );
    }

    /// Record a rate-limit response; the third consecutive one enters skip state
    pub fn record_rate_limit(&self, provider: &str) {
        let mut entry = self
            .stats
            .entry(provider.to_string())
            .or_insert_with(|| ProviderStats::new(provider));

        entry.rate_limit_count += 1;
        entry.last_used = Some(Instant::now());
        entry.last_rate_limit = Some(Instant::now());

        if entry.rate_limit_count >= health_constants::RATE_LIMIT_SKIP_THRESHOLD {
            entry.is_rate_limited = true;
            info!(
                provider,
                count = entry.rate_limit_count,
                cooldown_secs = self.cooldown.as_secs(),
                "provider rate limited, entering skip state"
            );
        } else {
            debug!(
                provider,
                count = entry.rate_limit_count,
                threshold = health_constants::RATE_LIMIT_SKIP_THRESHOLD,
                "rate limit detected"
            );
        }
    }

    /// Record a non-rate-limit failure
    pub fn record_failure(&self, provider: &str) {
        let mut entry = self
            .stats
            .entry(provider.to_string())
            .or_insert_with(|| ProviderStats::new(provider));

        entry.failure_count += 1;
        entry.last_used = Some(Instant::now());

        debug!(provider, failures = entry.failure_count, "recorded failure");
    }

    /// Whether a provider is in skip state.
    ///
    /// A skipped provider whose cool-down has expired is cleared in place:
    /// the flag drops and the rate-limit counter resets to zero.
    pub fn should_skip(&self, provider: &str) -> bool {
        let Some(mut entry) = self.stats.get_mut(provider) else {
            return false;
        };

        if !entry.is_rate_limited {
            return false;
        }

        let elapsed = entry
            .last_rate_limit
            .map(|t| t.elapsed())
            .unwrap_or(Duration::MAX);

        if elapsed > self.cooldown {
            entry.is_rate_limited = false;
            entry.rate_limit_count = 0;
            info!(provider, "rate limit cool-down expired, retrying");
            return false;
        }

        debug!(
            provider,
            remaining_secs = (self.cooldown - elapsed).as_secs(),
            "provider skipped (rate limited)"
        );
        true
    }

    /// Candidate providers ordered by descending success rate, then ascending
    /// average response time, with skipped providers filtered out.
    pub fn ordered_providers<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let mut ordered: Vec<String> = candidates
            .into_iter()
            .filter(|p| !self.should_skip(p))
            .map(str::to_string)
            .collect();

        ordered.sort_by(|a, b| {
            let (rate_a, time_a) = self
                .stats
                .get(a)
                .map(|s| (s.success_rate(), s.avg_response_time_ms))
                .unwrap_or((0.0, 0.0));
            let (rate_b, time_b) = self
                .stats
                .get(b)
                .map(|s| (s.success_rate(), s.avg_response_time_ms))
                .unwrap_or((0.0, 0.0));

            rate_b
                .partial_cmp(&rate_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    time_a
                        .partial_cmp(&time_b)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });

        ordered
    }

    /// Request timeout tuned to provider health: consistently unhealthy
    /// providers fail fast instead of holding up the pipeline.
    pub fn optimized_timeout(&self, provider: &str) -> Duration {
        let failure_rate = self
            .stats
            .get(provider)
            .map(|s| s.failure_rate())
            .unwrap_or(0.0);

        let ms = if failure_rate > 0.5 {
            health_constants::UNHEALTHY_TIMEOUT_MS
        } else if failure_rate > 0.25 {
            health_constants::DEGRADED_TIMEOUT_MS
        } else {
            health_constants::DEFAULT_TIMEOUT_MS
        };

        Duration::from_millis(ms)
    }

    /// Snapshot of a provider's stats
    pub fn stats(&self, provider: &str) -> Option<ProviderStats> {
        self.stats.get(provider).map(|s| s.clone())
    }

    /// Clear all counters (test isolation and manual intervention)
    pub fn reset(&self) {
        self.stats.clear();
        info!("provider health tracker reset");
    }

    /// Human-readable summary of all tracked providers
    pub fn summary(&self) -> String {
        let mut lines = vec!["=== PROVIDER STATISTICS ===".to_string()];
        for entry in self.stats.iter() {
            let s = entry.value();
            let status = if s.is_rate_limited {
                "RATE LIMITED"
            } else {
                "ACTIVE"
            };
            lines.push(format!(
                "{}: {} | success: {} | failures: {} | rate limits: {} | success rate: {:.1}% | avg response: {:.0}ms",
                s.name,
                status,
                s.success_count,
                s.failure_count,
                s.rate_limit_count,
                s.success_rate() * 100.0,
                s.avg_response_time_ms,
            ));
        }
        lines.join("\n")
    }
}

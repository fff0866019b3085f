//! Global Constants
//!
//! Centralized defaults for tuning. These are defaults for configuration
//! values, not invariants: the only load-bearing relationship is that the
//! primary providers have a much smaller context window than the
//! high-context escalation provider.

/// Token estimation and context limits
pub mod tokens {
    /// Character-per-token heuristic for English prose
    pub const CHARS_PER_TOKEN: usize = 4;

    /// Manuscripts at or under this estimate take the direct (unchunked) path
    pub const DIRECT_ANALYSIS_THRESHOLD: usize = 6_000;

    /// Safe aggregation prompt size for the primary provider class
    pub const PRIMARY_SAFE_LIMIT: usize = 6_000;

    /// Context limit of the high-context escalation provider class
    pub const HIGH_CONTEXT_LIMIT: usize = 1_000_000;
}

/// Chunking defaults
pub mod chunking {
    /// Soft token cap per chunk (warns if exceeded)
    pub const MAX_TOKENS_PER_CHUNK: usize = 8_000;

    /// Hard character target per chunk (~8000 tokens)
    pub const MAX_CHARS_PER_CHUNK: usize = 32_000;

    /// Trailing characters carried into the next chunk for context
    pub const OVERLAP_CHARS: usize = 500;

    /// Break-point search window as a fraction of the chunk size
    pub const DEVIATION_FRACTION: f64 = 0.1;
}

/// Provider health tracking
pub mod health {
    /// Consecutive rate limits before a provider enters the skip state
    pub const RATE_LIMIT_SKIP_THRESHOLD: u32 = 3;

    /// Cool-down before a skipped provider is tried again (seconds)
    pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 60;

    /// Weight of a new sample in the response-time moving average
    pub const RESPONSE_TIME_EMA_WEIGHT: f64 = 0.3;

    /// Request timeout for healthy providers (milliseconds)
    pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

    /// Request timeout when failure rate exceeds 25% (milliseconds)
    pub const DEGRADED_TIMEOUT_MS: u64 = 10_000;

    /// Request timeout when failure rate exceeds 50% (milliseconds)
    pub const UNHEALTHY_TIMEOUT_MS: u64 = 8_000;
}

/// Retry and backoff defaults
pub mod retry {
    /// Maximum retries for retryable network failures
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const INITIAL_DELAY_MS: u64 = 1_000;

    /// Maximum delay between retries (milliseconds)
    pub const MAX_DELAY_MS: u64 = 30_000;

    /// Backoff multiplier
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Jitter as a fraction of the computed delay
    pub const JITTER_FACTOR: f64 = 0.1;

    /// Base delay for rate-limit backoff (5s, 10s, 20s, ...)
    pub const RATE_LIMIT_INITIAL_DELAY_MS: u64 = 5_000;

    /// Cap for rate-limit backoff (milliseconds)
    pub const RATE_LIMIT_MAX_DELAY_MS: u64 = 120_000;

    /// Rate-limit attempts before giving up and rotating providers.
    /// Persistent rate limiting is a signal to switch, not to keep waiting.
    pub const RATE_LIMIT_MAX_ATTEMPTS: u32 = 2;
}

/// Aggregation defaults
pub mod aggregation {
    /// Maximum chunk results combined per multi-stage batch
    pub const BATCH_SIZE: usize = 50;
}

/// LLM request defaults
pub mod llm {
    /// Sampling temperature for analysis prompts
    pub const TEMPERATURE: f32 = 0.7;

    /// Maximum tokens to generate per completion
    pub const MAX_COMPLETION_TOKENS: usize = 4_096;

    /// Maximum tokens for aggregation completions (reports are long)
    pub const MAX_AGGREGATION_TOKENS: usize = 8_000;
}

//! Process-wide pipeline configuration, ambient to every component. Loaded
//! once per process and passed by `Arc` reference.

use std::time::Duration;

use crate::domain::RollMode;

/// Exponential-backoff-with-jitter policy for any `TransientUpstream` retry.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_factor: 0.2,
        }
    }
}

/// All tunables `process_turn` and its supporting components read.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub default_roll_mode: RollMode,
    pub anticipation_enabled: bool,

    /// Default fuzzy-match confidence threshold for the Action Matcher.
    pub min_match_confidence: f64,

    /// Fuzzy-match threshold above which an unknown key is silently
    /// rewritten to an existing one.
    pub unknown_key_rewrite_threshold: f64,

    /// Anticipation breadth: top-N likely next actions.
    pub anticipation_breadth: usize,

    /// Anticipation worker concurrency bound per session.
    pub anticipation_workers: usize,

    /// Narrative validator retry budget.
    pub narrator_retry_budget: u32,

    /// Delta validator regeneration budget: a failing branch is regenerated
    /// at most once before the turn degrades.
    pub delta_regeneration_budget: u32,

    pub branch_cache_capacity_per_session: usize,
    pub branch_cache_ttl: Duration,

    pub llm_retry: RetryConfig,

    /// Per-LLM-call timeout; expiry is treated as a transient error.
    pub llm_call_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_roll_mode: RollMode::Auto,
            anticipation_enabled: true,
            min_match_confidence: 0.72,
            unknown_key_rewrite_threshold: 0.78,
            anticipation_breadth: 3,
            anticipation_workers: 2,
            narrator_retry_budget: 3,
            delta_regeneration_budget: 1,
            branch_cache_capacity_per_session: 256,
            branch_cache_ttl: Duration::from_secs(600),
            llm_retry: RetryConfig::default(),
            llm_call_timeout: Duration::from_secs(20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let config = PipelineConfig::default();
        assert_eq!(config.anticipation_breadth, 3);
        assert_eq!(config.anticipation_workers, 2);
        assert!((config.min_match_confidence - 0.72).abs() < f64::EPSILON);
    }
}

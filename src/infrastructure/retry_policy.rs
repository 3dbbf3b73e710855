//! Retry policy for page fetches
//!
//! Capped exponential backoff with symmetric jitter. Sleeping goes through
//! the [`Sleeper`] trait so tests can record delays instead of waiting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Jitter as a share of the computed delay, applied in both directions
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy without any waiting, for tests and one-shot tools
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter_ratio: 0.0,
        }
    }

    /// Whether another attempt is allowed after `attempts_made` attempts
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Delay before retry number `retry` (1-based), without jitter
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let exponential = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = exponential.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Delay before retry number `retry` with jitter applied, never above the cap
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay_ms = self.base_delay_for(retry).as_millis() as u64;
        let jitter_range = (delay_ms as f64 * self.jitter_ratio.clamp(0.0, 1.0)) as u64;
        if jitter_range == 0 {
            return Duration::from_millis(delay_ms);
        }
        let jitter = fastrand::u64(0..=jitter_range * 2);
        let jittered = (delay_ms + jitter).saturating_sub(jitter_range);
        Duration::from_millis(jittered.min(self.max_delay_ms))
    }
}

/// Something that can wait
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real waiting on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

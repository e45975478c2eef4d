//! Reconnect policy.
//!
//! The policy is a plain state machine over "connection opened" and
//! "connection closed" signals. It never sleeps itself; the session
//! controller waits out the returned delay through a [`Sleeper`], so the
//! policy and the controller can be driven by a fake clock in tests.

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Always wait `base_delay`.
    Fixed,
    /// Wait `attempt × base_delay`, capped at `max_delay`.
    Linear,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Fixed => write!(f, "fixed"),
            Strategy::Linear => write!(f, "linear"),
        }
    }
}

/// Tunables for [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub strategy: Strategy,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Consecutive failed connections tolerated before giving up.
    /// `0` means retry forever.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    /// - strategy: linear
    /// - base_delay: 3 s
    /// - max_delay: 15 s
    /// - max_attempts: 5
    fn default() -> Self {
        Self {
            strategy: Strategy::Linear,
            base_delay_ms: 3_000,
            max_delay_ms: 15_000,
            max_attempts: 5,
        }
    }
}

/// What the controller should do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reconnect after `delay`. `attempt` is 1-based.
    Retry { attempt: u32, delay: Duration },
    /// Attempt limit reached; the session is terminal until restarted.
    GiveUp { attempts: u32 },
}

/// Strategy, limit and the current consecutive-failure counter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempts: u32,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Consecutive closes since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A connection opened: the counter starts over.
    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// A connection closed (or never opened). Returns the next step.
    pub fn on_close(&mut self) -> RetryDecision {
        let limit = self.config.max_attempts;
        if limit != 0 && self.attempts >= limit {
            return RetryDecision::GiveUp {
                attempts: self.attempts,
            };
        }
        self.attempts = self.attempts.saturating_add(1);
        RetryDecision::Retry {
            attempt: self.attempts,
            delay: self.delay_for(self.attempts),
        }
    }

    /// Delay before the `attempt`-th reconnect (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms;
        let ms = match self.config.strategy {
            Strategy::Fixed => base,
            Strategy::Linear => base
                .saturating_mul(u64::from(attempt))
                .min(self.config.max_delay_ms.max(base)),
        };
        Duration::from_millis(ms)
    }
}

/// Source of delays for the controller.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, delay: Duration);
}

/// Real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

//! Retry policy for image generation.
//!
//! The policy is a plain value: an ordered list of backend identifiers, a
//! per-backend attempt budget and a backoff base. [`RetryPolicy::schedule`]
//! flattens it into the exact sequence of attempts the visualizer performs.

use std::{num::NonZeroU32, time::Duration};

pub const DEFAULT_BACKENDS: &[&str] = &["flux", "turbo"];
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    backends: Vec<String>,
    max_attempts: NonZeroU32,
    base_delay: Duration,
}

/// One planned attempt: which backend, which try on that backend, and how long
/// to wait before issuing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAttempt<'a> {
    pub backend: &'a str,
    pub attempt: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backends: DEFAULT_BACKENDS.iter().map(|b| b.to_string()).collect(),
            max_attempts: NonZeroU32::new(DEFAULT_MAX_ATTEMPTS).unwrap_or(NonZeroU32::MIN),
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Build a policy; an empty backend list falls back to the defaults.
    pub fn new(backends: Vec<String>, max_attempts: NonZeroU32, base_delay: Duration) -> Self {
        let backends: Vec<String> = backends
            .into_iter()
            .map(|backend| backend.trim().to_string())
            .filter(|backend| !backend.is_empty())
            .collect();
        let backends = if backends.is_empty() {
            Self::default().backends
        } else {
            backends
        };
        Self {
            backends,
            max_attempts,
            base_delay,
        }
    }

    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    pub fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    /// Delay before try `attempt` (1-based) on the same backend:
    /// zero for the first try, then `base * 2^(attempt - 1)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Total attempts across every backend.
    pub fn total_attempts(&self) -> usize {
        self.backends.len() * self.max_attempts.get() as usize
    }

    pub fn schedule(&self) -> impl Iterator<Item = PlannedAttempt<'_>> + '_ {
        self.backends.iter().flat_map(move |backend| {
            (1..=self.max_attempts.get()).map(move |attempt| PlannedAttempt {
                backend: backend.as_str(),
                attempt,
                delay: self.delay_before(attempt),
            })
        })
    }
}

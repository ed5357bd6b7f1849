//! Exponential backoff for Redis resubscription

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000, // 30 seconds
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Delay sequence: initial, then multiplied each attempt, capped, with jitter
pub struct ExponentialBackoff {
    config: BackoffConfig,
    next_delay_ms: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        let initial = config.initial_delay_ms as f64;
        Self {
            config,
            next_delay_ms: initial,
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;

        let base = self.next_delay_ms.min(self.config.max_delay_ms as f64);
        self.next_delay_ms = (base * self.config.multiplier).min(self.config.max_delay_ms as f64);

        let delay = if self.config.jitter_factor > 0.0 {
            let range = base * self.config.jitter_factor;
            base + rand::rng().random_range(-range..=range)
        } else {
            base
        };

        Duration::from_millis(delay.max(1.0) as u64)
    }

    /// Back to the initial delay after a healthy subscription
    pub fn reset(&mut self) {
        self.next_delay_ms = self.config.initial_delay_ms as f64;
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

use std::time::Duration;

/// Reconnect delays used by the streaming synchronizer.
///
/// The delay for attempt `n` is `step * n`, with attempt zero using `initial_delay`, capped at
/// `max_delay`. Up to `jitter_ratio` of that delay is then subtracted at random.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub step: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
    /// Start counting attempts from zero again once a connection delivers a valid batch.
    pub reset_after_success: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            step: Duration::from_secs(2),
            max_delay: Duration::from_secs(64),
            jitter_ratio: 0.3,
            reset_after_success: true,
        }
    }
}

/// Attempt counter for one reconnect loop.
#[derive(Debug)]
pub(crate) struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The delay before the next reconnect. Advances the attempt counter.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.delay_with_sample(fastrand::f64());
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Called after a connection delivered a valid batch.
    pub(crate) fn reset(&mut self) {
        if self.config.reset_after_success {
            self.attempt = 0;
        }
    }

    fn base_delay(&self) -> Duration {
        if self.attempt == 0 {
            return self.config.initial_delay.min(self.config.max_delay);
        }
        self.config
            .step
            .saturating_mul(self.attempt)
            .min(self.config.max_delay)
    }

    fn delay_with_sample(&self, sample: f64) -> Duration {
        let jitter = unit_interval(sample) * unit_interval(self.config.jitter_ratio);
        self.base_delay().mul_f64(1.0 - jitter)
    }
}

// Clamp to [0, 1]; NaN counts as zero.
fn unit_interval(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

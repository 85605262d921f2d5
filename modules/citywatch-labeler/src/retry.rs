use std::time::Duration;

use rand::Rng;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(16);
pub const DEFAULT_JITTER: Duration = Duration::from_millis(300);
pub const DEFAULT_STRUCTURAL_DELAY: Duration = Duration::from_millis(500);

/// How one entry is retried.
///
/// Transient failures wait `delay + U(0, jitter)` and double `delay` up to
/// `max_backoff`. Structural failures wait a flat `structural_delay` and
/// leave `delay` alone. Both share `max_attempts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: Duration,
    pub structural_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            jitter: DEFAULT_JITTER,
            structural_delay: DEFAULT_STRUCTURAL_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Fresh backoff state for one entry.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            delay: self.initial_backoff,
            max: self.max_backoff,
            jitter: self.jitter,
            structural: self.structural_delay,
        }
    }

    /// Waits after `failures` consecutive transient failures, without jitter.
    pub fn transient_schedule(&self, failures: u32) -> Vec<Duration> {
        let mut delay = self.initial_backoff;
        (0..failures)
            .map(|_| {
                let wait = delay;
                delay = (delay * 2).min(self.max_backoff);
                wait
            })
            .collect()
    }
}

/// Per-entry backoff state. Never shared between entries.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max: Duration,
    jitter: Duration,
    structural: Duration,
}

impl Backoff {
    /// Wait after a rate limit, timeout or connection failure.
    pub fn after_transient(&mut self) -> Duration {
        let wait = self.delay + random_jitter(self.jitter);
        self.delay = (self.delay * 2).min(self.max);
        wait
    }

    /// Wait after any other failure.
    pub fn after_structural(&self) -> Duration {
        self.structural
    }

    /// Deterministic part of the next transient wait.
    pub fn current_delay(&self) -> Duration {
        self.delay
    }
}

fn random_jitter(max: Duration) -> Duration {
    let max_micros = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
    if max_micros == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(rand::rng().random_range(0..=max_micros))
}

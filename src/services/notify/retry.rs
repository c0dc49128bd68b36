use rand::Rng;
use std::time::Duration;

/// Delivery retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    pub max_attempts: u32,
    pub jitter_factor: f64,
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 2,
            max_delay_secs: 60,
            max_attempts: 4,
            jitter_factor: 0.1, // ±10%
            timeout_secs: 10,   // per sendMessage call
        }
    }
}

impl RetryConfig {
    /// Delay before the retry following `attempt` (0-based):
    /// min(base × 2^attempt × (1 ± jitter), max_delay)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay_secs as f64;
        let exponential = base * 2_f64.powi(attempt as i32);

        let mut rng = rand::rng();
        let jitter = 1.0 + (rng.random::<f64>() * 2.0 - 1.0) * self.jitter_factor;
        let capped = (exponential * jitter).min(self.max_delay_secs as f64);

        Duration::from_millis((capped * 1000.0) as u64)
    }

    /// Whether another attempt is allowed after `attempts_made`.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

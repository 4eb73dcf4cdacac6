//! Timing utilities: upstream pacing delays and job duration logging.

use log::{debug, info};
use rand::Rng;
use std::time::{Duration, Instant};

/// Spreads `base` uniformly over `base ± base * jitter`.
///
/// `jitter` is clamped to `[0, 1]`, so the result is never negative.
pub fn delay_with_jitter(base: Duration, jitter: f64) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    let jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
    let base_ms = base.as_millis() as f64;
    let spread = base_ms * jitter;
    let offset = if spread > 0.0 {
        rand::thread_rng().gen_range(-spread..=spread)
    } else {
        0.0
    };
    Duration::from_millis((base_ms + offset).round().max(0.0) as u64)
}

/// A timer for measuring operation durations
#[derive(Debug)]
pub struct Timer {
    start_time: Instant,
    operation_name: String,
}

impl Timer {
    pub fn start(operation_name: &str) -> Self {
        debug!("⏱️ Starting timer for: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name: operation_name.to_string(),
        }
    }

    /// Finish the timer and log the total duration
    pub fn finish(self) -> Duration {
        let total = self.start_time.elapsed();
        info!("🕐 {} completed in {}ms", self.operation_name, total.as_millis());
        total
    }
}

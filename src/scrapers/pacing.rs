use rand::Rng;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Randomized waits between browser actions so the session looks human
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    enabled: bool,
    min_delay: f64,
    max_delay: f64,
}

impl PacingPolicy {
    pub fn new(enabled: bool, min_delay: f64, max_delay: f64) -> Self {
        Self {
            enabled,
            min_delay,
            max_delay,
        }
    }

    /// Pacing that never sleeps
    pub fn disabled() -> Self {
        Self::new(false, 0.0, 0.0)
    }

    /// Sleep for the default bounds
    pub fn pause(&self) {
        self.delay(self.min_delay, self.max_delay);
    }

    /// Sleep for a uniformly random time in `[min_seconds, max_seconds]`
    pub fn delay(&self, min_seconds: f64, max_seconds: f64) {
        if !self.enabled {
            return;
        }

        let wait = sample_seconds(&mut rand::thread_rng(), min_seconds, max_seconds);
        debug!("Pausing for {:.2}s", wait);
        thread::sleep(Duration::from_secs_f64(wait));
    }
}

fn sample_seconds<R: Rng>(rng: &mut R, min_seconds: f64, max_seconds: f64) -> f64 {
    let (low, high) = if min_seconds <= max_seconds {
        (min_seconds, max_seconds)
    } else {
        (max_seconds, min_seconds)
    };
    let low = low.max(0.0);
    let high = high.max(low);

    if high == low {
        low
    } else {
        rng.gen_range(low..=high)
    }
}

//! Jittered pauses between requests to the racing sites.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Pacer {
    min_delay: Duration,
    max_delay: Duration,
}

impl Pacer {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        Self {
            min_delay,
            max_delay,
        }
    }

    /// Random delay in `[min_delay, max_delay]`
    pub fn next_delay(&self) -> Duration {
        if self.max_delay == self.min_delay {
            return self.min_delay;
        }
        let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
        self.min_delay + (self.max_delay - self.min_delay).mul_f64(factor)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

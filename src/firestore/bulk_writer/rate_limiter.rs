use std::time::{Duration, Instant};

use crate::platform::runtime;

/// Operations per second a fresh writer may dispatch.
pub(crate) const STARTING_OPS_PER_SECOND: f64 = 500.0;

/// Multiplier applied to the allowed rate for every full ramp window
/// elapsed since construction.
const RAMP_FACTOR: f64 = 1.5;
const RAMP_WINDOW: Duration = Duration::from_secs(5);

/// Paces how many write operations may be dispatched per unit time.
///
/// The allowed bandwidth starts conservatively and only ever grows,
/// following a fixed ramp-up curve: ×1.5 for each complete five-second
/// window since the limiter was created. The ramp is recomputed from
/// the start time on every call, so repeated calls inside one window
/// are no-ops.
pub(crate) struct RateLimiter {
    bandwidth: f64,
    start_time: Instant,
    last_fetched: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(start_time: Instant) -> Self {
        Self {
            bandwidth: STARTING_OPS_PER_SECOND,
            start_time,
            last_fetched: start_time,
        }
    }

    /// Blocks until `count` additional operations are cleared for
    /// dispatch. `admit(0)` returns immediately without touching state.
    pub async fn admit(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let delay = self.request_delay(count, Instant::now());
        if !delay.is_zero() {
            runtime::sleep(delay).await;
        }
        let now = Instant::now();
        self.last_fetched = now;
        self.grow(now);
    }

    pub fn ops_per_second(&self) -> f64 {
        self.bandwidth
    }

    /// How long a request for `count` operations must wait, given the
    /// current bandwidth and the time of the previous grant.
    fn request_delay(&self, count: usize, now: Instant) -> Duration {
        let cost = Duration::from_secs_f64(count as f64 / self.bandwidth);
        (self.last_fetched + cost).saturating_duration_since(now)
    }

    fn grow(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.start_time);
        let windows = (elapsed.as_secs_f64() / RAMP_WINDOW.as_secs_f64()).floor() as i32;
        let target = STARTING_OPS_PER_SECOND * RAMP_FACTOR.powi(windows);
        if target > self.bandwidth {
            self.bandwidth = target;
        }
    }
}

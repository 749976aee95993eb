use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Caps a loop to a target tick rate by sleeping off the residual of each
/// cycle.
///
/// Each tick targets `previous tick return + period`. After a stall longer
/// than one period the deadline is simply re-based on "now": there is no
/// catch-up burst of back-to-back ticks.
pub struct Pacer {
    period: Duration,
    last: Instant,
}

impl Pacer {
    /// Create a pacer targeting `tick_rate_hz` ticks per second.
    /// The first `tick` measures from construction.
    pub fn new(tick_rate_hz: u32) -> Self {
        let hz = tick_rate_hz.max(1);
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(hz)),
            last: Instant::now(),
        }
    }

    /// Block until at least one period has elapsed since the previous `tick`
    /// returned (or since construction, for the first call).
    pub async fn tick(&mut self) {
        let target = self.last + self.period;
        if target > Instant::now() {
            sleep_until(target).await;
        }
        self.last = Instant::now();
    }
}

//! # Delivery Scheduler
//!
//! Periodic trigger for drain passes. It is polled as one arm of the
//! coordinator's `select!`, so passes never overlap with frame handling.
//! The first pass runs one full period after start. A tick that comes due
//! while the coordinator is busy fires as soon as it waits again; missed
//! ticks are delayed, never burst.

use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

pub struct DeliveryScheduler {
    interval: Interval,
    period: Duration,
    passes: u64,
}

impl DeliveryScheduler {
    /// Must be called inside a tokio runtime
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            period,
            passes: 0,
        }
    }

    /// Wait for the next pass to come due. Cancel-safe.
    pub async fn tick(&mut self) -> Instant {
        let at = self.interval.tick().await;
        self.passes += 1;
        at
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Passes triggered so far
    pub fn passes(&self) -> u64 {
        self.passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_full_period() {
        let start = Instant::now();
        let mut scheduler = DeliveryScheduler::new(Duration::from_secs(30));

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(30));

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        assert_eq!(scheduler.passes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_ticks_are_delayed() {
        let start = Instant::now();
        let mut scheduler = DeliveryScheduler::new(Duration::from_secs(30));

        // Coordinator busy for two and a half periods
        time::sleep(Duration::from_secs(75)).await;

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(75));

        // Next tick is a full period later, not an immediate catch-up
        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(105));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_survives_cancellation() {
        let mut scheduler = DeliveryScheduler::new(Duration::from_secs(10));

        let early = time::timeout(Duration::from_secs(5), scheduler.tick()).await;
        assert!(early.is_err());

        let start = Instant::now();
        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(scheduler.passes(), 1);
    }
}

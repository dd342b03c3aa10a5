//! Receive-window timing for the LoRaWAN stack
//!
//! The MAC layer calls [`Timer::reset`] when a transmission ends and then
//! waits for the RX1/RX2 windows with [`Timer::at`], in milliseconds since
//! that reset.

use embassy_time::{Duration, Instant};
use lorawan_device::async_device::radio::Timer;

pub struct LorawanTimer {
    start: Instant,
}

impl LorawanTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Instant the window offsets are measured from.
    pub fn start(&self) -> Instant {
        self.start
    }
}

impl Default for LorawanTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for LorawanTimer {
    fn reset(&mut self) {
        self.start = Instant::now();
    }

    async fn at(&mut self, millis: u64) {
        embassy_time::Timer::at(self.start + Duration::from_millis(millis)).await
    }

    async fn delay_ms(&mut self, millis: u64) {
        embassy_time::Timer::after_millis(millis).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn test_at_is_relative_to_reset() {
        let mut timer = LorawanTimer::new();
        block_on(async {
            timer.reset();
            let start = timer.start();
            timer.at(20).await;
            assert!(Instant::now() >= start + Duration::from_millis(20));
        });
    }

    #[test]
    fn test_past_deadline_returns_immediately() {
        let mut timer = LorawanTimer::new();
        block_on(async {
            timer.reset();
            embassy_time::Timer::after_millis(10).await;
            let before = Instant::now();
            timer.at(1).await;
            assert!(before.elapsed() < Duration::from_millis(500));
        });
    }

    #[test]
    fn test_delay_ms() {
        let mut timer = LorawanTimer::new();
        let before = Instant::now();
        block_on(timer.delay_ms(15));
        assert!(before.elapsed() >= Duration::from_millis(15));
    }
}

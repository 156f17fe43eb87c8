//! Timestamp source for intervals.
//!
//! Timestamps come from [`tokio::time::Instant`], which reads the platform's monotonic clock
//! and is immune to wall-clock adjustments. On a paused tokio test runtime it follows the mocked
//! clock instead, which keeps durations deterministic in tests.
//!
//! Where a platform has no true monotonic source, std falls back to the best clock the OS offers
//! and only guarantees that readings never go backwards. That fallback is a portability
//! concession, not a correctness guarantee: durations measured there can still absorb clock
//! adjustments made by the OS.

pub type Timestamp = tokio::time::Instant;

#[inline]
pub fn now() -> Timestamp {
    Timestamp::now()
}

pub trait AsServerTimingDuration {
    /// Milliseconds, with sub-millisecond precision.
    fn as_server_timing_duration(&self) -> f64;
}

impl AsServerTimingDuration for std::time::Duration {
    fn as_server_timing_duration(&self) -> f64 {
        self.as_nanos() as f64 / 1000f64 / 1000f64
    }
}
impl AsServerTimingDuration for std::time::Instant {
    fn as_server_timing_duration(&self) -> f64 {
        self.elapsed().as_server_timing_duration()
    }
}
impl AsServerTimingDuration for tokio::time::Instant {
    fn as_server_timing_duration(&self) -> f64 {
        self.elapsed().as_server_timing_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn converts_durations_to_millis() {
        assert_eq!(Duration::from_millis(42).as_server_timing_duration(), 42.0);
        assert_eq!(Duration::from_micros(1500).as_server_timing_duration(), 1.5);
        assert_eq!(Duration::ZERO.as_server_timing_duration(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_follows_the_tokio_clock() {
        let start = now();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(start.as_server_timing_duration(), 250.0);
    }
}

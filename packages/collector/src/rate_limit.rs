//! Outbound request pacing.
//!
//! A single [`RateLimiter`] is shared by every dataset collector, so the
//! bound holds for the whole process no matter how many collectors run at
//! once. Each [`RateLimiter::acquire`] reserves the next free slot, spaced
//! `1s / max_requests_per_second` after the previous one, and sleeps until
//! it arrives.

use std::num::NonZeroU32;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Allows at most `max_requests_per_second` acquisitions per second.
    #[must_use]
    pub fn per_second(max_requests_per_second: NonZeroU32) -> Self {
        Self::with_interval(Duration::from_secs(1) / max_requests_per_second.get())
    }

    /// Spaces acquisitions at least `interval` apart.
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the caller may make one external request.
    ///
    /// The first call returns immediately. Dropping the future while it
    /// sleeps gives up the wait, but the reserved slot stays consumed.
    pub async fn acquire(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next_slot.map_or(now, |next| next.max(now));
            *next_slot = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn rps(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn interval_from_rate() {
        assert_eq!(
            RateLimiter::per_second(rps(10)).interval(),
            Duration::from_millis(100)
        );
        assert_eq!(
            RateLimiter::per_second(rps(1)).interval(),
            Duration::from_secs(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let limiter = RateLimiter::per_second(rps(2));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_calls_are_spaced() {
        let limiter = RateLimiter::per_second(rps(10));
        let mut stamps = Vec::new();
        for _ in 0..5 {
            limiter.acquire().await;
            stamps.push(Instant::now());
        }
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_is_not_banked() {
        let limiter = RateLimiter::per_second(rps(10));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let before = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(Instant::now() - before >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn shared_across_tasks() {
        let limiter = Arc::new(RateLimiter::per_second(rps(5)));
        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                let mut stamps = Vec::new();
                for _ in 0..3 {
                    limiter.acquire().await;
                    stamps.push(Instant::now());
                }
                stamps
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        assert_eq!(all.len(), 9);
        for pair in all.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
    }
}

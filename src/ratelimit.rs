use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

/// Time source for the limiter and for retry backoff.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Clock that only moves when slept on or advanced by hand.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *lock(&self.elapsed) += duration;
    }

    pub fn elapsed(&self) -> Duration {
        *lock(&self.elapsed)
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *lock(&self.elapsed)
    }

    fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        self.advance(duration);
    }
}

/// Strict fixed-interval spacing between outbound requests, shared by every
/// caller of one client. No bursts, no tokens.
#[derive(Debug)]
pub struct RateLimiter<C: Clock = SystemClock> {
    clock: C,
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter<SystemClock> {
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(interval: Duration, clock: C) -> Self {
        Self {
            clock,
            interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Blocks until at least `interval` has passed since the previous call
    /// returned, then stamps the current time as the new request time.
    pub fn wait(&self) {
        let mut last = lock(&self.last_request);
        if let Some(previous) = *last {
            let since = self.clock.now().saturating_duration_since(previous);
            if since < self.interval {
                let remaining = self.interval - since;
                trace!(wait_ms = remaining.as_millis() as u64, "rate limit");
                self.clock.sleep(remaining);
            }
        }
        *last = Some(self.clock.now());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_is_not_delayed() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_secs(2), clock.clone());
        limiter.wait();
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn consecutive_requests_are_spaced() {
        let clock = Arc::new(ManualClock::new());
        let interval = Duration::from_secs(2);
        let limiter = RateLimiter::with_clock(interval, clock.clone());

        let mut issued = Vec::new();
        for work in [0u64, 500, 3000, 1999, 0] {
            limiter.wait();
            issued.push(clock.now());
            clock.advance(Duration::from_millis(work));
        }

        for pair in issued.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= interval);
        }
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(2),
                Duration::from_millis(1500),
                Duration::from_millis(1),
            ]
        );
    }
}

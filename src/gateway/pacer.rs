//! Minimum-interval call pacing
//!
//! A [`CallPacer`] guards one generation endpoint. It holds a single
//! "next permitted call" instant in an `AtomicU64` (nanoseconds since the
//! pacer was created). Taking the token is a compare-and-swap from the
//! observed value to `now + interval`, so two concurrent acquirers can never
//! both succeed for the same slot.
//!
//! The pacer never sleeps. Callers that want to wait can read
//! [`CallPacer::next_available_in`] and decide for themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Lock-free minimum-interval token for a single endpoint
#[derive(Debug)]
pub struct CallPacer {
    /// Minimum spacing between two calls
    interval: Duration,
    /// Reference point for the atomic timestamp
    origin: Instant,
    /// Earliest permitted call, in nanoseconds since `origin`
    next_permitted: AtomicU64,
}

impl CallPacer {
    /// Create a pacer that allows its first call immediately
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tirepress_gen::gateway::CallPacer;
    ///
    /// let pacer = CallPacer::new(Duration::from_secs(60));
    /// assert!(pacer.try_acquire().is_ok());
    /// assert!(pacer.try_acquire().is_err());
    /// ```
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            origin: Instant::now(),
            next_permitted: AtomicU64::new(0),
        }
    }

    /// Configured minimum interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a call would be permitted right now
    pub fn can_call(&self) -> bool {
        self.now_nanos() >= self.next_permitted.load(Ordering::Acquire)
    }

    /// Time until the next call is permitted (zero when one is permitted now)
    pub fn next_available_in(&self) -> Duration {
        let next = self.next_permitted.load(Ordering::Acquire);
        Duration::from_nanos(next.saturating_sub(self.now_nanos()))
    }

    /// Take the token if the interval has elapsed
    ///
    /// On success the next permitted instant moves to `now + interval`. On
    /// refusal returns how long the caller would have to wait.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let interval = duration_nanos(self.interval);

        loop {
            let current = self.next_permitted.load(Ordering::Acquire);
            let now = self.now_nanos();
            if now < current {
                return Err(Duration::from_nanos(current - now));
            }

            match self.next_permitted.compare_exchange(
                current,
                now.saturating_add(interval),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                // Another acquirer moved the token; re-evaluate against its value
                Err(_) => continue,
            }
        }
    }

    /// Push the next permitted instant forward to at least `at`
    ///
    /// Used when the upstream itself asks us to back off. Never moves the
    /// token backwards.
    pub fn release_at(&self, at: Instant) {
        let target = duration_nanos(at.saturating_duration_since(self.origin));
        let previous = self.next_permitted.fetch_max(target, Ordering::AcqRel);
        if target > previous {
            tracing::debug!(
                delay_ms = Duration::from_nanos(target - previous).as_millis(),
                "pacer pushed forward"
            );
        }
    }

    fn now_nanos(&self) -> u64 {
        duration_nanos(self.origin.elapsed())
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

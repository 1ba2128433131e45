//! Poll-with-backoff helpers used by both sides of the handshake.
//!
//! The protocol has no wait/wake primitive: the peer may be another process
//! that only ever writes a plain byte. Waiters re-check the control byte at a
//! fixed interval and sleep in between.

use std::thread;
use std::time::{Duration, Instant};

/// Default delay between two polls of the control byte.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Result of polling until a condition holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult<T> {
    /// The condition produced a value.
    Ok(T),
    /// The deadline passed before the condition held.
    TimedOut,
}

impl<T> WaitResult<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            WaitResult::Ok(value) => Some(value),
            WaitResult::TimedOut => None,
        }
    }
}

/// Fixed-interval polling policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Sleeps for one poll interval. A zero interval yields instead.
    #[inline]
    pub fn pause(&self) {
        if self.interval.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.interval);
        }
    }

    /// Calls `check` until it returns `Some`, pausing between attempts.
    ///
    /// With a `deadline` the wait gives up once the deadline has passed; the
    /// condition is always checked at least once.
    pub fn until<T>(
        &self,
        deadline: Option<Instant>,
        mut check: impl FnMut() -> Option<T>,
    ) -> WaitResult<T> {
        loop {
            if let Some(value) = check() {
                return WaitResult::Ok(value);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return WaitResult::TimedOut;
            }
            self.pause();
        }
    }
}

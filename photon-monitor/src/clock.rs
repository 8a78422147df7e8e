//! Time source used by the decoder and tracker
//!
//! All polling and ticking goes through [`Clock`] so that the protocol can be
//! exercised against [`ManualClock`] without real delays.

use crate::types::Timestamp;
use chrono::Utc;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Wall-clock time, monotonic time and sleeping
pub trait Clock: Send + Sync {
    /// Current UTC time, used to stamp readings
    fn now(&self) -> Timestamp;

    /// Monotonic time elapsed since the clock was created
    fn monotonic(&self) -> Duration;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// The operating system clock
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Virtual clock: `sleep` returns immediately and advances time instead
#[derive(Debug)]
pub struct ManualClock {
    start: Timestamp,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock whose wall time starts at `start`
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            start,
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward without sleeping
    pub fn advance(&self, duration: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        match chrono::Duration::from_std(self.monotonic()) {
            Ok(elapsed) => self.start + elapsed,
            Err(_) => self.start,
        }
    }

    fn monotonic(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn monotonic(&self) -> Duration {
        (**self).monotonic()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

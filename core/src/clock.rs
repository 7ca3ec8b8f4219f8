//! Time sources for the scheduler
//!
//! [`SystemClock`] reads the monotonic OS clock and really sleeps.
//! [`ManualClock`] only moves when told to; sleeping jumps straight to the
//! deadline. Headless runs and tests use it to simulate real time exactly.

use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source with the ability to wait
pub trait Clock {
    fn now(&self) -> Instant;

    /// Block until `deadline`; returns immediately if it already passed
    fn sleep_until(&self, deadline: Instant);
}

/// Wall clock backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

/// Simulated clock
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<Instant>,
    slept: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            now: Cell::new(start),
            slept: Cell::new(Duration::ZERO),
        }
    }

    /// Move time forward, as if work had taken `by`
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Total time spent in [`Clock::sleep_until`]
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = self.now.get();
        if deadline > now {
            self.slept.set(self.slept.get() + (deadline - now));
            self.now.set(deadline);
        }
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep_until(&self, deadline: Instant) {
        (**self).sleep_until(deadline)
    }
}

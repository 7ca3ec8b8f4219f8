//! Emulation worker thread
//!
//! Each timeslice runs on its own named thread. The scheduler hands the
//! machine over in [`EmulationWorker::start`] and gets it back from
//! [`RunningSlice::stop`]. While the slice runs, the scheduler thread is free
//! to present the previously captured frame.
//!
//! The worker executes the slice in increments of `min_cycles`, checking its
//! stop flag between increments. The first increment always runs to
//! completion. Once `max_cycles` have executed the thread parks until it is
//! stopped. A trap or fatal error ends the slice immediately.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace};

use crate::dispatch::DispatchResult;
use crate::machine::{EmulationTiming, Machine, StopReason};

/// Parameters of one timeslice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimesliceTask {
    pub cycles_per_second: u64,
    pub max_cycles: u64,
    pub min_cycles: u64,
}

impl TimesliceTask {
    pub fn from_timing(timing: &EmulationTiming) -> Self {
        Self {
            cycles_per_second: timing.cycles_per_second(),
            max_cycles: timing.max_cycles_per_timeslice(),
            min_cycles: timing.min_cycles_per_timeslice(),
        }
    }

    fn increment(&self) -> u64 {
        self.min_cycles.clamp(1, self.max_cycles.max(1))
    }
}

/// Error running a timeslice
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn emulation worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("emulation worker thread panicked")]
    Panicked,
}

/// What a finished timeslice hands back
#[derive(Debug)]
pub struct SliceOutcome<M> {
    pub machine: M,
    pub cycles: u64,
    pub result: DispatchResult,
    cycles_per_second: u64,
}

impl<M> SliceOutcome<M> {
    /// Emulated time covered by the executed cycles
    pub fn emulated_time(&self) -> Duration {
        if self.cycles_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.cycles as f64 / self.cycles_per_second as f64)
    }
}

/// Starts timeslices on dedicated threads
#[derive(Debug, Default)]
pub struct EmulationWorker {
    slices_started: u64,
}

impl EmulationWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timeslices started so far
    pub fn slices_started(&self) -> u64 {
        self.slices_started
    }

    /// Move `machine` onto a worker thread and begin executing `task`
    pub fn start<M: Machine>(
        &mut self,
        task: TimesliceTask,
        machine: M,
    ) -> Result<RunningSlice<M>, WorkerError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("emulation-worker".into())
            .spawn(move || run_slice(task, machine, &thread_stop))
            .map_err(WorkerError::Spawn)?;

        self.slices_started += 1;
        trace!(slice = self.slices_started, ?task, "Timeslice started");

        Ok(RunningSlice {
            stop,
            handle: Some(handle),
        })
    }
}

/// A timeslice in progress
///
/// Dropping it without calling [`RunningSlice::stop`] still stops and joins
/// the thread, discarding the machine.
pub struct RunningSlice<M> {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<SliceOutcome<M>>>,
}

impl<M> RunningSlice<M> {
    fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Whether the worker has already finished (budget spent or trapped)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Stop the slice and take the machine back
    pub fn stop(mut self) -> Result<SliceOutcome<M>, WorkerError> {
        self.signal_stop();
        let handle = self.handle.take().ok_or(WorkerError::Panicked)?;
        handle.join().map_err(|_| WorkerError::Panicked)
    }
}

impl<M> Drop for RunningSlice<M> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.signal_stop();
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn run_slice<M: Machine>(task: TimesliceTask, mut machine: M, stop: &AtomicBool) -> SliceOutcome<M> {
    let increment = task.increment();
    let mut cycles = 0u64;
    let mut result = DispatchResult::default();

    loop {
        let budget = task.max_cycles.saturating_sub(cycles).min(increment);
        if budget == 0 {
            // Budget spent; wait for the scheduler
            while !stop.load(Ordering::Acquire) {
                thread::park();
            }
            result.set_ok(cycles);
            break;
        }

        let advance = machine.advance(budget);
        cycles += advance.cycles;

        match advance.stop {
            Some(StopReason::Trap(trap)) => {
                debug!(cycles, address = ?trap.address, "Timeslice stopped on trap");
                result.set_debugger(cycles, trap);
                break;
            }
            Some(StopReason::Fatal(message)) => {
                debug!(cycles, %message, "Timeslice stopped on fatal error");
                result.set_fatal(cycles, message);
                break;
            }
            None => {}
        }

        if stop.load(Ordering::Acquire) {
            result.set_ok(cycles);
            break;
        }
    }

    SliceOutcome {
        machine,
        cycles,
        result,
        cycles_per_second: task.cycles_per_second,
    }
}

//! Real-time main loop
//!
//! Each iteration polls the frontend, runs one timeslice of emulation (or
//! waits one UI tick in other states) and then paces itself against a
//! virtual clock. Emulation timeslices are one frame at most; the frame
//! completed by the previous slice is presented while the next one runs.

mod frontend;

pub use frontend::{AppState, Command, Commands, Frontend};

use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::dispatch::{DispatchResult, DispatchStatus};
use crate::fps::FpsMeter;
use crate::machine::{CYCLES_PER_SCANLINE, FrameBuffer, Machine};
use crate::pacing::{Pace, VirtualClock};
use crate::state::StateManager;
use crate::worker::{EmulationWorker, TimesliceTask, WorkerError};

/// UI tick for states that do not run the machine
const UI_TIMESLICE: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// Renders ignored by the FPS meter after entering emulation
const FPS_GARBAGE_FRAMES: u32 = 10;

/// Process-fatal scheduler failure
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("emulation worker returned an unwritten dispatch result")]
    InvalidDispatchResult,

    /// The machine went down with the worker thread
    #[error("emulation worker thread panicked")]
    WorkerPanicked,

    /// The machine was moved into the worker closure and is dropped with it;
    /// the scheduler is left without a machine.
    #[error("failed to spawn emulation worker: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error("emulation requested without a machine")]
    NoMachine,
}

impl From<WorkerError> for SchedulerError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Spawn(source) => SchedulerError::WorkerSpawn(source),
            WorkerError::Panicked => SchedulerError::WorkerPanicked,
        }
    }
}

/// Whether the loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// Counters for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub iterations: u64,
    pub timeslices: u64,
    pub cycles: u64,
    pub frames_rendered: u64,
    pub sleeps: u64,
    pub lag_resets: u64,
}

/// Main loop driving a machine at real-time pace
pub struct Scheduler<M: Machine, F: Frontend, C: Clock = SystemClock> {
    machine: Option<M>,
    states: StateManager,
    frontend: F,
    clock: C,
    worker: EmulationWorker,
    app_state: AppState,
    previous_state: Option<AppState>,
    frame: FrameBuffer,
    fps: FpsMeter,
    pacer: VirtualClock,
    stats: SchedulerStats,
}

impl<M: Machine, F: Frontend, C: Clock> Scheduler<M, F, C> {
    /// Create a scheduler with no machine; it starts in the menu
    pub fn new(states: StateManager, frontend: F, clock: C) -> Self {
        let now = clock.now();
        Self {
            machine: None,
            states,
            frontend,
            clock,
            worker: EmulationWorker::new(),
            app_state: AppState::Menu,
            previous_state: None,
            frame: FrameBuffer::default(),
            fps: FpsMeter::new(),
            pacer: VirtualClock::new(now),
            stats: SchedulerStats::default(),
        }
    }

    /// Create a scheduler that starts emulating `machine` right away
    pub fn with_machine(machine: M, states: StateManager, frontend: F, clock: C) -> Self {
        let mut scheduler = Self::new(states, frontend, clock);
        scheduler.insert_machine(machine);
        scheduler
    }

    /// Load a machine (a new or reloaded cartridge) and start emulating it
    pub fn insert_machine(&mut self, machine: M) {
        info!(cartridge = %machine.cartridge(), "Machine inserted");
        self.machine = Some(machine);
        self.states.reset();
        self.app_state = AppState::Emulation;
    }

    /// Remove the machine, returning to the menu
    pub fn take_machine(&mut self) -> Option<M> {
        self.app_state = AppState::Menu;
        self.machine.take()
    }

    pub fn machine(&self) -> Option<&M> {
        self.machine.as_ref()
    }

    pub fn machine_mut(&mut self) -> Option<&mut M> {
        self.machine.as_mut()
    }

    pub fn states(&self) -> &StateManager {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut StateManager {
        &mut self.states
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    pub fn app_state(&self) -> AppState {
        self.app_state
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Most recently presented frame
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Run until the frontend asks to quit
    pub fn run(&mut self) -> Result<(), SchedulerError> {
        info!("Scheduler started");
        loop {
            if self.run_iteration()? == LoopControl::Quit {
                info!(
                    iterations = self.stats.iterations,
                    frames = self.stats.frames_rendered,
                    "Scheduler stopped"
                );
                return Ok(());
            }
        }
    }

    /// One pass of the main loop
    pub fn run_iteration(&mut self) -> Result<LoopControl, SchedulerError> {
        self.stats.iterations += 1;

        for command in self.frontend.poll(self.app_state) {
            if self.apply(command) == LoopControl::Quit {
                return Ok(LoopControl::Quit);
            }
        }

        let now = self.clock.now();
        if self.app_state == AppState::Emulation
            && self.previous_state != Some(AppState::Emulation)
        {
            // Entering emulation: no catching up on time spent elsewhere
            self.pacer.reset(now);
            self.fps.reset(FPS_GARBAGE_FRAMES);
        }

        let timeslice = match self.app_state {
            AppState::Emulation => self.dispatch_emulation(now)?,
            AppState::Playback => {
                self.frontend.render_other(self.app_state);
                self.playback_timeslice()
            }
            AppState::Paused | AppState::Debugger | AppState::Menu => {
                self.frontend.render_other(self.app_state);
                UI_TIMESLICE
            }
        };

        let max_lag = self
            .machine
            .as_ref()
            .map_or(Duration::ZERO, |m| m.timing().frame_duration());
        match self.pacer.advance(timeslice, self.clock.now(), max_lag) {
            Pace::Sleep(deadline) => {
                self.stats.sleeps += 1;
                self.clock.sleep_until(deadline);
            }
            Pace::Snapped { lag } => {
                self.stats.lag_resets += 1;
                debug!(lag_ms = lag.as_secs_f64() * 1000.0, "Dropped emulation backlog");
            }
            Pace::OnTime => {}
        }

        self.previous_state = Some(self.app_state);
        Ok(LoopControl::Continue)
    }

    fn playback_timeslice(&self) -> Duration {
        match &self.machine {
            Some(machine) => {
                let cycles =
                    u64::from(machine.scanlines_last_frame()) * u64::from(CYCLES_PER_SCANLINE);
                machine.timing().cycles_to_duration(cycles)
            }
            None => UI_TIMESLICE,
        }
    }

    /// Run one emulation timeslice; returns the emulated time it covered
    fn dispatch_emulation(&mut self, now: Instant) -> Result<Duration, SchedulerError> {
        let mut machine = self.machine.take().ok_or(SchedulerError::NoMachine)?;
        let task = TimesliceTask::from_timing(&machine.timing());

        // Copy the finished frame out before the worker owns the machine
        let frame_pending = machine.new_frame_pending();
        if frame_pending {
            self.fps.render(machine.frames_since_last_render(), now);
            machine.render_to_frame_buffer(&mut self.frame);
        }

        let slice = self.worker.start(task, machine)?;
        if frame_pending {
            self.frontend.render_emulation(&self.frame, self.fps.fps());
            self.stats.frames_rendered += 1;
        }
        let outcome = slice.stop()?;

        let timeslice = outcome.emulated_time();
        self.stats.timeslices += 1;
        self.stats.cycles += outcome.cycles;

        let machine = self.machine.insert(outcome.machine);
        if frame_pending {
            self.states.update(machine);
        }

        self.handle_dispatch_result(&outcome.result)?;
        Ok(timeslice)
    }

    /// React to the way a timeslice ended
    pub(crate) fn handle_dispatch_result(
        &mut self,
        result: &DispatchResult,
    ) -> Result<(), SchedulerError> {
        match result.status() {
            DispatchStatus::Ok => Ok(()),
            DispatchStatus::Debugger => {
                self.app_state = AppState::Debugger;
                if let Some(trap) = result.trap_info() {
                    match self.frontend.debugger() {
                        Some(debugger) => debugger.start(&trap),
                        None => warn!(
                            address = ?trap.address,
                            message = %trap.message,
                            "Trap hit with no debugger attached"
                        ),
                    }
                }
                Ok(())
            }
            DispatchStatus::Fatal => {
                match self.frontend.debugger() {
                    Some(debugger) => {
                        debugger.start_with_fatal_error(result.message());
                        self.app_state = AppState::Debugger;
                    }
                    None => {
                        error!(message = %result.message(), "Fatal emulation error");
                        self.app_state = AppState::Paused;
                    }
                }
                Ok(())
            }
            DispatchStatus::Invalid => Err(SchedulerError::InvalidDispatchResult),
        }
    }

    fn apply(&mut self, command: Command) -> LoopControl {
        match command {
            Command::Quit => return LoopControl::Quit,
            Command::SetState(state) => {
                if state == AppState::Emulation && self.machine.is_none() {
                    warn!("Ignoring request to emulate without a machine");
                } else {
                    self.app_state = state;
                }
            }
            Command::ChangeSlot => {
                let message = self.states.change_state();
                self.frontend.show_message(&message);
            }
            Command::ToggleTimeMachine => {
                let message = self.states.toggle_time_machine();
                self.frontend.show_message(&message);
            }
            command => self.apply_machine_command(command),
        }
        LoopControl::Continue
    }

    fn apply_machine_command(&mut self, command: Command) {
        let Some(machine) = self.machine.as_mut() else {
            debug!(?command, "Ignoring command without a machine");
            return;
        };

        let message = match command {
            Command::SaveState(slot) => self
                .states
                .save_state(&*machine, slot)
                .unwrap_or_else(|e| e.to_string()),
            Command::LoadState(slot) => self
                .states
                .load_state(machine, slot)
                .unwrap_or_else(|e| e.to_string()),
            Command::Rewind(count) => self
                .states
                .rewind_states(machine, count)
                .unwrap_or_else(|e| e.to_string()),
            Command::Unwind(count) => self
                .states
                .unwind_states(machine, count)
                .unwrap_or_else(|e| e.to_string()),
            Command::AddExtraState(label) => {
                if let Err(e) = self.states.add_extra_state(&*machine, &label) {
                    debug!(error = %e, %label, "Extra state not captured");
                }
                return;
            }
            Command::Quit
            | Command::SetState(_)
            | Command::ChangeSlot
            | Command::ToggleTimeMachine => return,
        };
        self.frontend.show_message(&message);
    }
}

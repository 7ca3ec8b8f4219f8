//! Frame layout and cycle timing

use std::time::Duration;

/// CPU cycles per scanline (one scanline is 228 color clocks / 3)
pub const CYCLES_PER_SCANLINE: u32 = 76;

/// Television standard driving the frame layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameLayout {
    #[default]
    Ntsc,
    Pal,
}

impl FrameLayout {
    pub fn scanlines_per_frame(self) -> u32 {
        match self {
            FrameLayout::Ntsc => 262,
            FrameLayout::Pal => 312,
        }
    }

    pub fn frames_per_second(self) -> u32 {
        match self {
            FrameLayout::Ntsc => 60,
            FrameLayout::Pal => 50,
        }
    }
}

/// Timing constants derived from a frame layout
///
/// A timeslice never covers more than one frame, and never fewer cycles
/// than one scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulationTiming {
    layout: FrameLayout,
}

impl EmulationTiming {
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn cycles_per_scanline(&self) -> u32 {
        CYCLES_PER_SCANLINE
    }

    pub fn scanlines_per_frame(&self) -> u32 {
        self.layout.scanlines_per_frame()
    }

    pub fn frames_per_second(&self) -> u32 {
        self.layout.frames_per_second()
    }

    pub fn cycles_per_frame(&self) -> u64 {
        u64::from(CYCLES_PER_SCANLINE) * u64::from(self.scanlines_per_frame())
    }

    pub fn cycles_per_second(&self) -> u64 {
        self.cycles_per_frame() * u64::from(self.frames_per_second())
    }

    /// Upper bound on cycles in one timeslice
    pub fn max_cycles_per_timeslice(&self) -> u64 {
        self.cycles_per_frame()
    }

    /// Cycles the worker runs between checks of its stop flag
    pub fn min_cycles_per_timeslice(&self) -> u64 {
        (self.cycles_per_frame() / 8).max(u64::from(CYCLES_PER_SCANLINE))
    }

    /// Wall-clock duration of one frame
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frames_per_second()))
    }

    /// Wall-clock duration of a number of cycles
    pub fn cycles_to_duration(&self, cycles: u64) -> Duration {
        Duration::from_secs_f64(cycles as f64 / self.cycles_per_second() as f64)
    }
}

impl Default for EmulationTiming {
    fn default() -> Self {
        Self::new(FrameLayout::Ntsc)
    }
}

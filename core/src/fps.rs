//! Rendered frame rate meter

use std::collections::VecDeque;
use std::time::Instant;

/// Number of render samples the average is taken over
const WINDOW: usize = 20;

/// Moving-average frame rate
///
/// Fed once per rendered frame with the number of emulated frames that
/// frame represents. After a reset the first few samples are discarded,
/// since frames right after a state change are not representative.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    samples: VecDeque<(Instant, u32)>,
    frames_in_window: u64,
    garbage_frames_left: u32,
    fps: f32,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW + 1),
            frames_in_window: 0,
            garbage_frames_left: 0,
            fps: 0.0,
        }
    }

    /// Clear the window and ignore the next `garbage_frames` samples
    pub fn reset(&mut self, garbage_frames: u32) {
        self.samples.clear();
        self.frames_in_window = 0;
        self.garbage_frames_left = garbage_frames;
        self.fps = 0.0;
    }

    /// Record that `frames` emulated frames were presented at `now`
    pub fn render(&mut self, frames: u32, now: Instant) {
        if self.garbage_frames_left > 0 {
            self.garbage_frames_left -= 1;
            return;
        }

        self.samples.push_back((now, frames));
        self.frames_in_window += u64::from(frames);
        if self.samples.len() > WINDOW
            && let Some((_, dropped)) = self.samples.pop_front()
        {
            self.frames_in_window -= u64::from(dropped);
        }

        if let (Some(&(first_at, first_frames)), Some(&(last_at, _))) =
            (self.samples.front(), self.samples.back())
        {
            let elapsed = last_at.duration_since(first_at).as_secs_f64();
            if elapsed > 0.0 {
                // Frames of the first sample were rendered before the window opened
                let frames = self.frames_in_window - u64::from(first_frames);
                self.fps = (frames as f64 / elapsed) as f32;
            }
        }
    }

    /// Current average, 0 until two samples are available
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

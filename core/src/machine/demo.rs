//! Deterministic demo machine
//!
//! A small stand-in for a real console core. It executes pseudo-random
//! "instructions" of 2-5 cycles against 128 bytes of RAM, completes a frame
//! every `cycles_per_frame` cycles and paints a pattern derived from its
//! state. Everything it does is a pure function of its seed, which makes it
//! useful for exercising save states and rewind.

use hashbrown::HashSet;

use super::{
    Advance, CartridgeIdentity, EmulationTiming, FrameBuffer, FrameLayout, Machine, StopReason,
};
use crate::codec::{CodecError, Deserializer, Serializer};
use crate::dispatch::TrapInfo;

pub const DEMO_WIDTH: u32 = 160;
pub const DEMO_HEIGHT: u32 = 192;

const RAM_SIZE: usize = 128;
const ROM_BASE: u16 = 0xF000;
const STATE_TAG: &str = "DemoMachine";

/// Deterministic reference machine
#[derive(Debug, Clone)]
pub struct DemoMachine {
    cartridge: CartridgeIdentity,
    layout: FrameLayout,
    cycles: u64,
    frame_cycle: u64,
    frame_count: u64,
    lfsr: u32,
    pc: u16,
    instruction_cycles_left: u8,
    skip_breakpoint: bool,
    frame_seed: u32,
    frame_pending: bool,
    frames_since_render: u32,
    ram: [u8; RAM_SIZE],

    // Debugger configuration, not part of the machine state
    breakpoints: HashSet<u16>,
    fatal_at_cycle: Option<u64>,
}

impl DemoMachine {
    pub fn new(cartridge: CartridgeIdentity, layout: FrameLayout, seed: u32) -> Self {
        Self {
            cartridge,
            layout,
            cycles: 0,
            frame_cycle: 0,
            frame_count: 0,
            // xorshift must never hold zero
            lfsr: seed | 1,
            pc: ROM_BASE,
            instruction_cycles_left: 0,
            skip_breakpoint: false,
            frame_seed: 0,
            frame_pending: false,
            frames_since_render: 0,
            ram: [0; RAM_SIZE],
            breakpoints: HashSet::new(),
            fatal_at_cycle: None,
        }
    }

    /// Address of the next instruction to execute
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Frames completed since power-on
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn set_layout(&mut self, layout: FrameLayout) {
        self.layout = layout;
    }

    /// Stop with a debugger trap before executing the instruction at `address`
    pub fn add_breakpoint(&mut self, address: u16) {
        self.breakpoints.insert(address);
    }

    pub fn remove_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.remove(&address)
    }

    /// Raise a fatal emulation error at the first instruction fetch on or
    /// after `cycle`
    pub fn inject_fatal_at(&mut self, cycle: u64) {
        self.fatal_at_cycle = Some(cycle);
    }

    /// Run until exactly `frames` more frames have completed
    ///
    /// Breakpoints and fatal errors still stop execution early.
    pub fn run_frames(&mut self, frames: u64) -> Advance {
        let cycles_per_frame = self.timing().cycles_per_frame();
        let mut total = 0;
        for _ in 0..frames {
            // A layout switch mid-frame can leave frame_cycle past the new
            // frame length; the next cycle then completes the frame
            let remaining = cycles_per_frame.saturating_sub(self.frame_cycle).max(1);
            let advance = self.advance(remaining);
            total += advance.cycles;
            if advance.stop.is_some() {
                return Advance {
                    cycles: total,
                    stop: advance.stop,
                };
            }
        }
        Advance::completed(total)
    }

    fn next_random(&mut self) -> u32 {
        let mut x = self.lfsr;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.lfsr = x;
        x
    }

    fn execute_instruction(&mut self) {
        let r = self.next_random();
        let addr = usize::from(self.pc) % RAM_SIZE;
        self.ram[addr] = self.ram[addr].wrapping_add(r as u8) ^ (r >> 24) as u8;
        let step = 1 + (r & 1) as u16;
        self.pc = ROM_BASE | (self.pc.wrapping_add(step) & 0x0FFF);
        self.instruction_cycles_left = 2 + ((r >> 8) & 0x3) as u8;
    }

    fn finish_frame(&mut self) {
        self.frame_cycle = 0;
        self.frame_count += 1;
        self.frame_seed = self.lfsr ^ (self.frame_count as u32).wrapping_mul(0x9E37_79B9);
        self.frame_pending = true;
        self.frames_since_render = self.frames_since_render.saturating_add(1);
    }
}

impl Machine for DemoMachine {
    fn cartridge(&self) -> &CartridgeIdentity {
        &self.cartridge
    }

    fn timing(&self) -> EmulationTiming {
        EmulationTiming::new(self.layout)
    }

    fn advance(&mut self, max_cycles: u64) -> Advance {
        let cycles_per_frame = self.timing().cycles_per_frame();
        let mut run = 0;

        while run < max_cycles {
            if self.instruction_cycles_left == 0 {
                if let Some(at) = self.fatal_at_cycle
                    && self.cycles >= at
                {
                    self.fatal_at_cycle = None;
                    return Advance {
                        cycles: run,
                        stop: Some(StopReason::Fatal(format!(
                            "illegal instruction at ${:04X}",
                            self.pc
                        ))),
                    };
                }

                if !self.skip_breakpoint && self.breakpoints.contains(&self.pc) {
                    // Resuming must execute this instruction instead of trapping again
                    self.skip_breakpoint = true;
                    return Advance {
                        cycles: run,
                        stop: Some(StopReason::Trap(TrapInfo {
                            message: "Breakpoint hit".to_string(),
                            address: Some(self.pc),
                            was_read_trap: false,
                            tool_tip: format!("pc=${:04X}", self.pc),
                        })),
                    };
                }
                self.skip_breakpoint = false;
                self.execute_instruction();
            }

            self.instruction_cycles_left -= 1;
            self.cycles += 1;
            self.frame_cycle += 1;
            run += 1;

            if self.frame_cycle >= cycles_per_frame {
                self.finish_frame();
            }
        }

        Advance::completed(run)
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }

    fn new_frame_pending(&self) -> bool {
        self.frame_pending
    }

    fn frames_since_last_render(&self) -> u32 {
        self.frames_since_render
    }

    fn render_to_frame_buffer(&mut self, frame: &mut FrameBuffer) {
        let seed = self.frame_seed;
        let pixels = frame.pixels_mut(DEMO_WIDTH, DEMO_HEIGHT);
        for (i, pixel) in pixels.iter_mut().enumerate() {
            let row = (i as u32) / DEMO_WIDTH;
            let ram = u32::from(self.ram[row as usize % RAM_SIZE]);
            *pixel = (seed.rotate_left(row % 32) ^ (ram << 16) ^ i as u32) | 0xFF00_0000;
        }
        self.frame_pending = false;
        self.frames_since_render = 0;
    }

    fn scanlines_last_frame(&self) -> u32 {
        self.layout.scanlines_per_frame()
    }

    fn save(&self, out: &mut Serializer) -> Result<(), CodecError> {
        out.put_string(STATE_TAG);
        out.put_u8(match self.layout {
            FrameLayout::Ntsc => 0,
            FrameLayout::Pal => 1,
        });
        out.put_u64(self.cycles);
        out.put_u64(self.frame_cycle);
        out.put_u64(self.frame_count);
        out.put_u32(self.lfsr);
        out.put_u16(self.pc);
        out.put_u8(self.instruction_cycles_left);
        out.put_bool(self.skip_breakpoint);
        out.put_u32(self.frame_seed);
        out.put_bool(self.frame_pending);
        out.put_u32(self.frames_since_render);
        out.put_bytes(&self.ram);
        Ok(())
    }

    fn load(&mut self, input: &mut Deserializer<'_>) -> Result<(), CodecError> {
        let tag = input.get_string()?;
        if tag != STATE_TAG {
            return Err(CodecError::Machine(format!(
                "expected {STATE_TAG} state, found {tag:?}"
            )));
        }
        self.layout = match input.get_u8()? {
            0 => FrameLayout::Ntsc,
            1 => FrameLayout::Pal,
            other => {
                return Err(CodecError::Machine(format!(
                    "unknown frame layout {other}"
                )));
            }
        };
        self.cycles = input.get_u64()?;
        self.frame_cycle = input.get_u64()?;
        self.frame_count = input.get_u64()?;
        self.lfsr = input.get_u32()?;
        self.pc = input.get_u16()?;
        self.instruction_cycles_left = input.get_u8()?;
        self.skip_breakpoint = input.get_bool()?;
        self.frame_seed = input.get_u32()?;
        self.frame_pending = input.get_bool()?;
        self.frames_since_render = input.get_u32()?;
        input.get_bytes_into(&mut self.ram)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Snapshot;
    use crate::test_utils::demo_machine;

    #[test]
    fn test_same_seed_same_execution() {
        let mut a = demo_machine();
        let mut b = demo_machine();
        a.run_frames(3);
        b.run_frames(3);
        assert_eq!(
            Snapshot::capture(&a).unwrap(),
            Snapshot::capture(&b).unwrap()
        );
    }

    #[test]
    fn test_advance_never_exceeds_budget() {
        let mut machine = demo_machine();
        for budget in [1, 2, 3, 76, 1_000, 19_912] {
            let before = machine.cycles();
            let advance = machine.advance(budget);
            assert_eq!(advance.cycles, budget);
            assert_eq!(machine.cycles() - before, budget);
        }
    }

    #[test]
    fn test_frames_complete_every_frame_of_cycles() {
        let mut machine = demo_machine();
        let per_frame = machine.timing().cycles_per_frame();

        machine.advance(per_frame - 1);
        assert!(!machine.new_frame_pending());

        machine.advance(1);
        assert!(machine.new_frame_pending());
        assert_eq!(machine.frames_since_last_render(), 1);

        machine.advance(per_frame);
        assert_eq!(machine.frames_since_last_render(), 2);

        let mut frame = FrameBuffer::default();
        machine.render_to_frame_buffer(&mut frame);
        assert!(!machine.new_frame_pending());
        assert_eq!(machine.frames_since_last_render(), 0);
        assert_eq!(frame.width(), DEMO_WIDTH);
        assert_eq!(frame.height(), DEMO_HEIGHT);
    }

    #[test]
    fn test_breakpoint_traps_once_then_resumes() {
        let mut machine = demo_machine();
        machine.advance(500);
        // Let the in-flight instruction finish so the trap lands on a fetch
        machine.advance(u64::from(machine.instruction_cycles_left));
        let address = machine.pc();
        machine.add_breakpoint(address);

        let advance = machine.advance(10_000);
        match advance.stop {
            Some(StopReason::Trap(trap)) => assert_eq!(trap.address, Some(address)),
            other => panic!("expected trap, got {other:?}"),
        }
        assert_eq!(advance.cycles, 0);

        // The trapped instruction executes on resume
        let resumed = machine.advance(4);
        assert_eq!(resumed.cycles, 4);
        assert!(resumed.stop.is_none());
    }

    #[test]
    fn test_injected_fatal_stops_execution() {
        let mut machine = demo_machine();
        machine.inject_fatal_at(1_000);

        let advance = machine.advance(5_000);
        assert!(matches!(advance.stop, Some(StopReason::Fatal(_))));
        assert!(advance.cycles >= 1_000);
        assert!(advance.cycles < 1_010);

        // Fatal errors fire once
        assert!(machine.advance(100).stop.is_none());
    }

    #[test]
    fn test_switching_to_shorter_frame_mid_frame() {
        use crate::test_utils::{DEMO_SEED, demo_cartridge};

        let mut machine = DemoMachine::new(demo_cartridge(), FrameLayout::Pal, DEMO_SEED);
        let pal_per_frame = machine.timing().cycles_per_frame();
        machine.advance(pal_per_frame - 10);
        assert_eq!(machine.frame_count(), 0);

        machine.set_layout(FrameLayout::Ntsc);
        let advance = machine.run_frames(1);
        assert_eq!(advance.cycles, 1);
        assert_eq!(machine.frame_count(), 1);

        // Later frames use the new layout
        let ntsc_per_frame = machine.timing().cycles_per_frame();
        assert_eq!(machine.run_frames(1).cycles, ntsc_per_frame);
    }

    #[test]
    fn test_render_depends_on_state() {
        let mut a = demo_machine();
        a.run_frames(1);
        let mut first = FrameBuffer::default();
        a.render_to_frame_buffer(&mut first);

        a.run_frames(1);
        let mut second = FrameBuffer::default();
        a.render_to_frame_buffer(&mut second);

        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_load_rejects_foreign_state() {
        let mut out = Serializer::new();
        out.put_string("SomethingElse");
        let bytes = out.into_bytes();

        let mut machine = demo_machine();
        let err = machine.load(&mut Deserializer::new(&bytes)).unwrap_err();
        assert!(matches!(err, CodecError::Machine(_)));
    }
}

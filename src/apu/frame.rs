//! [Frame counter](https://www.nesdev.org/wiki/APU_Frame_Counter): quarter/half frame clocks
//! for envelopes, linear and length counters, independent of sample generation.

/// 4-step sequence: resets every 29830 CPU cycles.
const FRAME_4STEP_RESET: u32 = 29830;

/// 5-step sequence: resets every 37282 cycles.
const FRAME_5STEP_RESET: u32 = 37282;

/// Which frame clocks fired on a given cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameClock {
    /// Envelopes and triangle linear counter.
    pub quarter: bool,
    /// Length counters.
    pub half: bool,
}

impl FrameClock {
    const NONE: FrameClock = FrameClock {
        quarter: false,
        half: false,
    };
    const QUARTER: FrameClock = FrameClock {
        quarter: true,
        half: false,
    };
    const BOTH: FrameClock = FrameClock {
        quarter: true,
        half: true,
    };
}

/// Frame sequencer. IRQ generation is not modelled; there is no CPU to service it.
#[derive(Debug, Clone, Default)]
pub struct FrameSequencer {
    five_step: bool,
    cycle: u32,
}

impl FrameSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.five_step = false;
        self.cycle = 0;
    }

    /// $4017: bit 7 selects 5-step mode. Resets the sequence; 5-step mode clocks both units
    /// immediately.
    pub fn write(&mut self, data: u8) -> FrameClock {
        self.five_step = data & 0x80 != 0;
        self.cycle = 0;
        if self.five_step {
            FrameClock::BOTH
        } else {
            FrameClock::NONE
        }
    }

    /// Advance one CPU cycle.
    pub fn tick(&mut self) -> FrameClock {
        self.cycle += 1;
        let clock = match (self.five_step, self.cycle) {
            (_, 7457) | (_, 22371) => FrameClock::QUARTER,
            (_, 14913) | (false, 29829) | (true, 37281) => FrameClock::BOTH,
            _ => FrameClock::NONE,
        };
        let reset = if self.five_step {
            FRAME_5STEP_RESET
        } else {
            FRAME_4STEP_RESET
        };
        if self.cycle >= reset {
            self.cycle = 0;
        }
        clock
    }
}

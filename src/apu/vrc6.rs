//! Konami [VRC6 audio](https://www.nesdev.org/wiki/VRC6_audio): two pulse channels and a sawtooth.
//!
//! | Address | Pulse 1 / Pulse 2 ($9000 / $A000)        | Sawtooth ($B000)             |
//! |---------|-------------------------------------------|------------------------------|
//! | +0      | `MDDD VVVV` mode, duty, volume            | `..AA AAAA` accumulator rate |
//! | +1      | period low 8 bits                         | period low 8 bits            |
//! | +2      | `E... PPPP` enable, period high 4 bits    | same                         |
//!
//! $9003 is the frequency control register: bit 0 halts every channel, bit 1 shifts periods
//! right by 4, bit 2 by 8.

use std::ops::RangeInclusive;

use crate::apu::{RenderEngine, filter::HighPass};

const VRC6_REGISTERS: RangeInclusive<u16> = 0x9000..=0xB002;

/// Integer output per volume step, chosen so a full-volume VRC6 pulse matches a full-volume
/// base pulse in the mix.
const VRC6_UNIT: f32 = 80.0;

#[derive(Default)]
struct Vrc6Pulse {
    /// Ignore duty; output volume constantly.
    mode: bool,
    duty: u8,
    volume: u8,
    enabled: bool,
    period: u16,
    divider: u16,
    step: u8,
}

impl Vrc6Pulse {
    fn write_control(&mut self, data: u8) {
        self.mode = data & 0x80 != 0;
        self.duty = (data >> 4) & 7;
        self.volume = data & 0x0F;
    }

    fn write_period_low(&mut self, data: u8) {
        self.period = (self.period & 0x0F00) | data as u16;
    }

    /// Disabling resets the duty position.
    fn write_period_high(&mut self, data: u8) {
        self.period = (self.period & 0x00FF) | ((data & 0x0F) as u16) << 8;
        self.enabled = data & 0x80 != 0;
        if !self.enabled {
            self.step = 0;
        }
    }

    fn tick(&mut self, shift: u8) {
        if !self.enabled {
            return;
        }
        if self.divider > 0 {
            self.divider -= 1;
            return;
        }
        self.divider = self.period >> shift;
        self.step = (self.step + 1) & 15;
    }

    fn output(&self) -> u8 {
        if !self.enabled {
            return 0;
        }
        if self.mode || self.step <= self.duty {
            self.volume
        } else {
            0
        }
    }
}

/// Accumulator adds `rate` on every other step; resets after the seventh step pair.
#[derive(Default)]
struct Vrc6Saw {
    rate: u8,
    enabled: bool,
    period: u16,
    divider: u16,
    step: u8,
    accumulator: u8,
}

impl Vrc6Saw {
    fn write_rate(&mut self, data: u8) {
        self.rate = data & 0x3F;
    }

    fn write_period_low(&mut self, data: u8) {
        self.period = (self.period & 0x0F00) | data as u16;
    }

    fn write_period_high(&mut self, data: u8) {
        self.period = (self.period & 0x00FF) | ((data & 0x0F) as u16) << 8;
        self.enabled = data & 0x80 != 0;
        if !self.enabled {
            self.step = 0;
            self.accumulator = 0;
        }
    }

    fn tick(&mut self, shift: u8) {
        if !self.enabled {
            return;
        }
        if self.divider > 0 {
            self.divider -= 1;
            return;
        }
        self.divider = self.period >> shift;
        self.step += 1;
        if self.step >= 14 {
            self.step = 0;
            self.accumulator = 0;
        } else if self.step % 2 == 0 {
            self.accumulator = self.accumulator.wrapping_add(self.rate);
        }
    }

    /// Top five bits of the accumulator.
    fn output(&self) -> u8 {
        if !self.enabled {
            return 0;
        }
        self.accumulator >> 3
    }
}

/// VRC6 expansion sound engine.
#[derive(Default)]
pub struct Vrc6 {
    pulse: [Vrc6Pulse; 2],
    saw: Vrc6Saw,
    halt: bool,
    shift: u8,
    filter: HighPass,
}

impl Vrc6 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-channel enable bits (bit 0 pulse 1, bit 1 pulse 2, bit 2 sawtooth).
    pub(crate) fn enabled_mask(&self) -> u8 {
        (self.pulse[0].enabled as u8)
            | (self.pulse[1].enabled as u8) << 1
            | (self.saw.enabled as u8) << 2
    }

    pub(crate) fn level(&self) -> f32 {
        let sum = self.pulse[0].output() as u32
            + self.pulse[1].output() as u32
            + self.saw.output() as u32;
        sum as f32 * VRC6_UNIT
    }

    /// $9003: halt (bit 0), ×16 (bit 1), ×256 (bit 2, takes priority).
    fn write_frequency_control(&mut self, data: u8) {
        self.halt = data & 0x01 != 0;
        self.shift = if data & 0x04 != 0 {
            8
        } else if data & 0x02 != 0 {
            4
        } else {
            0
        };
    }
}

impl RenderEngine for Vrc6 {
    fn register_range(&self) -> RangeInclusive<u16> {
        VRC6_REGISTERS
    }

    fn configure_clock(&mut self, _master_clock_hz: f64, sample_rate_hz: f64) {
        self.filter.set_sample_rate(sample_rate_hz as f32);
    }

    fn reset_state(&mut self) {
        self.pulse = Default::default();
        self.saw = Vrc6Saw::default();
        self.halt = false;
        self.shift = 0;
        self.filter.reset();
    }

    fn clear_output(&mut self) {
        self.filter.reset();
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x9000 => self.pulse[0].write_control(data),
            0x9001 => self.pulse[0].write_period_low(data),
            0x9002 => self.pulse[0].write_period_high(data),
            0x9003 => self.write_frequency_control(data),
            0xA000 => self.pulse[1].write_control(data),
            0xA001 => self.pulse[1].write_period_low(data),
            0xA002 => self.pulse[1].write_period_high(data),
            0xB000 => self.saw.write_rate(data),
            0xB001 => self.saw.write_period_low(data),
            0xB002 => self.saw.write_period_high(data),
            _ => {}
        }
    }

    fn advance(&mut self, cycles: u32) {
        if self.halt {
            return;
        }
        for _ in 0..cycles {
            self.pulse[0].tick(self.shift);
            self.pulse[1].tick(self.shift);
            self.saw.tick(self.shift);
        }
    }

    fn render_frame(&mut self) -> (i32, i32) {
        let out = self.filter.process(self.level()) as i32;
        (out, out)
    }
}

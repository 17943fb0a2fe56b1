//! Base APU rendering units.
//!
//! The 2A03's channels are split across two engines the way the console's mixer groups them:
//! [`PulseUnit`] (pulse×2, the pulse output table) and [`TndUnit`] (triangle, noise and the
//! sample channel, the TND output table). Each runs its own [frame
//! sequencer](https://www.nesdev.org/wiki/APU_Frame_Counter); both decode $4015 and $4017.
//!
//! ## Timing
//!
//! - Pulse: timer clocked every 2 CPU cycles (APU "half cycle").
//! - Triangle and noise: timer at CPU rate.
//! - Envelope/linear/length: clocked by the frame sequencer (~240 Hz).

use std::ops::RangeInclusive;

use crate::apu::{
    MIX_SCALE, RenderEngine,
    channels::{Noise, Pulse, Triangle},
    filter::HighPass,
    frame::{FrameClock, FrameSequencer},
};

const BASE_REGISTERS: RangeInclusive<u16> = 0x4000..=0x4017;

/// Pulse output: 95.52 / (8128/n + 100), n = pulse1 + pulse2 (0–30). APU_Mixer.
fn pulse_table(n: usize) -> f32 {
    if n == 0 {
        return 0.0;
    }
    95.52 / (8128.0 / (n as f32) + 100.0)
}

/// TND output: 163.67 / (24329/n + 100), n = 3*tri + 2*noise + dmc.
fn tnd_table(n: usize) -> f32 {
    if n == 0 {
        return 0.0;
    }
    163.67 / (24329.0 / (n as f32) + 100.0)
}

// -----------------------------------------------------------------------------
// Pulse unit ($4000–$4007, $4015 bits 0–1, $4017)
// -----------------------------------------------------------------------------

/// Both base pulse channels.
#[derive(Default)]
pub struct PulseUnit {
    pulse: [Pulse; 2],
    frame: FrameSequencer,
    odd_cycle: bool,
    filter: HighPass,
}

impl PulseUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// $4015 read bits 0–1: length counter > 0.
    pub(crate) fn length_status(&self) -> u8 {
        (self.pulse[0].length.is_active() as u8) | (self.pulse[1].length.is_active() as u8) << 1
    }

    fn apply(&mut self, clock: FrameClock) {
        for pulse in &mut self.pulse {
            if clock.quarter {
                pulse.envelope.clock();
            }
            if clock.half {
                pulse.length.clock();
            }
        }
    }

    /// Unfiltered mix level in integer units.
    pub(crate) fn level(&self) -> f32 {
        let n = (self.pulse[0].output() + self.pulse[1].output()) as usize;
        pulse_table(n) * MIX_SCALE
    }
}

impl RenderEngine for PulseUnit {
    fn register_range(&self) -> RangeInclusive<u16> {
        BASE_REGISTERS
    }

    fn configure_clock(&mut self, _master_clock_hz: f64, sample_rate_hz: f64) {
        self.filter.set_sample_rate(sample_rate_hz as f32);
    }

    fn reset_state(&mut self) {
        self.pulse = Default::default();
        self.frame.reset();
        self.odd_cycle = false;
        self.filter.reset();
    }

    fn clear_output(&mut self) {
        self.filter.reset();
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x4000 => self.pulse[0].write_control(data),
            0x4002 => self.pulse[0].write_timer_low(data),
            0x4003 => self.pulse[0].write_timer_high(data),
            0x4004 => self.pulse[1].write_control(data),
            0x4006 => self.pulse[1].write_timer_low(data),
            0x4007 => self.pulse[1].write_timer_high(data),
            0x4015 => {
                self.pulse[0].length.set_enabled(data & 0x01 != 0);
                self.pulse[1].length.set_enabled(data & 0x02 != 0);
            }
            0x4017 => {
                let clock = self.frame.write(data);
                self.apply(clock);
            }
            _ => {}
        }
    }

    fn advance(&mut self, cycles: u32) {
        for _ in 0..cycles {
            let clock = self.frame.tick();
            self.apply(clock);
            self.odd_cycle = !self.odd_cycle;
            if !self.odd_cycle {
                self.pulse[0].tick();
                self.pulse[1].tick();
            }
        }
    }

    fn render_frame(&mut self) -> (i32, i32) {
        let out = self.filter.process(self.level()) as i32;
        (out, out)
    }
}

// -----------------------------------------------------------------------------
// TND unit ($4008–$4013, $4015 bits 2–3, $4017)
// -----------------------------------------------------------------------------

/// Triangle, noise, and the sample channel's output level.
#[derive(Default)]
pub struct TndUnit {
    triangle: Triangle,
    noise: Noise,
    /// 7-bit DMC output level set by direct load ($4011). Mixed whether enabled or not.
    sample_level: u8,
    frame: FrameSequencer,
    filter: HighPass,
}

impl TndUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// $4015 read bits 2–3: length counter > 0.
    pub(crate) fn length_status(&self) -> u8 {
        (self.triangle.length.is_active() as u8) << 2 | (self.noise.length.is_active() as u8) << 3
    }

    fn apply(&mut self, clock: FrameClock) {
        if clock.quarter {
            self.triangle.clock_linear();
            self.noise.envelope.clock();
        }
        if clock.half {
            self.triangle.length.clock();
            self.noise.length.clock();
        }
    }

    pub(crate) fn level(&self) -> f32 {
        let n = 3 * self.triangle.output() as usize
            + 2 * self.noise.output() as usize
            + self.sample_level as usize;
        tnd_table(n) * MIX_SCALE
    }
}

impl RenderEngine for TndUnit {
    fn register_range(&self) -> RangeInclusive<u16> {
        BASE_REGISTERS
    }

    fn configure_clock(&mut self, _master_clock_hz: f64, sample_rate_hz: f64) {
        self.filter.set_sample_rate(sample_rate_hz as f32);
    }

    fn reset_state(&mut self) {
        self.triangle = Triangle::default();
        self.noise = Noise::default();
        self.sample_level = 0;
        self.frame.reset();
        self.filter.reset();
    }

    fn clear_output(&mut self) {
        self.filter.reset();
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x4008 => self.triangle.write_control(data),
            0x400A => self.triangle.write_timer_low(data),
            0x400B => self.triangle.write_timer_high(data),
            0x400C => self.noise.write_control(data),
            0x400E => self.noise.write_period(data),
            0x400F => self.noise.write_length(data),
            0x4011 => self.sample_level = data & 0x7F,
            0x4015 => {
                self.triangle.length.set_enabled(data & 0x04 != 0);
                self.noise.length.set_enabled(data & 0x08 != 0);
            }
            0x4017 => {
                let clock = self.frame.write(data);
                self.apply(clock);
            }
            _ => {}
        }
    }

    fn advance(&mut self, cycles: u32) {
        for _ in 0..cycles {
            let clock = self.frame.tick();
            self.apply(clock);
            self.triangle.tick();
            self.noise.tick();
        }
    }

    fn render_frame(&mut self) -> (i32, i32) {
        let out = self.filter.process(self.level()) as i32;
        (out, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_note_sounds_after_enable() {
        let mut unit = PulseUnit::new();
        unit.write(0x4015, 0x0F);
        unit.write(0x4000, 0xBF); // 50%, halt, constant volume 15
        unit.write(0x4002, 0xFD);
        unit.write(0x4003, 0xF8);
        assert_eq!(unit.length_status(), 0x01);

        let mut peak: f32 = 0.0;
        for _ in 0..2000 {
            unit.advance(1);
            peak = peak.max(unit.level());
        }
        assert!(peak > 0.0);
    }

    #[test]
    fn status_write_clears_length_counters() {
        let mut unit = PulseUnit::new();
        unit.write(0x4015, 0x03);
        unit.write(0x4003, 0xF8);
        unit.write(0x4007, 0xF8);
        assert_eq!(unit.length_status(), 0x03);
        unit.write(0x4015, 0x02);
        assert_eq!(unit.length_status(), 0x02);
    }

    #[test]
    fn pulse_unit_ignores_tnd_registers() {
        let mut unit = PulseUnit::new();
        unit.write(0x4015, 0x0F);
        unit.write(0x400B, 0xF8);
        assert_eq!(unit.length_status(), 0);
    }

    #[test]
    fn tnd_unit_tracks_triangle_and_noise_lengths() {
        let mut unit = TndUnit::new();
        unit.write(0x4015, 0x0F);
        unit.write(0x4008, 0xFF);
        unit.write(0x400B, 0xF8);
        unit.write(0x400F, 0xF8);
        assert_eq!(unit.length_status(), 0x0C);
    }

    #[test]
    fn direct_load_feeds_mixer() {
        let mut unit = TndUnit::new();
        assert_eq!(unit.level(), 0.0);
        unit.write(0x4011, 0x40);
        assert!(unit.level() > 0.0);
    }

    #[test]
    fn mixer_tables_are_monotonic() {
        for n in 1..31 {
            assert!(pulse_table(n) > pulse_table(n - 1));
        }
        assert!(tnd_table(203) < 1.0);
    }
}

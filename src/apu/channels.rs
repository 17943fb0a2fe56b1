//! Base APU channel state: pulse, triangle and noise, plus the shared envelope and length units.
//!
//! Register semantics follow [APU registers](https://www.nesdev.org/wiki/APU_registers). Each
//! channel decodes its own writes; the units in [`super::apu`] route addresses to them.

/// Length counter lookup table: 5-bit index from register → count. APU_Length_Counter.
const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Noise channel period table (NTSC): 4-bit index from $400E → period in CPU cycles. APU_Noise.
const NOISE_PERIOD_TABLE: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

/// Pulse duty sequences (8 steps). Duty 0=12.5%, 1=25%, 2=50%, 3=25% negated. APU_Pulse.
const PULSE_DUTY: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1],
    [0, 0, 0, 0, 0, 0, 1, 1],
    [0, 0, 0, 0, 1, 1, 1, 1],
    [1, 1, 1, 1, 1, 1, 0, 0],
];

/// Triangle 32-step waveform: 15 down to 0, then 0 up to 15.
const TRIANGLE_SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
    13, 14, 15,
];

/// Length counter shared by pulse, triangle and noise. Loading only takes effect while the
/// channel is enabled in $4015; disabling clears it.
#[derive(Default)]
pub(crate) struct LengthCounter {
    enabled: bool,
    halt: bool,
    count: u8,
}

impl LengthCounter {
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.count = 0;
        }
    }

    pub(crate) fn set_halt(&mut self, halt: bool) {
        self.halt = halt;
    }

    /// Load from the top five bits of a period-high / length register write.
    pub(crate) fn load(&mut self, data: u8) {
        if self.enabled {
            self.count = LENGTH_TABLE[(data >> 3) as usize & 0x1F];
        }
    }

    pub(crate) fn clock(&mut self) {
        if !self.halt && self.count > 0 {
            self.count -= 1;
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.enabled && self.count > 0
    }
}

/// Envelope generator with constant-volume bypass. APU_Envelope.
#[derive(Default)]
pub(crate) struct Envelope {
    constant_volume: bool,
    looping: bool,
    volume: u8,
    start: bool,
    divider: u8,
    decay: u8,
}

impl Envelope {
    /// Low six bits of $4000/$4004/$400C: loop (shared with length halt), constant volume, volume.
    pub(crate) fn write(&mut self, data: u8) {
        self.looping = data & 0x20 != 0;
        self.constant_volume = data & 0x10 != 0;
        self.volume = data & 0x0F;
    }

    pub(crate) fn restart(&mut self) {
        self.start = true;
    }

    pub(crate) fn clock(&mut self) {
        if self.start {
            self.start = false;
            self.decay = 15;
            self.divider = self.volume;
        } else if self.divider > 0 {
            self.divider -= 1;
        } else {
            self.divider = self.volume;
            if self.decay > 0 {
                self.decay -= 1;
            } else if self.looping {
                self.decay = 15;
            }
        }
    }

    pub(crate) fn level(&self) -> u8 {
        if self.constant_volume {
            self.volume
        } else {
            self.decay
        }
    }
}

/// Pulse channel: duty sequencer clocked every other CPU cycle, 11-bit timer.
#[derive(Default)]
pub(crate) struct Pulse {
    duty: u8,
    pub(crate) envelope: Envelope,
    pub(crate) length: LengthCounter,
    timer_period: u16,
    timer: u16,
    step: u8,
}

impl Pulse {
    /// $4000/$4004: duty, length halt, constant volume, volume/envelope period.
    pub(crate) fn write_control(&mut self, data: u8) {
        self.duty = (data >> 6) & 3;
        self.length.set_halt(data & 0x20 != 0);
        self.envelope.write(data);
    }

    /// $4002/$4006: timer low 8 bits.
    pub(crate) fn write_timer_low(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x0700) | data as u16;
    }

    /// $4003/$4007: length load, timer high 3 bits; restarts envelope and sequencer.
    pub(crate) fn write_timer_high(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | ((data & 7) as u16) << 8;
        self.length.load(data);
        self.envelope.restart();
        self.step = 0;
    }

    pub(crate) fn tick(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.timer_period;
        self.step = self.step.wrapping_sub(1) & 7;
    }

    /// Periods below 8 are muted on hardware (ultrasonic).
    pub(crate) fn output(&self) -> u8 {
        if !self.length.is_active()
            || self.timer_period < 8
            || PULSE_DUTY[self.duty as usize][self.step as usize] == 0
        {
            return 0;
        }
        self.envelope.level()
    }
}

/// Triangle channel: linear counter + length counter, no volume control.
#[derive(Default)]
pub(crate) struct Triangle {
    control: bool,
    linear_load: u8,
    linear_counter: u8,
    linear_reload: bool,
    pub(crate) length: LengthCounter,
    timer_period: u16,
    timer: u16,
    step: u8,
}

impl Triangle {
    /// $4008: control (length halt) flag, linear counter load value.
    pub(crate) fn write_control(&mut self, data: u8) {
        self.control = data & 0x80 != 0;
        self.length.set_halt(self.control);
        self.linear_load = data & 0x7F;
    }

    /// $400A: timer low 8 bits.
    pub(crate) fn write_timer_low(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x0700) | data as u16;
    }

    /// $400B: length load, timer high 3 bits; sets the linear reload flag.
    pub(crate) fn write_timer_high(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | ((data & 7) as u16) << 8;
        self.length.load(data);
        self.linear_reload = true;
    }

    pub(crate) fn clock_linear(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_load;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
    }

    /// Timer runs at CPU rate; the sequencer only advances while both counters are nonzero.
    pub(crate) fn tick(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.timer_period;
        if self.length.is_active() && self.linear_counter > 0 {
            self.step = (self.step + 1) & 31;
        }
    }

    /// Holds the current step when halted, as hardware does; periods below 2 are muted.
    pub(crate) fn output(&self) -> u8 {
        if self.timer_period < 2 {
            return 0;
        }
        TRIANGLE_SEQUENCE[self.step as usize]
    }
}

/// Noise channel: 15-bit LFSR; mode bit selects the short (metallic) sequence.
pub(crate) struct Noise {
    pub(crate) envelope: Envelope,
    pub(crate) length: LengthCounter,
    short_mode: bool,
    period_index: u8,
    timer: u16,
    shift: u16,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            length: LengthCounter::default(),
            short_mode: false,
            period_index: 0,
            timer: 0,
            shift: 1,
        }
    }
}

impl Noise {
    /// $400C: length halt, constant volume, volume/envelope.
    pub(crate) fn write_control(&mut self, data: u8) {
        self.length.set_halt(data & 0x20 != 0);
        self.envelope.write(data);
    }

    /// $400E: LFSR mode (bit 7), period index (bits 0–3).
    pub(crate) fn write_period(&mut self, data: u8) {
        self.short_mode = data & 0x80 != 0;
        self.period_index = data & 0x0F;
    }

    /// $400F: length load; restarts envelope.
    pub(crate) fn write_length(&mut self, data: u8) {
        self.length.load(data);
        self.envelope.restart();
    }

    pub(crate) fn tick(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = NOISE_PERIOD_TABLE[self.period_index as usize];
        let tap = if self.short_mode { 6 } else { 1 };
        let feedback = (self.shift & 1) ^ ((self.shift >> tap) & 1);
        self.shift = (self.shift >> 1) | (feedback << 14);
    }

    pub(crate) fn output(&self) -> u8 {
        if !self.length.is_active() || self.shift & 1 != 0 {
            return 0;
        }
        self.envelope.level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_counter_ignores_load_while_disabled() {
        let mut length = LengthCounter::default();
        length.load(0xF8);
        assert!(!length.is_active());
        length.set_enabled(true);
        length.load(0xF8);
        assert!(length.is_active());
    }

    #[test]
    fn halted_length_counter_holds() {
        let mut length = LengthCounter::default();
        length.set_enabled(true);
        length.set_halt(true);
        length.load(0x18); // index 3 -> 2
        length.clock();
        length.clock();
        assert!(length.is_active());
    }

    #[test]
    fn constant_volume_bypasses_envelope() {
        let mut envelope = Envelope::default();
        envelope.write(0x30 | 9);
        envelope.restart();
        envelope.clock();
        assert_eq!(envelope.level(), 9);
    }

    #[test]
    fn triangle_zero_linear_load_silences_after_quarter_frame() {
        let mut triangle = Triangle::default();
        triangle.length.set_enabled(true);
        triangle.write_control(0xFF);
        triangle.write_timer_low(0x40);
        triangle.write_timer_high(0xF8);
        triangle.clock_linear();
        assert!(triangle.linear_counter > 0);

        triangle.write_control(0x80);
        triangle.clock_linear();
        assert_eq!(triangle.linear_counter, 0);
    }
}

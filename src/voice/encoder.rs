//! Note and velocity to register encoding.
//!
//! Pure functions: pitch → timer period, velocity → volume field, and the fixed register
//! recipes each channel family uses to start and stop a note.
//!
//! | Family         | Control byte           | Period low | Period high             |
//! |----------------|------------------------|------------|-------------------------|
//! | Pulse          | `DD11 VVVV`            | `PPPP PPPP`| `1111 1PPP` (length 30) |
//! | Triangle       | `1111 1111`            | `PPPP PPPP`| `1111 1PPP`             |
//! | Noise          | `0011 VVVV`            | `M000 NNNN`| `1111 1000`             |
//! | VRC6 pulse     | `0DDD VVVV`            | `PPPP PPPP`| `E000 PPPP`             |
//! | VRC6 sawtooth  | `00RR RRRR`            | `PPPP PPPP`| `E000 PPPP`             |

use crate::{
    bus::Register,
    voice::channel::{Channel, ChannelFamily, ChannelSettings},
};

const A4_NOTE: i32 = 69;
const A4_HZ: f64 = 440.0;

/// Highest timer period of the base chip (11 bits).
pub const BASE_MAX_PERIOD: u16 = 0x7FF;
/// Highest timer period of the VRC6 (12 bits).
pub const EXPANSION_MAX_PERIOD: u16 = 0xFFF;

/// Largest VRC6 accumulator rate that does not overflow within a cycle.
const SAW_MAX_RATE: f32 = 42.0;

/// Base-chip length index 31 (load 30) with the timer-high bits cleared.
const LENGTH_LOAD: u8 = 0xF8;
const CONSTANT_VOLUME_HALT: u8 = 0x30;
const TRIANGLE_SUSTAIN: u8 = 0xFF;
const TRIANGLE_HALT: u8 = 0x80;
const EXPANSION_ENABLE: u8 = 0x80;

pub fn clamp_note(note: i32) -> u8 {
    note.clamp(0, 127) as u8
}

/// NaN clamps to silence.
pub fn clamp_velocity(velocity: f32) -> f32 {
    if velocity.is_nan() {
        0.0
    } else {
        velocity.clamp(0.0, 1.0)
    }
}

/// Equal-tempered frequency, A4 (note 69) = 440 Hz.
pub fn frequency(note: u8) -> f64 {
    A4_HZ * ((note as i32 - A4_NOTE) as f64 / 12.0).exp2()
}

/// Timer period for `note` on `channel`, clamped to the channel's period width.
///
/// The triangle steps through 32 levels per cycle, every other family 16, so the triangle
/// sounds an octave lower for the same period. The sawtooth shares the pulse formula.
pub fn period(note: u8, channel: Channel, master_clock_hz: f64) -> u16 {
    let divisor = match channel.family() {
        ChannelFamily::Triangle => 32.0,
        _ => 16.0,
    };
    let max = max_period(channel);
    let raw = (master_clock_hz / (divisor * frequency(note)) - 1.0).round();
    raw.clamp(0.0, max as f64) as u16
}

pub fn max_period(channel: Channel) -> u16 {
    if channel.is_expansion() {
        EXPANSION_MAX_PERIOD
    } else {
        BASE_MAX_PERIOD
    }
}

/// Noise pitch is one of 16 preset rates; higher notes pick shorter periods.
pub fn noise_period_index(note: u8) -> u8 {
    (15 - note as i32 / 8).clamp(0, 15) as u8
}

/// 4-bit volume field.
pub fn volume(velocity: f32) -> u8 {
    (clamp_velocity(velocity) * 15.0).round() as u8
}

/// 6-bit sawtooth accumulator rate.
pub fn saw_rate(velocity: f32) -> u8 {
    (clamp_velocity(velocity) * SAW_MAX_RATE).round() as u8
}

/// One register write of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub register: Register,
    pub value: u8,
}

impl RegisterWrite {
    fn new(register: Register, value: u8) -> Self {
        Self { register, value }
    }
}

/// Up to three register writes, issued in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Recipe {
    writes: [Option<RegisterWrite>; 3],
}

impl Recipe {
    fn of(writes: &[RegisterWrite]) -> Self {
        let mut recipe = Recipe::default();
        for (slot, write) in recipe.writes.iter_mut().zip(writes) {
            *slot = Some(*write);
        }
        recipe
    }

    pub fn iter(&self) -> impl Iterator<Item = RegisterWrite> + '_ {
        self.writes.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.writes[0].is_none()
    }
}

/// Control byte for a sounding channel: duty, halt/constant-volume flags and volume.
/// `None` for the sample channel.
pub fn control_byte(channel: Channel, velocity: f32, settings: &ChannelSettings) -> Option<u8> {
    let duty = settings.duty_bits(channel);
    match channel.family() {
        ChannelFamily::Pulse => Some(duty | CONSTANT_VOLUME_HALT | volume(velocity)),
        ChannelFamily::Triangle => Some(TRIANGLE_SUSTAIN),
        ChannelFamily::Noise => Some(CONSTANT_VOLUME_HALT | volume(velocity)),
        ChannelFamily::ExpansionPulse => Some(duty | volume(velocity)),
        ChannelFamily::Sawtooth => Some(saw_rate(velocity)),
        ChannelFamily::Sample => None,
    }
}

/// $400E value: mode bit and preset period index.
pub fn noise_period_byte(note: u8, short_mode: bool) -> u8 {
    let mode = if short_mode { 0x80 } else { 0x00 };
    mode | noise_period_index(note)
}

/// Period-high byte for an expansion channel with its enable bit.
fn expansion_high(period: u16, enabled: bool) -> u8 {
    let enable = if enabled { EXPANSION_ENABLE } else { 0 };
    enable | ((period >> 8) & 0x0F) as u8
}

/// Writes that start `note` on `channel`. Expansion channels carry their enable bit from
/// `settings`; the sample channel has no recipe.
pub fn note_on(
    channel: Channel,
    note: u8,
    velocity: f32,
    settings: &ChannelSettings,
    master_clock_hz: f64,
) -> Recipe {
    let Some(control) = control_byte(channel, velocity, settings) else {
        return Recipe::default();
    };
    let period = period(note, channel, master_clock_hz);
    let low = (period & 0xFF) as u8;
    match channel.family() {
        ChannelFamily::Pulse | ChannelFamily::Triangle => Recipe::of(&[
            RegisterWrite::new(Register::Control(channel), control),
            RegisterWrite::new(Register::PeriodLow(channel), low),
            RegisterWrite::new(
                Register::PeriodHigh(channel),
                ((period >> 8) & 0x07) as u8 | LENGTH_LOAD,
            ),
        ]),
        ChannelFamily::Noise => Recipe::of(&[
            RegisterWrite::new(Register::Control(channel), control),
            RegisterWrite::new(
                Register::PeriodLow(channel),
                noise_period_byte(note, settings.noise_short_mode),
            ),
            RegisterWrite::new(Register::PeriodHigh(channel), LENGTH_LOAD),
        ]),
        ChannelFamily::ExpansionPulse | ChannelFamily::Sawtooth => Recipe::of(&[
            RegisterWrite::new(Register::Control(channel), control),
            RegisterWrite::new(Register::PeriodLow(channel), low),
            RegisterWrite::new(
                Register::PeriodHigh(channel),
                expansion_high(period, settings.is_enabled(channel)),
            ),
        ]),
        ChannelFamily::Sample => Recipe::default(),
    }
}

/// The single write that stops `channel`: volume zero for volume-capable base channels, the
/// linear-counter halt for the triangle, the enable bit cleared for expansion channels.
pub fn note_off(channel: Channel, settings: &ChannelSettings) -> Recipe {
    let write = match channel.family() {
        ChannelFamily::Pulse => RegisterWrite::new(
            Register::Control(channel),
            settings.duty_bits(channel) | CONSTANT_VOLUME_HALT,
        ),
        ChannelFamily::Triangle => RegisterWrite::new(Register::Control(channel), TRIANGLE_HALT),
        ChannelFamily::Noise => {
            RegisterWrite::new(Register::Control(channel), CONSTANT_VOLUME_HALT)
        }
        ChannelFamily::ExpansionPulse | ChannelFamily::Sawtooth => {
            RegisterWrite::new(Register::PeriodHigh(channel), 0x00)
        }
        ChannelFamily::Sample => return Recipe::default(),
    };
    Recipe::of(&[write])
}

/// Unconditional channel-off write for an expansion channel.
pub fn expansion_off(channel: Channel) -> RegisterWrite {
    RegisterWrite::new(Register::PeriodHigh(channel), 0x00)
}

/// Period-high rewrite toggling an expansion channel's enable bit while it sounds.
pub fn expansion_enable(
    channel: Channel,
    note: u8,
    enabled: bool,
    master_clock_hz: f64,
) -> RegisterWrite {
    let period = period(note, channel, master_clock_hz);
    RegisterWrite::new(Register::PeriodHigh(channel), expansion_high(period, enabled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::NTSC_MASTER_CLOCK_HZ;
    use approx::assert_relative_eq;

    #[test]
    fn reference_pitches() {
        assert_eq!(frequency(69), 440.0);
        assert_eq!(frequency(57), 220.0);
        assert_relative_eq!(frequency(60), 261.6256, epsilon = 1e-4);
    }

    #[test]
    fn period_is_non_increasing_and_clamps() {
        let channels = [
            Channel::Pulse1,
            Channel::Triangle,
            Channel::ExpPulse1,
            Channel::ExpSawtooth,
        ];
        for channel in channels {
            let mut previous = u16::MAX;
            for note in 0..=127u8 {
                let p = period(note, channel, NTSC_MASTER_CLOCK_HZ);
                assert!(p <= previous, "{channel:?} note {note}");
                assert!(p <= max_period(channel));
                previous = p;
            }
            assert_eq!(period(0, channel, NTSC_MASTER_CLOCK_HZ), max_period(channel));
        }
    }

    #[test]
    fn a440_periods() {
        // 1789772.7 / (16 * 440) - 1 = 253.23
        assert_eq!(period(69, Channel::Pulse1, NTSC_MASTER_CLOCK_HZ), 253);
        // 1789772.7 / (32 * 440) - 1 = 126.11
        assert_eq!(period(69, Channel::Triangle, NTSC_MASTER_CLOCK_HZ), 126);
        assert_eq!(period(69, Channel::ExpPulse2, NTSC_MASTER_CLOCK_HZ), 253);
    }

    #[test]
    fn noise_uses_preset_rates() {
        assert_eq!(noise_period_index(0), 15);
        assert_eq!(noise_period_index(60), 8);
        assert_eq!(noise_period_index(127), 0);
    }

    #[test]
    fn velocity_maps_to_volume() {
        assert_eq!(volume(0.0), 0);
        assert_eq!(volume(0.5), 8);
        assert_eq!(volume(1.0), 15);
        assert_eq!(volume(3.0), 15);
        assert_eq!(volume(f32::NAN), 0);
        assert_eq!(saw_rate(1.0), 42);
    }

    #[test]
    fn pulse_note_on_recipe() {
        let settings = ChannelSettings::default();
        let recipe = note_on(Channel::Pulse1, 69, 1.0, &settings, NTSC_MASTER_CLOCK_HZ);
        let writes: Vec<_> = recipe.iter().map(|w| (w.register.address(), w.value)).collect();
        assert_eq!(writes, vec![(0x4000, 0xBF), (0x4002, 0xFD), (0x4003, 0xF8)]);
    }

    #[test]
    fn noise_note_on_uses_mode_bit() {
        let settings = ChannelSettings {
            noise_short_mode: true,
            ..ChannelSettings::default()
        };
        let recipe = note_on(Channel::Noise, 60, 1.0, &settings, NTSC_MASTER_CLOCK_HZ);
        let writes: Vec<_> = recipe.iter().map(|w| (w.register.address(), w.value)).collect();
        assert_eq!(writes, vec![(0x400C, 0x3F), (0x400E, 0x88), (0x400F, 0xF8)]);
    }

    #[test]
    fn expansion_recipe_carries_enable_bit() {
        let mut settings = ChannelSettings::default();
        let on = note_on(Channel::ExpSawtooth, 33, 1.0, &settings, NTSC_MASTER_CLOCK_HZ);
        let high = on.iter().last().map(|w| w.value).unwrap();
        assert_eq!(high & 0x80, 0x80);

        settings.enabled[Channel::ExpSawtooth.index()] = false;
        let muted = note_on(Channel::ExpSawtooth, 33, 1.0, &settings, NTSC_MASTER_CLOCK_HZ);
        let high = muted.iter().last().map(|w| w.value).unwrap();
        assert_eq!(high & 0x80, 0);
    }

    #[test]
    fn note_off_is_a_single_write() {
        let settings = ChannelSettings::default();
        for channel in Channel::ALL {
            let recipe = note_off(channel, &settings);
            let expected = if channel == Channel::Sample { 0 } else { 1 };
            assert_eq!(recipe.len(), expected, "{channel:?}");
        }
        let tri = note_off(Channel::Triangle, &settings).iter().next().unwrap();
        assert_eq!(tri.value, 0x80);
    }

    #[test]
    fn sample_channel_has_no_recipe() {
        let settings = ChannelSettings::default();
        assert!(note_on(Channel::Sample, 60, 1.0, &settings, NTSC_MASTER_CLOCK_HZ).is_empty());
    }
}

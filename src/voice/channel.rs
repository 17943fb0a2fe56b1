//! Chip channels, duty settings, and the per-channel voice table.

use serde::{Deserialize, Serialize};

/// Physical channel of the base APU (indices 0–4) or the VRC6 expansion (indices 5–7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Pulse1 = 0,
    Pulse2 = 1,
    Triangle = 2,
    Noise = 3,
    /// DMC. Never driven by note events.
    Sample = 4,
    ExpPulse1 = 5,
    ExpPulse2 = 6,
    ExpSawtooth = 7,
}

/// Register layout family of a channel. Decides period divisor, period width and the
/// note-on / note-off register recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFamily {
    Pulse,
    Triangle,
    Noise,
    Sample,
    ExpansionPulse,
    Sawtooth,
}

impl Channel {
    pub const COUNT: usize = 8;

    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::Pulse1,
        Channel::Pulse2,
        Channel::Triangle,
        Channel::Noise,
        Channel::Sample,
        Channel::ExpPulse1,
        Channel::ExpPulse2,
        Channel::ExpSawtooth,
    ];

    /// Channels covered by the $4015 status register, in bit order.
    pub const BASE: [Channel; 5] = [
        Channel::Pulse1,
        Channel::Pulse2,
        Channel::Triangle,
        Channel::Noise,
        Channel::Sample,
    ];

    pub const EXPANSION: [Channel; 3] =
        [Channel::ExpPulse1, Channel::ExpPulse2, Channel::ExpSawtooth];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Out-of-range indices yield `None`; callers treat that as a no-op.
    pub fn from_index(index: usize) -> Option<Channel> {
        Channel::ALL.get(index).copied()
    }

    pub fn family(self) -> ChannelFamily {
        match self {
            Channel::Pulse1 | Channel::Pulse2 => ChannelFamily::Pulse,
            Channel::Triangle => ChannelFamily::Triangle,
            Channel::Noise => ChannelFamily::Noise,
            Channel::Sample => ChannelFamily::Sample,
            Channel::ExpPulse1 | Channel::ExpPulse2 => ChannelFamily::ExpansionPulse,
            Channel::ExpSawtooth => ChannelFamily::Sawtooth,
        }
    }

    pub fn is_expansion(self) -> bool {
        matches!(
            self,
            Channel::ExpPulse1 | Channel::ExpPulse2 | Channel::ExpSawtooth
        )
    }

    /// Pitched channels reachable through free-channel search and stealing.
    pub fn is_melodic(self) -> bool {
        !matches!(self, Channel::Noise | Channel::Sample)
    }

    /// Base channel standing in for an expansion channel while the expansion is off.
    pub fn base_counterpart(self) -> Channel {
        match self {
            Channel::ExpPulse1 => Channel::Pulse1,
            Channel::ExpPulse2 => Channel::Pulse2,
            Channel::ExpSawtooth => Channel::Triangle,
            other => other,
        }
    }
}

/// Base pulse duty cycle, register bits 7–6 of $4000/$4004.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DutyCycle {
    /// 12.5%
    Eighth = 0,
    /// 25%
    Quarter = 1,
    /// 50%
    #[default]
    Half = 2,
    /// 75% (negated 25%)
    ThreeQuarters = 3,
}

impl DutyCycle {
    /// Levels above 3 clamp to 75%.
    pub fn from_level(level: u8) -> DutyCycle {
        match level {
            0 => DutyCycle::Eighth,
            1 => DutyCycle::Quarter,
            2 => DutyCycle::Half,
            _ => DutyCycle::ThreeQuarters,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

/// VRC6 pulse duty, register bits 6–4 of $9000/$A000: high for `level + 1` of 16 steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct ExpansionDuty(u8);

impl ExpansionDuty {
    pub const MAX: u8 = 7;

    pub fn new(level: u8) -> ExpansionDuty {
        ExpansionDuty(level.min(Self::MAX))
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

impl Default for ExpansionDuty {
    fn default() -> Self {
        ExpansionDuty(4)
    }
}

impl From<u8> for ExpansionDuty {
    fn from(level: u8) -> Self {
        ExpansionDuty::new(level)
    }
}

impl From<ExpansionDuty> for u8 {
    fn from(duty: ExpansionDuty) -> Self {
        duty.0
    }
}

/// Live binding of a channel to a note.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Voice {
    /// `None` while the channel is silent.
    pub note: Option<u8>,
    pub velocity: f32,
    /// Allocation stamp; strictly increasing across note-ons, 0 after reset.
    pub timestamp: u64,
}

impl Voice {
    pub fn is_sounding(&self) -> bool {
        self.note.is_some()
    }
}

/// One voice slot per physical channel. A channel holds at most one voice.
#[derive(Debug, Clone)]
pub struct ChannelTable {
    voices: [Voice; Channel::COUNT],
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTable {
    pub fn new() -> Self {
        Self {
            voices: [Voice::default(); Channel::COUNT],
        }
    }

    pub fn voice(&self, channel: Channel) -> &Voice {
        &self.voices[channel.index()]
    }

    pub fn note(&self, channel: Channel) -> Option<u8> {
        self.voices[channel.index()].note
    }

    pub fn bind(&mut self, channel: Channel, note: u8, velocity: f32, timestamp: u64) {
        self.voices[channel.index()] = Voice {
            note: Some(note),
            velocity,
            timestamp,
        };
    }

    /// Clears the note, keeping the timestamp for stealing order. Returns whether a note was bound.
    pub fn release(&mut self, channel: Channel) -> bool {
        let voice = &mut self.voices[channel.index()];
        let was_sounding = voice.note.is_some();
        voice.note = None;
        voice.velocity = 0.0;
        was_sounding
    }

    /// Every channel bound to `note`, in index order.
    pub fn channels_with_note(&self, note: u8) -> impl Iterator<Item = Channel> + '_ {
        Channel::ALL
            .into_iter()
            .filter(move |c| self.voices[c.index()].note == Some(note))
    }

    /// Silence every voice and zero all timestamps.
    pub fn reset(&mut self) {
        self.voices = [Voice::default(); Channel::COUNT];
    }
}

/// Per-channel configuration that persists across notes.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub enabled: [bool; Channel::COUNT],
    pub pulse_duty: [DutyCycle; 2],
    pub expansion_duty: [ExpansionDuty; 2],
    pub noise_short_mode: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            // Sample channel starts muted; expansion channels are gated by the unit enable.
            enabled: [true, true, true, true, false, true, true, true],
            pulse_duty: [DutyCycle::Half; 2],
            expansion_duty: [ExpansionDuty::default(); 2],
            noise_short_mode: false,
        }
    }
}

impl ChannelSettings {
    pub fn is_enabled(&self, channel: Channel) -> bool {
        self.enabled[channel.index()]
    }

    /// $4015 value: bit i set iff base channel i is enabled.
    pub fn status_mask(&self) -> u8 {
        Channel::BASE
            .iter()
            .filter(|c| self.is_enabled(**c))
            .fold(0, |mask, c| mask | (1 << c.index()))
    }

    /// Duty register bits for a pulse-family channel, already shifted into place.
    pub fn duty_bits(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Pulse1 => self.pulse_duty[0].level() << 6,
            Channel::Pulse2 => self.pulse_duty[1].level() << 6,
            Channel::ExpPulse1 => self.expansion_duty[0].level() << 4,
            Channel::ExpPulse2 => self.expansion_duty[1].level() << 4,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_indices_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_index(channel.index()), Some(channel));
        }
        assert_eq!(Channel::from_index(8), None);
    }

    #[test]
    fn default_status_mask_enables_pulse_triangle_noise() {
        assert_eq!(ChannelSettings::default().status_mask(), 0x0F);
    }

    #[test]
    fn duty_levels_clamp() {
        assert_eq!(DutyCycle::from_level(9), DutyCycle::ThreeQuarters);
        assert_eq!(ExpansionDuty::new(12).level(), 7);
    }

    #[test]
    fn release_keeps_timestamp() {
        let mut table = ChannelTable::new();
        table.bind(Channel::Triangle, 40, 1.0, 7);
        assert!(table.release(Channel::Triangle));
        assert!(!table.release(Channel::Triangle));
        assert_eq!(table.voice(Channel::Triangle).timestamp, 7);
        assert_eq!(table.note(Channel::Triangle), None);
    }
}

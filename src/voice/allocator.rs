//! Note to channel allocation.
//!
//! The chip has at most six pitched channels, so the allocator decides which physical channel
//! realizes each incoming note: it tracks which note every channel holds, searches for free
//! channels in priority order, and steals the oldest note when none is free.
//!
//! The allocator never touches registers itself. Every channel it starts or stops is reported
//! to a [`VoiceSink`], which owns the register side.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::voice::{
    channel::{Channel, ChannelTable},
    encoder::clamp_velocity,
};

/// Middle C.
pub const DEFAULT_SPLIT_POINT: u8 = 60;

/// Low register of [`AllocationMode::PitchSplit`]: the triangle, then the VRC6 sawtooth.
const BASS_GROUP: [Channel; 2] = [Channel::Triangle, Channel::ExpSawtooth];

/// High register of [`AllocationMode::PitchSplit`]: base pulses, then VRC6 pulses.
const TREBLE_GROUP: [Channel; 4] = [
    Channel::Pulse1,
    Channel::Pulse2,
    Channel::ExpPulse1,
    Channel::ExpPulse2,
];

/// Receives the channel-level commands produced by allocation.
pub trait VoiceSink {
    /// Start `note` on `channel`. Any previous occupant has already been stopped.
    fn note_on(&mut self, channel: Channel, note: u8, velocity: f32);
    /// Stop `channel`. Implementations skip channels whose registers are already silent.
    fn note_off(&mut self, channel: Channel);
}

/// Process-wide allocation policy. Changes apply from the next note-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AllocationMode {
    /// Every note on Pulse 1.
    FixedMono,
    /// Retrigger a channel already holding the note, else first free, else steal the oldest.
    #[default]
    RoundRobin,
    /// Notes below the split point go to the bass group, the rest to the treble group.
    PitchSplit,
    /// The MIDI channel hint picks the chip channel.
    MidiChannelSplit,
    /// Every active melodic channel plays the note.
    Unison,
}

/// Priority order of the melodic channels for free-channel search and stealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Channel>", into = "Vec<Channel>")]
pub struct ChannelOrder {
    order: [Channel; 6],
}

impl ChannelOrder {
    /// Base pulses and triangle before the expansion channels.
    pub const DEFAULT: [Channel; 6] = [
        Channel::Pulse1,
        Channel::Pulse2,
        Channel::Triangle,
        Channel::ExpPulse1,
        Channel::ExpPulse2,
        Channel::ExpSawtooth,
    ];

    /// Keeps the melodic channels of `channels` in the given order, dropping duplicates and
    /// non-melodic channels; melodic channels not mentioned follow in default order.
    pub fn new(channels: &[Channel]) -> Self {
        let mut order = Self::DEFAULT;
        let mut len = 0;
        let requested = channels.iter().copied().filter(|c| c.is_melodic());
        for channel in requested.chain(Self::DEFAULT) {
            if !order[..len].contains(&channel) {
                order[len] = channel;
                len += 1;
            }
        }
        Self { order }
    }

    pub fn as_slice(&self) -> &[Channel] {
        &self.order
    }
}

impl Default for ChannelOrder {
    fn default() -> Self {
        Self {
            order: Self::DEFAULT,
        }
    }
}

impl From<Vec<Channel>> for ChannelOrder {
    fn from(channels: Vec<Channel>) -> Self {
        ChannelOrder::new(&channels)
    }
}

impl From<ChannelOrder> for Vec<Channel> {
    fn from(order: ChannelOrder) -> Self {
        order.order.to_vec()
    }
}

/// Voice allocator: owns the channel table and the allocation stamps.
#[derive(Debug, Clone, Default)]
pub struct VoiceAllocator {
    mode: AllocationMode,
    split_point: u8,
    order: ChannelOrder,
    table: ChannelTable,
    /// Last stamp handed out; 0 means "never allocated".
    clock: u64,
}

impl VoiceAllocator {
    pub fn new() -> Self {
        Self {
            split_point: DEFAULT_SPLIT_POINT,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> AllocationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AllocationMode) {
        if mode != self.mode {
            debug!("allocation mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
    }

    pub fn split_point(&self) -> u8 {
        self.split_point
    }

    pub fn set_split_point(&mut self, note: u8) {
        self.split_point = note.min(127);
    }

    pub fn order(&self) -> &ChannelOrder {
        &self.order
    }

    pub fn set_order(&mut self, order: ChannelOrder) {
        self.order = order;
    }

    pub fn table(&self) -> &ChannelTable {
        &self.table
    }

    /// Silence the table and zero every stamp. Issues no commands.
    pub fn reset(&mut self) {
        self.table.reset();
        self.clock = 0;
    }

    /// Allocate a channel for `note` and start it. Returns the channel (the first one in
    /// unison), or `None` when the policy yields no channel.
    ///
    /// A velocity of zero still binds the channel and plays at volume zero; it is not a
    /// note-off.
    pub fn note_on(
        &mut self,
        midi_channel_hint: u8,
        note: u8,
        velocity: f32,
        expansion_enabled: bool,
        sink: &mut impl VoiceSink,
    ) -> Option<Channel> {
        let note = note.min(127);
        let velocity = clamp_velocity(velocity);

        if self.mode == AllocationMode::Unison {
            let order = self.order;
            let mut first = None;
            for channel in active_melodic(&order, expansion_enabled) {
                self.bind(channel, note, velocity, sink);
                first.get_or_insert(channel);
            }
            return first;
        }

        let channel = self.select(midi_channel_hint, note, expansion_enabled)?;
        self.bind(channel, note, velocity, sink);
        Some(channel)
    }

    /// Release every channel holding `note`. Stale duplicates left by a mode change are
    /// released too. Returns how many channels were stopped.
    pub fn note_off(
        &mut self,
        _midi_channel_hint: u8,
        note: u8,
        sink: &mut impl VoiceSink,
    ) -> usize {
        let mut released = 0;
        for channel in Channel::ALL {
            if self.table.note(channel) == Some(note) {
                self.table.release(channel);
                sink.note_off(channel);
                released += 1;
            }
        }
        released
    }

    /// Release and stop every channel, bound or not.
    pub fn all_notes_off(&mut self, sink: &mut impl VoiceSink) {
        for channel in Channel::ALL {
            self.table.release(channel);
            sink.note_off(channel);
        }
    }

    /// Start `note` on `channel` directly, bypassing the policy. The only path to the noise and
    /// sample channels outside [`AllocationMode::MidiChannelSplit`].
    pub fn note_on_channel(
        &mut self,
        channel: Channel,
        note: u8,
        velocity: f32,
        sink: &mut impl VoiceSink,
    ) {
        self.bind(channel, note.min(127), clamp_velocity(velocity), sink);
    }

    /// Stop `channel` if it holds a note.
    pub fn note_off_channel(&mut self, channel: Channel, sink: &mut impl VoiceSink) -> bool {
        let released = self.table.release(channel);
        if released {
            sink.note_off(channel);
        }
        released
    }

    /// Drop the binding on `channel` without issuing a command.
    pub fn release_binding(&mut self, channel: Channel) -> bool {
        self.table.release(channel)
    }

    /// First channel (by index) holding `note`.
    pub fn channel_for_note(&self, note: u8) -> Option<Channel> {
        self.table.channels_with_note(note).next()
    }

    fn bind(&mut self, channel: Channel, note: u8, velocity: f32, sink: &mut impl VoiceSink) {
        if self.table.note(channel).is_some() {
            sink.note_off(channel);
        }
        self.clock += 1;
        self.table.bind(channel, note, velocity, self.clock);
        sink.note_on(channel, note, velocity);
    }

    fn select(
        &self,
        midi_channel_hint: u8,
        note: u8,
        expansion_enabled: bool,
    ) -> Option<Channel> {
        match self.mode {
            AllocationMode::FixedMono => Some(Channel::Pulse1),
            AllocationMode::RoundRobin => {
                let active = active_melodic(&self.order, expansion_enabled);
                let mut held = active.clone();
                if let Some(channel) = held.find(|c| self.table.note(*c) == Some(note)) {
                    return Some(channel);
                }
                self.free_or_oldest(active)
            }
            AllocationMode::PitchSplit => {
                let group: &[Channel] = if note < self.split_point {
                    &BASS_GROUP
                } else {
                    &TREBLE_GROUP
                };
                let candidates = group
                    .iter()
                    .copied()
                    .filter(|c| expansion_enabled || !c.is_expansion());
                self.free_or_oldest(candidates)
            }
            AllocationMode::MidiChannelSplit => {
                Some(midi_channel_target(midi_channel_hint, expansion_enabled))
            }
            AllocationMode::Unison => None,
        }
    }

    /// First free candidate, else the one with the smallest stamp (earliest on ties).
    fn free_or_oldest(
        &self,
        candidates: impl Iterator<Item = Channel> + Clone,
    ) -> Option<Channel> {
        let mut free = candidates.clone();
        if let Some(channel) = free.find(|c| !self.table.voice(*c).is_sounding()) {
            return Some(channel);
        }
        let victim = candidates.min_by_key(|c| self.table.voice(*c).timestamp)?;
        trace!("stealing {:?} from note {:?}", victim, self.table.note(victim));
        Some(victim)
    }
}

/// Melodic channels in priority order, expansion channels only while the unit is enabled.
fn active_melodic(
    order: &ChannelOrder,
    expansion_enabled: bool,
) -> impl Iterator<Item = Channel> + Clone + '_ {
    order
        .as_slice()
        .iter()
        .copied()
        .filter(move |c| expansion_enabled || !c.is_expansion())
}

/// General MIDI style routing: 1–3 base melodic, 4–6 expansion, 10 (drums) noise.
/// Expansion hints fall back to their base counterpart while the expansion is off.
pub fn midi_channel_target(midi_channel_hint: u8, expansion_enabled: bool) -> Channel {
    let channel = match midi_channel_hint {
        0 => Channel::Pulse1,
        1 => Channel::Pulse2,
        2 => Channel::Triangle,
        3 => Channel::ExpPulse1,
        4 => Channel::ExpPulse2,
        5 => Channel::ExpSawtooth,
        9 => Channel::Noise,
        _ => Channel::Pulse1,
    };
    if channel.is_expansion() && !expansion_enabled {
        channel.base_counterpart()
    } else {
        channel
    }
}

use log::debug;

use crate::{
    apu::MIX_SCALE,
    bus::{self, EngineGroup, Register, RegisterBus, RegisterTap},
    clock::{ClockScheduler, NTSC_MASTER_CLOCK_HZ},
    config::{DEFAULT_MASTER_GAIN, SynthConfig},
    error::Result,
    message::{MessageReceiver, SynthMessage},
    synth::driver::ChipDriver,
    voice::{
        allocator::{AllocationMode, ChannelOrder, VoiceAllocator},
        channel::{Channel, ChannelSettings, DutyCycle, ExpansionDuty},
        encoder::{self, clamp_note},
    },
};

/// NES APU + VRC6 synth voice.
pub struct NesSynth {
    bus: RegisterBus,
    clock: ClockScheduler,
    allocator: VoiceAllocator,
    settings: ChannelSettings,
    silenced: [bool; Channel::COUNT],
    master_clock_hz: f64,
    expansion_enabled: bool,
    master_gain: f32,
}

impl Default for NesSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl NesSynth {
    /// NTSC synth with default settings. Call [`NesSynth::initialize`] before rendering.
    pub fn new() -> Self {
        Self::with_master_clock(NTSC_MASTER_CLOCK_HZ)
    }

    pub fn with_master_clock(master_clock_hz: f64) -> Self {
        Self {
            bus: RegisterBus::new(),
            clock: ClockScheduler::new(),
            allocator: VoiceAllocator::new(),
            settings: ChannelSettings::default(),
            silenced: [true; Channel::COUNT],
            master_clock_hz,
            expansion_enabled: false,
            master_gain: DEFAULT_MASTER_GAIN,
        }
    }

    /// Build and initialize a synth from a validated configuration.
    pub fn from_config(config: &SynthConfig) -> Result<Self> {
        config.validate()?;
        let mut synth = Self::with_master_clock(config.master_clock_hz);
        synth.settings.pulse_duty = config.pulse_duty;
        synth.settings.expansion_duty = config.expansion_duty;
        synth.settings.noise_short_mode = config.noise_short_mode;
        for (channel, enabled) in Channel::BASE.iter().zip(config.base_channels_enabled) {
            synth.settings.enabled[channel.index()] = enabled;
        }
        synth.allocator.set_mode(config.allocation_mode);
        synth.allocator.set_split_point(config.split_point);
        synth.allocator.set_order(config.channel_order);
        synth.expansion_enabled = config.expansion_enabled;
        synth.set_master_gain(config.master_gain);
        synth.initialize(config.sample_rate);
        Ok(synth)
    }

    /// Compute the clock ratio for `sample_rate_hz` and reset all chip and voice state.
    pub fn initialize(&mut self, sample_rate_hz: f64) {
        self.clock.configure(self.master_clock_hz, sample_rate_hz);
        self.bus.configure_clock(self.master_clock_hz, sample_rate_hz);
        self.reset();
        debug!(
            "initialized at {} Hz: {:.4} clocks per sample, expansion {}",
            sample_rate_hz,
            self.clock.clocks_per_sample(),
            if self.expansion_enabled { "on" } else { "off" }
        );
    }

    /// Power-on state: engines silent, every voice released, stamps zeroed, status register
    /// written from the channel enables. Settings are kept.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.clock.reset();
        self.allocator.reset();
        self.silenced = [true; Channel::COUNT];
        self.write_status();
    }

    pub fn is_initialized(&self) -> bool {
        self.clock.is_configured()
    }

    // -------------------------------------------------------------------------
    // Note events
    // -------------------------------------------------------------------------

    /// Allocate a channel for `note` and start it. Notes clamp to 0..=127, velocity to 0..=1.
    pub fn note_on(&mut self, midi_channel_hint: u8, note: i32, velocity: f32) -> Option<Channel> {
        let mut driver = ChipDriver::new(
            &mut self.bus,
            &self.settings,
            &mut self.silenced,
            self.master_clock_hz,
        );
        self.allocator.note_on(
            midi_channel_hint,
            clamp_note(note),
            velocity,
            self.expansion_enabled,
            &mut driver,
        )
    }

    /// Stop every channel holding `note`. Returns how many were stopped.
    pub fn note_off(&mut self, midi_channel_hint: u8, note: i32) -> usize {
        let mut driver = ChipDriver::new(
            &mut self.bus,
            &self.settings,
            &mut self.silenced,
            self.master_clock_hz,
        );
        self.allocator
            .note_off(midi_channel_hint, clamp_note(note), &mut driver)
    }

    /// Start `note` on the channel at `index`, bypassing allocation. Out-of-range indices are
    /// ignored.
    pub fn note_on_channel(&mut self, index: usize, note: i32, velocity: f32) {
        let Some(channel) = Channel::from_index(index) else {
            return;
        };
        let mut driver = ChipDriver::new(
            &mut self.bus,
            &self.settings,
            &mut self.silenced,
            self.master_clock_hz,
        );
        self.allocator
            .note_on_channel(channel, clamp_note(note), velocity, &mut driver);
    }

    pub fn note_off_channel(&mut self, index: usize) {
        let Some(channel) = Channel::from_index(index) else {
            return;
        };
        let mut driver = ChipDriver::new(
            &mut self.bus,
            &self.settings,
            &mut self.silenced,
            self.master_clock_hz,
        );
        self.allocator.note_off_channel(channel, &mut driver);
    }

    /// Release and silence every channel. Channels already silent are not rewritten.
    pub fn all_notes_off(&mut self) {
        let mut driver = ChipDriver::new(
            &mut self.bus,
            &self.settings,
            &mut self.silenced,
            self.master_clock_hz,
        );
        self.allocator.all_notes_off(&mut driver);
    }

    pub fn channel_for_note(&self, note: i32) -> Option<Channel> {
        self.allocator.channel_for_note(clamp_note(note))
    }

    /// Frequency of the note sounding on the channel at `index`, or 0.0.
    pub fn channel_frequency(&self, index: usize) -> f64 {
        Channel::from_index(index)
            .and_then(|channel| self.allocator.table().note(channel))
            .map_or(0.0, encoder::frequency)
    }

    // -------------------------------------------------------------------------
    // Channel settings
    // -------------------------------------------------------------------------

    /// Base channels rewrite the whole status register; expansion channels rewrite their own
    /// enable bit.
    pub fn set_channel_enabled(&mut self, index: usize, enabled: bool) {
        let Some(channel) = Channel::from_index(index) else {
            return;
        };
        self.settings.enabled[index] = enabled;
        if !channel.is_expansion() {
            self.write_status();
            return;
        }
        if let Some(note) = self.allocator.table().note(channel) {
            let write = encoder::expansion_enable(channel, note, enabled, self.master_clock_hz);
            self.bus.write_register(write.register, write.value);
            self.silenced[index] = !enabled;
        } else if !enabled {
            self.driver_force_off(channel);
        }
    }

    pub fn is_channel_enabled(&self, index: usize) -> bool {
        Channel::from_index(index).is_some_and(|channel| self.settings.is_enabled(channel))
    }

    /// Duty level (0..=3, clamped) of base pulse `pulse` (0 or 1).
    pub fn set_pulse_duty(&mut self, pulse: usize, level: u8) {
        let Some(duty) = self.settings.pulse_duty.get_mut(pulse) else {
            return;
        };
        *duty = DutyCycle::from_level(level);
        self.refresh_control([Channel::Pulse1, Channel::Pulse2][pulse]);
    }

    /// Duty level (0..=7, clamped) of VRC6 pulse `pulse` (0 or 1).
    pub fn set_expansion_pulse_duty(&mut self, pulse: usize, level: u8) {
        let Some(duty) = self.settings.expansion_duty.get_mut(pulse) else {
            return;
        };
        *duty = ExpansionDuty::new(level);
        self.refresh_control([Channel::ExpPulse1, Channel::ExpPulse2][pulse]);
    }

    /// Short (93-step) noise sequence when set.
    pub fn set_noise_mode(&mut self, short_mode: bool) {
        self.settings.noise_short_mode = short_mode;
        if let Some(note) = self.sounding_note(Channel::Noise) {
            self.bus.write_register(
                Register::PeriodLow(Channel::Noise),
                encoder::noise_period_byte(note, short_mode),
            );
        }
    }

    /// Enabling changes nothing audible on the base chip. Disabling releases expansion voices
    /// and writes channel-off to all three expansion channels.
    pub fn set_expansion_enabled(&mut self, enabled: bool) {
        if enabled != self.expansion_enabled {
            debug!("expansion {}", if enabled { "enabled" } else { "disabled" });
            // Drop filter history from the last time the unit was mixed.
            self.bus.clear_output(EngineGroup::Expansion);
        }
        self.expansion_enabled = enabled;
        if enabled {
            return;
        }
        for channel in Channel::EXPANSION {
            self.allocator.release_binding(channel);
            self.driver_force_off(channel);
        }
    }

    pub fn expansion_enabled(&self) -> bool {
        self.expansion_enabled
    }

    pub fn set_allocation_mode(&mut self, mode: AllocationMode) {
        self.allocator.set_mode(mode);
    }

    pub fn allocation_mode(&self) -> AllocationMode {
        self.allocator.mode()
    }

    pub fn set_split_point(&mut self, note: i32) {
        self.allocator.set_split_point(clamp_note(note));
    }

    pub fn set_channel_order(&mut self, order: &[Channel]) {
        self.allocator.set_order(ChannelOrder::new(order));
    }

    /// Output gain, clamped to 0..=1. NaN mutes.
    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = if gain.is_nan() {
            0.0
        } else {
            gain.clamp(0.0, 1.0)
        };
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    // -------------------------------------------------------------------------
    // Register access
    // -------------------------------------------------------------------------

    /// Raw register write, fanned out like any other. The written channel counts as sounding
    /// until its next note-off.
    pub fn write_register(&mut self, addr: u16, data: u8) {
        self.bus.write(addr, data);
        if let Some(channel) = bus::channel_at(addr) {
            self.silenced[channel.index()] = false;
        }
    }

    pub fn peek_register(&self, addr: u16) -> Option<u8> {
        self.bus.peek(addr)
    }

    pub fn register_write_count(&self) -> u64 {
        self.bus.write_count()
    }

    pub fn set_register_tap(&mut self, tap: Option<Box<dyn RegisterTap>>) {
        self.bus.set_tap(tap);
    }

    pub fn clock(&self) -> &ClockScheduler {
        &self.clock
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Apply every queued message. Call once per block, before rendering.
    pub fn process_messages(&mut self, rx: &mut impl MessageReceiver) {
        while let Some(message) = rx.pop() {
            match message {
                SynthMessage::NoteOn {
                    midi_channel,
                    note,
                    velocity,
                } => {
                    self.note_on(midi_channel, note as i32, velocity);
                }
                SynthMessage::NoteOff { midi_channel, note } => {
                    self.note_off(midi_channel, note as i32);
                }
                SynthMessage::AllNotesOff => self.all_notes_off(),
            }
        }
    }

    /// Render `min(left.len(), right.len())` frames; both outputs carry the same signal.
    ///
    /// # Panics
    ///
    /// If called before [`NesSynth::initialize`].
    pub fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        assert!(self.is_initialized(), "render before initialize");
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let sample = self.next_sample();
            *l = sample;
            *r = sample;
        }
    }

    /// Render stereo frames into an interleaved `[l, r, l, r, ..]` buffer. A trailing odd
    /// sample is left untouched.
    ///
    /// # Panics
    ///
    /// If called before [`NesSynth::initialize`].
    pub fn render_interleaved(&mut self, out: &mut [f32]) {
        assert!(self.is_initialized(), "render before initialize");
        for frame in out.chunks_exact_mut(2) {
            let sample = self.next_sample();
            frame[0] = sample;
            frame[1] = sample;
        }
    }

    fn next_sample(&mut self) -> f32 {
        let pulses = self.clock.next_pulses();
        if pulses > 0 {
            self.bus.advance(pulses, self.expansion_enabled);
        }
        let mix = self.bus.render_frame(self.expansion_enabled) as f32 / MIX_SCALE;
        mix.clamp(-1.0, 1.0) * self.master_gain
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn write_status(&mut self) {
        self.bus
            .write_register(Register::Status, self.settings.status_mask());
    }

    fn sounding_note(&self, channel: Channel) -> Option<u8> {
        if self.silenced[channel.index()] {
            return None;
        }
        self.allocator.table().note(channel)
    }

    /// Rewrite the control byte of a sounding channel after a duty change.
    fn refresh_control(&mut self, channel: Channel) {
        if self.sounding_note(channel).is_none() {
            return;
        }
        let velocity = self.allocator.table().voice(channel).velocity;
        if let Some(control) = encoder::control_byte(channel, velocity, &self.settings) {
            self.bus.write_register(Register::Control(channel), control);
        }
    }

    fn driver_force_off(&mut self, channel: Channel) {
        ChipDriver::new(
            &mut self.bus,
            &self.settings,
            &mut self.silenced,
            self.master_clock_hz,
        )
        .force_off(channel);
    }
}

use crate::{
    bus::RegisterBus,
    voice::{
        allocator::VoiceSink,
        channel::{Channel, ChannelSettings},
        encoder::{self, Recipe, RegisterWrite},
    },
};

/// Register side of the voice layer: applies encoder recipes to the bus.
///
/// `silenced[i]` is set once channel `i`'s note-off recipe is in the register image, so
/// repeated stops of the same channel write nothing.
pub(crate) struct ChipDriver<'a> {
    bus: &'a mut RegisterBus,
    settings: &'a ChannelSettings,
    silenced: &'a mut [bool; Channel::COUNT],
    master_clock_hz: f64,
}

impl<'a> ChipDriver<'a> {
    pub(crate) fn new(
        bus: &'a mut RegisterBus,
        settings: &'a ChannelSettings,
        silenced: &'a mut [bool; Channel::COUNT],
        master_clock_hz: f64,
    ) -> Self {
        Self {
            bus,
            settings,
            silenced,
            master_clock_hz,
        }
    }

    fn apply(&mut self, recipe: Recipe) {
        for RegisterWrite { register, value } in recipe.iter() {
            self.bus.write_register(register, value);
        }
    }

    /// Clear an expansion channel's enable bit whatever its voice state.
    pub(crate) fn force_off(&mut self, channel: Channel) {
        let RegisterWrite { register, value } = encoder::expansion_off(channel);
        self.bus.write_register(register, value);
        self.silenced[channel.index()] = true;
    }
}

impl VoiceSink for ChipDriver<'_> {
    fn note_on(&mut self, channel: Channel, note: u8, velocity: f32) {
        self.apply(encoder::note_on(
            channel,
            note,
            velocity,
            self.settings,
            self.master_clock_hz,
        ));
        self.silenced[channel.index()] = false;
    }

    fn note_off(&mut self, channel: Channel) {
        if self.silenced[channel.index()] {
            return;
        }
        self.apply(encoder::note_off(channel, self.settings));
        self.silenced[channel.index()] = true;
    }
}

//! Note events delivered from other threads.
//!
//! A host's UI or MIDI thread pushes [`SynthMessage`]s into a lock-free queue; the render thread
//! drains it once per block through [`MessageReceiver`] before rendering.

#[cfg(feature = "rtrb")]
use rtrb::Consumer;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SynthMessage {
    NoteOn {
        midi_channel: u8,
        note: u8,
        velocity: f32,
    },
    NoteOff {
        midi_channel: u8,
        note: u8,
    },
    AllNotesOff,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}

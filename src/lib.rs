//! Nessy: a note-driven NES APU + Konami VRC6 synth voice written in Rust.
//!
//! Turns note events into the register writes the chips would see, time-multiplexing the
//! handful of physical channels across many simultaneous notes, and renders the result
//! through register-accurate sound engines as documented on the
//! [NESdev Wiki](https://www.nesdev.org/wiki/APU).
//!
//! ## Modules
//!
//! - **apu** – [APU](https://www.nesdev.org/wiki/APU) pulse×2, triangle, noise, sample level,
//!   [frame counter](https://www.nesdev.org/wiki/APU_Frame_Counter),
//!   [mixer](https://www.nesdev.org/wiki/APU_Mixer); [VRC6 audio](https://www.nesdev.org/wiki/VRC6_audio)
//! - **bus** – register map: $4000–$4017 and $9000–$B002, fan-out to every engine in range
//! - **clock** – sample rate to master clock scheduling with fractional carry
//! - **voice** – channel table, period/volume encoding, note allocation policies
//! - **synth** – [`NesSynth`]: note events in, stereo blocks out
//! - **config** / **error** / **message** – JSON settings, error type, cross-thread events

pub mod apu;
pub mod bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod message;
pub mod synth;
pub mod voice;

pub use config::SynthConfig;
pub use error::{Error, Result};
pub use message::{MessageReceiver, SynthMessage};
pub use synth::NesSynth;

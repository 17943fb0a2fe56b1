//! The synth: note events in, stereo sample blocks out.
//!
//! [`NesSynth`] ties the pieces together on the render thread:
//!
//! - the voice allocator decides which channel plays a note,
//! - the chip driver turns the decision into register writes on the bus,
//! - the clock scheduler converts each output sample into master-clock pulses,
//! - the render stage mixes the engines, clips, and applies master gain.
//!
//! Nothing here allocates or locks after construction. Rendering before
//! [`NesSynth::initialize`] is a programmer error and panics.

mod driver;
pub mod synth;

pub use synth::NesSynth;

#[cfg(test)]
mod tests;

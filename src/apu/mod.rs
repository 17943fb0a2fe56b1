//! NES APU and VRC6 rendering engines.
//!
//! - **Pulse unit** ($4000–$4007): pulse×2 with duty, envelope, length counter.
//! - **TND unit** ($4008–$4013): triangle, noise, and the sample channel's direct-load level.
//! - **VRC6** ($9000–$B002): expansion pulse×2 (8 duty levels, 12-bit period) and sawtooth.
//! - **Frame sequencer**: 4-step or 5-step; clocks envelope/linear/length counters.
//!
//! The two base units both subscribe to $4015 (channel enable) and $4017 (frame counter), so the
//! register bus fans shared writes out to each of them. Sweep units and the DMC memory reader
//! are not implemented.

use std::ops::RangeInclusive;

pub mod apu;
mod channels;
pub mod filter;
pub mod frame;
pub mod vrc6;

pub use apu::{PulseUnit, TndUnit};
pub use vrc6::Vrc6;

/// Full-scale integer output of a rendering engine. The render stage divides by this.
pub const MIX_SCALE: f32 = 8192.0;

/// A sound generator driven by register writes and master-clock pulses.
pub trait RenderEngine: Send {
    /// Addresses this engine listens to. The bus delivers every write in range; the engine
    /// ignores addresses it does not decode.
    fn register_range(&self) -> RangeInclusive<u16>;
    /// Set the master clock and output sample rate (affects output filtering only).
    fn configure_clock(&mut self, master_clock_hz: f64, sample_rate_hz: f64);
    /// Power-on state: all channels silent, counters and sequencers cleared.
    fn reset_state(&mut self);
    /// Drop output filter history, keeping channel state.
    fn clear_output(&mut self);
    fn write(&mut self, addr: u16, data: u8);
    /// Run `cycles` master-clock pulses.
    fn advance(&mut self, cycles: u32);
    /// Current output in raw integer units (0..=[`MIX_SCALE`] before filtering), left/right.
    fn render_frame(&mut self) -> (i32, i32);
}

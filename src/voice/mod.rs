//! Voice layer: the per-channel note table, note to register translation, and the policies
//! that map incoming notes onto the chip's channels.

pub mod allocator;
pub mod channel;
pub mod encoder;

pub use allocator::{AllocationMode, ChannelOrder, VoiceAllocator, VoiceSink};
pub use channel::{Channel, ChannelSettings, DutyCycle, ExpansionDuty};

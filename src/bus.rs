//! Register bus shared by the base APU and the VRC6 expansion.
//!
//! Maps 16-bit register addresses to every subscribed rendering engine whose range covers
//! them, keeps an image of the last value written to each register, and optionally reports
//! writes to a [`RegisterTap`].

use crate::{
    apu::{PulseUnit, RenderEngine, TndUnit, Vrc6},
    voice::channel::Channel,
};

/// Named chip registers. Encoders emit these instead of raw addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Duty/envelope/volume byte ($4000, $4004, $400C, $9000, $A000), triangle linear control
    /// ($4008), sawtooth accumulator rate ($B000), DMC flags ($4010).
    Control(Channel),
    /// Timer low byte; for noise, the mode/period-index register ($400E).
    PeriodLow(Channel),
    /// Timer high bits plus length load (base) or enable bit (expansion).
    PeriodHigh(Channel),
    /// $4015 channel enable.
    Status,
    /// $4017 frame sequencer mode.
    FrameCounter,
    /// $9003 VRC6 halt / frequency scaling.
    ExpansionFrequency,
}

impl Register {
    pub fn address(self) -> u16 {
        match self {
            Register::Control(channel) => channel_base(channel),
            Register::PeriodLow(channel) if channel.is_expansion() => channel_base(channel) + 1,
            Register::PeriodLow(channel) => channel_base(channel) + 2,
            Register::PeriodHigh(channel) if channel.is_expansion() => channel_base(channel) + 2,
            Register::PeriodHigh(channel) => channel_base(channel) + 3,
            Register::Status => 0x4015,
            Register::FrameCounter => 0x4017,
            Register::ExpansionFrequency => 0x9003,
        }
    }
}

fn channel_base(channel: Channel) -> u16 {
    match channel {
        Channel::Pulse1 => 0x4000,
        Channel::Pulse2 => 0x4004,
        Channel::Triangle => 0x4008,
        Channel::Noise => 0x400C,
        Channel::Sample => 0x4010,
        Channel::ExpPulse1 => 0x9000,
        Channel::ExpPulse2 => 0xA000,
        Channel::ExpSawtooth => 0xB000,
    }
}

/// Channel whose registers include `addr`.
pub fn channel_at(addr: u16) -> Option<Channel> {
    let channel = match addr {
        0x4000..=0x4003 => Channel::Pulse1,
        0x4004..=0x4007 => Channel::Pulse2,
        0x4008..=0x400B => Channel::Triangle,
        0x400C..=0x400F => Channel::Noise,
        0x4010..=0x4013 => Channel::Sample,
        0x9000..=0x9002 => Channel::ExpPulse1,
        0xA000..=0xA002 => Channel::ExpPulse2,
        0xB000..=0xB002 => Channel::ExpSawtooth,
        _ => return None,
    };
    Some(channel)
}

/// Index into the register image: 24 base slots ($4000–$4017) then 4 per VRC6 bank.
fn image_slot(addr: u16) -> Option<usize> {
    match addr {
        0x4000..=0x4017 => Some((addr - 0x4000) as usize),
        0x9000..=0x9003 => Some(24 + (addr - 0x9000) as usize),
        0xA000..=0xA003 => Some(28 + (addr - 0xA000) as usize),
        0xB000..=0xB003 => Some(32 + (addr - 0xB000) as usize),
        _ => None,
    }
}

const IMAGE_SIZE: usize = 36;

/// Observer for every register write that reaches the bus.
pub trait RegisterTap: Send {
    fn on_write(&mut self, addr: u16, data: u8);
}

impl<F> RegisterTap for F
where
    F: FnMut(u16, u8) + Send,
{
    fn on_write(&mut self, addr: u16, data: u8) {
        self(addr, data)
    }
}

/// Whether an engine is always mixed or only while the expansion unit is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineGroup {
    Base,
    Expansion,
}

struct Subscriber {
    engine: Box<dyn RenderEngine>,
    group: EngineGroup,
}

/// Register bus with the engines subscribed to it.
pub struct RegisterBus {
    subscribers: Vec<Subscriber>,
    image: [u8; IMAGE_SIZE],
    write_count: u64,
    tap: Option<Box<dyn RegisterTap>>,
}

impl Default for RegisterBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus {
    /// Bus with the two base APU units and the VRC6 subscribed.
    pub fn new() -> Self {
        let mut bus = Self::empty();
        bus.subscribe(Box::new(PulseUnit::new()), EngineGroup::Base);
        bus.subscribe(Box::new(TndUnit::new()), EngineGroup::Base);
        bus.subscribe(Box::new(Vrc6::new()), EngineGroup::Expansion);
        bus
    }

    /// Bus without engines; writes only update the image.
    pub fn empty() -> Self {
        Self {
            subscribers: Vec::with_capacity(4),
            image: [0; IMAGE_SIZE],
            write_count: 0,
            tap: None,
        }
    }

    pub fn subscribe(&mut self, engine: Box<dyn RenderEngine>, group: EngineGroup) {
        self.subscribers.push(Subscriber { engine, group });
    }

    pub fn set_tap(&mut self, tap: Option<Box<dyn RegisterTap>>) {
        self.tap = tap;
    }

    /// Deliver one write to every engine whose range covers `addr`.
    pub fn write(&mut self, addr: u16, data: u8) {
        if let Some(slot) = image_slot(addr) {
            self.image[slot] = data;
        }
        for sub in &mut self.subscribers {
            if sub.engine.register_range().contains(&addr) {
                sub.engine.write(addr, data);
            }
        }
        self.write_count += 1;
        if let Some(tap) = self.tap.as_mut() {
            tap.on_write(addr, data);
        }
    }

    pub fn write_register(&mut self, register: Register, data: u8) {
        self.write(register.address(), data);
    }

    /// Last value written to `addr`, or `None` for addresses outside the image.
    pub fn peek(&self, addr: u16) -> Option<u8> {
        image_slot(addr).map(|slot| self.image[slot])
    }

    pub fn peek_register(&self, register: Register) -> Option<u8> {
        self.peek(register.address())
    }

    /// Total writes since construction; not cleared by [`RegisterBus::reset`].
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    pub fn configure_clock(&mut self, master_clock_hz: f64, sample_rate_hz: f64) {
        for sub in &mut self.subscribers {
            sub.engine.configure_clock(master_clock_hz, sample_rate_hz);
        }
    }

    /// Reset every engine and clear the register image.
    pub fn reset(&mut self) {
        self.image = [0; IMAGE_SIZE];
        for sub in &mut self.subscribers {
            sub.engine.reset_state();
        }
    }

    /// Clear the output filters of every engine in `group`.
    pub fn clear_output(&mut self, group: EngineGroup) {
        for sub in self.subscribers.iter_mut().filter(|sub| sub.group == group) {
            sub.engine.clear_output();
        }
    }

    /// Run `cycles` pulses on the base engines, and on the expansion engines when enabled.
    pub fn advance(&mut self, cycles: u32, expansion_enabled: bool) {
        for sub in &mut self.subscribers {
            if sub.group == EngineGroup::Base || expansion_enabled {
                sub.engine.advance(cycles);
            }
        }
    }

    /// Sum of the engines' left outputs (the chip is monophonic).
    pub fn render_frame(&mut self, expansion_enabled: bool) -> i32 {
        self.subscribers
            .iter_mut()
            .filter(|sub| sub.group == EngineGroup::Base || expansion_enabled)
            .map(|sub| sub.engine.render_frame().0)
            .sum()
    }
}

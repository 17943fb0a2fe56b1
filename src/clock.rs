//! Sample-rate to master-clock scheduling.
//!
//! The chip runs at a fixed master clock (NTSC 2A03: ~1.789773 MHz) while the host asks for
//! samples at its own rate. Each output sample the scheduler hands out a whole number of
//! master-clock pulses and carries the fractional part forward, so the cumulative error stays
//! below one pulse over arbitrarily long runs.

/// NTSC CPU clock in Hz.
pub const NTSC_MASTER_CLOCK_HZ: f64 = 1_789_772.7;

/// Fractional clock accumulator.
#[derive(Debug, Clone, Default)]
pub struct ClockScheduler {
    master_clock_hz: f64,
    sample_rate_hz: f64,
    clocks_per_sample: f64,
    remainder: f64,
    total_pulses: u64,
}

impl ClockScheduler {
    /// Unconfigured scheduler; [`ClockScheduler::configure`] must run before
    /// [`ClockScheduler::next_pulses`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the clocks-per-sample ratio once and restart accumulation from zero.
    pub fn configure(&mut self, master_clock_hz: f64, sample_rate_hz: f64) {
        self.master_clock_hz = master_clock_hz;
        self.sample_rate_hz = sample_rate_hz;
        self.clocks_per_sample = if sample_rate_hz > 0.0 {
            master_clock_hz / sample_rate_hz
        } else {
            0.0
        };
        self.reset();
    }

    /// Clear the remainder and pulse total, keeping the ratio.
    pub fn reset(&mut self) {
        self.remainder = 0.0;
        self.total_pulses = 0;
    }

    pub fn is_configured(&self) -> bool {
        self.clocks_per_sample > 0.0
    }

    /// Pulses to run before rendering the next sample.
    pub fn next_pulses(&mut self) -> u32 {
        self.remainder += self.clocks_per_sample;
        let pulses = self.remainder as u32;
        self.remainder -= pulses as f64;
        self.total_pulses += pulses as u64;
        pulses
    }

    pub fn clocks_per_sample(&self) -> f64 {
        self.clocks_per_sample
    }

    pub fn master_clock_hz(&self) -> f64 {
        self.master_clock_hz
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Pulses handed out since the last configure/reset.
    pub fn total_pulses(&self) -> u64 {
        self.total_pulses
    }
}

//! Synth configuration, loadable from JSON.
//!
//! Every field has a default, so a partial document such as
//! `{"allocation_mode": "PitchSplit", "split_point": 55}` is valid.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    clock::NTSC_MASTER_CLOCK_HZ,
    error::{Error, Result},
    voice::{
        allocator::{AllocationMode, ChannelOrder, DEFAULT_SPLIT_POINT},
        channel::{DutyCycle, ExpansionDuty},
    },
};

pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;
pub const DEFAULT_MASTER_GAIN: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub sample_rate: f64,
    pub master_clock_hz: f64,
    /// Applied after clipping, 0..=1.
    pub master_gain: f32,
    pub allocation_mode: AllocationMode,
    pub split_point: u8,
    pub channel_order: ChannelOrder,
    pub pulse_duty: [DutyCycle; 2],
    pub expansion_duty: [ExpansionDuty; 2],
    pub noise_short_mode: bool,
    pub expansion_enabled: bool,
    /// Pulse 1, Pulse 2, Triangle, Noise, Sample.
    pub base_channels_enabled: [bool; 5],
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            master_clock_hz: NTSC_MASTER_CLOCK_HZ,
            master_gain: DEFAULT_MASTER_GAIN,
            allocation_mode: AllocationMode::default(),
            split_point: DEFAULT_SPLIT_POINT,
            channel_order: ChannelOrder::default(),
            pulse_duty: [DutyCycle::Half; 2],
            expansion_duty: [ExpansionDuty::default(); 2],
            noise_short_mode: false,
            expansion_enabled: false,
            base_channels_enabled: [true, true, true, true, false],
        }
    }
}

impl SynthConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SynthConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Rejects clock settings that would leave the scheduler without a ratio. Everything else
    /// is clamped when applied.
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::Config(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if !(self.master_clock_hz.is_finite() && self.master_clock_hz > 0.0) {
            return Err(Error::Config(format!(
                "master_clock_hz must be positive, got {}",
                self.master_clock_hz
            )));
        }
        Ok(())
    }
}

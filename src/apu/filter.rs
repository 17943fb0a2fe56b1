//! First-order high-pass at the engine output, as on the console's audio path
//! ([APU Mixer](https://www.nesdev.org/wiki/APU_Mixer)). Removes the unipolar DC offset so the
//! summed mix sits around zero.

use std::f32::consts::PI;

const CUTOFF_HZ: f32 = 90.0;

#[derive(Debug, Clone)]
pub struct HighPass {
    alpha: f32,
    prev_in: f32,
    prev_out: f32,
}

impl Default for HighPass {
    fn default() -> Self {
        Self::new(44_100.0)
    }
}

impl HighPass {
    pub fn new(sample_rate_hz: f32) -> Self {
        let mut filter = Self {
            alpha: 1.0,
            prev_in: 0.0,
            prev_out: 0.0,
        };
        filter.set_sample_rate(sample_rate_hz);
        filter
    }

    pub fn set_sample_rate(&mut self, sample_rate_hz: f32) {
        if sample_rate_hz > 0.0 {
            let rc = 1.0 / (2.0 * PI * CUTOFF_HZ);
            let dt = 1.0 / sample_rate_hz;
            self.alpha = rc / (rc + dt);
        }
        self.reset();
    }

    pub fn reset(&mut self) {
        self.prev_in = 0.0;
        self.prev_out = 0.0;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.alpha * (self.prev_out + input - self.prev_in);
        self.prev_in = input;
        self.prev_out = out;
        out
    }
}

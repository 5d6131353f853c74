//! Mixer — Sums voice outputs and applies the automated master gain.

use super::param::AudioParam;

/// A summing mixer that accumulates one block of audio from many voices.
#[derive(Debug, Clone)]
pub struct Mixer {
    pub master_gain: AudioParam,
    buffer: Vec<f64>,
}

impl Mixer {
    pub fn new(master_gain: f32) -> Self {
        Mixer {
            master_gain: AudioParam::new(master_gain),
            buffer: Vec::new(),
        }
    }

    /// Prepare a buffer of `num_samples` filled with zeros.
    pub fn clear(&mut self, num_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(num_samples, 0.0);
    }

    /// Add a sample at the given index.
    pub fn add(&mut self, index: usize, sample: f64) {
        if index < self.buffer.len() {
            self.buffer[index] += sample;
        }
    }

    /// Write the mixed block into `out`, applying master gain at each
    /// sample's clock time and soft clipping the result.
    pub fn write_output(&self, out: &mut [f32], start_time: f64, sample_rate: f64) {
        for (i, (o, &s)) in out.iter_mut().zip(&self.buffer).enumerate() {
            let t = start_time + i as f64 / sample_rate;
            *o = soft_clip(s * self.master_gain.value_at(t) as f64) as f32;
        }
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}

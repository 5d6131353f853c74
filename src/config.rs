//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or JS object) is a
//! valid config.

use serde::{Deserialize, Serialize};

use crate::dsp::envelope::EnvelopeConfig;
use crate::dsp::oscillator::Waveform;
use crate::error::{PianoError, Result};
use crate::note::KeyboardRange;

/// Where rendered audio goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Host-pulled rendering (AudioWorklet, tests).
    #[default]
    Offline,
    /// The default system output device. Needs the `device` feature.
    Device,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Sample rate for offline rendering. Device outputs use the device rate.
    pub sample_rate: f64,
    pub waveform: Waveform,
    pub envelope: EnvelopeConfig,
    /// Initial master volume in [0, 1].
    pub master_volume: f32,
    pub range: KeyboardRange,
    pub output: OutputKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 48_000.0,
            waveform: Waveform::Triangle,
            envelope: EnvelopeConfig::default(),
            master_volume: 0.3,
            range: KeyboardRange::default(),
            output: OutputKind::Offline,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate >= 8_000.0) {
            return Err(PianoError::InvalidConfig(format!(
                "sampleRate must be at least 8000 Hz, got {}",
                self.sample_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.master_volume) {
            return Err(PianoError::InvalidConfig(format!(
                "masterVolume must be in [0, 1], got {}",
                self.master_volume
            )));
        }
        if self.range.lowest > self.range.highest {
            return Err(PianoError::InvalidConfig(format!(
                "range lowest {} is above highest {}",
                self.range.lowest, self.range.highest
            )));
        }
        self.envelope.validate()
    }
}

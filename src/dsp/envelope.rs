//! ADSR envelope expressed as gain automation.
//!
//! Rather than stepping a state machine per sample, the envelope schedules
//! ramps on a voice's gain `AudioParam`: linear attack to full level,
//! exponential decay to the sustain level, and on release an exponential
//! ramp from wherever the gain currently is down to a small floor.

use serde::{Deserialize, Serialize};

use super::param::AudioParam;
use crate::error::{PianoError, Result};

/// Envelope stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Envelope timing. Times are in seconds, levels in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnvelopeConfig {
    pub attack: f64,
    pub decay: f64,
    pub sustain_level: f32,
    pub release: f64,
    /// Level the release ramp aims for before the voice is stopped.
    pub release_floor: f32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        EnvelopeConfig {
            attack: 0.01,
            decay: 0.1,
            sustain_level: 0.7,
            release: 0.3,
            release_floor: 0.001,
        }
    }
}

impl EnvelopeConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, t) in [
            ("attack", self.attack),
            ("decay", self.decay),
            ("release", self.release),
        ] {
            if !t.is_finite() || t < 0.0 {
                return Err(PianoError::InvalidConfig(format!(
                    "envelope {name} must be a non-negative number of seconds, got {t}"
                )));
            }
        }
        if !(self.sustain_level > 0.0 && self.sustain_level <= 1.0) {
            return Err(PianoError::InvalidConfig(format!(
                "envelope sustainLevel must be in (0, 1], got {}",
                self.sustain_level
            )));
        }
        if !(self.release_floor > 0.0 && self.release_floor < 1.0) {
            return Err(PianoError::InvalidConfig(format!(
                "envelope releaseFloor must be in (0, 1), got {}",
                self.release_floor
            )));
        }
        Ok(())
    }

    /// Schedule attack and decay starting at `now`. The gain then holds at
    /// the sustain level until released.
    pub fn schedule_attack(&self, gain: &mut AudioParam, now: f64) {
        gain.cancel_scheduled_values(now);
        gain.set_value_at_time(0.0, now);
        gain.linear_ramp_to_value_at_time(1.0, now + self.attack);
        gain.exponential_ramp_to_value_at_time(self.sustain_level, now + self.attack + self.decay);
    }

    /// Schedule the release from the gain's current value at `now`.
    /// Returns the time at which the voice should stop.
    pub fn schedule_release(&self, gain: &mut AudioParam, now: f64) -> f64 {
        let current = gain.value_at(now);
        let end = now + self.release;
        gain.cancel_scheduled_values(now);
        gain.set_value_at_time(current, now);
        gain.exponential_ramp_to_value_at_time(self.release_floor, end);
        end
    }

    /// Stage of a voice `elapsed` seconds after its note-on.
    pub fn stage(&self, elapsed: f64, released: bool) -> Stage {
        if released {
            Stage::Release
        } else if elapsed < self.attack {
            Stage::Attack
        } else if elapsed < self.attack + self.decay {
            Stage::Decay
        } else {
            Stage::Sustain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_piano_timings() {
        let env = EnvelopeConfig::default();
        assert_eq!(env.attack, 0.01);
        assert_eq!(env.decay, 0.1);
        assert_eq!(env.sustain_level, 0.7);
        assert_eq!(env.release, 0.3);
        assert!(env.validate().is_ok());
    }

    #[test]
    fn attack_reaches_one_then_decays_to_sustain() {
        let env = EnvelopeConfig::default();
        let mut gain = AudioParam::new(1.0);
        env.schedule_attack(&mut gain, 2.0);

        assert_eq!(gain.value_at(2.0), 0.0);
        let mid_attack = gain.value_at(2.005);
        assert!((mid_attack - 0.5).abs() < 1e-3, "got {mid_attack}");
        assert!((gain.value_at(2.01) - 1.0).abs() < 1e-6);

        let mid_decay = gain.value_at(2.06);
        assert!(mid_decay < 1.0 && mid_decay > 0.7, "got {mid_decay}");
        assert!((gain.value_at(2.11) - 0.7).abs() < 1e-6);
        assert!((gain.value_at(60.0) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn release_starts_from_current_level() {
        let env = EnvelopeConfig::default();
        let mut gain = AudioParam::new(1.0);
        env.schedule_attack(&mut gain, 0.0);

        // Release halfway through the attack ramp.
        let end = env.schedule_release(&mut gain, 0.005);
        assert!((end - 0.305).abs() < 1e-12);

        let start = gain.value_at(0.005);
        assert!((start - 0.5).abs() < 1e-3, "got {start}");
        assert!(gain.value_at(0.1) < start);
        assert!((gain.value_at(end) - 0.001).abs() < 1e-6);
    }

    #[test]
    fn scaled_down_timings() {
        let env = EnvelopeConfig {
            attack: 0.001,
            decay: 0.002,
            sustain_level: 0.5,
            release: 0.003,
            release_floor: 0.01,
        };
        let mut gain = AudioParam::new(0.0);
        env.schedule_attack(&mut gain, 0.0);
        assert!((gain.value_at(0.003) - 0.5).abs() < 1e-6);

        let end = env.schedule_release(&mut gain, 0.01);
        assert!((gain.value_at(end) - 0.01).abs() < 1e-6);
    }

    #[test]
    fn stages_follow_elapsed_time() {
        let env = EnvelopeConfig::default();
        assert_eq!(env.stage(0.0, false), Stage::Attack);
        assert_eq!(env.stage(0.05, false), Stage::Decay);
        assert_eq!(env.stage(1.0, false), Stage::Sustain);
        assert_eq!(env.stage(0.0, true), Stage::Release);
    }

    #[test]
    fn rejects_bad_values() {
        let mut env = EnvelopeConfig::default();
        env.sustain_level = 0.0;
        assert!(env.validate().is_err());

        let mut env = EnvelopeConfig::default();
        env.release = -1.0;
        assert!(env.validate().is_err());

        let mut env = EnvelopeConfig::default();
        env.release_floor = 0.0;
        assert!(env.validate().is_err());
    }
}

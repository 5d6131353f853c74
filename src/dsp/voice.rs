//! Voice — A single note instance: oscillator into an automated gain.

use super::envelope::{EnvelopeConfig, Stage};
use super::oscillator::{Oscillator, Waveform};
use super::param::AudioParam;

/// Graph-side handle for a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub(crate) u64);

#[derive(Debug, Clone)]
pub struct Voice {
    pub oscillator: Oscillator,
    pub gain: AudioParam,
    /// Clock time of the note-on.
    pub start_time: f64,
    /// Clock time at which the voice is torn down, once released.
    pub stop_time: Option<f64>,
}

impl Voice {
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: f64, start_time: f64) -> Self {
        Voice {
            oscillator: Oscillator::new(waveform, frequency, sample_rate),
            gain: AudioParam::new(0.0),
            start_time,
            stop_time: None,
        }
    }

    /// Generate the sample at clock time `time`.
    pub fn next_sample(&mut self, time: f64) -> f64 {
        if time < self.start_time {
            return 0.0;
        }
        self.oscillator.next_sample() * self.gain.value_at(time) as f64
    }

    /// Has the clock passed this voice's stop time?
    pub fn is_finished(&self, time: f64) -> bool {
        self.stop_time.is_some_and(|stop| time >= stop)
    }

    pub fn stage(&self, envelope: &EnvelopeConfig, time: f64) -> Stage {
        envelope.stage(time - self.start_time, self.stop_time.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_produces_sound() {
        let env = EnvelopeConfig::default();
        let mut v = Voice::new(Waveform::Triangle, 440.0, 44100.0, 0.0);
        env.schedule_attack(&mut v.gain, 0.0);

        let mut has_nonzero = false;
        for i in 0..4410 {
            let s = v.next_sample(i as f64 / 44100.0);
            if s.abs() > 0.001 {
                has_nonzero = true;
            }
        }
        assert!(has_nonzero, "Voice should produce non-zero output");
    }

    #[test]
    fn voice_finishes_at_stop_time() {
        let env = EnvelopeConfig::default();
        let mut v = Voice::new(Waveform::Sine, 440.0, 44100.0, 0.0);
        env.schedule_attack(&mut v.gain, 0.0);
        assert!(!v.is_finished(100.0));

        v.stop_time = Some(env.schedule_release(&mut v.gain, 1.0));
        assert!(!v.is_finished(1.2));
        assert!(v.is_finished(1.31));
        assert_eq!(v.stage(&env, 1.1), Stage::Release);
    }

    #[test]
    fn voice_output_range() {
        let env = EnvelopeConfig::default();
        let mut v = Voice::new(Waveform::Triangle, 880.0, 44100.0, 0.0);
        env.schedule_attack(&mut v.gain, 0.0);

        for i in 0..44100 {
            let s = v.next_sample(i as f64 / 44100.0);
            assert!(s.abs() <= 1.0, "Voice output should be within [-1, 1], got {s}");
        }
    }
}

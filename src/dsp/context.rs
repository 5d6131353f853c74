//! Audio context — the clock, the voice graph and the output it feeds.
//!
//! The graph is shared between the control side (the engine, which starts,
//! releases and stops voices) and whoever renders it: the host pulling
//! blocks through `AudioContext::render`, or a device callback thread.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::envelope::{EnvelopeConfig, Stage};
use super::mixer::Mixer;
use super::oscillator::Waveform;
use super::output::AudioOutput;
use super::voice::{Voice, VoiceId};
use crate::error::{PianoError, Result};

/// Lifecycle of the output. The clock only runs while `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

pub type SharedGraph = Arc<Mutex<Graph>>;

/// Voices, master gain and the sample clock.
#[derive(Debug)]
pub struct Graph {
    sample_rate: f64,
    frame: u64,
    state: ContextState,
    next_id: u64,
    voices: BTreeMap<VoiceId, Voice>,
    mixer: Mixer,
    scratch: Vec<f32>,
}

impl Graph {
    pub fn new(sample_rate: f64, master_gain: f32) -> Self {
        Graph {
            sample_rate,
            frame: 0,
            state: ContextState::Suspended,
            next_id: 0,
            voices: BTreeMap::new(),
            mixer: Mixer::new(master_gain),
            scratch: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Seconds of audio rendered while running.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Render one mono block. Outside `Running` the block is silent and the
    /// clock stands still.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.state != ContextState::Running {
            out.fill(0.0);
            return;
        }

        let start = self.current_time();
        let frames = out.len();
        self.mixer.clear(frames);

        for voice in self.voices.values_mut() {
            for i in 0..frames {
                let t = (self.frame + i as u64) as f64 / self.sample_rate;
                if voice.is_finished(t) {
                    break;
                }
                self.mixer.add(i, voice.next_sample(t));
            }
        }

        self.mixer.write_output(out, start, self.sample_rate);
        self.frame += frames as u64;

        let now = self.current_time();
        let before = self.voices.len();
        self.voices.retain(|_, v| !v.is_finished(now));
        if self.voices.len() != before {
            debug!(removed = before - self.voices.len(), "voices finished");
        }
        for voice in self.voices.values_mut() {
            voice.gain.prune(now);
        }
        self.mixer.master_gain.prune(now);
    }

    /// Render into an interleaved buffer, copying the mono signal to every
    /// channel.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(frames, 0.0);
        self.render(&mut scratch);
        for (frame, &s) in out.chunks_exact_mut(channels).zip(&scratch) {
            frame.fill(s);
        }
        out[frames * channels..].fill(0.0);
        self.scratch = scratch;
    }
}

/// Control handle over a shared graph and the output rendering it.
pub struct AudioContext {
    graph: SharedGraph,
    output: Box<dyn AudioOutput>,
}

impl AudioContext {
    /// Build the graph at the output's sample rate and hand it to the output.
    /// The context starts suspended.
    pub fn open(mut output: Box<dyn AudioOutput>, master_gain: f32) -> Result<Self> {
        let sample_rate = output.sample_rate();
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PianoError::AudioUnavailable(format!(
                "output reports sample rate {sample_rate}"
            )));
        }
        let graph = Arc::new(Mutex::new(Graph::new(sample_rate, master_gain)));
        output.start(Arc::clone(&graph))?;
        info!(sample_rate, "audio context opened");
        Ok(AudioContext { graph, output })
    }

    // The graph holds plain numeric state, so a panic mid-render leaves
    // nothing worth refusing to read.
    fn lock(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ContextState {
        self.lock().state
    }

    pub fn sample_rate(&self) -> f64 {
        self.lock().sample_rate
    }

    pub fn current_time(&self) -> f64 {
        self.lock().current_time()
    }

    /// Start the clock. Already running is fine; closed is an error.
    pub fn resume(&mut self) -> Result<()> {
        match self.state() {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(PianoError::ContextClosed),
            ContextState::Suspended => {
                self.output.resume()?;
                self.lock().state = ContextState::Running;
                info!("audio context running");
                Ok(())
            }
        }
    }

    pub fn suspend(&mut self) -> Result<()> {
        match self.state() {
            ContextState::Suspended => Ok(()),
            ContextState::Closed => Err(PianoError::ContextClosed),
            ContextState::Running => {
                self.output.suspend()?;
                self.lock().state = ContextState::Suspended;
                Ok(())
            }
        }
    }

    /// Drop every voice and release the output. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state() == ContextState::Closed {
            return Ok(());
        }
        {
            let mut graph = self.lock();
            graph.state = ContextState::Closed;
            graph.voices.clear();
        }
        self.output.close()?;
        info!("audio context closed");
        Ok(())
    }

    /// Create a voice at the current time and schedule its attack and decay.
    pub fn start_voice(
        &self,
        waveform: Waveform,
        frequency: f64,
        envelope: &EnvelopeConfig,
    ) -> Result<VoiceId> {
        let mut graph = self.lock();
        if graph.state == ContextState::Closed {
            return Err(PianoError::ContextClosed);
        }
        let now = graph.current_time();
        let id = VoiceId(graph.next_id);
        graph.next_id += 1;

        let mut voice = Voice::new(waveform, frequency, graph.sample_rate, now);
        envelope.schedule_attack(&mut voice.gain, now);
        graph.voices.insert(id, voice);
        Ok(id)
    }

    /// Replace whatever is scheduled on the voice with a release ramp from
    /// its current gain, and schedule its stop at the end of the ramp.
    /// Returns the stop time, or `None` if the voice is already gone.
    pub fn release_voice(&self, id: VoiceId, envelope: &EnvelopeConfig) -> Option<f64> {
        let mut graph = self.lock();
        let now = graph.current_time();
        let voice = graph.voices.get_mut(&id)?;
        let stop = envelope.schedule_release(&mut voice.gain, now);
        voice.stop_time = Some(stop);
        Some(stop)
    }

    /// Tear a voice down immediately, without a release tail.
    pub fn stop_voice(&self, id: VoiceId) -> bool {
        self.lock().voices.remove(&id).is_some()
    }

    /// Set the master gain at the current time, cancelling anything later.
    pub fn set_master_gain(&self, value: f32) {
        let mut graph = self.lock();
        let now = graph.current_time();
        let gain = &mut graph.mixer.master_gain;
        gain.cancel_scheduled_values(now);
        gain.set_value_at_time(value, now);
    }

    pub fn master_gain(&self) -> f32 {
        let graph = self.lock();
        graph.mixer.master_gain.value_at(graph.current_time())
    }

    /// Voices still in the graph, including release tails.
    pub fn voice_count(&self) -> usize {
        self.lock().voice_count()
    }

    pub fn has_voice(&self, id: VoiceId) -> bool {
        self.lock().voices.contains_key(&id)
    }

    pub fn voice_gain(&self, id: VoiceId) -> Option<f32> {
        let graph = self.lock();
        let now = graph.current_time();
        graph.voices.get(&id).map(|v| v.gain.value_at(now))
    }

    pub fn voice_frequency(&self, id: VoiceId) -> Option<f64> {
        self.lock().voices.get(&id).map(|v| v.oscillator.frequency)
    }

    pub fn voice_stage(&self, id: VoiceId, envelope: &EnvelopeConfig) -> Option<Stage> {
        let graph = self.lock();
        let now = graph.current_time();
        graph.voices.get(&id).map(|v| v.stage(envelope, now))
    }

    /// Pull one mono block from the graph.
    pub fn render(&self, out: &mut [f32]) {
        self.lock().render(out);
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::output::OfflineOutput;

    const SAMPLE_RATE: f64 = 1000.0;

    fn context() -> AudioContext {
        AudioContext::open(Box::new(OfflineOutput::new(SAMPLE_RATE)), 1.0).unwrap()
    }

    fn advance(ctx: &AudioContext, seconds: f64) -> Vec<f32> {
        let mut block = vec![0.0_f32; (seconds * SAMPLE_RATE).round() as usize];
        ctx.render(&mut block);
        block
    }

    #[test]
    fn starts_suspended_and_clock_waits() {
        let mut ctx = context();
        assert_eq!(ctx.state(), ContextState::Suspended);
        let out = advance(&ctx, 0.5);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(ctx.current_time(), 0.0);

        ctx.resume().unwrap();
        ctx.resume().unwrap();
        assert_eq!(ctx.state(), ContextState::Running);
        advance(&ctx, 0.5);
        assert!((ctx.current_time() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn suspend_freezes_clock() {
        let mut ctx = context();
        ctx.resume().unwrap();
        advance(&ctx, 0.2);
        ctx.suspend().unwrap();
        ctx.suspend().unwrap();
        advance(&ctx, 0.2);
        assert!((ctx.current_time() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_sample_rate() {
        let result = AudioContext::open(Box::new(OfflineOutput::new(0.0)), 1.0);
        assert!(matches!(result, Err(PianoError::AudioUnavailable(_))));
    }

    #[test]
    fn voice_sounds_then_finishes_after_release() {
        let mut ctx = context();
        ctx.resume().unwrap();
        let env = EnvelopeConfig::default();
        let id = ctx.start_voice(Waveform::Triangle, 110.0, &env).unwrap();

        let out = advance(&ctx, 0.2);
        assert!(out.iter().any(|s| s.abs() > 0.1));
        assert_eq!(ctx.voice_stage(id, &env), Some(Stage::Sustain));

        let stop = ctx.release_voice(id, &env).unwrap();
        assert!((stop - 0.5).abs() < 1e-9);
        assert_eq!(ctx.voice_stage(id, &env), Some(Stage::Release));

        advance(&ctx, 0.1);
        assert!(ctx.has_voice(id));
        assert!(ctx.voice_gain(id).unwrap() < 0.7);

        advance(&ctx, 0.25);
        assert!(!ctx.has_voice(id));
        assert_eq!(ctx.voice_count(), 0);
        assert!(advance(&ctx, 0.1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn stop_voice_is_immediate() {
        let mut ctx = context();
        ctx.resume().unwrap();
        let env = EnvelopeConfig::default();
        let id = ctx.start_voice(Waveform::Sine, 220.0, &env).unwrap();
        assert!(ctx.stop_voice(id));
        assert!(!ctx.stop_voice(id));
        assert_eq!(ctx.voice_count(), 0);
        assert_eq!(ctx.release_voice(id, &env), None);
    }

    #[test]
    fn master_gain_applies_now() {
        let mut ctx = context();
        ctx.resume().unwrap();
        advance(&ctx, 0.1);
        ctx.set_master_gain(0.25);
        assert_eq!(ctx.master_gain(), 0.25);

        ctx.set_master_gain(0.0);
        let env = EnvelopeConfig::default();
        ctx.start_voice(Waveform::Triangle, 110.0, &env).unwrap();
        assert!(advance(&ctx, 0.2).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn close_drops_voices_and_refuses_new_ones() {
        let mut ctx = context();
        ctx.resume().unwrap();
        let env = EnvelopeConfig::default();
        ctx.start_voice(Waveform::Triangle, 110.0, &env).unwrap();
        ctx.close().unwrap();
        ctx.close().unwrap();

        assert_eq!(ctx.state(), ContextState::Closed);
        assert_eq!(ctx.voice_count(), 0);
        assert!(matches!(
            ctx.start_voice(Waveform::Triangle, 110.0, &env),
            Err(PianoError::ContextClosed)
        ));
        assert!(matches!(ctx.resume(), Err(PianoError::ContextClosed)));
    }

    #[test]
    fn interleaved_copies_to_all_channels() {
        let mut graph = Graph::new(SAMPLE_RATE, 1.0);
        graph.state = ContextState::Running;
        let env = EnvelopeConfig::default();
        let mut voice = Voice::new(Waveform::Triangle, 110.0, SAMPLE_RATE, 0.0);
        env.schedule_attack(&mut voice.gain, 0.0);
        graph.voices.insert(VoiceId(0), voice);

        let mut out = vec![0.0_f32; 200];
        graph.render_interleaved(&mut out, 2);
        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!((graph.current_time() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn interleaved_partial_frame_is_zeroed() {
        let mut graph = Graph::new(SAMPLE_RATE, 1.0);
        graph.state = ContextState::Running;
        let mut out = vec![9.0_f32; 7];
        graph.render_interleaved(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!((graph.current_time() - 0.003).abs() < 1e-12);
    }
}

//! Audio outputs — what actually consumes the rendered graph.

use super::context::SharedGraph;
use crate::error::Result;

/// A sink for the shared graph.
///
/// `start` is called once when the context opens; the output may keep the
/// graph and render it from its own thread. `resume`, `suspend` and `close`
/// follow the context's lifecycle.
pub trait AudioOutput {
    fn sample_rate(&self) -> f64;

    fn start(&mut self, graph: SharedGraph) -> Result<()>;

    fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Host-pulled output: nothing renders unless the host calls
/// `AudioContext::render`. Used for AudioWorklet playback and as the fake
/// clock in tests.
#[derive(Debug, Clone, Copy)]
pub struct OfflineOutput {
    sample_rate: f64,
}

impl OfflineOutput {
    pub fn new(sample_rate: f64) -> Self {
        OfflineOutput { sample_rate }
    }
}

impl AudioOutput for OfflineOutput {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn start(&mut self, _graph: SharedGraph) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "device")]
pub use device::DeviceOutput;

#[cfg(feature = "device")]
mod device {
    use std::sync::PoisonError;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use tracing::error;

    use super::AudioOutput;
    use crate::dsp::context::SharedGraph;
    use crate::error::{PianoError, Result};

    /// Plays the graph through the default system output device.
    pub struct DeviceOutput {
        device: cpal::Device,
        config: cpal::SupportedStreamConfig,
        stream: Option<cpal::Stream>,
    }

    impl DeviceOutput {
        pub fn open_default() -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| PianoError::AudioUnavailable("no default output device".into()))?;
            let config = device
                .default_output_config()
                .map_err(|e| PianoError::AudioUnavailable(e.to_string()))?;
            if config.sample_format() != cpal::SampleFormat::F32 {
                return Err(PianoError::AudioUnavailable(format!(
                    "unsupported sample format {:?}",
                    config.sample_format()
                )));
            }
            Ok(DeviceOutput {
                device,
                config,
                stream: None,
            })
        }
    }

    impl AudioOutput for DeviceOutput {
        fn sample_rate(&self) -> f64 {
            self.config.sample_rate().0 as f64
        }

        fn start(&mut self, graph: SharedGraph) -> Result<()> {
            let channels = self.config.channels() as usize;
            let stream = self
                .device
                .build_output_stream(
                    &self.config.config(),
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut graph = graph.lock().unwrap_or_else(PoisonError::into_inner);
                        graph.render_interleaved(data, channels);
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
                .map_err(|e| PianoError::Device(e.to_string()))?;
            // Some hosts start streams on creation; the context starts suspended.
            stream
                .pause()
                .map_err(|e| PianoError::Device(e.to_string()))?;
            self.stream = Some(stream);
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            match &self.stream {
                Some(stream) => stream.play().map_err(|e| PianoError::Device(e.to_string())),
                None => Err(PianoError::ContextClosed),
            }
        }

        fn suspend(&mut self) -> Result<()> {
            match &self.stream {
                Some(stream) => stream.pause().map_err(|e| PianoError::Device(e.to_string())),
                None => Err(PianoError::ContextClosed),
            }
        }

        fn close(&mut self) -> Result<()> {
            self.stream.take();
            Ok(())
        }
    }
}

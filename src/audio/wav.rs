//! WAV file playback as an audio source.
//!
//! The file is decoded up front (hound), downmixed to mono and then fed to
//! the sink from a feeder thread in small chunks. With real-time pacing on,
//! the feeder sleeps one chunk duration between chunks so frames arrive at
//! the cadence a microphone would deliver them.

use super::{downmix_into, AudioSource, SampleSink};
use crate::error::CaptureError;
use hound::{SampleFormat, WavReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Samples per sink call. Roughly one hardware buffer at 16 kHz.
const FEED_CHUNK: usize = 256;

/// Decode a WAV file into mono `f32` samples.
pub fn read_mono(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32), CaptureError> {
    let reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mut mono = Vec::with_capacity(interleaved.len() / channels);
    downmix_into(&interleaved, channels, &mut mono);
    Ok((mono, spec.sample_rate))
}

/// Plays decoded samples into the sink from a background thread.
pub struct WavSource {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    realtime: bool,
    running: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
}

impl WavSource {
    /// Open and decode `path`. Fails if the file is missing or unreadable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let (samples, sample_rate) = read_mono(path)?;
        Ok(Self::from_samples(samples, sample_rate))
    }

    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            realtime: false,
            running: Arc::new(AtomicBool::new(false)),
            feeder: None,
        }
    }

    /// Pace delivery at the file's sample rate instead of as fast as possible.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn len_samples(&self) -> usize {
        self.samples.len()
    }

    /// True once the feeder has delivered every sample (or was stopped).
    pub fn is_finished(&self) -> bool {
        self.feeder.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl AudioSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, mut sink: SampleSink) -> Result<(), CaptureError> {
        if self.feeder.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        let samples = self.samples.clone();
        let running = self.running.clone();
        let pace = self
            .realtime
            .then(|| Duration::from_secs_f64(FEED_CHUNK as f64 / self.sample_rate.max(1) as f64));

        running.store(true, Ordering::Release);
        let handle = thread::Builder::new()
            .name("vxavatar-wav".into())
            .spawn(move || {
                for chunk in samples.chunks(FEED_CHUNK) {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    sink(chunk);
                    if let Some(d) = pace {
                        thread::sleep(d);
                    }
                }
            })
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        log::debug!(
            "WAV source started: {} samples @ {} Hz{}",
            self.samples.len(),
            self.sample_rate,
            if self.realtime { " (realtime)" } else { "" }
        );
        self.feeder = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.feeder.take() {
            if handle.join().is_err() {
                log::error!("WAV feeder thread panicked");
            }
        }
    }
}

impl Drop for WavSource {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Audio input: fixed-size frames from arbitrary-size capture chunks.
//!
//! A source pushes mono `f32` chunks of whatever size its hardware delivers.
//! [`FrameAssembler`] cuts them into fixed [`AudioFrame`]s and
//! [`AudioFrameProducer`] hands each frame to a handler, either on a dedicated
//! worker thread or on the caller's thread. Both paths share the assembler, so
//! the frames they see are bit-identical.

#[cfg(feature = "capture")]
pub mod capture;
pub mod producer;
pub mod push;
pub mod wav;

#[cfg(feature = "capture")]
pub use capture::CpalSource;
pub use producer::{AudioFrameProducer, ExecutionStrategy, FrameHandler};
pub use push::{PushHandle, PushSource};
pub use wav::WavSource;

use crate::error::CaptureError;

pub const DEFAULT_FRAME_SIZE: usize = 1024;

/// Callback a source feeds with mono sample chunks.
pub type SampleSink = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// A live (or replayed) audio input.
///
/// Sources are owned and opened by the embedding application; this crate only
/// consumes the samples. `start` must fail before delivering anything if the
/// device cannot be opened.
pub trait AudioSource: Send {
    /// Declared sample rate of the delivered samples.
    fn sample_rate(&self) -> u32;

    /// Begin delivering samples to `sink`.
    fn start(&mut self, sink: SampleSink) -> Result<(), CaptureError>;

    /// Stop delivery. Must be idempotent and must not return until the sink
    /// will no longer be called.
    fn stop(&mut self);
}

/// One fixed-size block of mono samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
    sequence: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32, sequence: u64) -> Self {
        Self {
            samples,
            sample_rate,
            sequence,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time budget for processing this frame before the next one arrives.
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }

    pub(crate) fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

/// Accumulates arbitrary-size chunks into fixed-size frames.
///
/// Allocation-free after construction; safe to run inside a capture callback.
pub struct FrameAssembler {
    buf: Vec<f32>,
    fill: usize,
    frames_emitted: u64,
}

impl FrameAssembler {
    /// A `frame_size` of 0 is treated as 1.
    pub fn new(frame_size: usize) -> Self {
        Self {
            buf: vec![0.0; frame_size.max(1)],
            fill: 0,
            frames_emitted: 0,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.buf.len()
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Append `chunk`, calling `on_frame(sequence, samples)` for every frame it
    /// completes. Leftover samples wait for the next chunk.
    pub fn push<F: FnMut(u64, &[f32])>(&mut self, mut chunk: &[f32], mut on_frame: F) {
        while !chunk.is_empty() {
            let want = self.buf.len() - self.fill;
            let take = want.min(chunk.len());
            self.buf[self.fill..self.fill + take].copy_from_slice(&chunk[..take]);
            self.fill += take;
            chunk = &chunk[take..];

            if self.fill == self.buf.len() {
                on_frame(self.frames_emitted, &self.buf);
                self.frames_emitted += 1;
                self.fill = 0;
            }
        }
    }

    pub fn reset(&mut self) {
        self.fill = 0;
        self.frames_emitted = 0;
    }
}

/// Average interleaved channels down to mono, appending to `out`.
pub fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    let channels = channels.max(1);
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    for frame in interleaved.chunks_exact(channels) {
        out.push(frame.iter().sum::<f32>() * scale);
    }
}

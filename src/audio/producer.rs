//! Audio Frame Producer
//!
//! Moves assembled frames from the capture side to the frame handler.
//!
//! ```text
//! ┌──────────────────┐  push_slice   ┌──────────────────────┐
//! │  Capture thread  │──────────────►│  One-frame SPSC ring │
//! │ (FrameAssembler) │               │  (lossy, no queue)   │
//! └──────────────────┘               └──────────┬───────────┘
//!                                               │ pop_slice
//!                         ┌─────────────────────┴─────────────────────┐
//!                         ▼                                           ▼
//!              ┌─────────────────────┐                     ┌─────────────────────┐
//!              │  Dedicated worker   │                     │  Inline: caller's   │
//!              │  thread (preferred) │                     │  thread via poll()  │
//!              └─────────────────────┘                     └─────────────────────┘
//! ```
//!
//! The ring holds exactly one frame. If the handler has not taken the previous
//! frame when the next one completes, the new frame is dropped and counted.
//! Nothing is buffered behind it.

use super::{AudioFrame, AudioSource, FrameAssembler};
use crate::error::CaptureError;
use crate::meters::LipSyncMeters;
use crate::vx_log;
use ringbuf::{Consumer, Producer, RingBuffer};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};

/// Where the frame handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// Handler runs on a dedicated worker thread, off the control thread.
    #[default]
    Dedicated,
    /// Handler runs on the caller's thread from [`AudioFrameProducer::poll`].
    Inline,
}

/// Consumer of completed frames.
pub type FrameHandler = Box<dyn FnMut(&AudioFrame) + Send + 'static>;

/// Capture-side half of the hand-off.
struct FrameSender {
    assembler: FrameAssembler,
    samples: Producer<f32>,
    sequences: Producer<u64>,
    meters: Arc<LipSyncMeters>,
    wake: Option<Thread>,
}

impl FrameSender {
    fn push(&mut self, chunk: &[f32]) {
        let samples = &mut self.samples;
        let sequences = &mut self.sequences;
        let meters = &self.meters;
        let wake = &self.wake;

        self.assembler.push(chunk, |seq, frame| {
            if samples.remaining() < frame.len() || sequences.is_full() {
                meters.record_dropped_frame();
                vx_log!("frame {} dropped: handler still busy", seq);
                return;
            }
            samples.push_slice(frame);
            // Sequence goes last: its presence means the samples are complete.
            let _ = sequences.push(seq);
            if let Some(t) = wake {
                t.unpark();
            }
        });
    }
}

/// Handler-side half of the hand-off.
struct FrameReceiver {
    samples: Consumer<f32>,
    sequences: Consumer<u64>,
    frame: AudioFrame,
    handler: FrameHandler,
    meters: Arc<LipSyncMeters>,
}

impl FrameReceiver {
    /// Run the handler on the pending frame, if any.
    fn poll(&mut self) -> bool {
        let seq = match self.sequences.pop() {
            Some(seq) => seq,
            None => return false,
        };
        let n = self.samples.pop_slice(self.frame.samples_mut());
        if n < self.frame.len() {
            // Cannot happen with a single producer, but never hand out a torn frame.
            return false;
        }
        self.frame.set_sequence(seq);
        (self.handler)(&self.frame);
        self.meters.record_processed_frame();
        true
    }
}

/// Running frame delivery for one audio source.
pub struct AudioFrameProducer {
    strategy: ExecutionStrategy,
    sample_rate: u32,
    frame_size: usize,
    source: Option<Box<dyn AudioSource>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    inline: Option<FrameReceiver>,
}

impl AudioFrameProducer {
    /// Open `source` and start delivering `frame_size` frames to `handler`.
    ///
    /// Fails before any frame is produced if the source cannot be opened or
    /// `frame_size` is 0.
    pub fn start(
        mut source: Box<dyn AudioSource>,
        strategy: ExecutionStrategy,
        frame_size: usize,
        meters: Arc<LipSyncMeters>,
        handler: FrameHandler,
    ) -> Result<Self, CaptureError> {
        if frame_size == 0 {
            return Err(CaptureError::InvalidFrameSize(frame_size));
        }
        let sample_rate = source.sample_rate();
        let (samples_prod, samples_cons) = RingBuffer::<f32>::new(frame_size).split();
        let (seq_prod, seq_cons) = RingBuffer::<u64>::new(1).split();

        let receiver = FrameReceiver {
            samples: samples_cons,
            sequences: seq_cons,
            frame: AudioFrame::new(vec![0.0; frame_size], sample_rate, 0),
            handler,
            meters: meters.clone(),
        };

        let running = Arc::new(AtomicBool::new(true));
        let (worker, inline) = match strategy {
            ExecutionStrategy::Dedicated => {
                let handle = spawn_worker(receiver, running.clone())?;
                (Some(handle), None)
            }
            ExecutionStrategy::Inline => (None, Some(receiver)),
        };

        let mut sender = FrameSender {
            assembler: FrameAssembler::new(frame_size),
            samples: samples_prod,
            sequences: seq_prod,
            meters,
            wake: worker.as_ref().map(|h| h.thread().clone()),
        };

        let mut producer = Self {
            strategy,
            sample_rate,
            frame_size,
            source: None,
            running,
            worker,
            inline,
        };

        if let Err(e) = source.start(Box::new(move |chunk: &[f32]| sender.push(chunk))) {
            log::warn!("Audio source failed to start: {}", e);
            producer.stop();
            return Err(e);
        }
        producer.source = Some(source);

        log::info!(
            "Lip sync audio started ({:?}, {} Hz, {} samples/frame, {:.1} ms budget)",
            strategy,
            sample_rate,
            frame_size,
            frame_size as f32 / sample_rate.max(1) as f32 * 1000.0
        );

        Ok(producer)
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Inline strategy: process the pending frame on this thread.
    ///
    /// Returns the number of frames handled (0 or 1). Always 0 for the
    /// dedicated strategy.
    pub fn poll(&mut self) -> usize {
        match self.inline.as_mut() {
            Some(receiver) if self.running.load(Ordering::Acquire) => receiver.poll() as usize,
            _ => 0,
        }
    }

    /// Disconnect the source and stop the worker. Synchronous and idempotent.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            if worker.join().is_err() {
                log::error!("Lip sync worker thread panicked");
            }
        }
        self.inline = None;
        if was_running {
            log::info!("Lip sync audio stopped");
        }
    }
}

impl Drop for AudioFrameProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_worker(
    mut receiver: FrameReceiver,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, CaptureError> {
    thread::Builder::new()
        .name("vxavatar-lipsync".into())
        .spawn(move || {
            while running.load(Ordering::Acquire) {
                // Woken by the sender for each frame and by `stop`.
                if !receiver.poll() {
                    thread::park();
                }
            }
        })
        .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))
}

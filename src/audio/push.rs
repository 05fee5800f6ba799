//! Push-fed audio source.
//!
//! The embedding application owns device access and permissions. It hands
//! captured samples to a [`PushHandle`], which forwards them into the running
//! frame producer. Pushing while the source is stopped is a silent no-op.

use super::{AudioSource, SampleSink};
use crate::error::CaptureError;
use std::sync::{Arc, Mutex};

type SharedSink = Arc<Mutex<Option<SampleSink>>>;

/// Source fed externally through [`PushHandle`]s.
pub struct PushSource {
    sample_rate: u32,
    sink: SharedSink,
}

/// Cloneable feeder for a [`PushSource`].
#[derive(Clone)]
pub struct PushHandle {
    sink: SharedSink,
}

impl PushSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn handle(&self) -> PushHandle {
        PushHandle {
            sink: self.sink.clone(),
        }
    }
}

impl AudioSource for PushSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, sink: SampleSink) -> Result<(), CaptureError> {
        let mut slot = self
            .sink
            .lock()
            .map_err(|_| CaptureError::Stream("push source lock poisoned".into()))?;
        if slot.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        *slot = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        // Taking the lock waits out any push in flight.
        if let Ok(mut slot) = self.sink.lock() {
            *slot = None;
        }
    }
}

impl PushHandle {
    /// Deliver mono samples. Returns false if the source is not running.
    pub fn push(&self, samples: &[f32]) -> bool {
        match self.sink.lock() {
            Ok(mut slot) => match slot.as_mut() {
                Some(sink) => {
                    sink(samples);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Deliver interleaved samples, averaging channels down to mono.
    pub fn push_interleaved(&self, samples: &[f32], channels: usize) -> bool {
        let mut mono = Vec::with_capacity(samples.len() / channels.max(1));
        super::downmix_into(samples, channels, &mut mono);
        self.push(&mono)
    }

    pub fn is_connected(&self) -> bool {
        self.sink.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

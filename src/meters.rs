//! Lock-free meters shared between the frame worker and the control thread.
//!
//! Floats are stored as their bit patterns in `AtomicU32`. Values are
//! snapshots: a reader may see volume from one frame and F1 from the next.

use crate::lipsync::PhonemeClass;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

// Phoneme is stored as class index + 1 so zero means "nothing analysed yet".

/// Per-session analysis meters.
#[derive(Default)]
pub struct LipSyncMeters {
    volume: AtomicU32,
    smoothed_volume: AtomicU32,
    pitch_hz: AtomicU32,
    f1_hz: AtomicU32,
    f2_hz: AtomicU32,
    f3_hz: AtomicU32,
    phoneme: AtomicU8,
    frames_processed: AtomicU64,
    frames_dropped: AtomicU64,
    numerical_faults: AtomicU64,
}

/// Plain copy of [`LipSyncMeters`] for logging and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeterSnapshot {
    pub volume: f32,
    pub smoothed_volume: f32,
    pub pitch_hz: f32,
    pub formants_hz: [f32; 3],
    pub phoneme: Option<PhonemeClass>,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub numerical_faults: u64,
}

#[inline]
fn store(slot: &AtomicU32, val: f32) {
    slot.store(val.to_bits(), Ordering::Relaxed);
}

#[inline]
fn load(slot: &AtomicU32) -> f32 {
    f32::from_bits(slot.load(Ordering::Relaxed))
}

impl LipSyncMeters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_volume(&self, raw: f32, smoothed: f32) {
        store(&self.volume, raw);
        store(&self.smoothed_volume, smoothed);
    }

    pub fn set_pitch_hz(&self, val: f32) {
        store(&self.pitch_hz, val);
    }

    pub fn set_formants(&self, [f1, f2, f3]: [f32; 3]) {
        store(&self.f1_hz, f1);
        store(&self.f2_hz, f2);
        store(&self.f3_hz, f3);
    }

    pub fn set_phoneme(&self, class: PhonemeClass) {
        self.phoneme.store(class as u8 + 1, Ordering::Relaxed);
    }

    pub fn record_processed_frame(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_frame(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_numerical_fault(&self) {
        self.numerical_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        load(&self.volume)
    }

    pub fn smoothed_volume(&self) -> f32 {
        load(&self.smoothed_volume)
    }

    pub fn pitch_hz(&self) -> f32 {
        load(&self.pitch_hz)
    }

    pub fn formants(&self) -> [f32; 3] {
        [load(&self.f1_hz), load(&self.f2_hz), load(&self.f3_hz)]
    }

    /// Class of the last analysed frame; `None` before the first frame.
    pub fn phoneme(&self) -> Option<PhonemeClass> {
        match self.phoneme.load(Ordering::Relaxed) {
            0 => None,
            n => PhonemeClass::from_index(n - 1),
        }
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn numerical_faults(&self) -> u64 {
        self.numerical_faults.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            volume: self.volume(),
            smoothed_volume: self.smoothed_volume(),
            pitch_hz: self.pitch_hz(),
            formants_hz: self.formants(),
            phoneme: self.phoneme(),
            frames_processed: self.frames_processed(),
            frames_dropped: self.frames_dropped(),
            numerical_faults: self.numerical_faults(),
        }
    }
}

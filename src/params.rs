//! Live-tweakable lip-sync parameters.
//!
//! Written from the control thread, read by the frame worker once per frame.
//! Each value is its own atomic; a frame may see a mix of old and new values
//! for one frame after a change.

use crate::config::AvatarConfig;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

pub struct SharedParams {
    sensitivity: AtomicU32,
    smoothing: AtomicUsize,
    amplitude: AtomicU32,
    viseme_amplitude: AtomicU32,
}

/// One frame's view of [`SharedParams`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub sensitivity: f32,
    pub smoothing: usize,
    pub amplitude: f32,
    pub viseme_amplitude: f32,
}

fn sanitize_gain(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

impl SharedParams {
    pub fn from_config(config: &AvatarConfig) -> Self {
        Self {
            sensitivity: AtomicU32::new(sanitize_gain(config.sensitivity).to_bits()),
            smoothing: AtomicUsize::new(config.smoothing.max(1)),
            amplitude: AtomicU32::new(sanitize_gain(config.amplitude).to_bits()),
            viseme_amplitude: AtomicU32::new(sanitize_gain(config.viseme_amplitude).to_bits()),
        }
    }

    /// Pre-gain applied to samples before the volume RMS. Negative or
    /// non-finite values are stored as 0.
    pub fn set_sensitivity(&self, value: f32) {
        self.sensitivity
            .store(sanitize_gain(value).to_bits(), Ordering::Relaxed);
    }

    /// Moving-average window in frames (min 1).
    pub fn set_smoothing(&self, frames: usize) {
        self.smoothing.store(frames.max(1), Ordering::Relaxed);
    }

    /// Post-gain on the emitted `mouthOpen` weight.
    pub fn set_amplitude(&self, value: f32) {
        self.amplitude
            .store(sanitize_gain(value).to_bits(), Ordering::Relaxed);
    }

    /// Post-gain on the emitted viseme weight.
    pub fn set_viseme_amplitude(&self, value: f32) {
        self.viseme_amplitude
            .store(sanitize_gain(value).to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            sensitivity: f32::from_bits(self.sensitivity.load(Ordering::Relaxed)),
            smoothing: self.smoothing.load(Ordering::Relaxed),
            amplitude: f32::from_bits(self.amplitude.load(Ordering::Relaxed)),
            viseme_amplitude: f32::from_bits(self.viseme_amplitude.load(Ordering::Relaxed)),
        }
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::from_config(&AvatarConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        let p = SharedParams::default().snapshot();
        assert_eq!(p.sensitivity, 1.0);
        assert_eq!(p.smoothing, 5);
        assert_eq!(p.amplitude, 2.0);
        assert_eq!(p.viseme_amplitude, 2.0);
    }

    #[test]
    fn test_setters_sanitize() {
        let p = SharedParams::default();
        p.set_sensitivity(f32::NAN);
        p.set_smoothing(0);
        p.set_amplitude(-1.0);
        p.set_viseme_amplitude(3.5);
        let s = p.snapshot();
        assert_eq!(s.sensitivity, 0.0);
        assert_eq!(s.smoothing, 1);
        assert_eq!(s.amplitude, 0.0);
        assert_eq!(s.viseme_amplitude, 3.5);
    }
}

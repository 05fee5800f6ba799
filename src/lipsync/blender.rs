//! Lip-sync blender: smoothed volume → mouth weights.
//!
//! Two channels, added rather than substituted:
//! - `mouthOpen` follows the smoothed volume and is emitted on every tick,
//!   even at 0, so coarse loudness always moves the jaw;
//! - the viseme shape for the current phoneme class rides on top of it when
//!   it is a different shape and its weight is above 0.
//!
//! ## Parameters
//! - `amplitude`: post-gain on `mouthOpen`.
//! - `viseme_amplitude`: post-gain on the viseme shape.
//! - window: number of frames in the moving average.

use super::viseme::Viseme;
use crate::dsp::utils::clamp01;
use crate::shapes::{BlendShape, MOUTH_OPEN};
use std::collections::VecDeque;

pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;
pub const DEFAULT_AMPLITUDE: f32 = 2.0;
pub const DEFAULT_VISEME_AMPLITUDE: f32 = 2.0;

/// Fixed-capacity FIFO of recent volumes.
#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    values: VecDeque<f32>,
    capacity: usize,
}

impl SmoothingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Push a value (non-finite counts as 0) and evict the oldest if full.
    pub fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(if value.is_finite() { value } else { 0.0 });
    }

    /// Mean of the values currently held; 0 when empty.
    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    /// Change capacity, keeping the most recent values.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        while self.values.len() > capacity {
            self.values.pop_front();
        }
        self.capacity = capacity;
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Per-avatar lip-sync state.
#[derive(Debug, Clone)]
pub struct LipSyncBlender {
    buffer: SmoothingBuffer,
    amplitude: f32,
    viseme_amplitude: f32,
    smoothed: f32,
}

impl Default for LipSyncBlender {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_WINDOW, DEFAULT_AMPLITUDE, DEFAULT_VISEME_AMPLITUDE)
    }
}

impl LipSyncBlender {
    pub fn new(window: usize, amplitude: f32, viseme_amplitude: f32) -> Self {
        Self {
            buffer: SmoothingBuffer::new(window),
            amplitude,
            viseme_amplitude,
            smoothed: 0.0,
        }
    }

    pub fn window(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn set_window(&mut self, window: usize) {
        if window.max(1) != self.buffer.capacity() {
            self.buffer.resize(window);
        }
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    pub fn set_viseme_amplitude(&mut self, viseme_amplitude: f32) {
        self.viseme_amplitude = viseme_amplitude;
    }

    pub fn smoothed_volume(&self) -> f32 {
        self.smoothed
    }

    /// Advance one frame and write this frame's weights into `out`.
    pub fn blend_into(&mut self, volume: f32, viseme: &Viseme, out: &mut Vec<BlendShape>) {
        self.buffer.push(volume);
        self.smoothed = self.buffer.mean();

        out.clear();
        out.push(BlendShape::new(MOUTH_OPEN, self.smoothed * self.amplitude));

        if viseme.shape != MOUTH_OPEN {
            let weight = clamp01(self.smoothed * viseme.intensity * self.viseme_amplitude);
            if weight > 0.0 {
                out.push(BlendShape::new(viseme.shape, weight));
            }
        }
    }

    pub fn blend(&mut self, volume: f32, viseme: &Viseme) -> Vec<BlendShape> {
        let mut out = Vec::with_capacity(2);
        self.blend_into(volume, viseme, &mut out);
        out
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.smoothed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{weight_of, MOUTH_FUNNEL};

    const FUNNEL: Viseme = Viseme {
        shape: MOUTH_FUNNEL,
        intensity: 0.8,
    };

    #[test]
    fn test_moving_average_converges_after_window() {
        let mut blender = LipSyncBlender::new(5, 1.0, 1.0);
        for _ in 0..3 {
            blender.blend(0.0, &FUNNEL);
        }
        for _ in 0..5 {
            blender.blend(0.3, &FUNNEL);
        }
        assert!((blender.smoothed_volume() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_silence_emits_closed_mouth_only() {
        let mut blender = LipSyncBlender::default();
        blender.blend(0.8, &FUNNEL);
        let out = (0..DEFAULT_SMOOTHING_WINDOW)
            .map(|_| blender.blend(0.0, &FUNNEL))
            .last()
            .unwrap();
        assert_eq!(out, vec![BlendShape::new(MOUTH_OPEN, 0.0)]);
    }

    #[test]
    fn test_viseme_channel_adds_to_mouth_open() {
        let mut blender = LipSyncBlender::new(1, 2.0, 2.0);
        let out = blender.blend(0.2, &FUNNEL);
        assert_eq!(out.len(), 2);
        assert!((weight_of(&out, MOUTH_OPEN) - 0.4).abs() < 1e-6);
        assert!((weight_of(&out, MOUTH_FUNNEL) - 0.32).abs() < 1e-6);
    }

    #[test]
    fn test_open_vowel_does_not_duplicate_mouth_open() {
        let mut blender = LipSyncBlender::default();
        let open = Viseme {
            shape: MOUTH_OPEN,
            intensity: 1.0,
        };
        let out = blender.blend(0.4, &open);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_weights_stay_in_range_for_loud_input() {
        let mut blender = LipSyncBlender::new(1, 10.0, 10.0);
        for v in [1.0, 5.0, f32::NAN, -3.0] {
            for s in blender.blend(v, &FUNNEL) {
                assert!((0.0..=1.0).contains(&s.value));
            }
        }
    }

    #[test]
    fn test_resize_keeps_recent_values() {
        let mut buf = SmoothingBuffer::new(5);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            buf.push(v);
        }
        buf.resize(2);
        assert_eq!(buf.len(), 2);
        assert!((buf.mean() - 4.5).abs() < 1e-6);
        buf.push(7.0);
        assert!((buf.mean() - 6.0).abs() < 1e-6);
        assert!(SmoothingBuffer::new(0).capacity() == 1);
    }
}

//! Spectral Feature Extractor
//!
//! Turns one [`AudioFrame`] into one [`FeatureVector`]: volume, a coarse pitch
//! estimate, up to three formants (LPC), spectral centroid and zero-crossing
//! rate. There is no cross-frame state; `&mut self` is only needed for the
//! pre-allocated FFT and LPC scratch buffers.
//!
//! # Perceptual Contract
//! - **Target Source**: Spoken voice driving an avatar mouth. Not a pitch tracker.
//! - **Pitch**: Dominant FFT bin. Harmonics can win over the fundamental; that
//!   is acceptable for lip sync.
//! - **Formants**: Pole angles of a 12th-order LPC model. Accurate to a few
//!   tens of Hz on clean vowels, meaningless on unvoiced frames. Poles wider
//!   than 600 Hz are dropped by default, so a single tone anywhere in
//!   (90 Hz, Nyquist) reports its own frequency instead of being pushed out
//!   of the first three by broad filler poles.
//!
//! # Failure Modes
//! - Silent frames: every feature is 0 and the formant list is empty.
//! - Ill-conditioned LPC or root finding: formants fall back to an empty list,
//!   the other features are still reported.
//! - Non-finite input samples: [`FeatureError::NonFinite`]; the caller keeps
//!   its previous output.
//!
//! ## Audio Thread Safety
//! - FFT plan, window and scratch buffers are allocated in `new()`.
//! - Root finding allocates a handful of small vectors per frame; the
//!   extractor runs on the frame handler, never on the capture callback.

use crate::audio::AudioFrame;
use crate::dsp::lpc::{autocorrelation, levinson_durbin, DEFAULT_LPC_ORDER};
use crate::dsp::roots::find_roots;
use crate::dsp::utils::{
    clamp01, condition_for_lpc, frame_rms_with_gain, make_hamming_window, make_hann_window,
    zero_crossing_rate,
};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Formants at or below this frequency are discarded (Hz).
pub const FORMANT_MIN_HZ: f32 = 90.0;

/// Number of formants reported.
pub const MAX_FORMANTS: usize = 3;

/// Default pole bandwidth cap (Hz). Speech formants sit well under it; the
/// spare LPC poles on a narrowband frame are far broader.
pub const DEFAULT_MAX_FORMANT_BANDWIDTH_HZ: f32 = 600.0;

/// Magnitude-squared floor below which a spectrum counts as silent.
const SPECTRUM_ENERGY_EPS: f32 = 1e-12;

// =============================================================================
// Types
// =============================================================================

/// Per-frame analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureVector {
    /// Normalized RMS after sensitivity gain, 0..1.
    pub volume: f32,
    pub pitch_hz: f32,
    /// Ascending, at most three. Missing formants are read as 0.
    pub formants: Vec<f32>,
    pub spectral_centroid_hz: f32,
    /// 0..1
    pub zero_crossing_rate: f32,
}

impl FeatureVector {
    /// Formant `i` (0-based), or 0.0 when not available.
    #[inline]
    pub fn formant(&self, i: usize) -> f32 {
        self.formants.get(i).copied().unwrap_or(0.0)
    }

    /// `[f1, f2, f3]` with missing entries as 0.
    pub fn formant_triplet(&self) -> [f32; 3] {
        [self.formant(0), self.formant(1), self.formant(2)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("frame produced non-finite features")]
    NonFinite,
}

/// Extractor settings that are fixed for the lifetime of an extractor.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorSettings {
    pub frame_size: usize,
    pub lpc_order: usize,
    /// Drop poles broader than this (Hz). `None` keeps every pole.
    pub max_formant_bandwidth_hz: Option<f32>,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            lpc_order: DEFAULT_LPC_ORDER,
            max_formant_bandwidth_hz: Some(DEFAULT_MAX_FORMANT_BANDWIDTH_HZ),
        }
    }
}

// =============================================================================
// Extractor
// =============================================================================

pub struct SpectralFeatureExtractor {
    settings: ExtractorSettings,
    fft: Arc<dyn Fft<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    spectrum: Vec<Complex<f32>>,
    hann: Vec<f32>,
    hamming: Vec<f64>,
    lpc_frame: Vec<f64>,
    autocorr: Vec<f64>,
}

impl SpectralFeatureExtractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        let n = settings.frame_size.max(2);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let fft_scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];

        Self {
            settings: ExtractorSettings {
                frame_size: n,
                ..settings
            },
            fft,
            fft_scratch,
            spectrum: vec![Complex::default(); n],
            hann: make_hann_window(n),
            hamming: make_hamming_window(n),
            lpc_frame: vec![0.0; n],
            autocorr: vec![0.0; settings.lpc_order + 1],
        }
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Analyse one frame. `sensitivity` is the pre-gain applied before the
    /// volume computation.
    pub fn extract(
        &mut self,
        frame: &AudioFrame,
        sensitivity: f32,
    ) -> Result<FeatureVector, FeatureError> {
        let samples = frame.samples();
        let sample_rate = frame.sample_rate() as f32;

        let rms = frame_rms_with_gain(samples, sensitivity);
        if !rms.is_finite() {
            return Err(FeatureError::NonFinite);
        }
        let volume = clamp01(rms);
        let zero_crossing_rate = zero_crossing_rate(samples);

        let (pitch_hz, spectral_centroid_hz) = self.spectral_features(samples, sample_rate);
        if !pitch_hz.is_finite() || !spectral_centroid_hz.is_finite() {
            return Err(FeatureError::NonFinite);
        }

        let formants = self.formants(samples, sample_rate);

        Ok(FeatureVector {
            volume,
            pitch_hz,
            formants,
            spectral_centroid_hz,
            zero_crossing_rate,
        })
    }

    /// Dominant-bin pitch and energy-weighted centroid from a Hann-windowed FFT.
    fn spectral_features(&mut self, samples: &[f32], sample_rate: f32) -> (f32, f32) {
        let n = self.spectrum.len();
        for i in 0..n {
            let x = samples.get(i).copied().unwrap_or(0.0);
            self.spectrum[i] = Complex::new(x * self.hann[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);

        let bin_hz = sample_rate / n as f32;
        let half = n / 2;

        let mut total = 0.0f32;
        let mut weighted = 0.0f32;
        let mut best_bin = 0usize;
        let mut best_mag = 0.0f32;

        for k in 0..=half {
            let power = self.spectrum[k].norm_sqr();
            total += power;
            weighted += power * k as f32 * bin_hz;
            if k > 0 && power > best_mag {
                best_mag = power;
                best_bin = k;
            }
        }

        if total.is_nan() || weighted.is_nan() {
            return (f32::NAN, f32::NAN);
        }
        if total <= SPECTRUM_ENERGY_EPS {
            return (0.0, 0.0);
        }

        (best_bin as f32 * bin_hz, weighted / total)
    }

    /// LPC formants. Any numerical failure collapses to an empty list.
    fn formants(&mut self, samples: &[f32], sample_rate: f32) -> Vec<f32> {
        let n = samples.len().min(self.lpc_frame.len());
        condition_for_lpc(&samples[..n], &self.hamming, &mut self.lpc_frame[..n]);
        autocorrelation(&self.lpc_frame[..n], &mut self.autocorr);

        let lpc = match levinson_durbin(&self.autocorr, self.settings.lpc_order) {
            Ok(lpc) => lpc,
            Err(e) => {
                log::trace!("LPC recursion unstable ({:?}), dropping formants", e);
                return Vec::new();
            }
        };
        if lpc.is_silent() {
            return Vec::new();
        }

        let roots = match find_roots(&lpc.polynomial()) {
            Ok(roots) => roots,
            Err(e) => {
                log::trace!("LPC root finding failed ({:?}), dropping formants", e);
                return Vec::new();
            }
        };

        let nyquist = sample_rate * 0.5;
        let to_hz = sample_rate as f64 / (2.0 * std::f64::consts::PI);
        let mut freqs: Vec<f32> = roots
            .iter()
            .filter(|z| z.im > 0.0)
            .filter(|z| match self.settings.max_formant_bandwidth_hz {
                Some(max_bw) => {
                    let radius = z.norm();
                    radius > 0.0 && (-(sample_rate as f64) / std::f64::consts::PI * radius.ln())
                        <= max_bw as f64
                }
                None => true,
            })
            .map(|z| (z.im.atan2(z.re) * to_hz) as f32)
            .filter(|f| f.is_finite() && *f > FORMANT_MIN_HZ && *f < nyquist)
            .collect();

        freqs.sort_by(|a, b| a.total_cmp(b));
        freqs.truncate(MAX_FORMANTS);
        freqs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn extractor() -> SpectralFeatureExtractor {
        SpectralFeatureExtractor::new(ExtractorSettings::default())
    }

    fn tone(freq: f32, amp: f32) -> AudioFrame {
        let samples = (0..1024)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / 16_000.0).sin())
            .collect();
        AudioFrame::new(samples, 16_000, 0)
    }

    /// Impulse train through three two-pole resonators.
    fn synthetic_vowel(formants: [f32; 3]) -> AudioFrame {
        let sr = 16_000.0f64;
        let mut x: Vec<f64> = (0..1024).map(|i| if i % 133 == 0 { 1.0 } else { 0.0 }).collect();
        for (&f, bw) in formants.iter().zip([80.0f64, 100.0, 120.0]) {
            let r = (-std::f64::consts::PI * bw / sr).exp();
            let theta = 2.0 * std::f64::consts::PI * f as f64 / sr;
            let (a1, a2) = (-2.0 * r * theta.cos(), r * r);
            let (mut y1, mut y2) = (0.0, 0.0);
            for v in x.iter_mut() {
                let out = *v - a1 * y1 - a2 * y2;
                y2 = y1;
                y1 = out;
                *v = out;
            }
        }
        let peak = x.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let samples = x.iter().map(|v| (v / peak * 0.5) as f32).collect();
        AudioFrame::new(samples, 16_000, 0)
    }

    #[test]
    fn test_silent_frame_is_all_zero() {
        let mut ex = extractor();
        let frame = AudioFrame::new(vec![0.0; 1024], 16_000, 0);
        let fv = ex.extract(&frame, 1.0).unwrap();
        assert_eq!(fv.volume, 0.0);
        assert_eq!(fv.pitch_hz, 0.0);
        assert_eq!(fv.spectral_centroid_hz, 0.0);
        assert_eq!(fv.zero_crossing_rate, 0.0);
        assert!(fv.formants.is_empty());
        assert_eq!(fv.formant_triplet(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_tone_sweep_reports_its_frequency() {
        let mut ex = extractor();
        for &freq in &[
            100.0f32, 150.0, 300.0, 500.0, 1000.0, 1500.0, 2500.0, 3000.0, 4000.0, 5000.0,
            6000.0, 6500.0, 7000.0, 7500.0, 7900.0,
        ] {
            let fv = ex.extract(&tone(freq, 0.5), 1.0).unwrap();
            let closest = fv
                .formants
                .iter()
                .map(|f| (f - freq).abs())
                .fold(f32::MAX, f32::min);
            assert!(
                closest < 0.03 * freq,
                "tone {} Hz -> formants {:?}",
                freq,
                fv.formants
            );
        }
    }

    #[test]
    fn test_low_tone_is_first_formant() {
        let mut ex = extractor();
        let fv = ex.extract(&tone(1000.0, 0.5), 1.0).unwrap();
        assert!((fv.formant(0) - 1000.0).abs() < 30.0, "{:?}", fv.formants);
    }

    #[test]
    fn test_tone_pitch_and_centroid() {
        let mut ex = extractor();
        let fv = ex.extract(&tone(1000.0, 0.5), 1.0).unwrap();
        let bin_hz = 16_000.0 / 1024.0;
        assert!((fv.pitch_hz - 1000.0).abs() <= bin_hz);
        assert!((fv.spectral_centroid_hz - 1000.0).abs() < 3.0 * bin_hz);
        // Two crossings per period.
        let expected_zcr = 2.0 * 1000.0 / 16_000.0;
        assert!((fv.zero_crossing_rate - expected_zcr).abs() < 0.01);
    }

    #[test]
    fn test_volume_applies_sensitivity_and_clamps() {
        let mut ex = extractor();
        let frame = tone(440.0, 0.5);
        let plain = ex.extract(&frame, 1.0).unwrap().volume;
        let boosted = ex.extract(&frame, 2.0).unwrap().volume;
        assert!((plain - 0.5 / 2f32.sqrt()).abs() < 0.01);
        assert!((boosted - 2.0 * plain).abs() < 0.01);
        let saturated = ex.extract(&frame, 100.0).unwrap().volume;
        assert_eq!(saturated, 1.0);
    }

    #[test]
    fn test_open_vowel_formants() {
        let mut ex = extractor();
        let fv = ex.extract(&synthetic_vowel([730.0, 1090.0, 2440.0]), 1.0).unwrap();
        assert_eq!(fv.formants.len(), 3);
        assert!((fv.formant(0) - 730.0).abs() < 80.0, "{:?}", fv.formants);
        assert!((fv.formant(1) - 1090.0).abs() < 80.0, "{:?}", fv.formants);
        assert!((fv.formant(2) - 2440.0).abs() < 80.0, "{:?}", fv.formants);
    }

    #[test]
    fn test_bandwidth_cap_drops_broad_poles() {
        let mut ex = SpectralFeatureExtractor::new(ExtractorSettings {
            max_formant_bandwidth_hz: Some(600.0),
            ..ExtractorSettings::default()
        });
        let fv = ex.extract(&synthetic_vowel([270.0, 2290.0, 3010.0]), 1.0).unwrap();
        // The broad spurious pole between F2 and F3 is gone.
        assert!((fv.formant(1) - 2290.0).abs() < 80.0, "{:?}", fv.formants);
        assert!((fv.formant(2) - 3010.0).abs() < 80.0, "{:?}", fv.formants);

        let mut uncapped = SpectralFeatureExtractor::new(ExtractorSettings {
            max_formant_bandwidth_hz: None,
            ..ExtractorSettings::default()
        });
        let fv = uncapped
            .extract(&synthetic_vowel([270.0, 2290.0, 3010.0]), 1.0)
            .unwrap();
        assert!((fv.formant(2) - 3010.0).abs() > 80.0, "{:?}", fv.formants);
    }

    #[test]
    fn test_nan_samples_are_reported() {
        let mut ex = extractor();
        let mut samples = vec![0.1; 1024];
        samples[17] = f32::NAN;
        let frame = AudioFrame::new(samples, 16_000, 0);
        assert_eq!(ex.extract(&frame, 1.0).unwrap_err(), FeatureError::NonFinite);
    }

    #[test]
    fn test_formants_are_sorted_and_bounded() {
        let mut ex = extractor();
        let fv = ex.extract(&synthetic_vowel([300.0, 870.0, 2240.0]), 1.0).unwrap();
        assert!(fv.formants.len() <= MAX_FORMANTS);
        assert!(fv.formants.windows(2).all(|w| w[0] <= w[1]));
        assert!(fv
            .formants
            .iter()
            .all(|&f| f > FORMANT_MIN_HZ && f < 8000.0));
    }
}

//! Audio-driven mouth motion.
//!
//! ```text
//! AudioFrame → SpectralFeatureExtractor → PhonemeClassifier → VisemeMapper → LipSyncBlender
//!                 (volume, formants)        ([f1,f2,f3])       (class)         (smoothing)
//! ```
//!
//! [`LipSyncPipeline`] runs that chain once per frame on whichever thread the
//! frame producer delivers on, and keeps the latest weights for the control
//! thread to read.
//!
//! ## Failure Modes
//! - Silent frame: volume 0, no formants, default class. Not an error.
//! - Ill-conditioned LPC: formants dropped for that frame. Not an error.
//! - Non-finite features (NaN samples): the frame is discarded, the previous
//!   weights stay in place, and [`LipSyncPipeline::process`] returns the error
//!   so the caller can report it.

pub mod blender;
pub mod phoneme;
pub mod viseme;

pub use blender::{LipSyncBlender, SmoothingBuffer};
pub use phoneme::{ClassifierThresholds, PhonemeClass, PhonemeClassifier};
pub use viseme::{Viseme, VisemeMapper};

use crate::audio::AudioFrame;
use crate::dsp::features::{ExtractorSettings, FeatureError, FeatureVector, SpectralFeatureExtractor};
use crate::meters::LipSyncMeters;
use crate::params::SharedParams;
use crate::shapes::BlendShape;
use std::sync::Arc;

/// Everything one frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub sequence: u64,
    pub features: FeatureVector,
    pub phoneme: PhonemeClass,
    pub viseme: Viseme,
    pub weights: Vec<BlendShape>,
}

pub struct LipSyncPipeline {
    extractor: SpectralFeatureExtractor,
    classifier: PhonemeClassifier,
    mapper: VisemeMapper,
    blender: LipSyncBlender,
    params: Arc<SharedParams>,
    meters: Arc<LipSyncMeters>,
    weights: Vec<BlendShape>,
    last: Option<FrameAnalysis>,
}

impl LipSyncPipeline {
    pub fn new(
        settings: ExtractorSettings,
        thresholds: ClassifierThresholds,
        params: Arc<SharedParams>,
        meters: Arc<LipSyncMeters>,
    ) -> Self {
        let p = params.snapshot();
        Self {
            extractor: SpectralFeatureExtractor::new(settings),
            classifier: PhonemeClassifier::new(thresholds),
            mapper: VisemeMapper::new(),
            blender: LipSyncBlender::new(p.smoothing, p.amplitude, p.viseme_amplitude),
            params,
            meters,
            weights: Vec::with_capacity(2),
            last: None,
        }
    }

    /// Analyse one frame and update the current weights.
    ///
    /// On error the current weights are left exactly as they were.
    pub fn process(&mut self, frame: &AudioFrame) -> Result<&[BlendShape], FeatureError> {
        let p = self.params.snapshot();
        self.blender.set_window(p.smoothing);
        self.blender.set_amplitude(p.amplitude);
        self.blender.set_viseme_amplitude(p.viseme_amplitude);

        let features = match self.extractor.extract(frame, p.sensitivity) {
            Ok(f) => f,
            Err(e) => {
                self.meters.record_numerical_fault();
                log::debug!("Frame {} discarded: {}", frame.sequence(), e);
                return Err(e);
            }
        };

        let formants = features.formant_triplet();
        let phoneme = self.classifier.classify(formants);
        let viseme = self.mapper.map(phoneme);
        self.blender
            .blend_into(features.volume, &viseme, &mut self.weights);

        self.meters
            .set_volume(features.volume, self.blender.smoothed_volume());
        self.meters.set_pitch_hz(features.pitch_hz);
        self.meters.set_formants(formants);
        self.meters.set_phoneme(phoneme);

        self.last = Some(FrameAnalysis {
            sequence: frame.sequence(),
            features,
            phoneme,
            viseme,
            weights: self.weights.clone(),
        });

        Ok(&self.weights)
    }

    /// Weights from the most recent successful frame (empty before the first).
    pub fn weights(&self) -> &[BlendShape] {
        &self.weights
    }

    pub fn last_analysis(&self) -> Option<&FrameAnalysis> {
        self.last.as_ref()
    }

    /// Forget smoothing history and close the mouth.
    pub fn reset(&mut self) {
        self.blender.reset();
        self.weights.clear();
        self.last = None;
    }
}

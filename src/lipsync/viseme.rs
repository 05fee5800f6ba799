//! Phoneme class → mouth shape lookup.

use super::phoneme::PhonemeClass;
use crate::shapes::{MOUTH_CLOSE, MOUTH_FUNNEL, MOUTH_OPEN, MOUTH_PRESS, MOUTH_SMILE, MOUTH_STRETCH};
use serde::Serialize;

/// Mouth shape and its base intensity for one phoneme class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viseme {
    pub shape: &'static str,
    pub intensity: f32,
}

/// Used for symbols with no mapping.
pub const FALLBACK_VISEME: Viseme = Viseme {
    shape: MOUTH_OPEN,
    intensity: 0.2,
};

/// Static class → viseme table.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisemeMapper;

impl VisemeMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn map(&self, class: PhonemeClass) -> Viseme {
        let (shape, intensity) = match class {
            PhonemeClass::BackVowel => (MOUTH_FUNNEL, 0.8),
            PhonemeClass::FrontVowel => (MOUTH_SMILE, 0.6),
            PhonemeClass::OpenVowel => (MOUTH_OPEN, 1.0),
            PhonemeClass::Nasal => (MOUTH_CLOSE, 0.5),
            PhonemeClass::Fricative => (MOUTH_STRETCH, 0.5),
            PhonemeClass::StopConsonant => (MOUTH_PRESS, 0.3),
        };
        Viseme { shape, intensity }
    }

    /// Viseme for a finer phoneme symbol; unknown symbols get a low open mouth.
    pub fn map_symbol(&self, symbol: &str) -> Viseme {
        PhonemeClass::from_symbol(symbol)
            .map(|class| self.map(class))
            .unwrap_or(FALLBACK_VISEME)
    }
}

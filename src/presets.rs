use crate::error::ConfigError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// EMOTION PRESETS
// =============================================================================

/// Interpolation rate used when a preset does not name one.
pub const DEFAULT_EMOTION_SPEED: f32 = 0.1;

pub const NEUTRAL: &str = "neutral";

/// Alternative spellings accepted by [`EmotionPresets::get`].
const ALIASES: &[(&str, &str)] = &[
    ("joy", "happy"),
    ("happiness", "happy"),
    ("sadness", "sad"),
    ("anger", "angry"),
    ("surprised", "surprise"),
    ("fearful", "fear"),
    ("afraid", "fear"),
    ("disgusted", "disgust"),
    ("calm", "neutral"),
];

fn default_speed() -> f32 {
    DEFAULT_EMOTION_SPEED
}

/// Target expression for one emotion label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionTarget {
    /// Per-tick interpolation rate, (0, 1].
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Shape name → weight at full intensity, [0, 1].
    #[serde(default)]
    pub shapes: BTreeMap<String, f32>,
}

impl EmotionTarget {
    pub fn neutral() -> Self {
        Self {
            speed: DEFAULT_EMOTION_SPEED,
            shapes: BTreeMap::new(),
        }
    }

    fn sanitized(mut self) -> Self {
        self.speed = sanitize_speed(self.speed).unwrap_or(DEFAULT_EMOTION_SPEED);
        for w in self.shapes.values_mut() {
            *w = crate::dsp::utils::clamp01(*w);
        }
        self
    }
}

/// `Some(speed)` clamped to (0, 1], or `None` if it cannot be used.
pub fn sanitize_speed(speed: f32) -> Option<f32> {
    (speed.is_finite() && speed > 0.0).then(|| speed.min(1.0))
}

/// Emotion label → target table.
#[derive(Debug, Clone)]
pub struct EmotionPresets {
    presets: BTreeMap<String, EmotionTarget>,
}

static BUILTIN: Lazy<EmotionPresets> = Lazy::new(EmotionPresets::load_builtin);

impl EmotionPresets {
    /// Shared table baked in from `emotions.json`.
    pub fn builtin() -> &'static EmotionPresets {
        &BUILTIN
    }

    /// Parse the baked-in table. Non-fatal: a malformed table degrades to
    /// neutral only.
    fn load_builtin() -> Self {
        let json = include_str!("../emotions.json");
        match Self::from_json(json) {
            Ok(presets) => presets,
            Err(e) => {
                log::error!("Built-in emotion table unusable ({}), using neutral only", e);
                Self::default()
            }
        }
    }

    /// Parse a `{label: {speed, shapes}}` table. Labels are lower-cased,
    /// weights clamped to [0, 1], speeds clamped to (0, 1]. A `neutral` entry
    /// is added if missing.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, EmotionTarget> = serde_json::from_str(json)?;
        let mut presets: BTreeMap<String, EmotionTarget> = raw
            .into_iter()
            .map(|(label, target)| (label.trim().to_lowercase(), target.sanitized()))
            .collect();
        presets
            .entry(NEUTRAL.to_string())
            .or_insert_with(EmotionTarget::neutral);
        Ok(Self { presets })
    }

    /// Look up a label, case-insensitively, accepting common aliases.
    pub fn get(&self, label: &str) -> Option<&EmotionTarget> {
        let key = label.trim().to_lowercase();
        if let Some(target) = self.presets.get(&key) {
            return Some(target);
        }
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .and_then(|(_, canonical)| self.presets.get(*canonical))
    }

    pub fn neutral(&self) -> &EmotionTarget {
        static FALLBACK: Lazy<EmotionTarget> = Lazy::new(EmotionTarget::neutral);
        self.presets.get(NEUTRAL).unwrap_or(&*FALLBACK)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl Default for EmotionPresets {
    fn default() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert(NEUTRAL.to_string(), EmotionTarget::neutral());
        Self { presets }
    }
}

//! Coarse phoneme classification from formants.
//!
//! Six broad classes, picked by a fixed rule table evaluated in priority
//! order. The thresholds are a heuristic starting point, not trained on
//! labelled phonetic data; callers must not expect linguistic accuracy.
//!
//! | Priority | Rule                                   | Class         |
//! |----------|----------------------------------------|---------------|
//! | 1        | F1 < 500 and F2 - F1 < 400             | Nasal         |
//! | 2        | F1 < 500 and F2 < 1200                 | BackVowel     |
//! | 3        | F1 < 500 and F2 >= 1800                | FrontVowel    |
//! | 4        | F1 >= 650 and F2 < 1600                | OpenVowel     |
//! | 5        | F3 >= 3000                             | Fricative     |
//! | -        | otherwise                              | StopConsonant |
//!
//! Rules 1-4 need both F1 and F2. A missing formant reads as 0 and skips
//! them, so silence lands on the default class.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PhonemeClass {
    BackVowel = 0,
    FrontVowel = 1,
    OpenVowel = 2,
    Nasal = 3,
    Fricative = 4,
    StopConsonant = 5,
}

impl PhonemeClass {
    pub const ALL: [PhonemeClass; 6] = [
        PhonemeClass::BackVowel,
        PhonemeClass::FrontVowel,
        PhonemeClass::OpenVowel,
        PhonemeClass::Nasal,
        PhonemeClass::Fricative,
        PhonemeClass::StopConsonant,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            PhonemeClass::BackVowel => "back_vowel",
            PhonemeClass::FrontVowel => "front_vowel",
            PhonemeClass::OpenVowel => "open_vowel",
            PhonemeClass::Nasal => "nasal",
            PhonemeClass::Fricative => "fricative",
            PhonemeClass::StopConsonant => "stop_consonant",
        }
    }

    /// Broad class of an ARPAbet-style phoneme symbol ("aa", "iy", "m", ...).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let class = match symbol.trim().to_ascii_lowercase().as_str() {
            "aa" | "ah" | "ae" | "a" | "ao" | "aw" | "ay" => PhonemeClass::OpenVowel,
            "uw" | "oo" | "u" | "uh" | "ow" | "oh" | "o" | "oy" | "w" => PhonemeClass::BackVowel,
            "iy" | "ee" | "i" | "ih" | "eh" | "e" | "ey" | "y" => PhonemeClass::FrontVowel,
            "m" | "n" | "ng" => PhonemeClass::Nasal,
            "f" | "v" | "s" | "z" | "sh" | "zh" | "ch" | "jh" | "j" | "th" | "dh" | "hh" => {
                PhonemeClass::Fricative
            }
            "p" | "b" | "t" | "d" | "k" | "g" | "l" | "r" => PhonemeClass::StopConsonant,
            _ => return None,
        };
        Some(class)
    }
}

/// Rule-table thresholds in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// F1 below this counts as "low F1" (nasal, back and front vowels).
    pub low_f1_max: f32,
    /// Nasal when F2 - F1 is below this.
    pub nasal_gap_max: f32,
    /// Back vowel when F2 is below this.
    pub back_f2_max: f32,
    /// Front vowel when F2 is at least this.
    pub front_f2_min: f32,
    /// Open vowel when F1 is at least this...
    pub open_f1_min: f32,
    /// ...and F2 is below this.
    pub open_f2_max: f32,
    /// Fricative when F3 is at least this.
    pub fricative_f3_min: f32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            low_f1_max: 500.0,
            nasal_gap_max: 400.0,
            back_f2_max: 1200.0,
            front_f2_min: 1800.0,
            open_f1_min: 650.0,
            open_f2_max: 1600.0,
            fricative_f3_min: 3000.0,
        }
    }
}

/// Deterministic, total map from `[f1, f2, f3]` to a [`PhonemeClass`].
#[derive(Debug, Clone, Default)]
pub struct PhonemeClassifier {
    thresholds: ClassifierThresholds,
}

impl PhonemeClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    pub fn classify(&self, formants: [f32; 3]) -> PhonemeClass {
        let t = &self.thresholds;
        let [f1, f2, f3] = formants.map(|f| if f.is_finite() && f > 0.0 { f } else { 0.0 });

        if f1 > 0.0 && f2 > 0.0 {
            let low_f1 = f1 < t.low_f1_max;
            if low_f1 && (f2 - f1) < t.nasal_gap_max {
                return PhonemeClass::Nasal;
            }
            if low_f1 && f2 < t.back_f2_max {
                return PhonemeClass::BackVowel;
            }
            if low_f1 && f2 >= t.front_f2_min {
                return PhonemeClass::FrontVowel;
            }
            if f1 >= t.open_f1_min && f2 < t.open_f2_max {
                return PhonemeClass::OpenVowel;
            }
        }
        if f3 >= t.fricative_f3_min {
            return PhonemeClass::Fricative;
        }
        PhonemeClass::StopConsonant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(f: [f32; 3]) -> PhonemeClass {
        PhonemeClassifier::default().classify(f)
    }

    #[test]
    fn test_vowel_regions() {
        // Textbook adult-male averages.
        assert_eq!(classify([300.0, 870.0, 2240.0]), PhonemeClass::BackVowel); // "oo"
        assert_eq!(classify([270.0, 2290.0, 3010.0]), PhonemeClass::FrontVowel); // "ee"
        assert_eq!(classify([730.0, 1090.0, 2440.0]), PhonemeClass::OpenVowel); // "ah"
    }

    #[test]
    fn test_nasal_wins_over_back_vowel() {
        // Low F1 with F2 close to it also satisfies the back-vowel rule.
        assert_eq!(classify([250.0, 600.0, 2200.0]), PhonemeClass::Nasal);
    }

    #[test]
    fn test_high_f3_without_vowel_evidence_is_fricative() {
        assert_eq!(classify([550.0, 1700.0, 3500.0]), PhonemeClass::Fricative);
        assert_eq!(classify([0.0, 0.0, 4000.0]), PhonemeClass::Fricative);
    }

    #[test]
    fn test_missing_formants_fall_back_to_stop_consonant() {
        assert_eq!(classify([0.0, 0.0, 0.0]), PhonemeClass::StopConsonant);
        assert_eq!(classify([300.0, 0.0, 0.0]), PhonemeClass::StopConsonant);
        assert_eq!(classify([f32::NAN, 900.0, 0.0]), PhonemeClass::StopConsonant);
    }

    #[test]
    fn test_custom_thresholds() {
        let classifier = PhonemeClassifier::new(ClassifierThresholds {
            fricative_f3_min: 2000.0,
            ..Default::default()
        });
        assert_eq!(classifier.classify([550.0, 1700.0, 2500.0]), PhonemeClass::Fricative);
    }

    #[test]
    fn test_symbols_and_indices() {
        assert_eq!(PhonemeClass::from_symbol("AA"), Some(PhonemeClass::OpenVowel));
        assert_eq!(PhonemeClass::from_symbol("m"), Some(PhonemeClass::Nasal));
        assert_eq!(PhonemeClass::from_symbol("sh"), Some(PhonemeClass::Fricative));
        assert_eq!(PhonemeClass::from_symbol("xx"), None);
        for class in PhonemeClass::ALL {
            assert_eq!(PhonemeClass::from_index(class as u8), Some(class));
        }
        assert_eq!(PhonemeClass::from_index(6), None);
    }
}

//! Session configuration.
//!
//! All fields are optional in JSON; missing ones take the defaults below.
//!
//! | Field                      | Default       | Effect |
//! |----------------------------|---------------|--------|
//! | `sensitivity`              | 1.0           | Pre-gain applied to samples before the volume RMS. |
//! | `smoothing`                | 5             | Moving-average window, in frames (min 1). |
//! | `amplitude`                | 2.0           | Post-gain on the emitted `mouthOpen` weight. |
//! | `viseme_amplitude`         | 2.0           | Post-gain on the emitted viseme weight. |
//! | `animation_speed`          | `null`        | Per-tick emotion interpolation rate in (0, 1]; `null` uses each emotion's own speed. |
//! | `frame_size`               | 1024          | Samples per analysis frame. |
//! | `lpc_order`                | 12            | LPC model order for formant tracking. |
//! | `max_formant_bandwidth_hz` | 600           | Drop LPC poles broader than this (Hz); `null` keeps all. |
//! | `max_tick_rate_hz`         | 60            | Upper bound on the animation tick rate. |
//! | `strategy`                 | `"dedicated"` | `"dedicated"` worker thread or `"inline"` on the caller. |
//! | `classifier`               | table values  | Formant thresholds (Hz) of the phoneme classifier; see `ClassifierThresholds`. |

use crate::audio::{ExecutionStrategy, DEFAULT_FRAME_SIZE};
use crate::dsp::features::{ExtractorSettings, DEFAULT_MAX_FORMANT_BANDWIDTH_HZ};
use crate::dsp::lpc::DEFAULT_LPC_ORDER;
use crate::error::ConfigError;
use crate::lipsync::blender::{DEFAULT_AMPLITUDE, DEFAULT_SMOOTHING_WINDOW, DEFAULT_VISEME_AMPLITUDE};
use crate::lipsync::ClassifierThresholds;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Frames shorter than this cannot hold an LPC fit worth reporting.
const MIN_FRAME_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub sensitivity: f32,
    pub smoothing: usize,
    pub amplitude: f32,
    pub viseme_amplitude: f32,
    pub animation_speed: Option<f32>,
    pub frame_size: usize,
    pub lpc_order: usize,
    pub max_formant_bandwidth_hz: Option<f32>,
    pub max_tick_rate_hz: f32,
    pub strategy: ExecutionStrategy,
    pub classifier: ClassifierThresholds,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            smoothing: DEFAULT_SMOOTHING_WINDOW,
            amplitude: DEFAULT_AMPLITUDE,
            viseme_amplitude: DEFAULT_VISEME_AMPLITUDE,
            animation_speed: None,
            frame_size: DEFAULT_FRAME_SIZE,
            lpc_order: DEFAULT_LPC_ORDER,
            max_formant_bandwidth_hz: Some(DEFAULT_MAX_FORMANT_BANDWIDTH_HZ),
            max_tick_rate_hz: 60.0,
            strategy: ExecutionStrategy::Dedicated,
            classifier: ClassifierThresholds::default(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

impl AvatarConfig {
    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| invalid("path", format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Reject values that cannot run at all. Soft limits (negative gains,
    /// zero smoothing) are clamped by the setters instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, v) in [
            ("sensitivity", self.sensitivity),
            ("amplitude", self.amplitude),
            ("viseme_amplitude", self.viseme_amplitude),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(field, format!("must be a finite value >= 0, got {}", v)));
            }
        }
        if let Some(speed) = self.animation_speed {
            if !(speed.is_finite() && speed > 0.0 && speed <= 1.0) {
                return Err(invalid("animation_speed", format!("must be in (0, 1], got {}", speed)));
            }
        }
        if self.frame_size < MIN_FRAME_SIZE {
            return Err(invalid(
                "frame_size",
                format!("must be at least {}, got {}", MIN_FRAME_SIZE, self.frame_size),
            ));
        }
        if self.lpc_order == 0 || self.lpc_order >= self.frame_size {
            return Err(invalid("lpc_order", "must be in 1..frame_size"));
        }
        if let Some(bw) = self.max_formant_bandwidth_hz {
            if !(bw.is_finite() && bw > 0.0) {
                return Err(invalid("max_formant_bandwidth_hz", "must be > 0"));
            }
        }
        if !(self.max_tick_rate_hz.is_finite() && self.max_tick_rate_hz > 0.0) {
            return Err(invalid("max_tick_rate_hz", "must be > 0"));
        }
        Ok(())
    }

    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            frame_size: self.frame_size,
            lpc_order: self.lpc_order,
            max_formant_bandwidth_hz: self.max_formant_bandwidth_hz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = AvatarConfig::from_json("{}").unwrap();
        assert_eq!(config, AvatarConfig::default());
        assert_eq!(config.smoothing, 5);
        assert_eq!(config.amplitude, 2.0);
        assert_eq!(config.frame_size, 1024);
        assert_eq!(config.strategy, ExecutionStrategy::Dedicated);
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = AvatarConfig::from_json(
            r#"{"sensitivity": 1.5, "strategy": "inline", "animation_speed": 0.25,
                "classifier": {"fricative_f3_min": 2800}}"#,
        )
        .unwrap();
        assert_eq!(config.sensitivity, 1.5);
        assert_eq!(config.strategy, ExecutionStrategy::Inline);
        assert_eq!(config.animation_speed, Some(0.25));
        assert_eq!(config.classifier.fricative_f3_min, 2800.0);
        assert_eq!(config.classifier.low_f1_max, 500.0);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for json in [
            r#"{"sensitivity": -1}"#,
            r#"{"animation_speed": 0}"#,
            r#"{"frame_size": 16}"#,
            r#"{"lpc_order": 0}"#,
            r#"{"max_tick_rate_hz": 0}"#,
        ] {
            assert!(
                matches!(AvatarConfig::from_json(json), Err(ConfigError::InvalidValue { .. })),
                "{}",
                json
            );
        }
        assert!(matches!(
            AvatarConfig::from_json(r#"{"strategy": "turbo"}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_serialized_fields_match_documented_table() {
        let value = serde_json::to_value(AvatarConfig::default()).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "amplitude",
                "animation_speed",
                "classifier",
                "frame_size",
                "lpc_order",
                "max_formant_bandwidth_hz",
                "max_tick_rate_hz",
                "sensitivity",
                "smoothing",
                "strategy",
                "viseme_amplitude",
            ]
        );
    }

    #[test]
    fn test_bandwidth_cap_defaults_on_and_null_disables_it() {
        let config = AvatarConfig::default();
        assert_eq!(config.extractor_settings().max_formant_bandwidth_hz, Some(600.0));
        let uncapped = AvatarConfig::from_json(r#"{"max_formant_bandwidth_hz": null}"#).unwrap();
        assert_eq!(uncapped.extractor_settings().max_formant_bandwidth_hz, None);
    }
}

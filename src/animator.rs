//! Emotion Animator
//!
//! Moves a set of blend-shape weights toward the target expression of the
//! current emotion, one tick at a time.
//!
//! Per shape, every tick:
//! - `|target - current| > ε`: `current += (target - current) · speed`
//! - otherwise: `current = target`
//! - a shape that reached 0 and is not in the target is dropped
//!
//! Changing the emotion only replaces the target; current weights carry over,
//! so any emotion change is a smooth blend.
//!
//! ## Perceptual Contract
//! - Weights move monotonically toward their target and never overshoot:
//!   speed is clamped to (0, 1].
//! - At rest, further ticks change nothing.
//!
//! ## Scheduling
//! [`EmotionAnimator::tick_once`] returns `true` while anything is still
//! moving. A host loop stops ticking when it returns `false` and resumes after
//! the next [`EmotionAnimator::set_target`].

use crate::dsp::utils::{clamp01, lerp};
use crate::presets::{sanitize_speed, EmotionPresets, NEUTRAL};
use crate::shapes::BlendShape;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Settling threshold on `|target - current|`.
pub const SETTLE_EPSILON: f32 = 1e-3;

/// Weights of one avatar's expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimatorState {
    pub current: BTreeMap<String, f32>,
    pub target: BTreeMap<String, f32>,
    pub animation_speed: f32,
}

pub struct EmotionAnimator {
    presets: Arc<EmotionPresets>,
    state: AnimatorState,
    emotion: String,
    intensity: f32,
    speed_override: Option<f32>,
}

impl EmotionAnimator {
    pub fn new(presets: Arc<EmotionPresets>) -> Self {
        let speed = presets.neutral().speed;
        Self {
            presets,
            state: AnimatorState {
                animation_speed: speed,
                ..Default::default()
            },
            emotion: NEUTRAL.to_string(),
            intensity: 1.0,
            speed_override: None,
        }
    }

    /// Animator over the built-in emotion table.
    pub fn with_builtin_presets() -> Self {
        Self::new(Arc::new(EmotionPresets::builtin().clone()))
    }

    /// Switch to `label` at `intensity` (clamped to [0, 1]).
    ///
    /// Unknown labels target neutral and return `false`.
    pub fn set_target(&mut self, label: &str, intensity: f32) -> bool {
        let intensity = clamp01(intensity);
        let (target, known) = match self.presets.get(label) {
            Some(t) => (t, true),
            None => {
                log::warn!("Unknown emotion '{}', relaxing to neutral", label);
                (self.presets.neutral(), false)
            }
        };

        self.state.target = target
            .shapes
            .iter()
            .map(|(name, &w)| (name.clone(), clamp01(w * intensity)))
            .filter(|(_, w)| *w > 0.0)
            .collect();
        self.state.animation_speed = self.speed_override.unwrap_or(target.speed);
        self.emotion = if known {
            label.trim().to_lowercase()
        } else {
            NEUTRAL.to_string()
        };
        self.intensity = intensity;

        log::debug!(
            "Emotion -> {} @ {:.2} ({} shapes, speed {:.3})",
            self.emotion,
            intensity,
            self.state.target.len(),
            self.state.animation_speed
        );
        known
    }

    /// Override the per-tick rate for every emotion; `None` returns to each
    /// emotion's own speed. Out-of-range values are clamped to (0, 1];
    /// non-positive or non-finite values clear the override.
    pub fn set_animation_speed(&mut self, speed: Option<f32>) {
        self.speed_override = speed.and_then(sanitize_speed);
        self.state.animation_speed = match self.speed_override {
            Some(s) => s,
            None => self
                .presets
                .get(&self.emotion)
                .map_or(self.presets.neutral().speed, |t| t.speed),
        };
    }

    pub fn animation_speed(&self) -> f32 {
        self.state.animation_speed
    }

    pub fn emotion(&self) -> &str {
        &self.emotion
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn state(&self) -> &AnimatorState {
        &self.state
    }

    /// Advance one tick. Returns `true` while any shape is still moving.
    pub fn tick_once(&mut self) -> bool {
        let speed = self.state.animation_speed;
        let names: BTreeSet<String> = self
            .state
            .current
            .keys()
            .chain(self.state.target.keys())
            .cloned()
            .collect();

        let mut animating = false;
        for name in names {
            let target = self.state.target.get(&name).copied().unwrap_or(0.0);
            let current = self.state.current.get(&name).copied().unwrap_or(0.0);

            let next = if (target - current).abs() > SETTLE_EPSILON {
                animating = true;
                lerp(current, target, speed)
            } else {
                target
            };

            if next == 0.0 && !self.state.target.contains_key(&name) {
                self.state.current.remove(&name);
            } else {
                self.state.current.insert(name, next);
            }
        }
        animating
    }

    /// True when every tracked shape sits on its target.
    pub fn is_settled(&self) -> bool {
        let pending_target = self
            .state
            .target
            .iter()
            .any(|(name, &t)| self.state.current.get(name).copied() != Some(t));
        let pending_decay = self
            .state
            .current
            .keys()
            .any(|name| !self.state.target.contains_key(name));
        !pending_target && !pending_decay
    }

    pub fn weight(&self, name: &str) -> f32 {
        self.state.current.get(name).copied().unwrap_or(0.0)
    }

    /// Every tracked shape, in name order.
    pub fn weights(&self) -> Vec<BlendShape> {
        self.state
            .current
            .iter()
            .map(|(name, &v)| BlendShape::new(name.clone(), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animator() -> EmotionAnimator {
        EmotionAnimator::with_builtin_presets()
    }

    fn run_to_rest(a: &mut EmotionAnimator) -> usize {
        let mut ticks = 0;
        while a.tick_once() {
            ticks += 1;
            assert!(ticks < 10_000, "animator never settled");
        }
        ticks
    }

    #[test]
    fn test_converges_to_happy_and_is_idempotent_at_rest() {
        let mut a = animator();
        assert!(a.set_target("happy", 1.0));
        run_to_rest(&mut a);

        let happy = EmotionPresets::builtin().get("happy").unwrap();
        for (name, &w) in &happy.shapes {
            assert!((a.weight(name) - w).abs() <= SETTLE_EPSILON, "{}", name);
        }
        assert!(a.is_settled());

        let before = a.state().clone();
        assert!(!a.tick_once());
        assert_eq!(a.state(), &before);
    }

    #[test]
    fn test_happy_to_neutral_decays_monotonically() {
        let mut a = animator();
        a.set_target("happy", 1.0);
        run_to_rest(&mut a);

        a.set_target("neutral", 1.0);
        let mut prev = a.state().current.clone();
        loop {
            let moving = a.tick_once();
            for (name, &old) in &prev {
                let new = a.weight(name);
                assert!(new >= 0.0);
                assert!(new <= old, "{} rose from {} to {}", name, old, new);
            }
            prev = a.state().current.clone();
            if !moving {
                break;
            }
        }
        assert!(a.state().current.is_empty());
        assert!(a.weights().is_empty());
    }

    #[test]
    fn test_switch_keeps_current_weights() {
        let mut a = animator();
        a.set_target("happy", 1.0);
        for _ in 0..5 {
            a.tick_once();
        }
        let smile = a.weight("mouthSmile");
        assert!(smile > 0.0);
        a.set_target("sad", 1.0);
        assert_eq!(a.weight("mouthSmile"), smile);
    }

    #[test]
    fn test_intensity_scales_and_clamps() {
        let mut a = animator();
        a.set_target("happy", 0.5);
        run_to_rest(&mut a);
        assert!((a.weight("mouthSmile") - 0.4).abs() <= SETTLE_EPSILON);

        a.set_target("happy", 3.0);
        assert_eq!(a.intensity(), 1.0);
        a.set_target("happy", 0.0);
        assert!(a.state().target.is_empty());
    }

    #[test]
    fn test_unknown_label_targets_neutral() {
        let mut a = animator();
        a.set_target("angry", 1.0);
        run_to_rest(&mut a);
        assert!(!a.set_target("smug", 1.0));
        assert_eq!(a.emotion(), NEUTRAL);
        run_to_rest(&mut a);
        assert!(a.weights().is_empty());
    }

    #[test]
    fn test_speed_override() {
        let mut a = animator();
        a.set_target("sad", 1.0);
        assert_eq!(a.animation_speed(), 0.05);

        a.set_animation_speed(Some(1.0));
        assert_eq!(a.animation_speed(), 1.0);
        a.tick_once();
        assert!(!a.tick_once());
        assert_eq!(a.weight("mouthFrown"), 0.7);

        a.set_animation_speed(Some(-1.0));
        assert_eq!(a.animation_speed(), 0.05);
        a.set_animation_speed(Some(4.0));
        assert_eq!(a.animation_speed(), 1.0);
        a.set_animation_speed(None);
        assert_eq!(a.animation_speed(), 0.05);
    }

    #[test]
    fn test_weights_are_name_ordered_and_in_range() {
        let mut a = animator();
        a.set_target("surprise", 1.0);
        for _ in 0..3 {
            a.tick_once();
        }
        let w = a.weights();
        assert!(w.windows(2).all(|p| p[0].name < p[1].name));
        assert!(w.iter().all(|s| (0.0..=1.0).contains(&s.value)));
    }
}

//! Blend-shape weights handed to the renderer.
//!
//! A [`BlendShape`] is always in `[0, 1]`: the constructor clamps, and
//! non-finite input becomes 0. Names are free-form; renderers ignore names
//! their rig does not have.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const MOUTH_OPEN: &str = "mouthOpen";
pub const MOUTH_FUNNEL: &str = "mouthFunnel";
pub const MOUTH_SMILE: &str = "mouthSmile";
pub const MOUTH_CLOSE: &str = "mouthClose";
pub const MOUTH_STRETCH: &str = "mouthStretch";
pub const MOUTH_PRESS: &str = "mouthPress";

/// One named weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendShape {
    pub name: Cow<'static, str>,
    pub value: f32,
}

impl BlendShape {
    pub fn new(name: impl Into<Cow<'static, str>>, value: f32) -> Self {
        Self {
            name: name.into(),
            value: crate::dsp::utils::clamp01(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Weight of `name` in `shapes`, 0 if absent.
pub fn weight_of(shapes: &[BlendShape], name: &str) -> f32 {
    shapes
        .iter()
        .find(|s| s.name == name)
        .map_or(0.0, |s| s.value)
}

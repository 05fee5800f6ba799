//! Merges lip-sync and emotion weights into one renderer update.
//!
//! Same-named shapes are summed and clamped, so an expression's `mouthOpen`
//! and speech's `mouthOpen` both show instead of one replacing the other.

use crate::shapes::BlendShape;
use std::borrow::Cow;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Compositor {
    merged: BTreeMap<Cow<'static, str>, f32>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamped per-name sum of all `layers`, in name order. Non-finite
    /// contributions count as 0.
    pub fn composite(&mut self, layers: &[&[BlendShape]]) -> Vec<BlendShape> {
        self.merged.clear();
        for layer in layers {
            for shape in layer.iter() {
                let v = if shape.value.is_finite() { shape.value } else { 0.0 };
                *self.merged.entry(shape.name.clone()).or_insert(0.0) += v;
            }
        }
        self.merged
            .iter()
            .map(|(name, &v)| BlendShape::new(name.clone(), v))
            .collect()
    }
}

//! Per-frame speech analysis.
//!
//! `utils` holds the frame-level primitives (RMS, zero crossings, windows,
//! LPC conditioning), `lpc` and `roots` the vocal-tract model, and `features`
//! ties them into one [`FeatureVector`] per frame.

pub mod features;
pub mod lpc;
pub mod roots;
pub mod utils;

pub use features::{ExtractorSettings, FeatureError, FeatureVector, SpectralFeatureExtractor};
pub use lpc::{levinson_durbin, LpcCoefficients, LpcError};
pub use roots::{find_roots, RootError};

//! Real-time facial motion for a virtual avatar.
//!
//! Speech audio drives the mouth (formant-based lip sync); an emotion label
//! drives the expression. Both are merged into one list of named blend-shape
//! weights in `[0, 1]` per tick, ready for any renderer that maps names onto
//! its rig.
//!
//! ```no_run
//! use vxavatar::{AvatarConfig, AvatarSession, PushSource};
//!
//! let mut session = AvatarSession::new(AvatarConfig::default())?;
//! session.on_blend_shapes(|shapes| {
//!     for s in shapes {
//!         println!("{} = {:.2}", s.name, s.value);
//!     }
//! });
//!
//! let mic = PushSource::new(16_000);
//! let feed = mic.handle();
//! session.start_lip_sync(Box::new(mic))?;
//! session.set_emotion("happy", 0.8);
//!
//! feed.push(&[0.0; 1024]); // from the host's capture callback
//! while session.tick_once() {}
//! session.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod debug;

pub mod animator;
pub mod audio;
pub mod compositor;
pub mod config;
pub mod dsp;
pub mod error;
pub mod events;
pub mod lipsync;
pub mod meters;
pub mod pacer;
pub mod params;
pub mod presets;
pub mod session;
pub mod shapes;

pub use animator::{AnimatorState, EmotionAnimator};
pub use audio::{
    AudioFrame, AudioFrameProducer, AudioSource, ExecutionStrategy, PushHandle, PushSource,
    WavSource,
};
#[cfg(feature = "capture")]
pub use audio::CpalSource;
pub use compositor::Compositor;
pub use config::AvatarConfig;
pub use dsp::{FeatureVector, SpectralFeatureExtractor};
pub use error::{CaptureError, ConfigError};
pub use events::{PipelineFault, Publisher, SubscriptionId};
pub use lipsync::{
    ClassifierThresholds, LipSyncBlender, LipSyncPipeline, PhonemeClass, PhonemeClassifier,
    SmoothingBuffer, Viseme, VisemeMapper,
};
pub use meters::{LipSyncMeters, MeterSnapshot};
pub use presets::{EmotionPresets, EmotionTarget};
pub use session::AvatarSession;
pub use shapes::BlendShape;

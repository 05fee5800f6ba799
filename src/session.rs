//! Avatar Session
//!
//! One [`AvatarSession`] per avatar. It owns every piece of per-avatar state
//! (lip-sync pipeline, smoothing history, emotion animator, live parameters,
//! meters) so any number of sessions can run side by side without sharing
//! anything mutable.
//!
//! ```text
//!   AudioSource ─► AudioFrameProducer ─► LipSyncPipeline ──┐
//!                  (worker or inline)    (latest weights)  │
//!                                                          ├─► Compositor ─► on_blend_shapes
//!   set_emotion ─► EmotionAnimator ────────────────────────┘
//!                  (tick_once)
//! ```
//!
//! ## Driving the session
//! The host calls [`AvatarSession::tick_once`] from its render loop. It
//! returns `true` while there is still something to show: the expression is
//! moving, or a new audio frame arrived since the previous tick. When it
//! returns `false` the host can stop ticking until the next `set_emotion` or
//! audio frame. [`AvatarSession::run_until_settled`] does exactly that at the
//! configured maximum tick rate.
//!
//! ## Failure Modes
//! - Invalid configuration: the constructor returns the [`ConfigError`].
//! - Audio source fails to open: `start_lip_sync` returns the error and a
//!   [`PipelineFault::Capture`] is published. Emotion keeps working.
//! - A frame with non-finite features: previous lip-sync weights stay, a
//!   [`PipelineFault::NumericalFault`] is published.
//! - Unknown emotion label: neutral is targeted, a
//!   [`PipelineFault::UnknownEmotion`] is published.

use crate::animator::EmotionAnimator;
use crate::audio::{AudioFrame, AudioFrameProducer, AudioSource, ExecutionStrategy};
use crate::compositor::Compositor;
use crate::config::AvatarConfig;
use crate::error::{CaptureError, ConfigError};
use crate::events::{Publisher, PipelineFault, SubscriptionId};
use crate::lipsync::LipSyncPipeline;
use crate::meters::LipSyncMeters;
use crate::pacer::TickPacer;
use crate::params::SharedParams;
use crate::presets::EmotionPresets;
use crate::shapes::BlendShape;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock_pipeline(pipeline: &Mutex<LipSyncPipeline>) -> MutexGuard<'_, LipSyncPipeline> {
    // A panicking frame handler leaves the pipeline usable; take it back.
    match pipeline.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct AvatarSession {
    config: AvatarConfig,
    params: Arc<SharedParams>,
    meters: Arc<LipSyncMeters>,
    pipeline: Arc<Mutex<LipSyncPipeline>>,
    producer: Option<AudioFrameProducer>,
    animator: EmotionAnimator,
    compositor: Compositor,
    pacer: TickPacer,
    output: Vec<BlendShape>,
    frames_seen: u64,
    blend_shapes: Publisher<[BlendShape]>,
    faults: Publisher<PipelineFault>,
}

impl AvatarSession {
    /// Session over the built-in emotion table.
    ///
    /// Fails if `config` does not pass [`AvatarConfig::validate`].
    pub fn new(config: AvatarConfig) -> Result<Self, ConfigError> {
        Self::with_presets(config, Arc::new(EmotionPresets::builtin().clone()))
    }

    pub fn with_presets(
        config: AvatarConfig,
        presets: Arc<EmotionPresets>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        crate::debug::init();

        let params = Arc::new(SharedParams::from_config(&config));
        let meters = Arc::new(LipSyncMeters::new());
        let pipeline = LipSyncPipeline::new(
            config.extractor_settings(),
            config.classifier,
            params.clone(),
            meters.clone(),
        );
        let mut animator = EmotionAnimator::new(presets);
        animator.set_animation_speed(config.animation_speed);

        Ok(Self {
            pacer: TickPacer::new(config.max_tick_rate_hz),
            config,
            params,
            meters,
            pipeline: Arc::new(Mutex::new(pipeline)),
            producer: None,
            animator,
            compositor: Compositor::new(),
            output: Vec::new(),
            frames_seen: 0,
            blend_shapes: Publisher::new(),
            faults: Publisher::new(),
        })
    }

    // -------------------------------------------------------------------------
    // Lip sync
    // -------------------------------------------------------------------------

    /// Connect an audio source and start analysing it.
    ///
    /// Fails before any frame is produced if the source cannot be opened, or
    /// if lip sync is already running.
    pub fn start_lip_sync(&mut self, source: Box<dyn AudioSource>) -> Result<(), CaptureError> {
        if self.producer.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        lock_pipeline(&self.pipeline).reset();

        let pipeline = self.pipeline.clone();
        let faults = self.faults.clone();
        let handler = Box::new(move |frame: &AudioFrame| {
            let result = lock_pipeline(&pipeline).process(frame).map(|_| ());
            if result.is_err() {
                faults.publish(&PipelineFault::NumericalFault {
                    sequence: frame.sequence(),
                });
            }
        });

        match AudioFrameProducer::start(
            source,
            self.config.strategy,
            self.config.frame_size,
            self.meters.clone(),
            handler,
        ) {
            Ok(producer) => {
                self.producer = Some(producer);
                Ok(())
            }
            Err(e) => {
                log::warn!("Lip sync disabled: {}", e);
                self.faults.publish(&PipelineFault::Capture {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Disconnect audio synchronously and close the mouth. Idempotent.
    pub fn stop_lip_sync(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            producer.stop();
            lock_pipeline(&self.pipeline).reset();
        }
    }

    pub fn is_lip_sync_active(&self) -> bool {
        self.producer.is_some()
    }

    /// Inline strategy: run the pending frame, if any, on this thread.
    /// Returns the number of frames processed.
    pub fn poll_audio(&mut self) -> usize {
        self.producer.as_mut().map_or(0, |p| p.poll())
    }

    pub fn strategy(&self) -> Option<ExecutionStrategy> {
        self.producer.as_ref().map(|p| p.strategy())
    }

    // -------------------------------------------------------------------------
    // Emotion
    // -------------------------------------------------------------------------

    /// Target `label` at `intensity` in [0, 1]. Unknown labels target neutral,
    /// publish a fault, and return `false`.
    pub fn set_emotion(&mut self, label: &str, intensity: f32) -> bool {
        let known = self.animator.set_target(label, intensity);
        if !known {
            self.faults.publish(&PipelineFault::UnknownEmotion {
                label: label.to_string(),
            });
        }
        known
    }

    pub fn animator(&self) -> &EmotionAnimator {
        &self.animator
    }

    // -------------------------------------------------------------------------
    // Ticking
    // -------------------------------------------------------------------------

    /// Advance one tick and publish the composited weights.
    ///
    /// Returns `true` while the expression is still moving or new audio
    /// frames are arriving.
    pub fn tick_once(&mut self) -> bool {
        self.poll_audio();
        let animating = self.animator.tick_once();

        let frames = self.meters.frames_processed();
        let fresh_audio = frames != self.frames_seen;
        self.frames_seen = frames;

        let emotion = self.animator.weights();
        self.output = {
            let pipeline = lock_pipeline(&self.pipeline);
            let merged = self.compositor.composite(&[pipeline.weights(), &emotion[..]]);
            merged
        };
        self.blend_shapes.publish(&self.output);

        crate::debug::drain();
        animating || fresh_audio
    }

    /// Tick at no more than the configured rate until [`Self::tick_once`]
    /// reports nothing left to show. Returns the number of ticks run.
    pub fn run_until_settled(&mut self) -> usize {
        let mut ticks = 0;
        loop {
            self.pacer.wait();
            ticks += 1;
            if !self.tick_once() {
                return ticks;
            }
        }
    }

    /// Weights published by the last tick.
    pub fn output(&self) -> &[BlendShape] {
        &self.output
    }

    pub fn on_blend_shapes<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&[BlendShape]) + Send + 'static,
    {
        self.blend_shapes.subscribe(callback)
    }

    pub fn on_fault<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&PipelineFault) + Send + 'static,
    {
        self.faults.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.blend_shapes.unsubscribe(id);
        self.faults.unsubscribe(id);
    }

    // -------------------------------------------------------------------------
    // Parameters
    // -------------------------------------------------------------------------

    pub fn set_sensitivity(&mut self, value: f32) {
        self.params.set_sensitivity(value);
        self.config.sensitivity = self.params.snapshot().sensitivity;
    }

    pub fn set_smoothing(&mut self, frames: usize) {
        self.params.set_smoothing(frames);
        self.config.smoothing = self.params.snapshot().smoothing;
    }

    pub fn set_amplitude(&mut self, value: f32) {
        self.params.set_amplitude(value);
        self.config.amplitude = self.params.snapshot().amplitude;
    }

    pub fn set_viseme_amplitude(&mut self, value: f32) {
        self.params.set_viseme_amplitude(value);
        self.config.viseme_amplitude = self.params.snapshot().viseme_amplitude;
    }

    /// `None` returns to each emotion's own speed.
    pub fn set_animation_speed(&mut self, speed: Option<f32>) {
        self.animator.set_animation_speed(speed);
        self.config.animation_speed = speed.and_then(crate::presets::sanitize_speed);
    }

    pub fn config(&self) -> &AvatarConfig {
        &self.config
    }

    pub fn meters(&self) -> &Arc<LipSyncMeters> {
        &self.meters
    }

    /// Stop everything that runs in the background. Idempotent; the session
    /// stays usable for emotion ticks afterwards.
    pub fn stop(&mut self) {
        self.stop_lip_sync();
        crate::debug::drain();
    }
}

impl Drop for AvatarSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{PushHandle, PushSource};
    use crate::lipsync::PhonemeClass;
    use crate::shapes::{weight_of, MOUTH_OPEN};
    use std::f32::consts::PI;
    use std::time::{Duration, Instant};

    struct DeniedSource;

    impl AudioSource for DeniedSource {
        fn sample_rate(&self) -> u32 {
            16_000
        }

        fn start(&mut self, _sink: crate::audio::SampleSink) -> Result<(), CaptureError> {
            Err(CaptureError::PermissionDenied("microphone".into()))
        }

        fn stop(&mut self) {}
    }

    fn fast_config(strategy: ExecutionStrategy) -> AvatarConfig {
        AvatarConfig {
            strategy,
            max_tick_rate_hz: 100_000.0,
            ..Default::default()
        }
    }

    fn tone(freq: f32, amp: f32) -> Vec<f32> {
        (0..1024)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / 16_000.0).sin())
            .collect()
    }

    fn start_push(session: &mut AvatarSession) -> PushHandle {
        let source = PushSource::new(16_000);
        let handle = source.handle();
        session.start_lip_sync(Box::new(source)).unwrap();
        handle
    }

    fn collect_faults(session: &AvatarSession) -> Arc<Mutex<Vec<PipelineFault>>> {
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = faults.clone();
        session.on_fault(move |f: &PipelineFault| sink.lock().unwrap().push(f.clone()));
        faults
    }

    #[test]
    fn test_silent_frames_give_closed_mouth_and_default_class() {
        let mut session = AvatarSession::new(fast_config(ExecutionStrategy::Inline)).unwrap();
        let faults = collect_faults(&session);
        let handle = start_push(&mut session);

        for _ in 0..5 {
            handle.push(&[0.0; 1024]);
            assert!(session.tick_once());
        }

        assert_eq!(session.meters().frames_processed(), 5);
        assert_eq!(session.meters().volume(), 0.0);
        assert_eq!(session.meters().phoneme(), Some(PhonemeClass::StopConsonant));
        assert_eq!(session.meters().formants(), [0.0, 0.0, 0.0]);
        assert_eq!(weight_of(session.output(), MOUTH_OPEN), 0.0);
        assert!(faults.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stop_twice_is_a_no_op() {
        let mut session = AvatarSession::new(fast_config(ExecutionStrategy::Dedicated)).unwrap();
        start_push(&mut session);
        session.set_emotion("happy", 1.0);
        session.tick_once();

        session.stop();
        let output = session.output().to_vec();
        let emotion = session.animator().state().clone();
        session.stop();
        session.stop_lip_sync();

        assert!(!session.is_lip_sync_active());
        assert_eq!(session.output(), output.as_slice());
        assert_eq!(session.animator().state(), &emotion);
    }

    #[test]
    fn test_capture_failure_leaves_emotion_usable() {
        let mut session = AvatarSession::new(fast_config(ExecutionStrategy::Dedicated)).unwrap();
        let faults = collect_faults(&session);

        let err = session.start_lip_sync(Box::new(DeniedSource)).unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert!(!session.is_lip_sync_active());
        assert!(matches!(
            faults.lock().unwrap()[0],
            PipelineFault::Capture { .. }
        ));

        assert!(session.set_emotion("happy", 1.0));
        session.run_until_settled();
        assert!((weight_of(session.output(), "mouthSmile") - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_dedicated_worker_drives_mouth() {
        let mut session = AvatarSession::new(fast_config(ExecutionStrategy::Dedicated)).unwrap();
        let handle = start_push(&mut session);
        handle.push(&tone(220.0, 0.3));

        let deadline = Instant::now() + Duration::from_secs(5);
        while session.meters().frames_processed() < 1 {
            assert!(Instant::now() < deadline, "worker never processed the frame");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(session.tick_once());
        assert!(weight_of(session.output(), MOUTH_OPEN) > 0.0);

        // Nothing new arrived and no emotion is moving.
        assert!(!session.tick_once());
    }

    #[test]
    fn test_lip_sync_and_emotion_are_summed() {
        let mut session = AvatarSession::new(fast_config(ExecutionStrategy::Inline)).unwrap();
        session.set_smoothing(1);
        session.set_amplitude(1.0);
        session.set_animation_speed(Some(1.0));
        session.set_emotion("happy", 1.0);
        let handle = start_push(&mut session);

        // RMS of a 0.5 sine ≈ 0.354; happy contributes mouthOpen 0.2.
        handle.push(&tone(500.0, 0.5));
        session.tick_once();
        let open = weight_of(session.output(), MOUTH_OPEN);
        assert!((open - 0.554).abs() < 0.01, "mouthOpen = {}", open);
    }

    #[test]
    fn test_numerical_fault_keeps_previous_weights() {
        let mut session = AvatarSession::new(fast_config(ExecutionStrategy::Inline)).unwrap();
        let faults = collect_faults(&session);
        let handle = start_push(&mut session);

        handle.push(&tone(300.0, 0.4));
        session.tick_once();
        let before = session.output().to_vec();

        let mut bad = tone(300.0, 0.4);
        bad[100] = f32::INFINITY;
        handle.push(&bad);
        session.tick_once();

        assert_eq!(session.output(), before.as_slice());
        assert_eq!(
            *faults.lock().unwrap(),
            vec![PipelineFault::NumericalFault { sequence: 1 }]
        );
        assert_eq!(session.meters().numerical_faults(), 1);
    }

    #[test]
    fn test_unknown_emotion_publishes_fault() {
        let mut session = AvatarSession::new(fast_config(ExecutionStrategy::Inline)).unwrap();
        let faults = collect_faults(&session);
        assert!(!session.set_emotion("smug", 1.0));
        assert_eq!(session.animator().emotion(), "neutral");
        assert_eq!(
            *faults.lock().unwrap(),
            vec![PipelineFault::UnknownEmotion {
                label: "smug".into()
            }]
        );
    }

    #[test]
    fn test_every_published_weight_is_in_range() {
        let mut session = AvatarSession::new(fast_config(ExecutionStrategy::Inline)).unwrap();
        let seen = Arc::new(Mutex::new(0usize));
        let counter = seen.clone();
        session.on_blend_shapes(move |shapes: &[BlendShape]| {
            for s in shapes {
                assert!((0.0..=1.0).contains(&s.value));
            }
            *counter.lock().unwrap() += 1;
        });
        session.set_sensitivity(40.0);
        session.set_amplitude(40.0);
        session.set_emotion("surprise", 1.0);
        let handle = start_push(&mut session);

        for f in [200.0, 800.0, 3000.0] {
            handle.push(&tone(f, 0.9));
            session.tick_once();
        }
        let ticks = session.run_until_settled();
        assert_eq!(*seen.lock().unwrap(), 3 + ticks);
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = AvatarSession::new(fast_config(ExecutionStrategy::Inline)).unwrap();
        let mut b = AvatarSession::new(fast_config(ExecutionStrategy::Inline)).unwrap();
        a.set_emotion("angry", 1.0);
        b.set_emotion("sad", 1.0);
        a.run_until_settled();
        b.run_until_settled();
        assert!(weight_of(a.output(), "browDown") > 0.0);
        assert_eq!(weight_of(b.output(), "browDown"), 0.0);
        assert!(weight_of(b.output(), "mouthFrown") > 0.0);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let mut session = AvatarSession::new(fast_config(ExecutionStrategy::Inline)).unwrap();
        start_push(&mut session);
        let again = session.start_lip_sync(Box::new(PushSource::new(16_000)));
        assert!(matches!(again, Err(CaptureError::AlreadyRunning)));
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let result = AvatarSession::new(AvatarConfig {
            frame_size: 0,
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "frame_size",
                ..
            })
        ));
    }
}

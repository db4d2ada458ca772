//! Per-session heart-rate state machine.
//!
//! Frames are ingested one at a time; spectral estimation runs only once
//! the window is full and then every `calc_interval` samples. A face lost
//! for longer than `max_no_face_frames` consecutive frames discards the
//! window and the cached estimate.

use thiserror::Error;

use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::session::domain::engine_config::{ConfigError, EngineConfig};
use crate::shared::frame::Frame;
use crate::signal::domain::pulse_estimator::PulseEstimator;
use crate::signal::domain::region_extractor::RegionExtractor;
use crate::signal::domain::signal_buffer::SignalBuffer;
use crate::signal::domain::spectral_estimator::SpectralEstimator;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("landmark detection failed: {0}")]
    Detector(String),
    #[error("session '{0}' is unusable after a panic in another worker")]
    Poisoned(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Window not yet full; no estimation attempted.
    WarmingUp,
    /// Window full; estimating every `calc_interval` samples.
    Tracking,
    /// The most recent frame(s) had no face; the window is kept until the
    /// face-loss threshold is crossed.
    FaceLost,
}

pub struct HeartRateEngine {
    config: EngineConfig,
    detector: Box<dyn LandmarkDetector>,
    extractor: RegionExtractor,
    estimator: Box<dyn PulseEstimator>,
    buffer: SignalBuffer,
    frame_counter: usize,
    consecutive_no_face_frames: usize,
    last_estimate: Option<f64>,
}

impl HeartRateEngine {
    pub fn new(config: EngineConfig, detector: Box<dyn LandmarkDetector>) -> Result<Self, ConfigError> {
        let estimator = SpectralEstimator::new(config.low_hz, config.high_hz, config.min_bpm, config.max_bpm);
        Self::with_estimator(config, detector, Box::new(estimator))
    }

    pub fn with_estimator(
        config: EngineConfig,
        detector: Box<dyn LandmarkDetector>,
        estimator: Box<dyn PulseEstimator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            extractor: RegionExtractor::new(config.roi_indices.clone()),
            buffer: SignalBuffer::new(config.buffer_size),
            config,
            detector,
            estimator,
            frame_counter: 0,
            consecutive_no_face_frames: 0,
            last_estimate: None,
        })
    }

    /// Ingests one frame and returns the current estimate in BPM.
    ///
    /// `None` as input models an undecodable frame: nothing changes and the
    /// cached estimate is returned. Only a failing detector is an error.
    pub fn process_frame(&mut self, frame: Option<&Frame>) -> Result<Option<f64>, EngineError> {
        let Some(frame) = frame else {
            return Ok(self.last_estimate);
        };

        let mesh = self
            .detector
            .detect(frame)
            .map_err(|e| EngineError::Detector(e.to_string()))?;
        let sample = self.extractor.extract(frame, mesh.as_ref());
        Ok(self.process_sample(sample))
    }

    /// Advances the state machine with an already extracted ROI sample.
    ///
    /// `None` means no face was found in the frame.
    pub fn process_sample(&mut self, sample: Option<f64>) -> Option<f64> {
        let Some(sample) = sample else {
            self.on_face_missing();
            return self.last_estimate;
        };

        if self.consecutive_no_face_frames > 0 {
            log::debug!(
                "Face reacquired after {} frame(s)",
                self.consecutive_no_face_frames
            );
        }
        self.consecutive_no_face_frames = 0;
        self.buffer.push(sample);
        self.frame_counter += 1;

        if !self.buffer.is_full() {
            return self.last_estimate;
        }

        if self.frame_counter % self.config.calc_interval == 0 {
            match self.estimator.estimate(&self.buffer.snapshot(), self.config.fps) {
                Some(bpm) => {
                    if self.last_estimate.is_none() {
                        log::debug!("First estimate after {} samples: {bpm:.1} BPM", self.frame_counter);
                    }
                    self.last_estimate = Some(bpm);
                }
                None => log::trace!("Window at sample {} gave no valid estimate", self.frame_counter),
            }
        }

        self.last_estimate
    }

    fn on_face_missing(&mut self) {
        self.consecutive_no_face_frames += 1;
        if self.consecutive_no_face_frames > self.config.max_no_face_frames {
            log::debug!(
                "Face lost for {} frames, discarding {} buffered samples",
                self.consecutive_no_face_frames,
                self.buffer.len()
            );
            self.buffer.clear();
            self.last_estimate = None;
            self.consecutive_no_face_frames = 0;
        }
    }

    /// Discards all signal state, as if the engine had just been created.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.frame_counter = 0;
        self.consecutive_no_face_frames = 0;
        self.last_estimate = None;
    }

    pub fn state(&self) -> EngineState {
        if self.consecutive_no_face_frames > 0 {
            EngineState::FaceLost
        } else if self.buffer.is_full() {
            EngineState::Tracking
        } else {
            EngineState::WarmingUp
        }
    }

    pub fn last_estimate(&self) -> Option<f64> {
        self.last_estimate
    }

    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    pub fn frame_counter(&self) -> usize {
        self.frame_counter
    }

    pub fn consecutive_no_face_frames(&self) -> usize {
        self.consecutive_no_face_frames
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_mesh::FaceMesh;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::f64::consts::PI;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Detector that always finds the same full-frame quad.
    struct FullFrameDetector;

    impl LandmarkDetector for FullFrameDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<FaceMesh>, Box<dyn std::error::Error>> {
            Ok(Some(FaceMesh::new(vec![(0.0, 0.0), (0.9, 0.0), (0.9, 0.9), (0.0, 0.9)])))
        }
    }

    struct NoFaceDetector;

    impl LandmarkDetector for NoFaceDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<FaceMesh>, Box<dyn std::error::Error>> {
            Ok(None)
        }
    }

    struct BrokenDetector;

    impl LandmarkDetector for BrokenDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<FaceMesh>, Box<dyn std::error::Error>> {
            Err("model crashed".into())
        }
    }

    /// Returns scripted results in order (repeating the last one) and
    /// counts calls.
    struct ScriptedEstimator {
        results: RefCell<VecDeque<Option<f64>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedEstimator {
        fn new(results: Vec<Option<f64>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    results: RefCell::new(results.into()),
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl PulseEstimator for ScriptedEstimator {
        fn estimate(&self, _samples: &[f64], _sample_rate_hz: f64) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.borrow_mut();
            if results.len() > 1 {
                results.pop_front().flatten()
            } else {
                results.front().copied().flatten()
            }
        }
    }

    fn small_config() -> EngineConfig {
        EngineConfig {
            buffer_size: 20,
            calc_interval: 5,
            max_no_face_frames: 3,
            roi_indices: vec![0, 1, 2, 3],
            ..EngineConfig::default()
        }
    }

    fn scripted_engine(config: EngineConfig, results: Vec<Option<f64>>) -> (HeartRateEngine, Arc<AtomicUsize>) {
        let (estimator, calls) = ScriptedEstimator::new(results);
        let engine =
            HeartRateEngine::with_estimator(config, Box::new(FullFrameDetector), Box::new(estimator))
                .unwrap();
        (engine, calls)
    }

    fn frame(green: u8) -> Frame {
        let mut data = Vec::with_capacity(10 * 10 * 3);
        for _ in 0..100 {
            data.extend_from_slice(&[0, green, 0]);
        }
        Frame::new(data, 10, 10, 3, 0)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            calc_interval: 0,
            ..EngineConfig::default()
        };
        assert!(HeartRateEngine::new(config, Box::new(FullFrameDetector)).is_err());
    }

    // ── warm-up ──────────────────────────────────────────────────────

    #[test]
    fn test_no_estimate_before_buffer_full() {
        let (mut engine, calls) = scripted_engine(small_config(), vec![Some(70.0)]);
        for i in 0..19 {
            assert_eq!(engine.process_sample(Some(i as f64)), None);
            assert_eq!(engine.state(), EngineState::WarmingUp);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_estimate_on_sample_that_fills_buffer() {
        let (mut engine, calls) = scripted_engine(small_config(), vec![Some(70.0)]);
        for i in 0..19 {
            engine.process_sample(Some(i as f64));
        }
        assert_eq!(engine.process_sample(Some(19.0)), Some(70.0));
        assert_eq!(engine.state(), EngineState::Tracking);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recomputes_only_every_calc_interval() {
        let (mut engine, calls) = scripted_engine(small_config(), vec![Some(70.0)]);
        for i in 0..20 {
            engine.process_sample(Some(i as f64));
        }
        for i in 0..14 {
            engine.process_sample(Some(i as f64));
        }
        // Ticks at samples 20, 25, 30.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    // ── stability ────────────────────────────────────────────────────

    #[test]
    fn test_invalid_window_keeps_previous_estimate() {
        let (mut engine, _) = scripted_engine(small_config(), vec![Some(72.0), None]);
        for i in 0..20 {
            engine.process_sample(Some(i as f64));
        }
        assert_eq!(engine.last_estimate(), Some(72.0));

        for i in 0..5 {
            assert_eq!(engine.process_sample(Some(i as f64)), Some(72.0));
        }
        assert_eq!(engine.last_estimate(), Some(72.0));
    }

    #[test]
    fn test_new_valid_estimate_overwrites() {
        let (mut engine, _) = scripted_engine(small_config(), vec![Some(72.0), Some(80.0)]);
        for i in 0..25 {
            engine.process_sample(Some(i as f64));
        }
        assert_eq!(engine.last_estimate(), Some(80.0));
    }

    // ── face loss ────────────────────────────────────────────────────

    #[test]
    fn test_face_loss_beyond_threshold_clears_everything() {
        let (mut engine, _) = scripted_engine(small_config(), vec![Some(72.0)]);
        for i in 0..20 {
            engine.process_sample(Some(i as f64));
        }

        for _ in 0..3 {
            assert_eq!(engine.process_sample(None), Some(72.0));
            assert_eq!(engine.state(), EngineState::FaceLost);
        }
        assert_eq!(engine.buffered_samples(), 20);

        assert_eq!(engine.process_sample(None), None);
        assert_eq!(engine.buffered_samples(), 0);
        assert_eq!(engine.consecutive_no_face_frames(), 0);
        assert_eq!(engine.state(), EngineState::WarmingUp);
    }

    #[test]
    fn test_short_face_loss_keeps_buffer() {
        let (mut engine, _) = scripted_engine(small_config(), vec![Some(72.0)]);
        for i in 0..20 {
            engine.process_sample(Some(i as f64));
        }
        for _ in 0..2 {
            engine.process_sample(None);
        }
        assert_eq!(engine.process_sample(Some(1.0)), Some(72.0));
        assert_eq!(engine.buffered_samples(), 20);
        assert_eq!(engine.consecutive_no_face_frames(), 0);
        assert_eq!(engine.state(), EngineState::Tracking);
    }

    #[test]
    fn test_face_loss_counter_resets_on_face() {
        let (mut engine, _) = scripted_engine(small_config(), vec![Some(72.0)]);
        for i in 0..20 {
            engine.process_sample(Some(i as f64));
        }
        // Interleaved losses never accumulate past the threshold.
        for _ in 0..10 {
            engine.process_sample(None);
            engine.process_sample(None);
            engine.process_sample(None);
            engine.process_sample(Some(1.0));
        }
        assert_eq!(engine.last_estimate(), Some(72.0));
        assert_eq!(engine.buffered_samples(), 20);
    }

    #[test]
    fn test_refills_after_face_loss() {
        let (mut engine, _) = scripted_engine(small_config(), vec![Some(72.0)]);
        for i in 0..20 {
            engine.process_sample(Some(i as f64));
        }
        for _ in 0..4 {
            engine.process_sample(None);
        }
        for i in 0..19 {
            assert_eq!(engine.process_sample(Some(i as f64)), None);
        }
        // Buffer is full again, but the tick depends on the running counter
        // (20 + 20 = 40 is a multiple of 5).
        assert_eq!(engine.process_sample(Some(0.0)), Some(72.0));
    }

    // ── frames ───────────────────────────────────────────────────────

    #[test]
    fn test_missing_frame_is_a_no_op() {
        let (mut engine, _) = scripted_engine(small_config(), vec![Some(72.0)]);
        for _ in 0..20 {
            engine.process_frame(Some(&frame(100))).unwrap();
        }
        let before = (engine.frame_counter(), engine.buffered_samples());

        assert_eq!(engine.process_frame(None).unwrap(), Some(72.0));
        assert_eq!((engine.frame_counter(), engine.buffered_samples()), before);
        assert_eq!(engine.consecutive_no_face_frames(), 0);
    }

    #[test]
    fn test_frame_without_face_counts_as_loss() {
        let mut engine = HeartRateEngine::new(small_config(), Box::new(NoFaceDetector)).unwrap();
        assert_eq!(engine.process_frame(Some(&frame(100))).unwrap(), None);
        assert_eq!(engine.consecutive_no_face_frames(), 1);
        assert_eq!(engine.buffered_samples(), 0);
    }

    #[test]
    fn test_frame_with_face_buffers_one_sample() {
        let (mut engine, _) = scripted_engine(small_config(), vec![None]);
        engine.process_frame(Some(&frame(123))).unwrap();
        assert_eq!(engine.buffered_samples(), 1);
        assert_eq!(engine.frame_counter(), 1);
    }

    #[test]
    fn test_detector_failure_propagates() {
        let mut engine = HeartRateEngine::new(small_config(), Box::new(BrokenDetector)).unwrap();
        let err = engine.process_frame(Some(&frame(100))).unwrap_err();
        assert!(matches!(err, EngineError::Detector(ref m) if m == "model crashed"));
        assert_eq!(engine.consecutive_no_face_frames(), 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let (mut engine, _) = scripted_engine(small_config(), vec![Some(72.0)]);
        for i in 0..20 {
            engine.process_sample(Some(i as f64));
        }
        engine.reset();
        assert_eq!(engine.last_estimate(), None);
        assert_eq!(engine.buffered_samples(), 0);
        assert_eq!(engine.frame_counter(), 0);
        assert_eq!(engine.state(), EngineState::WarmingUp);
    }

    // ── spectral end to end ──────────────────────────────────────────

    #[test]
    fn test_sinusoidal_signal_converges_to_rate() {
        let config = EngineConfig {
            roi_indices: vec![0, 1, 2, 3],
            ..EngineConfig::default()
        };
        let mut engine = HeartRateEngine::new(config, Box::new(FullFrameDetector)).unwrap();
        let sample = |i: usize| 120.0 + 1.5 * (2.0 * PI * 1.0 * i as f64 / 30.0).sin();

        for i in 0..299 {
            assert_eq!(engine.process_sample(Some(sample(i))), None);
        }
        for i in 299..420 {
            let bpm = engine.process_sample(Some(sample(i))).unwrap();
            assert_relative_eq!(bpm, 60.0, epsilon = 3.0);
        }
    }
}

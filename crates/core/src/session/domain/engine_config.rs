use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    BAND_PASS_ORDER, DEFAULT_BUFFER_SIZE, DEFAULT_CALC_INTERVAL, DEFAULT_FPS,
    DEFAULT_MAX_NO_FACE_FRAMES, FOREHEAD_LANDMARKS, MAX_PLAUSIBLE_BPM, MIN_PLAUSIBLE_BPM,
    PULSE_BAND_HIGH_HZ, PULSE_BAND_LOW_HZ,
};
use crate::signal::domain::band_pass::{BandPassFilter, FilterDesignError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("buffer size {size} too small, need more than {min} samples")]
    BufferSize { size: usize, min: usize },
    #[error("fps must be positive, got {0}")]
    Fps(f64),
    #[error("calc interval must be at least 1")]
    CalcInterval,
    #[error("invalid pulse band: {0}")]
    Band(#[from] FilterDesignError),
    #[error("BPM range {min}-{max} is empty")]
    BpmRange { min: f64, max: f64 },
    #[error("ROI needs at least one landmark index")]
    EmptyRoi,
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tuning knobs for one [`HeartRateEngine`](super::engine::HeartRateEngine).
///
/// Missing fields in a JSON config fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples per analysis window.
    pub buffer_size: usize,
    /// Expected frame rate; also the sample rate of the pulse signal.
    pub fps: f64,
    /// Re-estimate every N ingested samples once the window is full.
    pub calc_interval: usize,
    /// Face-less frames tolerated before the window is discarded.
    pub max_no_face_frames: usize,
    pub low_hz: f64,
    pub high_hz: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Landmark indices outlining the sampled region.
    pub roi_indices: Vec<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            fps: DEFAULT_FPS,
            calc_interval: DEFAULT_CALC_INTERVAL,
            max_no_face_frames: DEFAULT_MAX_NO_FACE_FRAMES,
            low_hz: PULSE_BAND_LOW_HZ,
            high_hz: PULSE_BAND_HIGH_HZ,
            min_bpm: MIN_PLAUSIBLE_BPM,
            max_bpm: MAX_PLAUSIBLE_BPM,
            roi_indices: FOREHEAD_LANDMARKS.to_vec(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps.is_nan() || self.fps <= 0.0 {
            return Err(ConfigError::Fps(self.fps));
        }
        if self.calc_interval == 0 {
            return Err(ConfigError::CalcInterval);
        }
        let filter = BandPassFilter::butterworth(BAND_PASS_ORDER, self.low_hz, self.high_hz, self.fps)?;
        if self.buffer_size <= filter.pad_len() {
            return Err(ConfigError::BufferSize {
                size: self.buffer_size,
                min: filter.pad_len(),
            });
        }
        if self.min_bpm.is_nan() || self.max_bpm.is_nan() || self.min_bpm > self.max_bpm {
            return Err(ConfigError::BpmRange {
                min: self.min_bpm,
                max: self.max_bpm,
            });
        }
        if self.roi_indices.is_empty() {
            return Err(ConfigError::EmptyRoi);
        }
        Ok(())
    }
}

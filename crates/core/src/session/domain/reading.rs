use serde::{Deserialize, Serialize};

/// One reply per processed frame. Serializes as `{"bpm": 72.0}` or
/// `{"bpm": null}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub bpm: Option<f64>,
}

impl Reading {
    pub fn new(bpm: Option<f64>) -> Self {
        Self { bpm }
    }
}

/// Persists heart-rate readings. Only called with an actual value.
pub trait ReadingSink: Send + Sync {
    fn record(&self, token: &str, bpm: f64) -> Result<(), Box<dyn std::error::Error>>;
}

/// Discards everything.
pub struct NullReadingSink;

impl ReadingSink for NullReadingSink {
    fn record(&self, _token: &str, _bpm: f64) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

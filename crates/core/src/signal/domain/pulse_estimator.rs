/// Domain interface for turning a full window of pulse samples into a
/// heart-rate estimate.
///
/// `None` means the window produced no trustworthy estimate. Implementations
/// must be pure: the same samples always yield the same result.
pub trait PulseEstimator: Send {
    fn estimate(&self, samples: &[f64], sample_rate_hz: f64) -> Option<f64>;
}

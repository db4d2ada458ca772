//! Dominant-frequency heart-rate estimation.
//!
//! Fixed stage order: detrend -> band-pass -> spectrum -> peak -> BPM ->
//! plausibility gate. Each stage is a free function over an explicit
//! intermediate type so it can be exercised on its own.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::shared::constants::{
    BAND_PASS_ORDER, MAX_PLAUSIBLE_BPM, MIN_PLAUSIBLE_BPM, PULSE_BAND_HIGH_HZ, PULSE_BAND_LOW_HZ,
};
use crate::signal::domain::band_pass::BandPassFilter;
use crate::signal::domain::pulse_estimator::PulseEstimator;

/// Samples with their arithmetic mean removed.
#[derive(Clone, Debug, PartialEq)]
pub struct Detrended(Vec<f64>);

impl Detrended {
    pub fn samples(&self) -> &[f64] {
        &self.0
    }
}

/// Band-limited, zero-phase filtered samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Filtered(Vec<f64>);

impl Filtered {
    pub fn samples(&self) -> &[f64] {
        &self.0
    }
}

/// Magnitudes of the non-negative frequency bins of a real-input DFT.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    magnitudes: Vec<f64>,
    bin_hz: f64,
    len: usize,
    sample_rate_hz: f64,
}

impl Spectrum {
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate_hz / self.len as f64
    }

    /// Frequency resolution in Hz.
    pub fn bin_hz(&self) -> f64 {
        self.bin_hz
    }

    /// Strongest bin inside `[low_hz, high_hz]`, lowest frequency on ties.
    ///
    /// `None` when the band holds no bin, when the in-band peak carries no
    /// energy, or when a bin outside the band (DC excluded) is stronger than
    /// every bin inside it.
    pub fn dominant_frequency(&self, low_hz: f64, high_hz: f64) -> Option<f64> {
        let in_band = |bin: usize| {
            let f = self.frequency(bin);
            f >= low_hz && f <= high_hz
        };

        let mut peak: Option<(usize, f64)> = None;
        for (bin, &mag) in self.magnitudes.iter().enumerate() {
            if !in_band(bin) || !mag.is_finite() {
                continue;
            }
            match peak {
                Some((_, best)) if mag <= best => {}
                _ => peak = Some((bin, mag)),
            }
        }

        let (bin, mag) = peak?;
        if mag <= 0.0 {
            return None;
        }

        let outshone = self
            .magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .any(|(b, &m)| !in_band(b) && m > mag);
        if outshone {
            return None;
        }

        Some(self.frequency(bin))
    }
}

pub fn detrend(samples: &[f64]) -> Detrended {
    if samples.is_empty() {
        return Detrended(Vec::new());
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    Detrended(samples.iter().map(|s| s - mean).collect())
}

pub fn band_pass(signal: &Detrended, filter: &BandPassFilter) -> Option<Filtered> {
    filter.filtfilt(signal.samples()).map(Filtered)
}

pub fn spectrum(signal: &Filtered, sample_rate_hz: f64) -> Spectrum {
    let n = signal.samples().len();
    let mut buf: Vec<Complex<f64>> = signal
        .samples()
        .iter()
        .map(|&s| Complex::new(s, 0.0))
        .collect();

    if n > 0 {
        let mut planner = FftPlanner::<f64>::new();
        planner.plan_fft_forward(n).process(&mut buf);
    }

    let magnitudes = buf.iter().take(n / 2 + 1).map(|c| c.norm()).collect();
    Spectrum {
        magnitudes,
        bin_hz: if n > 0 { sample_rate_hz / n as f64 } else { 0.0 },
        len: n.max(1),
        sample_rate_hz,
    }
}

pub fn to_bpm(frequency_hz: f64) -> f64 {
    frequency_hz * 60.0
}

/// Keeps `bpm` only if it lies within `[min_bpm, max_bpm]`.
pub fn gate(bpm: f64, min_bpm: f64, max_bpm: f64) -> Option<f64> {
    (min_bpm..=max_bpm).contains(&bpm).then_some(bpm)
}

/// Band-pass + FFT peak estimator with a plausibility gate.
#[derive(Clone, Debug)]
pub struct SpectralEstimator {
    low_hz: f64,
    high_hz: f64,
    min_bpm: f64,
    max_bpm: f64,
}

impl SpectralEstimator {
    pub fn new(low_hz: f64, high_hz: f64, min_bpm: f64, max_bpm: f64) -> Self {
        Self {
            low_hz,
            high_hz,
            min_bpm,
            max_bpm,
        }
    }
}

impl Default for SpectralEstimator {
    fn default() -> Self {
        Self::new(
            PULSE_BAND_LOW_HZ,
            PULSE_BAND_HIGH_HZ,
            MIN_PLAUSIBLE_BPM,
            MAX_PLAUSIBLE_BPM,
        )
    }
}

impl PulseEstimator for SpectralEstimator {
    fn estimate(&self, samples: &[f64], sample_rate_hz: f64) -> Option<f64> {
        let filter =
            match BandPassFilter::butterworth(BAND_PASS_ORDER, self.low_hz, self.high_hz, sample_rate_hz) {
                Ok(filter) => filter,
                Err(e) => {
                    log::warn!("Cannot design pulse filter: {e}");
                    return None;
                }
            };

        let detrended = detrend(samples);
        let filtered = band_pass(&detrended, &filter)?;
        let spectrum = spectrum(&filtered, sample_rate_hz);
        let frequency = spectrum.dominant_frequency(self.low_hz, self.high_hz)?;
        let bpm = to_bpm(frequency);
        log::trace!("Spectral peak at {frequency:.3} Hz ({bpm:.1} BPM)");
        gate(bpm, self.min_bpm, self.max_bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::f64::consts::PI;

    const FS: f64 = 30.0;

    fn sine(freq_hz: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 2.0 * (2.0 * PI * freq_hz * i as f64 / FS).sin())
            .collect()
    }

    fn spectrum_of(magnitudes: Vec<f64>, sample_rate_hz: f64, len: usize) -> Spectrum {
        Spectrum {
            magnitudes,
            bin_hz: sample_rate_hz / len as f64,
            len,
            sample_rate_hz,
        }
    }

    // ── detrend ──────────────────────────────────────────────────────

    #[test]
    fn test_detrend_removes_mean() {
        let d = detrend(&[1.0, 2.0, 3.0, 6.0]);
        assert_eq!(d.samples(), &[-2.0, -1.0, 0.0, 3.0]);
        assert_relative_eq!(d.samples().iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn test_detrend_empty() {
        assert!(detrend(&[]).samples().is_empty());
    }

    // ── spectrum ─────────────────────────────────────────────────────

    #[test]
    fn test_spectrum_bins_and_resolution() {
        let filtered = Filtered(vec![0.0; 300]);
        let s = spectrum(&filtered, FS);
        assert_eq!(s.magnitudes().len(), 151);
        assert_relative_eq!(s.bin_hz(), 0.1);
        assert_eq!(s.frequency(7), 0.7);
        assert_eq!(s.frequency(40), 4.0);
    }

    #[test]
    fn test_spectrum_of_pure_tone_peaks_at_tone_bin() {
        let tone: Vec<f64> = (0..300)
            .map(|i| (2.0 * PI * 1.2 * i as f64 / FS).sin())
            .collect();
        let s = spectrum(&Filtered(tone), FS);
        let peak = s
            .magnitudes()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 12);
        assert_relative_eq!(s.magnitudes()[12], 150.0, epsilon = 1e-6);
    }

    // ── peak selection ───────────────────────────────────────────────

    #[test]
    fn test_peak_restricted_to_band() {
        // bins at 0.0, 0.5, 1.0, 1.5, 2.0 ... Hz
        let s = spectrum_of(vec![0.0, 1.0, 5.0, 3.0, 1.0], 5.0, 10);
        assert_eq!(s.dominant_frequency(0.7, 4.0), Some(1.0));
    }

    #[test]
    fn test_peak_tie_prefers_lowest_frequency() {
        let s = spectrum_of(vec![0.0, 0.0, 4.0, 4.0, 4.0, 1.0], 5.0, 10);
        assert_eq!(s.dominant_frequency(0.7, 4.0), Some(1.0));
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        // 0.5 Hz bins, band [1.0, 2.0]
        let low_edge = spectrum_of(vec![0.0, 0.0, 9.0, 1.0, 1.0, 0.0], 5.0, 10);
        let high_edge = spectrum_of(vec![0.0, 0.0, 1.0, 1.0, 9.0, 0.0], 5.0, 10);
        assert_eq!(low_edge.dominant_frequency(1.0, 2.0), Some(1.0));
        assert_eq!(high_edge.dominant_frequency(1.0, 2.0), Some(2.0));
    }

    #[test]
    fn test_no_bin_in_band_is_none() {
        // 1 Hz bins: 0, 1, 2 Hz; band strictly between bins
        let s = spectrum_of(vec![0.0, 3.0, 2.0], 4.0, 4);
        assert_eq!(s.dominant_frequency(1.2, 1.8), None);
    }

    #[test]
    fn test_silent_band_is_none() {
        let s = spectrum_of(vec![0.0; 6], 5.0, 10);
        assert_eq!(s.dominant_frequency(0.7, 2.0), None);
    }

    #[test]
    fn test_stronger_out_of_band_bin_is_none() {
        let s = spectrum_of(vec![0.0, 0.0, 2.0, 1.0, 1.0, 8.0], 5.0, 10);
        assert_eq!(s.dominant_frequency(0.7, 2.0), None);
    }

    #[test]
    fn test_dc_bin_does_not_outshine_band() {
        let s = spectrum_of(vec![50.0, 0.0, 2.0, 1.0, 1.0, 0.5], 5.0, 10);
        assert_eq!(s.dominant_frequency(0.7, 2.0), Some(1.0));
    }

    #[test]
    fn test_non_finite_magnitudes_are_skipped() {
        let s = spectrum_of(vec![0.0, 0.0, f64::NAN, 3.0, 1.0, 0.0], 5.0, 10);
        assert_eq!(s.dominant_frequency(0.7, 2.0), Some(1.5));
    }

    // ── conversion and gate ──────────────────────────────────────────

    #[test]
    fn test_to_bpm() {
        assert_relative_eq!(to_bpm(1.2), 72.0, epsilon = 1e-9);
    }

    #[rstest]
    #[case::low_edge(40.0, Some(40.0))]
    #[case::high_edge(200.0, Some(200.0))]
    #[case::typical(72.0, Some(72.0))]
    #[case::too_slow(39.9, None)]
    #[case::too_fast(210.0, None)]
    fn test_gate(#[case] bpm: f64, #[case] expected: Option<f64>) {
        assert_eq!(gate(bpm, 40.0, 200.0), expected);
    }

    // ── full estimator ───────────────────────────────────────────────

    #[rstest]
    #[case::resting(1.2, 72.0)]
    #[case::slow(1.0, 60.0)]
    #[case::elevated(2.0, 120.0)]
    fn test_estimates_in_band_sinusoid(#[case] freq_hz: f64, #[case] expected_bpm: f64) {
        let bpm = SpectralEstimator::default()
            .estimate(&sine(freq_hz, 300), FS)
            .unwrap();
        assert_relative_eq!(bpm, expected_bpm, epsilon = 2.0);
    }

    #[test]
    fn test_out_of_band_sinusoid_is_invalid() {
        assert!(SpectralEstimator::default()
            .estimate(&sine(5.0, 300), FS)
            .is_none());
    }

    #[test]
    fn test_in_band_but_implausible_rate_is_invalid() {
        // 3.5 Hz = 210 BPM passes the filter band but fails the gate.
        assert!(SpectralEstimator::default()
            .estimate(&sine(3.5, 300), FS)
            .is_none());
    }

    #[test]
    fn test_constant_signal_is_invalid() {
        assert!(SpectralEstimator::default()
            .estimate(&[128.0; 300], FS)
            .is_none());
    }

    #[test]
    fn test_too_short_window_is_invalid() {
        assert!(SpectralEstimator::default()
            .estimate(&sine(1.2, 10), FS)
            .is_none());
    }

    #[test]
    fn test_unusable_sample_rate_is_invalid() {
        // Nyquist below the upper band edge.
        assert!(SpectralEstimator::default()
            .estimate(&sine(1.2, 300), 6.0)
            .is_none());
    }

    #[test]
    fn test_estimate_is_bit_identical_across_runs() {
        let samples: Vec<f64> = sine(1.3, 300)
            .iter()
            .enumerate()
            .map(|(i, s)| s + ((i * 7919) % 13) as f64 * 0.05)
            .collect();
        let estimator = SpectralEstimator::default();
        let a = estimator.estimate(&samples, FS);
        let b = estimator.estimate(&samples, FS);
        assert_eq!(a.map(f64::to_bits), b.map(f64::to_bits));
    }
}

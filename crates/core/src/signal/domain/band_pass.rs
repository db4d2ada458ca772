//! Butterworth band-pass design and zero-phase filtering.
//!
//! Design follows the classic route: analog Butterworth prototype, low-pass
//! to band-pass transform, then the bilinear transform with prewarped
//! cutoffs. Application runs the filter forward and backward over an
//! odd-extended signal with steady-state initial conditions, so the output
//! has no phase shift and minimal edge transients.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterDesignError {
    #[error("filter order must be at least 1")]
    ZeroOrder,
    #[error("sample rate must be positive, got {0}")]
    SampleRate(f64),
    #[error("band {low_hz}-{high_hz} Hz is not inside (0, {nyquist_hz}) Hz")]
    Band {
        low_hz: f64,
        high_hz: f64,
        nyquist_hz: f64,
    },
}

/// Transfer function `b(z) / a(z)` with `a[0] == 1`.
#[derive(Clone, Debug)]
pub struct BandPassFilter {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl BandPassFilter {
    /// Digital Butterworth band-pass of the given prototype order.
    ///
    /// The resulting transfer function has order `2 * order`.
    pub fn butterworth(
        order: usize,
        low_hz: f64,
        high_hz: f64,
        sample_rate_hz: f64,
    ) -> Result<Self, FilterDesignError> {
        if order == 0 {
            return Err(FilterDesignError::ZeroOrder);
        }
        if sample_rate_hz.is_nan() || sample_rate_hz <= 0.0 {
            return Err(FilterDesignError::SampleRate(sample_rate_hz));
        }
        let nyquist_hz = sample_rate_hz / 2.0;
        if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist_hz) {
            return Err(FilterDesignError::Band {
                low_hz,
                high_hz,
                nyquist_hz,
            });
        }

        // Work in the normalized domain where Nyquist = 1 and fs = 2.
        let fs = 2.0;
        let warp = |wn: f64| 2.0 * fs * (PI * wn / fs).tan();
        let w_low = warp(low_hz / nyquist_hz);
        let w_high = warp(high_hz / nyquist_hz);
        let bandwidth = w_high - w_low;
        let center_sq = w_low * w_high;

        // Analog prototype poles on the left half of the unit circle.
        let prototype: Vec<Complex<f64>> = (0..order)
            .map(|k| {
                let m = (2 * k) as f64 - (order as f64 - 1.0);
                -Complex::from_polar(1.0, PI * m / (2.0 * order as f64))
            })
            .collect();

        // Each low-pass pole splits into two band-pass poles.
        let mut analog_poles = Vec::with_capacity(2 * order);
        for &p in &prototype {
            let scaled = p * (bandwidth / 2.0);
            let root = (scaled * scaled - Complex::new(center_sq, 0.0)).sqrt();
            analog_poles.push(scaled + root);
        }
        for &p in &prototype {
            let scaled = p * (bandwidth / 2.0);
            let root = (scaled * scaled - Complex::new(center_sq, 0.0)).sqrt();
            analog_poles.push(scaled - root);
        }
        let analog_gain = bandwidth.powi(order as i32);

        // Bilinear transform. `order` zeros at s=0 land on z=1, the `order`
        // zeros at infinity land on z=-1.
        let fs2 = Complex::new(2.0 * fs, 0.0);
        let digital_poles: Vec<Complex<f64>> =
            analog_poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
        let mut digital_zeros = vec![Complex::new(1.0, 0.0); order];
        digital_zeros.extend(std::iter::repeat(Complex::new(-1.0, 0.0)).take(order));

        let pole_term = analog_poles
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
        let zero_term = fs2.powi(order as i32);
        let gain = analog_gain * (zero_term / pole_term).re;

        let b = poly(&digital_zeros).into_iter().map(|c| gain * c.re).collect();
        let a = poly(&digital_poles).into_iter().map(|c| c.re).collect();
        Ok(Self { b, a })
    }

    pub fn numerator(&self) -> &[f64] {
        &self.b
    }

    pub fn denominator(&self) -> &[f64] {
        &self.a
    }

    /// Edge padding used by [`filtfilt`](Self::filtfilt).
    pub fn pad_len(&self) -> usize {
        3 * self.a.len().max(self.b.len())
    }

    /// Zero-phase forward-backward filtering.
    ///
    /// Returns `None` when the signal is not longer than the edge padding.
    pub fn filtfilt(&self, x: &[f64]) -> Option<Vec<f64>> {
        let pad = self.pad_len();
        if x.len() <= pad {
            return None;
        }

        let extended = odd_extend(x, pad);
        let zi = self.steady_state();

        let forward = self.lfilter(&extended, &scaled(&zi, extended[0]));
        let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
        let backward = self.lfilter(&reversed, &scaled(&zi, reversed[0]));
        reversed = backward.into_iter().rev().collect();

        Some(reversed[pad..reversed.len() - pad].to_vec())
    }

    /// Direct form II transposed with initial state `zi`.
    fn lfilter(&self, x: &[f64], zi: &[f64]) -> Vec<f64> {
        let order = self.a.len() - 1;
        let mut z = zi.to_vec();
        let mut y = Vec::with_capacity(x.len());
        for &xn in x {
            let yn = self.b[0] * xn + z[0];
            for i in 0..order - 1 {
                z[i] = self.b[i + 1] * xn + z[i + 1] - self.a[i + 1] * yn;
            }
            z[order - 1] = self.b[order] * xn - self.a[order] * yn;
            y.push(yn);
        }
        y
    }

    /// Filter state for a unit step input held forever.
    ///
    /// Solves `(I - A^T) zi = b[1..] - a[1..] * b[0]` where `A` is the
    /// companion matrix of `a`.
    fn steady_state(&self) -> Vec<f64> {
        let n = self.a.len() - 1;
        let mut m = vec![vec![0.0; n]; n];
        let mut rhs = vec![0.0; n];
        for i in 0..n {
            m[i][i] += 1.0;
            m[i][0] += self.a[i + 1];
            if i + 1 < n {
                m[i][i + 1] -= 1.0;
            }
            rhs[i] = self.b[i + 1] - self.a[i + 1] * self.b[0];
        }
        solve(m, rhs)
    }
}

/// Polynomial coefficients (highest power first) with the given roots.
fn poly(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for &r in roots {
        let mut next = vec![Complex::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * r;
        }
        coeffs = next;
    }
    coeffs
}

/// Point-symmetric extension by `n` samples on both ends.
fn odd_extend(x: &[f64], n: usize) -> Vec<f64> {
    let first = x[0];
    let last = x[x.len() - 1];
    let mut out = Vec::with_capacity(x.len() + 2 * n);
    out.extend((1..=n).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=n).map(|i| 2.0 * last - x[x.len() - 1 - i]));
    out
}

fn scaled(v: &[f64], k: f64) -> Vec<f64> {
    v.iter().map(|&c| c * k).collect()
}

/// Gaussian elimination with partial pivoting for small dense systems.
fn solve(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Vec<f64> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot);
        rhs.swap(col, pivot);

        let diag = m[col][col];
        if diag.abs() < f64::EPSILON {
            continue;
        }
        for row in col + 1..n {
            let factor = m[row][col] / diag;
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * x[k]).sum();
        let diag = m[row][row];
        x[row] = if diag.abs() < f64::EPSILON {
            0.0
        } else {
            (rhs[row] - tail) / diag
        };
    }
    x
}

//! Per-frame pulse sample from the forehead region.
//!
//! The landmark polygon is rasterized as a filled convex shape (boundary
//! pixels included, clipped to the frame) and the chosen color channel is
//! averaged over the covered pixels only.

use ndarray::s;

use crate::detection::domain::face_mesh::FaceMesh;
use crate::shared::constants::{FOREHEAD_LANDMARKS, PULSE_CHANNEL};
use crate::shared::frame::Frame;

pub struct RegionExtractor {
    roi_indices: Vec<usize>,
    channel: usize,
}

impl RegionExtractor {
    pub fn new(roi_indices: Vec<usize>) -> Self {
        Self {
            roi_indices,
            channel: PULSE_CHANNEL,
        }
    }

    pub fn roi_indices(&self) -> &[usize] {
        &self.roi_indices
    }

    /// Mean channel intensity inside the ROI polygon.
    ///
    /// Returns `None` (no face) when the detector found nothing, when the
    /// mesh lacks one of the ROI indices, or when the polygon covers no
    /// pixel of the frame.
    pub fn extract(&self, frame: &Frame, mesh: Option<&FaceMesh>) -> Option<f64> {
        let mesh = mesh?;
        if (frame.channels() as usize) <= self.channel {
            log::warn!(
                "Frame {} has {} channels, cannot sample channel {}",
                frame.index(),
                frame.channels(),
                self.channel
            );
            return None;
        }

        let polygon = mesh.pixel_polygon(&self.roi_indices, frame.width(), frame.height())?;
        let spans = convex_spans(&polygon, frame.width() as i64, frame.height() as i64);

        let pixels = frame.as_ndarray();
        let mut sum: u64 = 0;
        let mut count: u64 = 0;
        for (row, x0, x1) in spans {
            let line = pixels.slice(s![row, x0..=x1, self.channel]);
            sum += line.iter().map(|&v| v as u64).sum::<u64>();
            count += line.len() as u64;
        }

        if count == 0 {
            return None;
        }
        Some(sum as f64 / count as f64)
    }
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self::new(FOREHEAD_LANDMARKS.to_vec())
    }
}

/// Horizontal pixel spans `(row, first_col, last_col)` covered by a convex
/// polygon, clipped to a `width` x `height` frame.
fn convex_spans(polygon: &[(i64, i64)], width: i64, height: i64) -> Vec<(usize, usize, usize)> {
    if polygon.is_empty() || width <= 0 || height <= 0 {
        return Vec::new();
    }

    let min_y = polygon.iter().map(|p| p.1).min().unwrap_or(0).max(0);
    let max_y = polygon.iter().map(|p| p.1).max().unwrap_or(-1).min(height - 1);

    let mut spans = Vec::new();
    for y in min_y..=max_y {
        let Some((left, right)) = row_extent(polygon, y) else {
            continue;
        };
        let x0 = (left.ceil() as i64).max(0);
        let x1 = (right.floor() as i64).min(width - 1);
        if x0 <= x1 {
            spans.push((y as usize, x0 as usize, x1 as usize));
        }
    }
    spans
}

/// Leftmost and rightmost polygon boundary crossings on row `y`.
fn row_extent(polygon: &[(i64, i64)], y: i64) -> Option<(f64, f64)> {
    let mut left = f64::INFINITY;
    let mut right = f64::NEG_INFINITY;

    let n = polygon.len();
    for i in 0..n {
        let (xa, ya) = polygon[i];
        let (xb, yb) = polygon[(i + 1) % n];
        if y < ya.min(yb) || y > ya.max(yb) {
            continue;
        }
        if ya == yb {
            left = left.min(xa.min(xb) as f64);
            right = right.max(xa.max(xb) as f64);
        } else {
            let t = (y - ya) as f64 / (yb - ya) as f64;
            let x = xa as f64 + t * (xb - xa) as f64;
            left = left.min(x);
            right = right.max(x);
        }
    }

    (left <= right).then_some((left, right))
}

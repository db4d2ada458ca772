//! Dense face landmark set as produced by a face-mesh detector.
//!
//! Points are in normalized image coordinates (`0.0..=1.0` on both axes),
//! which is the convention of MediaPipe Face Mesh. Consumers only rely on
//! index lookup, never on detector internals.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceMesh {
    points: Vec<(f64, f64)>,
}

impl FaceMesh {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<(f64, f64)> {
        self.points.get(index).copied()
    }

    /// Maps the selected landmarks to integer pixel coordinates.
    ///
    /// Coordinates are scaled by the frame size and truncated toward zero.
    /// Returns `None` if any index is out of range for this mesh.
    pub fn pixel_polygon(&self, indices: &[usize], width: u32, height: u32) -> Option<Vec<(i64, i64)>> {
        indices
            .iter()
            .map(|&i| {
                self.point(i)
                    .map(|(x, y)| ((x * width as f64) as i64, (y * height as f64) as i64))
            })
            .collect()
    }
}

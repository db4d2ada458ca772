use std::collections::HashMap;
use std::sync::Arc;

use crate::detection::domain::face_mesh::FaceMesh;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::frame::Frame;

/// Replays pre-computed landmark results by frame index.
///
/// Used for offline measurement where the face mesh was extracted by an
/// external tool beforehand. Frames absent from the cache report no face.
pub struct CachedLandmarkDetector {
    cache: Arc<HashMap<usize, FaceMesh>>,
}

impl CachedLandmarkDetector {
    pub fn new(cache: Arc<HashMap<usize, FaceMesh>>) -> Self {
        Self { cache }
    }
}

impl LandmarkDetector for CachedLandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<FaceMesh>, Box<dyn std::error::Error>> {
        Ok(self.cache.get(&frame.index()).cloned())
    }
}

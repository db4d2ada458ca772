use crate::detection::domain::face_mesh::FaceMesh;
use crate::shared::frame::Frame;

/// Domain interface for face-landmark detection.
///
/// `Ok(None)` means no face in the frame, which is a normal outcome.
/// `Err` is reserved for the detector itself failing. Implementations may
/// be stateful (e.g., tracking across frames), hence `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<FaceMesh>, Box<dyn std::error::Error>>;
}

use std::path::PathBuf;

/// Describes a frame stream opened by a [`FrameSource`](crate::video::domain::frame_source::FrameSource).
#[derive(Clone, Debug, PartialEq)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;

/// Reads frames from a recorded source.
///
/// Implementations handle decoding and ordering while the pipeline works
/// with the abstract `Frame` and `StreamMetadata` types.
pub trait FrameSource: Send {
    /// Opens the source and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<StreamMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in capture order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}

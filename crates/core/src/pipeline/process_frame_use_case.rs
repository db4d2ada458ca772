use std::sync::Arc;

use crate::session::domain::engine::EngineError;
use crate::session::domain::reading::{Reading, ReadingSink};
use crate::session::domain::session_registry::SessionRegistry;
use crate::video::infrastructure::frame_decoder::FrameDecoder;

/// Handles one self-contained frame request: decode, route to the caller's
/// session, record the estimate.
///
/// The use case holds no per-request state, so a single instance can serve
/// any number of request handlers concurrently.
pub struct ProcessFrameUseCase {
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn ReadingSink>,
    decoder: FrameDecoder,
}

impl ProcessFrameUseCase {
    pub fn new(registry: Arc<SessionRegistry>, sink: Arc<dyn ReadingSink>) -> Self {
        Self {
            registry,
            sink,
            decoder: FrameDecoder,
        }
    }

    /// Processes one encoded frame for `token`.
    ///
    /// Undecodable bytes are not an error: the session still exists and the
    /// cached estimate is returned.
    pub fn execute(&self, token: &str, bytes: &[u8]) -> Result<Reading, EngineError> {
        let frame = self.decoder.decode(bytes, 0);
        let bpm = self.registry.process(token, frame.as_ref())?;

        if let Some(bpm) = bpm {
            if let Err(e) = self.sink.record(token, bpm) {
                log::warn!("Failed to record reading for session '{token}': {e}");
            }
        }
        Ok(Reading::new(bpm))
    }

    /// Ends the session. Returns `false` if there was nothing to end.
    pub fn end_session(&self, token: &str) -> bool {
        self.registry.remove(token)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

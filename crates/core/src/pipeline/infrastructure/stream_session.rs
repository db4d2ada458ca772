use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::session::domain::engine::{EngineError, HeartRateEngine};
use crate::session::domain::reading::Reading;
use crate::shared::constants::STREAM_QUEUE_CAPACITY;
use crate::video::infrastructure::frame_decoder::FrameDecoder;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("stream session is closed")]
    Closed,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("stream worker panicked")]
    WorkerPanicked,
}

/// A persistent connection that owns one engine for its whole lifetime.
///
/// Layout: `caller → [bounded frame queue] → worker (decode → engine) → readings`
///
/// The worker replies with exactly one [`Reading`] per decodable frame, in
/// arrival order. Undecodable frames get no reply. The frame queue is
/// bounded so a fast client is throttled by the engine; readings are
/// unbounded so a client that sends before it reads cannot deadlock the
/// worker.
pub struct StreamSession {
    frame_tx: Option<Sender<Vec<u8>>>,
    reading_rx: Receiver<Reading>,
    worker: Option<JoinHandle<Result<(), EngineError>>>,
}

impl StreamSession {
    pub fn start(engine: HeartRateEngine) -> Self {
        Self::with_capacity(engine, STREAM_QUEUE_CAPACITY)
    }

    pub fn with_capacity(engine: HeartRateEngine, capacity: usize) -> Self {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Vec<u8>>(capacity.max(1));
        let (reading_tx, reading_rx) = crossbeam_channel::unbounded::<Reading>();
        let worker = spawn_worker(engine, frame_rx, reading_tx);
        Self {
            frame_tx: Some(frame_tx),
            reading_rx,
            worker: Some(worker),
        }
    }

    /// Queues one encoded frame, blocking while the queue is full.
    pub fn send(&self, bytes: Vec<u8>) -> Result<(), StreamError> {
        let tx = self.frame_tx.as_ref().ok_or(StreamError::Closed)?;
        tx.send(bytes).map_err(|_| StreamError::Closed)
    }

    /// Handle to the outbound readings. Stays readable after [`close`](Self::close)
    /// until drained.
    pub fn readings(&self) -> Receiver<Reading> {
        self.reading_rx.clone()
    }

    /// Blocks until the next reading, or `None` once the worker has stopped
    /// and all readings were consumed.
    pub fn recv(&self) -> Option<Reading> {
        self.reading_rx.recv().ok()
    }

    /// Stops accepting frames, lets the worker finish the queue and drops
    /// the engine. Reports the error that stopped the worker, if any.
    pub fn close(mut self) -> Result<(), StreamError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), StreamError> {
        drop(self.frame_tx.take());
        match self.worker.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result.map_err(StreamError::from),
                Err(_) => Err(StreamError::WorkerPanicked),
            },
            None => Ok(()),
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Stream session ended with error: {e}");
        }
    }
}

fn spawn_worker(
    mut engine: HeartRateEngine,
    frame_rx: Receiver<Vec<u8>>,
    reading_tx: Sender<Reading>,
) -> JoinHandle<Result<(), EngineError>> {
    std::thread::spawn(move || {
        let decoder = FrameDecoder;
        let mut received = 0usize;
        let mut skipped = 0usize;
        log::debug!("Stream session started");

        for bytes in frame_rx {
            let index = received;
            received += 1;
            let Some(frame) = decoder.decode(&bytes, index) else {
                skipped += 1;
                continue;
            };

            let bpm = engine.process_frame(Some(&frame))?;
            if reading_tx.send(Reading::new(bpm)).is_err() {
                break;
            }
        }

        log::debug!("Stream session finished: {received} frame(s), {skipped} undecodable");
        Ok(())
    })
}

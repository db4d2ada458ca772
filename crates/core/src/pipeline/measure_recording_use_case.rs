use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::session::domain::engine::HeartRateEngine;
use crate::video::domain::frame_source::FrameSource;

/// Engine output for one recorded frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FrameReading {
    pub frame: usize,
    pub bpm: Option<f64>,
}

/// Runs a recorded frame sequence through a single engine.
pub struct MeasureRecordingUseCase {
    source: Box<dyn FrameSource>,
    engine: HeartRateEngine,
    logger: Box<dyn PipelineLogger>,
}

impl MeasureRecordingUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        engine: HeartRateEngine,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            source,
            engine,
            logger,
        }
    }

    pub fn execute(&mut self, path: &Path) -> Result<Vec<FrameReading>, Box<dyn std::error::Error>> {
        let metadata = self.source.open(path)?;
        let fps = self.engine.config().fps;
        if metadata.fps > 0.0 && (metadata.fps - fps).abs() > f64::EPSILON {
            log::warn!(
                "Source reports {:.2} fps but the engine assumes {fps:.2} fps",
                metadata.fps
            );
        }
        self.logger.info(&format!(
            "Measuring {} frames ({}x{})",
            metadata.total_frames, metadata.width, metadata.height
        ));

        let total = metadata.total_frames;
        let mut readings = Vec::with_capacity(total);
        let mut read_start = Instant::now();

        for frame in self.source.frames() {
            let frame = frame?;
            self.logger
                .timing("read", read_start.elapsed().as_secs_f64() * 1000.0);

            let engine_start = Instant::now();
            let bpm = self.engine.process_frame(Some(&frame))?;
            self.logger
                .timing("engine", engine_start.elapsed().as_secs_f64() * 1000.0);
            self.logger
                .metric("buffered_samples", self.engine.buffered_samples() as f64);
            self.logger.reading(frame.index(), bpm);

            readings.push(FrameReading {
                frame: frame.index(),
                bpm,
            });
            self.logger.progress(readings.len(), total);
            read_start = Instant::now();
        }

        self.source.close();
        self.logger.summary();
        Ok(readings)
    }

    pub fn engine(&self) -> &HeartRateEngine {
        &self.engine
    }
}

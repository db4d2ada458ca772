use std::collections::HashMap;
use std::time::Instant;

/// Observer for measurement runs.
///
/// Keeps use cases independent of the output mechanism (stdout, log crate,
/// a test probe) while still exposing progress and per-stage costs.
pub trait PipelineLogger: Send {
    /// Report frame-level progress.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. buffered samples).
    fn metric(&mut self, name: &str, value: f64);

    /// Record the engine output for one frame.
    fn reading(&mut self, frame_index: usize, bpm: Option<f64>);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn reading(&mut self, _frame_index: usize, _bpm: Option<f64>) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI logger: throttled progress through `log`, plus a report of stage
/// timings, metrics and heart-rate statistics at the end of the run.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    estimates: Vec<f64>,
    first_estimate_frame: Option<usize>,
    frames_seen: usize,
    start_time: Instant,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            estimates: Vec::new(),
            first_estimate_frame: None,
            frames_seen: 0,
            start_time: Instant::now(),
            messages: Vec::new(),
        }
    }

    /// Returns the formatted report, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames_seen == 0 && self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Measurement summary ({} frames, {:.1}s total):",
            self.frames_seen,
            elapsed_ms / 1000.0
        )];

        match self.first_estimate_frame {
            Some(first) => {
                let n = self.estimates.len() as f64;
                let mean = self.estimates.iter().sum::<f64>() / n;
                let min = self.estimates.iter().copied().fold(f64::INFINITY, f64::min);
                let max = self.estimates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                lines.push(format!(
                    "  Heart rate: mean {mean:.1} BPM  range {min:.1}-{max:.1}  first at frame {first}"
                ));
                lines.push(format!(
                    "  Coverage: {}/{} frames with an estimate",
                    self.estimates.len(),
                    self.frames_seen
                ));
            }
            None => lines.push("  Heart rate: no estimate".to_string()),
        }

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!("  {stage:12}: avg {avg_ms:6.2}ms  total {total_ms:7.0}ms"));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            let values = &self.metrics[name];
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if self.frames_seen > 0 && elapsed_ms > 0.0 {
            let fps = self.frames_seen as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn estimates(&self) -> &[f64] {
        &self.estimates
    }

    pub fn first_estimate_frame(&self) -> Option<usize> {
        self.first_estimate_frame
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        if total > 0 && (current % self.throttle_frames == 0 || current == total) {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn reading(&mut self, frame_index: usize, bpm: Option<f64>) {
        self.frames_seen += 1;
        if let Some(bpm) = bpm {
            self.first_estimate_frame.get_or_insert(frame_index);
            self.estimates.push(bpm);
        }
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

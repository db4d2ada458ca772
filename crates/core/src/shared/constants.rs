/// Samples kept for spectral analysis (~10 seconds at 30 fps).
pub const DEFAULT_BUFFER_SIZE: usize = 300;

/// Nominal camera frame rate.
pub const DEFAULT_FPS: f64 = 30.0;

/// Re-estimate every N ingested samples (~0.5 second at 30 fps).
pub const DEFAULT_CALC_INTERVAL: usize = 15;

/// Consecutive face-less frames tolerated before the signal is discarded
/// (~1 second at 30 fps).
pub const DEFAULT_MAX_NO_FACE_FRAMES: usize = 30;

/// Heart-rate pass band in Hz (42-240 BPM).
pub const PULSE_BAND_LOW_HZ: f64 = 0.7;
pub const PULSE_BAND_HIGH_HZ: f64 = 4.0;

/// Plausible estimate range; values outside are discarded, not clamped.
pub const MIN_PLAUSIBLE_BPM: f64 = 40.0;
pub const MAX_PLAUSIBLE_BPM: f64 = 200.0;

/// Butterworth prototype order for the band-pass stage.
pub const BAND_PASS_ORDER: usize = 2;

/// MediaPipe Face Mesh indices outlining the central forehead.
pub const FOREHEAD_LANDMARKS: [usize; 8] = [10, 338, 297, 332, 284, 251, 389, 356];

/// RGB channel sampled for the pulse signal (green carries the strongest
/// blood-volume modulation).
pub const PULSE_CHANNEL: usize = 1;

/// Capacity of the inbound frame queue of a streaming session.
pub const STREAM_QUEUE_CAPACITY: usize = 8;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

//! Camera-based heart rate estimation (remote photoplethysmography).
//!
//! Frames go in, a beats-per-minute estimate comes out. Each bounded
//! context keeps pure types and algorithms under `domain` and adapters to
//! files, codecs and threads under `infrastructure`.

pub mod detection;
pub mod pipeline;
pub mod session;
pub mod shared;
pub mod signal;
pub mod video;

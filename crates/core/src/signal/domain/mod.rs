pub mod band_pass;
pub mod pulse_estimator;
pub mod region_extractor;
pub mod signal_buffer;
pub mod spectral_estimator;

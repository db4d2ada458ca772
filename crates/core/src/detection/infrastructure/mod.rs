pub mod cached_landmark_detector;
pub mod landmark_track_file;

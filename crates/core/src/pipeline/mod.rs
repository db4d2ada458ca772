pub mod infrastructure;
pub mod measure_recording_use_case;
pub mod pipeline_logger;
pub mod process_frame_use_case;

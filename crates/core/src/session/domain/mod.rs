pub mod engine;
pub mod engine_config;
pub mod reading;
pub mod session_registry;

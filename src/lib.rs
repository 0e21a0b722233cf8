pub mod config;
pub mod core;
pub mod init;
pub mod pipeline;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{AppConfig, AudioConfig, RunConfig};
pub use core::asr::global_registry;
pub use core::message::Message;
pub use core::transcribe::{PIPELINE_VERSION, Transcriber};
pub use pipeline::{RunReport, run_pipeline};

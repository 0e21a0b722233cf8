//! Google Speech-to-Text backend (synchronous `speech:recognize` REST API).

mod client;
mod config;
mod messages;


pub use client::GoogleSttBackend;
pub use config::DEFAULT_API_URL;

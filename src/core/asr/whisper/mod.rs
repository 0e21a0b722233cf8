//! Hosted Whisper backend (OpenAI Audio Transcription API).

mod client;
mod config;
mod messages;


pub use client::WhisperBackend;
pub use config::DEFAULT_API_URL;

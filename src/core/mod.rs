//! Core transcription engine.
//!
//! Everything below this module is per-message: the message schema, the audio
//! tooling, the ASR layer, the result cache, and the orchestrator tying them
//! together. Run-level concerns (stages, manifests, concurrency) live in
//! `crate::pipeline`.

pub mod asr;
pub mod audio;
pub mod cache;
pub mod message;
pub mod transcribe;
pub mod vad;

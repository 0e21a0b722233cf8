//! Speech recognition layer.
//!
//! Providers are described in a static catalog ([`config`]), instantiated
//! through a factory registry ([`registry`]), and driven through a retrying
//! client ([`client`]). Backends with no credential configured fall back to
//! deterministic stubs ([`stub`]), which keeps the pipeline runnable offline.

pub mod base;
pub mod client;
pub mod config;
pub mod google;
pub mod registry;
pub mod stub;
pub mod whisper;

pub use base::{
    AsrBackend, AsrError, AsrErrorKind, AsrResult, BoxedBackend, ChunkResult, Transcription,
    classify_error_text, classify_status,
};
pub use client::AsrClient;
pub use config::{
    AsrConfigError, ProviderConfig, ProviderInfo, ProviderSpec, list_providers, provider_spec,
    resolve_provider_config, select_backend,
};
pub use registry::{BackendFactory, BackendRegistry, global_registry};
pub use stub::{GoogleStubBackend, WhisperStubBackend};

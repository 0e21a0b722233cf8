//! Deterministic stub backends.
//!
//! Stubs stand in for hosted providers when no credential is configured. Their
//! output is a pure function of model and chunk geometry, so pipeline runs are
//! reproducible in tests and on machines without API keys. A chunk whose file
//! name contains "fail" simulates a provider failure, which exercises the
//! partial/failed aggregation paths end to end.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use super::base::{AsrBackend, AsrError, AsrErrorKind, AsrResult, Transcription};
use super::config::ProviderConfig;

/// Marker in a chunk file name that triggers a simulated failure.
const FAILURE_MARKER: &str = "fail";

fn simulated_failure(wav_path: &Path) -> Option<AsrError> {
    let name = wav_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.contains(FAILURE_MARKER)
        .then(|| AsrError::new(AsrErrorKind::Unknown, "simulated_failure"))
}

/// Stub standing in for Whisper-family providers.
#[derive(Debug)]
pub struct WhisperStubBackend {
    config: ProviderConfig,
}

impl WhisperStubBackend {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AsrBackend for WhisperStubBackend {
    fn id(&self) -> &'static str {
        "whisper_stub"
    }

    async fn transcribe_chunk(
        &self,
        wav_path: &Path,
        start_sec: f64,
        end_sec: f64,
    ) -> AsrResult<Transcription> {
        if let Some(error) = simulated_failure(wav_path) {
            return Err(error);
        }
        Ok(Transcription {
            text: format!("{}-chunk-{start_sec:.2}-{end_sec:.2}", self.config.model),
            language: Some(self.config.language.clone()),
            meta: HashMap::from([("backend".to_string(), self.id().to_string())]),
        })
    }
}

/// Stub standing in for Google Speech-to-Text.
#[derive(Debug)]
pub struct GoogleStubBackend {
    config: ProviderConfig,
}

impl GoogleStubBackend {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AsrBackend for GoogleStubBackend {
    fn id(&self) -> &'static str {
        "google_stub"
    }

    async fn transcribe_chunk(
        &self,
        wav_path: &Path,
        start_sec: f64,
        end_sec: f64,
    ) -> AsrResult<Transcription> {
        if let Some(error) = simulated_failure(wav_path) {
            return Err(error);
        }
        Ok(Transcription {
            text: format!("{}-google-{start_sec:.2}-{end_sec:.2}", self.config.model),
            language: Some(self.config.language.clone()),
            meta: HashMap::from([("backend".to_string(), self.id().to_string())]),
        })
    }
}

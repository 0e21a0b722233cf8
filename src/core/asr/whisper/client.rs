//! HTTP client for the hosted Whisper transcription endpoint.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::core::asr::base::{
    AsrBackend, AsrError, AsrErrorKind, AsrResult, Transcription, classify_status,
};
use crate::core::asr::config::{AsrConfigError, ProviderConfig};

use super::config::{DEFAULT_API_URL, RESPONSE_FORMAT};
use super::messages::{VerboseTranscriptionResponse, error_message};

/// Backend posting chunk WAVs to the OpenAI Audio Transcription API.
///
/// The HTTP client is created once and reused across chunks so requests share
/// a connection pool; the per-request timeout comes from the resolved provider
/// configuration.
#[derive(Debug)]
pub struct WhisperBackend {
    config: ProviderConfig,
    http_client: Client,
    api_url: String,
}

impl WhisperBackend {
    /// Build a backend against the default API endpoint.
    ///
    /// # Errors
    /// Returns [`AsrConfigError::MissingCredential`] when no API key was
    /// resolved; the real backend must never be instantiated without one.
    pub fn new(config: ProviderConfig) -> Result<Self, AsrConfigError> {
        Self::with_api_url(config, DEFAULT_API_URL)
    }

    /// Build a backend against a specific endpoint; used by tests to point at
    /// a local mock server.
    pub fn with_api_url(
        config: ProviderConfig,
        api_url: impl Into<String>,
    ) -> Result<Self, AsrConfigError> {
        if config.api_key.is_none() {
            return Err(AsrConfigError::MissingCredential {
                provider: config.provider.clone(),
                backend: config.backend.clone(),
            });
        }
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AsrConfigError::UnknownBackend(format!("http client: {e}")))?;
        Ok(Self {
            config,
            http_client,
            api_url: api_url.into(),
        })
    }

    fn map_request_error(error: reqwest::Error) -> AsrError {
        if error.is_timeout() {
            AsrError::new(AsrErrorKind::Timeout, format!("request timed out: {error}"))
        } else {
            AsrError::classified(format!("request failed: {error}"))
        }
    }
}

#[async_trait]
impl AsrBackend for WhisperBackend {
    fn id(&self) -> &'static str {
        "whisper_openai_real"
    }

    async fn transcribe_chunk(
        &self,
        wav_path: &Path,
        start_sec: f64,
        end_sec: f64,
    ) -> AsrResult<Transcription> {
        let audio = tokio::fs::read(wav_path).await.map_err(|e| {
            AsrError::new(
                AsrErrorKind::Unknown,
                format!("failed to read chunk {}: {e}", wav_path.display()),
            )
        })?;
        let audio = Bytes::from(audio);

        debug!(
            chunk = %wav_path.display(),
            bytes = audio.len(),
            start_sec,
            end_sec,
            "posting chunk to Whisper API"
        );

        let file_part = Part::stream(reqwest::Body::from(audio))
            .file_name("chunk.wav")
            .mime_str("audio/wav")
            .map_err(|e| AsrError::new(AsrErrorKind::Unknown, format!("invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.config.model.clone())
            .text("response_format", RESPONSE_FORMAT);
        if self.config.language != "auto" {
            form = form.text("language", self.config.language.clone());
        }

        // Unwrap is fine: with_api_url rejects a missing key up front.
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let response = self
            .http_client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .multipart(form)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AsrError::classified(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(AsrError::new(
                classify_status(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), error_message(&body)),
            ));
        }

        let parsed: VerboseTranscriptionResponse = serde_json::from_str(&body).map_err(|e| {
            AsrError::new(
                AsrErrorKind::Unknown,
                format!("unexpected response shape: {e}"),
            )
        })?;

        let mut meta = std::collections::HashMap::new();
        if let Some(duration) = parsed.duration {
            meta.insert("audio_duration".to_string(), format!("{duration:.3}"));
        }
        if let Some(language) = &parsed.language {
            meta.insert("detected_language".to_string(), language.clone());
        }

        Ok(Transcription {
            text: parsed.text.trim().to_string(),
            language: parsed.language,
            meta,
        })
    }
}

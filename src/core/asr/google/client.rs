//! HTTP client for Google Speech-to-Text synchronous recognition.

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use tracing::debug;

use crate::core::asr::base::{
    AsrBackend, AsrError, AsrErrorKind, AsrResult, Transcription, classify_status,
};
use crate::core::asr::config::{AsrConfigError, ProviderConfig};

use super::config::{DEFAULT_API_URL, language_code, model_id};
use super::messages::{
    RecognitionAudio, RecognitionConfig, RecognizeRequest, RecognizeResponse, error_message,
};

/// Backend posting chunk WAVs to `speech:recognize`.
///
/// Audio travels base64-encoded in the JSON body, which the synchronous API
/// requires; chunking keeps each request comfortably under the one-minute
/// limit of that endpoint.
#[derive(Debug)]
pub struct GoogleSttBackend {
    config: ProviderConfig,
    http_client: Client,
    api_url: String,
}

impl GoogleSttBackend {
    /// Build a backend against the default API endpoint.
    ///
    /// # Errors
    /// Returns [`AsrConfigError::MissingCredential`] when no API key was
    /// resolved.
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
impl AsrBackend for GoogleSttBackend {
    fn id(&self) -> &'static str {
        "google_stt_real"
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

        // The chunk carries its own sample rate in the WAV header; trust it
        // over configuration so resampled inputs still recognize correctly.
        let sample_rate = hound::WavReader::new(Cursor::new(&audio))
            .map(|reader| reader.spec().sample_rate)
            .map_err(|e| {
                AsrError::new(
                    AsrErrorKind::Unknown,
                    format!("chunk {} is not a valid WAV: {e}", wav_path.display()),
                )
            })?;

        let language = language_code(&self.config.language);
        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: sample_rate,
                language_code: language.clone(),
                model: model_id(&self.config.model).to_string(),
                enable_automatic_punctuation: true,
            },
            audio: RecognitionAudio {
                content: BASE64.encode(&audio),
            },
        };

        debug!(
            chunk = %wav_path.display(),
            bytes = audio.len(),
            start_sec,
            end_sec,
            language = %language,
            "posting chunk to Google STT"
        );

        // Unwrap is fine: with_api_url rejects a missing key up front.
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let response = self
            .http_client
            .post(&self.api_url)
            .query(&[("key", api_key)])
            .json(&request)
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

        let parsed: RecognizeResponse = serde_json::from_str(&body).map_err(|e| {
            AsrError::new(
                AsrErrorKind::Unknown,
                format!("unexpected response shape: {e}"),
            )
        })?;

        let mut meta = std::collections::HashMap::new();
        meta.insert("language_code".to_string(), language);
        if let Some(confidence) = parsed.min_confidence() {
            meta.insert("min_confidence".to_string(), format!("{confidence:.3}"));
        }

        Ok(Transcription {
            text: parsed.transcript(),
            language: Some(self.config.language.clone()),
            meta,
        })
    }
}

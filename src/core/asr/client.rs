//! Retrying ASR client.
//!
//! One client wraps one backend instance for the lifetime of a run. The retry
//! policy lives here and only here: server and timeout failures are retried
//! with exponential backoff up to the configured attempt budget, everything
//! else fails immediately. The client never returns an error for a chunk; the
//! outcome, success or classified failure, is folded into a [`ChunkResult`].

use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::AudioConfig;

use super::base::{AsrError, BoxedBackend, ChunkResult};
use super::config::{AsrConfigError, ProviderConfig, resolve_provider_config};
use super::registry::{BackendRegistry, global_registry};

/// Base delay before the first retry; doubles on each subsequent attempt.
const BASE_RETRY_DELAY_MS: u64 = 500;

/// Backend handle with uniform retry and result enrichment.
pub struct AsrClient {
    provider: ProviderConfig,
    backend: BoxedBackend,
}

impl AsrClient {
    /// Build a client from the engine configuration and the global registry.
    ///
    /// `fallback_credential` is the provider key resolved into the
    /// application config; the environment variable still wins when set.
    pub fn new(
        config: &AudioConfig,
        fallback_credential: Option<&str>,
    ) -> Result<Self, AsrConfigError> {
        Self::with_registry(config, global_registry(), fallback_credential)
    }

    /// Build a client against a specific registry; used by tests to inject
    /// fake backends.
    pub fn with_registry(
        config: &AudioConfig,
        registry: &BackendRegistry,
        fallback_credential: Option<&str>,
    ) -> Result<Self, AsrConfigError> {
        let provider = resolve_provider_config(config, fallback_credential)?;
        let backend = registry.create(provider.clone())?;
        debug!(
            provider = %provider.provider,
            backend = %provider.backend,
            model = %provider.model,
            "ASR client ready"
        );
        Ok(Self { provider, backend })
    }

    pub fn provider_name(&self) -> &str {
        &self.provider.provider
    }

    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    pub fn model(&self) -> &str {
        &self.provider.model
    }

    pub fn api_version(&self) -> &str {
        &self.provider.api_version
    }

    pub fn language_hint(&self) -> &str {
        &self.provider.language
    }

    pub fn billing_plan(&self) -> crate::config::BillingPlan {
        self.provider.billing_plan
    }

    /// Transcribe one chunk, retrying transient failures.
    ///
    /// `max_retries` is the total attempt budget, first try included. The
    /// returned result carries provider and model metadata regardless of
    /// which backend produced it.
    pub async fn transcribe_chunk(
        &self,
        wav_path: &Path,
        start_sec: f64,
        end_sec: f64,
    ) -> ChunkResult {
        let attempts = self.provider.max_retries.max(1);
        let mut last_error: Option<AsrError> = None;

        for attempt in 1..=attempts {
            match self.backend.transcribe_chunk(wav_path, start_sec, end_sec).await {
                Ok(transcription) => {
                    let mut result = ChunkResult::ok(transcription, start_sec, end_sec);
                    self.enrich(&mut result);
                    return result;
                }
                Err(error) => {
                    let kind = error.kind;
                    let retry = kind.is_retryable() && attempt < attempts;
                    last_error = Some(error);
                    if !retry {
                        debug!(
                            chunk = %wav_path.display(),
                            kind = %kind,
                            attempt,
                            "giving up on chunk"
                        );
                        break;
                    }
                    let delay = BASE_RETRY_DELAY_MS * 2u64.pow(attempt - 1);
                    warn!(
                        chunk = %wav_path.display(),
                        kind = %kind,
                        attempt,
                        attempts,
                        delay_ms = delay,
                        "transient ASR failure, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }

        // Unreachable fallback only if the loop body never ran.
        let error = last_error
            .unwrap_or_else(|| AsrError::classified("no transcription attempt was made"));
        let mut result = ChunkResult::from_error(&error, start_sec, end_sec);
        self.enrich(&mut result);
        result
    }

    fn enrich(&self, result: &mut ChunkResult) {
        result
            .provider_meta
            .entry("provider".to_string())
            .or_insert_with(|| self.provider.provider.clone());
        result
            .provider_meta
            .entry("model".to_string())
            .or_insert_with(|| self.provider.model.clone());
        if result.language.is_none() && self.provider.language != "auto" {
            result.language = Some(self.provider.language.clone());
        }
    }
}

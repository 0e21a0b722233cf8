//! Transcription engine configuration.
//!
//! [`AudioConfig`] is the immutable knob set for one pipeline run: ffmpeg
//! settings, chunking geometry, VAD thresholds, ASR provider selection, and
//! cache placement. It is built once at startup, validated, and passed by
//! reference into the engine; nothing mutates it afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::pricing::BillingPlan;

/// Configuration for the audio transcription engine.
///
/// All fields have working defaults, so an empty config transcribes with the
/// stub-or-real Whisper provider at 16 kHz mono. Serialized verbatim into each
/// message's `config_snapshot` for auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    /// ffmpeg binary to invoke (name on PATH or absolute path).
    pub ffmpeg_bin: String,
    /// Target sample rate for normalized WAV output (Hz).
    pub sample_rate: u32,
    /// Target channel count for normalized WAV output.
    pub channels: u16,
    /// Chunk window length in seconds.
    pub chunk_seconds: f64,
    /// Overlap between consecutive chunks in seconds.
    /// Clamped to half the window length at chunking time.
    pub chunk_overlap_seconds: f64,
    /// Speech ratio below which audio is flagged as mostly silence.
    pub vad_min_speech_ratio: f64,
    /// Speech duration below which audio is flagged as mostly silence.
    pub vad_min_speech_seconds: f64,
    /// ASR provider name (e.g., "whisper_openai", "google_stt").
    pub asr_provider: String,
    /// Model override; falls back to the provider's default model.
    pub asr_model: Option<String>,
    /// Language override; falls back to the provider's default language.
    pub asr_language: Option<String>,
    /// API version override for providers that are versioned.
    pub asr_api_version: Option<String>,
    /// Per-chunk request timeout in seconds.
    pub asr_timeout_seconds: u64,
    /// Total attempt budget per chunk (first try included).
    pub asr_max_retries: u32,
    /// Total attempt budget for ffmpeg conversion.
    pub ffmpeg_max_retries: u32,
    /// Timeout for one ffmpeg invocation in seconds.
    pub ffmpeg_timeout_seconds: u64,
    /// Run voice-activity analysis before transcription.
    pub enable_vad: bool,
    /// Directory holding normalized WAVs and cached transcription outcomes.
    pub cache_dir: PathBuf,
    /// Billing plan used for cost estimation.
    pub asr_billing_plan: BillingPlan,
    /// Override directory for chunk WAVs; defaults to a per-file directory
    /// under `cache_dir/chunks`.
    pub chunk_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            sample_rate: 16_000,
            channels: 1,
            chunk_seconds: 120.0,
            chunk_overlap_seconds: 0.25,
            vad_min_speech_ratio: 0.05,
            vad_min_speech_seconds: 0.1,
            asr_provider: "whisper_openai".to_string(),
            asr_model: None,
            asr_language: None,
            asr_api_version: None,
            asr_timeout_seconds: 60,
            asr_max_retries: 2,
            ffmpeg_max_retries: 2,
            ffmpeg_timeout_seconds: 30,
            enable_vad: true,
            cache_dir: PathBuf::from("cache/audio"),
            asr_billing_plan: BillingPlan::PerMinute,
            chunk_dir: None,
        }
    }
}

impl AudioConfig {
    /// Validate the configuration, returning a human-readable error on the
    /// first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.ffmpeg_bin.trim().is_empty() {
            return Err("ffmpeg_bin must not be empty".to_string());
        }
        if self.sample_rate == 0 {
            return Err("sample_rate must be greater than 0".to_string());
        }
        if self.channels == 0 {
            return Err("channels must be greater than 0".to_string());
        }
        if self.chunk_seconds <= 0.0 {
            return Err("chunk_seconds must be greater than 0".to_string());
        }
        if self.chunk_overlap_seconds < 0.0 {
            return Err("chunk_overlap_seconds must not be negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.vad_min_speech_ratio) {
            return Err("vad_min_speech_ratio must be between 0.0 and 1.0".to_string());
        }
        if self.vad_min_speech_seconds < 0.0 {
            return Err("vad_min_speech_seconds must not be negative".to_string());
        }
        if self.asr_provider.trim().is_empty() {
            return Err("asr_provider must not be empty".to_string());
        }
        if self.asr_timeout_seconds == 0 {
            return Err("asr_timeout_seconds must be greater than 0".to_string());
        }
        if self.ffmpeg_timeout_seconds == 0 {
            return Err("ffmpeg_timeout_seconds must be greater than 0".to_string());
        }
        if self.asr_max_retries == 0 {
            return Err("asr_max_retries must be greater than 0".to_string());
        }
        if self.ffmpeg_max_retries == 0 {
            return Err("ffmpeg_max_retries must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Overlap actually applied at chunking time.
    pub fn effective_overlap(&self) -> f64 {
        self.chunk_overlap_seconds.min(self.chunk_seconds / 2.0)
    }

    /// Full config serialized for the per-message audit snapshot.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Extra input mixed into the cache key so that any setting that changes
    /// transcription output also changes the key.
    pub fn fingerprint_extra(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.asr_provider,
            self.asr_model.as_deref().unwrap_or("none"),
            self.chunk_seconds,
            self.chunk_overlap_seconds,
            self.vad_min_speech_ratio,
            self.vad_min_speech_seconds,
            self.asr_billing_plan.as_str(),
        )
    }
}

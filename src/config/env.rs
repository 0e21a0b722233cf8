//! Environment variable loading.
//!
//! Every engine setting can be overridden with a `VOICEPIPE_*` variable so
//! deployments can tune runs without editing YAML. Provider credentials come
//! from the conventional `OPENAI_API_KEY` / `GOOGLE_API_KEY` names.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::pricing::BillingPlan;

/// Raw environment overrides; `None` means the variable was unset or blank.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub ffmpeg_bin: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub chunk_seconds: Option<f64>,
    pub chunk_overlap_seconds: Option<f64>,
    pub vad_min_speech_ratio: Option<f64>,
    pub vad_min_speech_seconds: Option<f64>,
    pub enable_vad: Option<bool>,
    pub asr_provider: Option<String>,
    pub asr_model: Option<String>,
    pub asr_language: Option<String>,
    pub asr_api_version: Option<String>,
    pub asr_timeout_seconds: Option<u64>,
    pub asr_max_retries: Option<u32>,
    pub asr_billing_plan: Option<BillingPlan>,
    pub ffmpeg_timeout_seconds: Option<u64>,
    pub ffmpeg_max_retries: Option<u32>,
    pub cache_dir: Option<PathBuf>,
    pub chunk_dir: Option<PathBuf>,
    pub max_workers: Option<usize>,
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
}

impl EnvConfig {
    /// Read all recognized variables from the process environment.
    ///
    /// # Errors
    /// Returns an error when a variable is set but fails to parse (e.g., a
    /// non-numeric `VOICEPIPE_SAMPLE_RATE`), naming the offending variable.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            ffmpeg_bin: string_var("VOICEPIPE_FFMPEG_BIN"),
            sample_rate: parse_var("VOICEPIPE_SAMPLE_RATE")?,
            channels: parse_var("VOICEPIPE_CHANNELS")?,
            chunk_seconds: parse_var("VOICEPIPE_CHUNK_SECONDS")?,
            chunk_overlap_seconds: parse_var("VOICEPIPE_CHUNK_OVERLAP_SECONDS")?,
            vad_min_speech_ratio: parse_var("VOICEPIPE_VAD_MIN_SPEECH_RATIO")?,
            vad_min_speech_seconds: parse_var("VOICEPIPE_VAD_MIN_SPEECH_SECONDS")?,
            enable_vad: bool_var("VOICEPIPE_ENABLE_VAD")?,
            asr_provider: string_var("VOICEPIPE_ASR_PROVIDER"),
            asr_model: string_var("VOICEPIPE_ASR_MODEL"),
            asr_language: string_var("VOICEPIPE_ASR_LANGUAGE"),
            asr_api_version: string_var("VOICEPIPE_ASR_API_VERSION"),
            asr_timeout_seconds: parse_var("VOICEPIPE_ASR_TIMEOUT_SECONDS")?,
            asr_max_retries: parse_var("VOICEPIPE_ASR_MAX_RETRIES")?,
            asr_billing_plan: string_var("VOICEPIPE_ASR_BILLING_PLAN")
                .map(|s| BillingPlan::from_str_or_default(&s)),
            ffmpeg_timeout_seconds: parse_var("VOICEPIPE_FFMPEG_TIMEOUT_SECONDS")?,
            ffmpeg_max_retries: parse_var("VOICEPIPE_FFMPEG_MAX_RETRIES")?,
            cache_dir: string_var("VOICEPIPE_CACHE_DIR").map(PathBuf::from),
            chunk_dir: string_var("VOICEPIPE_CHUNK_DIR").map(PathBuf::from),
            max_workers: parse_var("VOICEPIPE_MAX_WORKERS")?,
            openai_api_key: string_var("OPENAI_API_KEY"),
            google_api_key: string_var("GOOGLE_API_KEY"),
        })
    }
}

/// Read a variable, treating unset and blank identically.
fn string_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match string_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name}: {e}").into()),
        None => Ok(None),
    }
}

fn bool_var(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match string_var(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(format!("Invalid {name}: expected a boolean, got '{other}'").into()),
        },
        None => Ok(None),
    }
}

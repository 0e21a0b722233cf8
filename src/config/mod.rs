//! Configuration module for the voicepipe pipeline
//!
//! This module handles configuration from various sources: .env files, YAML
//! files, and environment variables. Priority: ENV vars > YAML > defaults,
//! with CLI flags applied on top by the binary. The configuration is split
//! into logical submodules for maintainability.
//!
//! # Modules
//! - `audio`: Transcription engine settings (ffmpeg, chunking, VAD, ASR)
//! - `run`: Per-run orchestration settings and output layout
//! - `pricing`: ASR cost tables and estimation
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//!
//! # Example
//! ```rust,no_run
//! use voicepipe::config::AppConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = AppConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = AppConfig::from_file(&config_path)?;
//!
//! println!("Provider: {}", config.audio.asr_provider);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod audio;
mod env;
pub mod pricing;
pub mod run;
mod yaml;

pub use audio::AudioConfig;
pub use pricing::{
    BillingPlan, CostBreakdown, ModelPricing, accumulate_costs, estimate_asr_cost,
    list_priced_models, lookup_pricing,
};
pub use run::{RunConfig, runs_dir, slugify};

use env::EnvConfig;
use yaml::YamlConfig;

/// Top-level application configuration.
///
/// Combines the engine settings with provider credentials and orchestration
/// defaults. Built once at startup; the binary applies CLI overrides and then
/// treats it as immutable.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Transcription engine settings.
    pub audio: AudioConfig,
    /// Default worker count for runs; CLI `--workers` wins when given.
    pub max_workers: Option<usize>,
    /// OpenAI API key for hosted Whisper transcription.
    pub openai_api_key: Option<String>,
    /// Google Cloud API key for Speech-to-Text.
    pub google_api_key: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables over built-in defaults.
    ///
    /// # Errors
    /// Returns an error if a set variable fails to parse or the resulting
    /// engine configuration is invalid.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();
        config.apply_env(EnvConfig::load()?);
        config.audio.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment overrides.
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables (actual ENV vars override .env values)
    /// 2. YAML file values
    /// 3. Default values
    ///
    /// Note: the .env file is loaded in main.rs at application startup, so by
    /// the time this runs, .env values already appear as environment
    /// variables.
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or parsed, an
    /// environment variable has an invalid format, or validation fails.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = Self::default();
        config.apply_yaml(yaml_config);
        config.apply_env(EnvConfig::load()?);
        config.audio.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) {
        if let Some(audio) = yaml.audio {
            self.audio = audio;
        }
        if let Some(run) = yaml.run {
            if run.max_workers.is_some() {
                self.max_workers = run.max_workers;
            }
        }
        if let Some(providers) = yaml.providers {
            if providers.openai_api_key.is_some() {
                self.openai_api_key = providers.openai_api_key;
            }
            if providers.google_api_key.is_some() {
                self.google_api_key = providers.google_api_key;
            }
        }
    }

    fn apply_env(&mut self, env: EnvConfig) {
        let audio = &mut self.audio;
        if let Some(v) = env.ffmpeg_bin {
            audio.ffmpeg_bin = v;
        }
        if let Some(v) = env.sample_rate {
            audio.sample_rate = v;
        }
        if let Some(v) = env.channels {
            audio.channels = v;
        }
        if let Some(v) = env.chunk_seconds {
            audio.chunk_seconds = v;
        }
        if let Some(v) = env.chunk_overlap_seconds {
            audio.chunk_overlap_seconds = v;
        }
        if let Some(v) = env.vad_min_speech_ratio {
            audio.vad_min_speech_ratio = v;
        }
        if let Some(v) = env.vad_min_speech_seconds {
            audio.vad_min_speech_seconds = v;
        }
        if let Some(v) = env.enable_vad {
            audio.enable_vad = v;
        }
        if let Some(v) = env.asr_provider {
            audio.asr_provider = v;
        }
        if env.asr_model.is_some() {
            audio.asr_model = env.asr_model;
        }
        if env.asr_language.is_some() {
            audio.asr_language = env.asr_language;
        }
        if env.asr_api_version.is_some() {
            audio.asr_api_version = env.asr_api_version;
        }
        if let Some(v) = env.asr_timeout_seconds {
            audio.asr_timeout_seconds = v;
        }
        if let Some(v) = env.asr_max_retries {
            audio.asr_max_retries = v;
        }
        if let Some(v) = env.asr_billing_plan {
            audio.asr_billing_plan = v;
        }
        if let Some(v) = env.ffmpeg_timeout_seconds {
            audio.ffmpeg_timeout_seconds = v;
        }
        if let Some(v) = env.ffmpeg_max_retries {
            audio.ffmpeg_max_retries = v;
        }
        if let Some(v) = env.cache_dir {
            audio.cache_dir = v;
        }
        if env.chunk_dir.is_some() {
            audio.chunk_dir = env.chunk_dir;
        }
        if env.max_workers.is_some() {
            self.max_workers = env.max_workers;
        }
        if env.openai_api_key.is_some() {
            self.openai_api_key = env.openai_api_key;
        }
        if env.google_api_key.is_some() {
            self.google_api_key = env.google_api_key;
        }
    }

    /// Credential used by a provider's real backend, when configured.
    ///
    /// Presence of a credential is what flips backend selection from stub to
    /// real; absence is not an error.
    pub fn credential_for(&self, provider: &str) -> Option<String> {
        match provider.to_lowercase().as_str() {
            "whisper_openai" => self.openai_api_key.clone(),
            "google_stt" => self.google_api_key.clone(),
            _ => None,
        }
    }

    /// Get the API key for a specific provider
    ///
    /// # Arguments
    /// * `provider` - The name of the provider (e.g., "whisper_openai", "google_stt")
    ///
    /// # Returns
    /// * `Result<String, String>` - The API key on success, or an error message on failure
    pub fn get_api_key(&self, provider: &str) -> Result<String, String> {
        match provider.to_lowercase().as_str() {
            "whisper_openai" => self.openai_api_key.as_ref().cloned().ok_or_else(|| {
                "OpenAI API key not configured in environment (OPENAI_API_KEY)".to_string()
            }),
            "google_stt" => self.google_api_key.as_ref().cloned().ok_or_else(|| {
                "Google API key not configured in environment (GOOGLE_API_KEY)".to_string()
            }),
            _ => Err(format!("Unsupported provider: {provider}")),
        }
    }
}

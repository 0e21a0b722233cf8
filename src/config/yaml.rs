use std::path::PathBuf;

use serde::Deserialize;

use super::audio::AudioConfig;

/// Complete YAML configuration structure
///
/// This structure represents the full configuration that can be loaded from a
/// YAML file. All sections are optional to allow partial configuration.
/// Environment variables override any values specified here.
///
/// # Example YAML structure
/// ```yaml
/// audio:
///   asr_provider: "whisper_openai"
///   asr_model: "whisper-1"
///   chunk_seconds: 120.0
///   chunk_overlap_seconds: 0.25
///   enable_vad: true
///   cache_dir: "cache/audio"
///
/// run:
///   max_workers: 4
///
/// providers:
///   openai_api_key: "sk-..."
///   google_api_key: "AIza..."
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub audio: Option<AudioConfig>,
    pub run: Option<RunYaml>,
    pub providers: Option<ProvidersYaml>,
}

/// Run orchestration defaults from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RunYaml {
    /// Upper bound on concurrent voice transcriptions
    pub max_workers: Option<usize>,
}

/// Provider API keys from YAML
///
/// Keys placed here are fallbacks for local setups; environment variables
/// (`OPENAI_API_KEY`, `GOOGLE_API_KEY`) take precedence.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    /// OpenAI API key for hosted Whisper transcription
    pub openai_api_key: Option<String>,
    /// Google Cloud API key for Speech-to-Text
    pub google_api_key: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Result<YamlConfig, Box<dyn std::error::Error>>` - The loaded configuration or an error
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - A field has an invalid type or is not recognized
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
audio:
  asr_provider: "google_stt"
  asr_model: "chirp-3"
  chunk_seconds: 60.0
  enable_vad: false
  cache_dir: "/var/cache/voicepipe"

run:
  max_workers: 8

providers:
  openai_api_key: "sk-test"
  google_api_key: "g-test"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let audio = config.audio.as_ref().unwrap();
        assert_eq!(audio.asr_provider, "google_stt");
        assert_eq!(audio.asr_model.as_deref(), Some("chirp-3"));
        assert_eq!(audio.chunk_seconds, 60.0);
        assert!(!audio.enable_vad);
        assert_eq!(audio.cache_dir, PathBuf::from("/var/cache/voicepipe"));
        assert_eq!(config.run.as_ref().unwrap().max_workers, Some(8));
        assert_eq!(
            config.providers.as_ref().unwrap().openai_api_key,
            Some("sk-test".to_string())
        );
        assert_eq!(
            config.providers.as_ref().unwrap().google_api_key,
            Some("g-test".to_string())
        );
    }

    #[test]
    fn test_yaml_config_partial_audio_keeps_defaults() {
        let yaml = r#"
audio:
  chunk_seconds: 30.0
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let audio = config.audio.as_ref().unwrap();
        assert_eq!(audio.chunk_seconds, 30.0);
        // Unspecified fields fall back to engine defaults.
        assert_eq!(audio.asr_provider, "whisper_openai");
        assert_eq!(audio.sample_rate, 16_000);
        assert!(config.run.is_none());
        assert!(config.providers.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let yaml = "";

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(config.audio.is_none());
        assert!(config.run.is_none());
        assert!(config.providers.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
run:
  max_workers: 2
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();

        assert_eq!(config.run.as_ref().unwrap().max_workers, Some(2));
    }

    #[test]
    fn test_from_file_not_found() {
        let path = PathBuf::from("/nonexistent/config.yaml");
        let result = YamlConfig::from_file(&path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: content:").unwrap();

        let result = YamlConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }

    #[test]
    fn test_yaml_config_unknown_audio_field_rejected() {
        let yaml = r#"
audio:
  bitrate: 320
"#;

        let result: Result<YamlConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }
}

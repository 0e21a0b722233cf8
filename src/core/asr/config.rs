//! Provider catalog and backend selection.
//!
//! The catalog is a static table of known providers with their models,
//! languages, API versions, and credential requirements. Selection between a
//! provider's real and stub backend is a pure function of credential presence,
//! so the same run configuration produces stub output on a laptop without keys
//! and real output in a deployment that has them.

use std::env;

use thiserror::Error;

use crate::config::pricing::BillingPlan;
use crate::config::{AppConfig, AudioConfig};

// =============================================================================
// Provider Catalog
// =============================================================================

/// Static description of one supported ASR provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderSpec {
    /// Provider name as used in configuration (e.g., "whisper_openai").
    pub name: &'static str,
    pub display_name: &'static str,
    /// Backend id used when a credential is present; `None` means the
    /// provider has no hosted implementation and always runs its stub.
    pub real_backend: Option<&'static str>,
    /// Backend id used when no credential is present.
    pub stub_backend: &'static str,
    pub default_model: &'static str,
    pub available_models: &'static [&'static str],
    pub default_language: &'static str,
    /// `(config language, provider language code)` pairs.
    pub languages: &'static [(&'static str, &'static str)],
    pub api_versions: &'static [&'static str],
    /// Environment variable that carries the provider credential.
    pub env_key: Option<&'static str>,
}

/// All providers known to the engine.
pub const PROVIDER_SPECS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "whisper_openai",
        display_name: "OpenAI Whisper (hosted)",
        real_backend: Some("whisper_openai_real"),
        stub_backend: "whisper_stub",
        default_model: "whisper-1",
        available_models: &["whisper-1"],
        default_language: "auto",
        languages: &[
            ("auto", "auto"),
            ("en", "en"),
            ("es", "es"),
            ("de", "de"),
            ("fr", "fr"),
            ("pt", "pt"),
        ],
        api_versions: &["v1"],
        env_key: Some("OPENAI_API_KEY"),
    },
    ProviderSpec {
        name: "whisper_local",
        display_name: "Whisper (local)",
        real_backend: None,
        stub_backend: "whisper_stub",
        default_model: "large-v2",
        available_models: &["tiny", "base", "small", "medium", "large-v2"],
        default_language: "auto",
        languages: &[
            ("auto", "auto"),
            ("en", "en"),
            ("es", "es"),
            ("de", "de"),
            ("fr", "fr"),
            ("pt", "pt"),
        ],
        api_versions: &["v1"],
        env_key: None,
    },
    ProviderSpec {
        name: "google_stt",
        display_name: "Google Speech-to-Text",
        real_backend: Some("google_stt_real"),
        stub_backend: "google_stub",
        default_model: "latest_long",
        available_models: &["latest_long", "latest_short", "chirp-3"],
        default_language: "en",
        languages: &[
            ("en", "en-US"),
            ("es", "es-ES"),
            ("de", "de-DE"),
            ("fr", "fr-FR"),
            ("pt", "pt-BR"),
        ],
        api_versions: &["v1"],
        env_key: Some("GOOGLE_API_KEY"),
    },
];

/// Look up a provider by name, case-insensitively.
pub fn provider_spec(name: &str) -> Option<&'static ProviderSpec> {
    let lower = name.to_lowercase();
    PROVIDER_SPECS.iter().find(|spec| spec.name == lower)
}

/// Pick the backend id for a provider given credential presence.
///
/// Pure function so selection is testable without touching the environment.
pub fn select_backend(spec: &ProviderSpec, has_credential: bool) -> &'static str {
    match spec.real_backend {
        Some(real) if has_credential => real,
        _ => spec.stub_backend,
    }
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Errors raised while resolving or instantiating a backend.
///
/// These are configuration mistakes that should fail the run fast, before any
/// audio is processed; they never appear on the per-chunk path.
#[derive(Debug, Clone, Error)]
pub enum AsrConfigError {
    #[error("unknown ASR provider: {0}")]
    UnknownProvider(String),
    #[error("model '{model}' is not available for provider '{provider}'")]
    UnknownModel { provider: String, model: String },
    #[error("api version '{version}' is not supported by provider '{provider}'")]
    UnknownApiVersion { provider: String, version: String },
    #[error("backend '{backend}' requires a credential for provider '{provider}'")]
    MissingCredential { provider: String, backend: String },
    #[error("no backend registered with id '{0}'")]
    UnknownBackend(String),
}

/// Fully resolved provider settings handed to a backend factory.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: String,
    pub backend: String,
    pub model: String,
    pub language: String,
    pub api_version: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub billing_plan: BillingPlan,
    /// Credential for the real backend; `None` for stubs.
    pub api_key: Option<String>,
}

/// Resolve the engine configuration against the provider catalog.
///
/// Overrides are validated against the catalog so typos fail loudly here
/// instead of surfacing as per-chunk provider errors mid-run. The credential
/// comes from the provider's environment variable, falling back to
/// `fallback_credential` (the key a YAML `providers:` section resolved into
/// `AppConfig`); its presence selects the real backend, its absence the stub.
pub fn resolve_provider_config(
    config: &AudioConfig,
    fallback_credential: Option<&str>,
) -> Result<ProviderConfig, AsrConfigError> {
    let spec = provider_spec(&config.asr_provider)
        .ok_or_else(|| AsrConfigError::UnknownProvider(config.asr_provider.clone()))?;

    let model = match config.asr_model.as_deref() {
        Some(model) if spec.available_models.contains(&model) => model.to_string(),
        Some(model) => {
            return Err(AsrConfigError::UnknownModel {
                provider: spec.name.to_string(),
                model: model.to_string(),
            });
        }
        None => spec.default_model.to_string(),
    };

    let api_version = match config.asr_api_version.as_deref() {
        Some(version) if spec.api_versions.contains(&version) => version.to_string(),
        Some(version) => {
            return Err(AsrConfigError::UnknownApiVersion {
                provider: spec.name.to_string(),
                version: version.to_string(),
            });
        }
        None => spec.api_versions[0].to_string(),
    };

    let language = config
        .asr_language
        .clone()
        .unwrap_or_else(|| spec.default_language.to_string());

    let api_key = credential(spec, fallback_credential);
    let backend = select_backend(spec, api_key.is_some());

    Ok(ProviderConfig {
        provider: spec.name.to_string(),
        backend: backend.to_string(),
        model,
        language,
        api_version,
        timeout_seconds: config.asr_timeout_seconds,
        max_retries: config.asr_max_retries,
        billing_plan: config.asr_billing_plan,
        api_key,
    })
}

/// Provider credential: environment wins, then the configured fallback.
fn credential(spec: &ProviderSpec, fallback: Option<&str>) -> Option<String> {
    credential_from_env(spec)
        .or_else(|| fallback.map(str::trim).filter(|v| !v.is_empty()).map(String::from))
}

fn credential_from_env(spec: &ProviderSpec) -> Option<String> {
    spec.env_key.and_then(|key| {
        env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
    })
}

// =============================================================================
// Provider Listing
// =============================================================================

/// Snapshot of one provider's capabilities for operator-facing listings.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub default_model: &'static str,
    pub available_models: &'static [&'static str],
    pub default_language: &'static str,
    pub languages: Vec<&'static str>,
    pub api_versions: &'static [&'static str],
    pub env_key: Option<&'static str>,
    /// Whether the provider's credential is currently present, i.e. whether
    /// this provider would run its real backend.
    pub credential_present: bool,
    pub active_backend: &'static str,
}

/// List every catalog provider with its current backend selection.
///
/// Credentials are looked up the same way backend resolution does it:
/// environment first, then the keys carried by `app`.
pub fn list_providers(app: &AppConfig) -> Vec<ProviderInfo> {
    PROVIDER_SPECS
        .iter()
        .map(|spec| {
            let fallback = app.credential_for(spec.name);
            let credential_present = credential(spec, fallback.as_deref()).is_some();
            ProviderInfo {
                name: spec.name,
                display_name: spec.display_name,
                default_model: spec.default_model,
                available_models: spec.available_models,
                default_language: spec.default_language,
                languages: spec.languages.iter().map(|(name, _)| *name).collect(),
                api_versions: spec.api_versions,
                env_key: spec.env_key,
                credential_present,
                active_backend: select_backend(spec, credential_present),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("GOOGLE_API_KEY");
        }
    }

    #[test]
    fn test_provider_spec_lookup() {
        assert!(provider_spec("whisper_openai").is_some());
        assert!(provider_spec("WHISPER_OPENAI").is_some());
        assert!(provider_spec("google_stt").is_some());
        assert!(provider_spec("whisper_local").is_some());
        assert!(provider_spec("azure_stt").is_none());
    }

    #[test]
    fn test_select_backend_is_pure() {
        let whisper = provider_spec("whisper_openai").unwrap();
        assert_eq!(select_backend(whisper, true), "whisper_openai_real");
        assert_eq!(select_backend(whisper, false), "whisper_stub");

        let google = provider_spec("google_stt").unwrap();
        assert_eq!(select_backend(google, true), "google_stt_real");
        assert_eq!(select_backend(google, false), "google_stub");

        // whisper_local has no hosted backend; a credential changes nothing.
        let local = provider_spec("whisper_local").unwrap();
        assert_eq!(select_backend(local, true), "whisper_stub");
        assert_eq!(select_backend(local, false), "whisper_stub");
    }

    #[test]
    #[serial]
    fn test_resolve_defaults_without_credentials() {
        cleanup_env_vars();

        let config = AudioConfig::default();
        let resolved = resolve_provider_config(&config, None).unwrap();
        assert_eq!(resolved.provider, "whisper_openai");
        assert_eq!(resolved.backend, "whisper_stub");
        assert_eq!(resolved.model, "whisper-1");
        assert_eq!(resolved.language, "auto");
        assert_eq!(resolved.api_version, "v1");
        assert!(resolved.api_key.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_resolve_picks_real_backend_with_credential() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-test");
        }

        let config = AudioConfig::default();
        let resolved = resolve_provider_config(&config, None).unwrap();
        assert_eq!(resolved.backend, "whisper_openai_real");
        assert_eq!(resolved.api_key.as_deref(), Some("sk-test"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_resolve_uses_fallback_credential() {
        cleanup_env_vars();

        // A key carried by the application config (e.g. a YAML providers
        // section) selects the real backend even with no env var set.
        let config = AudioConfig::default();
        let resolved = resolve_provider_config(&config, Some("sk-from-yaml")).unwrap();
        assert_eq!(resolved.backend, "whisper_openai_real");
        assert_eq!(resolved.api_key.as_deref(), Some("sk-from-yaml"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_resolve_env_credential_wins_over_fallback() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-from-env");
        }

        let config = AudioConfig::default();
        let resolved = resolve_provider_config(&config, Some("sk-from-yaml")).unwrap();
        assert_eq!(resolved.api_key.as_deref(), Some("sk-from-env"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_resolve_blank_fallback_treated_as_absent() {
        cleanup_env_vars();

        let config = AudioConfig::default();
        let resolved = resolve_provider_config(&config, Some("   ")).unwrap();
        assert_eq!(resolved.backend, "whisper_stub");
        assert!(resolved.api_key.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_resolve_blank_credential_treated_as_absent() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "   ");
        }

        let config = AudioConfig::default();
        let resolved = resolve_provider_config(&config, None).unwrap();
        assert_eq!(resolved.backend, "whisper_stub");
        assert!(resolved.api_key.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_resolve_rejects_unknown_provider() {
        cleanup_env_vars();

        let config = AudioConfig {
            asr_provider: "azure_stt".to_string(),
            ..AudioConfig::default()
        };
        let err = resolve_provider_config(&config, None).unwrap_err();
        assert!(matches!(err, AsrConfigError::UnknownProvider(_)));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_resolve_rejects_unknown_model() {
        cleanup_env_vars();

        let config = AudioConfig {
            asr_model: Some("whisper-99".to_string()),
            ..AudioConfig::default()
        };
        let err = resolve_provider_config(&config, None).unwrap_err();
        assert!(matches!(err, AsrConfigError::UnknownModel { .. }));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_resolve_rejects_unknown_api_version() {
        cleanup_env_vars();

        let config = AudioConfig {
            asr_api_version: Some("v9".to_string()),
            ..AudioConfig::default()
        };
        let err = resolve_provider_config(&config, None).unwrap_err();
        assert!(matches!(err, AsrConfigError::UnknownApiVersion { .. }));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_resolve_google_defaults() {
        cleanup_env_vars();

        let config = AudioConfig {
            asr_provider: "google_stt".to_string(),
            ..AudioConfig::default()
        };
        let resolved = resolve_provider_config(&config, None).unwrap();
        assert_eq!(resolved.backend, "google_stub");
        assert_eq!(resolved.model, "latest_long");
        assert_eq!(resolved.language, "en");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_list_providers_reports_backend_selection() {
        cleanup_env_vars();
        unsafe {
            env::set_var("GOOGLE_API_KEY", "g-test");
        }

        let providers = list_providers(&AppConfig::default());
        assert_eq!(providers.len(), 3);

        let whisper = providers
            .iter()
            .find(|p| p.name == "whisper_openai")
            .unwrap();
        assert!(!whisper.credential_present);
        assert_eq!(whisper.active_backend, "whisper_stub");

        let google = providers.iter().find(|p| p.name == "google_stt").unwrap();
        assert!(google.credential_present);
        assert_eq!(google.active_backend, "google_stt_real");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_list_providers_sees_config_credentials() {
        cleanup_env_vars();

        let app = AppConfig {
            openai_api_key: Some("sk-from-yaml".to_string()),
            ..AppConfig::default()
        };
        let providers = list_providers(&app);

        let whisper = providers
            .iter()
            .find(|p| p.name == "whisper_openai")
            .unwrap();
        assert!(whisper.credential_present);
        assert_eq!(whisper.active_backend, "whisper_openai_real");

        cleanup_env_vars();
    }
}

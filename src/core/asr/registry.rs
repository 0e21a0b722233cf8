//! Backend registry.
//!
//! Maps backend ids to factory functions. The engine resolves a provider to a
//! backend id (see [`super::config`]) and asks the registry to instantiate it.
//! Tests register their own factories in a private registry, so fakes slot in
//! without touching the global one.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::debug;

use super::base::BoxedBackend;
use super::config::{AsrConfigError, ProviderConfig};
use super::google::GoogleSttBackend;
use super::stub::{GoogleStubBackend, WhisperStubBackend};
use super::whisper::WhisperBackend;

/// Factory producing a backend from resolved provider settings.
pub type BackendFactory =
    Arc<dyn Fn(ProviderConfig) -> Result<BoxedBackend, AsrConfigError> + Send + Sync>;

/// Thread-safe id-to-factory map.
pub struct BackendRegistry {
    factories: DashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Create a registry preloaded with every built-in backend.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("whisper_stub", |config| {
            Ok(Box::new(WhisperStubBackend::new(config)))
        });
        registry.register("google_stub", |config| {
            Ok(Box::new(GoogleStubBackend::new(config)))
        });
        registry.register("whisper_openai_real", |config| {
            Ok(Box::new(WhisperBackend::new(config)?))
        });
        registry.register("google_stt_real", |config| {
            Ok(Box::new(GoogleSttBackend::new(config)?))
        });
        registry
    }

    /// Register a factory, replacing any previous one with the same id.
    pub fn register<F>(&self, id: &str, factory: F)
    where
        F: Fn(ProviderConfig) -> Result<BoxedBackend, AsrConfigError> + Send + Sync + 'static,
    {
        debug!(backend = id, "registering ASR backend factory");
        self.factories.insert(id.to_string(), Arc::new(factory));
    }

    /// Instantiate the backend named by `config.backend`.
    pub fn create(&self, config: ProviderConfig) -> Result<BoxedBackend, AsrConfigError> {
        let factory = self
            .factories
            .get(&config.backend)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AsrConfigError::UnknownBackend(config.backend.clone()))?;
        factory(config)
    }

    /// Registered backend ids, sorted for stable output.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Process-wide registry holding the built-in backends.
pub fn global_registry() -> &'static BackendRegistry {
    static REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();
    REGISTRY.get_or_init(BackendRegistry::with_builtins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::pricing::BillingPlan;

    fn provider_config(backend: &str, api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            provider: "whisper_openai".to_string(),
            backend: backend.to_string(),
            model: "whisper-1".to_string(),
            language: "auto".to_string(),
            api_version: "v1".to_string(),
            timeout_seconds: 60,
            max_retries: 2,
            billing_plan: BillingPlan::PerMinute,
            api_key: api_key.map(String::from),
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = BackendRegistry::with_builtins();
        assert_eq!(
            registry.ids(),
            vec![
                "google_stt_real",
                "google_stub",
                "whisper_openai_real",
                "whisper_stub"
            ]
        );
    }

    #[test]
    fn test_create_stub_backend() {
        let registry = BackendRegistry::with_builtins();
        let backend = registry.create(provider_config("whisper_stub", None)).unwrap();
        assert_eq!(backend.id(), "whisper_stub");
    }

    #[test]
    fn test_create_real_backend_requires_credential() {
        let registry = BackendRegistry::with_builtins();
        let err = registry
            .create(provider_config("whisper_openai_real", None))
            .unwrap_err();
        assert!(matches!(err, AsrConfigError::MissingCredential { .. }));

        let backend = registry
            .create(provider_config("whisper_openai_real", Some("sk-test")))
            .unwrap();
        assert_eq!(backend.id(), "whisper_openai_real");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let registry = BackendRegistry::with_builtins();
        let err = registry
            .create(provider_config("azure_stub", None))
            .unwrap_err();
        assert!(matches!(err, AsrConfigError::UnknownBackend(_)));
    }

    #[test]
    fn test_register_replaces_existing() {
        let registry = BackendRegistry::with_builtins();
        registry.register("whisper_stub", |config| {
            Ok(Box::new(GoogleStubBackend::new(config)))
        });
        let backend = registry.create(provider_config("whisper_stub", None)).unwrap();
        assert_eq!(backend.id(), "google_stub");
    }

    #[test]
    fn test_global_registry_is_shared() {
        let first = global_registry() as *const BackendRegistry;
        let second = global_registry() as *const BackendRegistry;
        assert_eq!(first, second);
    }
}

//! Backend table construction: turns configuration into the ordered set of
//! adapters the orchestrator iterates.

use std::sync::Arc;

use helix_config::{AppConfig, BackendConfig, BackendKind};
use helix_core::backend::{Backend, BackendDescriptor, BackendTable};
use helix_core::provider::Provider;
use tracing::{debug, warn};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the backend descriptor table from configuration.
///
/// Disabled backends are skipped. A backend without credentials is still
/// registered: its calls fail with a permanent authentication error and the
/// orchestrator moves on to the next one.
pub fn build_from_config(config: &AppConfig) -> helix_core::Result<BackendTable> {
    let mut backends = Vec::new();

    for (name, backend_config) in config.enabled_backends() {
        if backend_config.api_key.is_none() && backend_config.api_url.is_none() {
            warn!(backend = %name, "No API key configured");
        }

        let descriptor = descriptor_for(name, backend_config);
        debug!(
            backend = %name,
            priority = descriptor.priority,
            max_retries = descriptor.max_retries,
            "Registering backend"
        );
        backends.push(Backend::new(
            descriptor,
            backend_config.model.clone(),
            build_adapter(name, backend_config),
        ));
    }

    BackendTable::new(backends)
}

/// The immutable descriptor for one configured backend.
pub fn descriptor_for(name: &str, config: &BackendConfig) -> BackendDescriptor {
    BackendDescriptor::new(name, config.priority)
        .with_max_retries(config.max_retries)
        .with_max_response_size(config.max_response_size)
        .with_timeout(config.timeout())
}

/// Create the adapter that speaks to one backend.
pub fn build_adapter(name: &str, config: &BackendConfig) -> Arc<dyn Provider> {
    let api_key = config.api_key.clone().unwrap_or_default();
    match config.kind {
        BackendKind::Anthropic => {
            let mut provider = AnthropicProvider::new(&api_key)
                .with_name(name)
                .with_timeout(config.timeout());
            if let Some(url) = &config.api_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        BackendKind::OpenaiCompat => {
            let base_url = config
                .api_url
                .clone()
                .unwrap_or_else(|| default_base_url(name));
            Arc::new(
                OpenAiCompatProvider::new(name, &base_url, &api_key)
                    .with_timeout(config.timeout()),
            )
        }
    }
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("deepseek").contains("api.deepseek.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let table = build_from_config(&config).unwrap();
        assert_eq!(table.names(), vec!["openai", "anthropic", "deepseek"]);

        let deepseek = table.get("deepseek").unwrap();
        assert_eq!(deepseek.descriptor.max_retries, 2);
        assert_eq!(deepseek.model, "deepseek-chat");
        assert_eq!(deepseek.provider.name(), "deepseek");
    }

    #[test]
    fn disabled_backends_skipped() {
        let mut config = AppConfig::default();
        config.backends.get_mut("anthropic").unwrap().enabled = false;
        let table = build_from_config(&config).unwrap();
        assert!(table.get("anthropic").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn descriptor_carries_limits() {
        let mut backend = BackendConfig::new(BackendKind::OpenaiCompat, "m", 4);
        backend.max_response_size = 512;
        backend.timeout_secs = 15;
        let d = descriptor_for("x", &backend);
        assert_eq!(d.priority, 4);
        assert_eq!(d.max_response_size, 512);
        assert_eq!(d.timeout, Duration::from_secs(15));
    }
}

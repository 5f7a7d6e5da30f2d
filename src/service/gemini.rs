//! Gemini through `edgequake-llm`.
//!
//! Builds the production [`LlmService`] from the run configuration and lists
//! the models a credential can use.

use crate::config::{Credential, PipelineConfig};
use crate::error::DdrError;
use crate::service::llm::{map_llm_error, LlmService};
use edgequake_llm::providers::gemini::GeminiModelInfo;
use edgequake_llm::{CompletionOptions, GeminiProvider, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A model visible to the credential.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Resource name, e.g. `models/gemini-2.5-flash`.
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl From<GeminiModelInfo> for ModelInfo {
    fn from(m: GeminiModelInfo) -> Self {
        Self {
            name: m.name,
            display_name: (!m.display_name.is_empty()).then_some(m.display_name),
            supported_generation_methods: m.supported_generation_methods,
        }
    }
}

/// The Gemini provider for `config.model`, authenticated with `credential`.
pub fn provider(config: &PipelineConfig, credential: &Credential) -> GeminiProvider {
    let model = config
        .model
        .strip_prefix("models/")
        .unwrap_or(&config.model);
    GeminiProvider::new(credential.expose()).with_model(model)
}

/// Sampling settings from the configuration; unset values keep provider defaults.
pub fn completion_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_output_tokens.map(|n| n as usize),
        ..Default::default()
    }
}

/// The completion service used by [`crate::generate_report`].
pub fn service(config: &PipelineConfig, credential: &Credential) -> LlmService {
    LlmService::new(Arc::new(provider(config, credential)))
        .with_options(completion_options(config))
        .with_timeout_secs(config.api_timeout_secs)
}

/// List the models available to `credential`, bounded by the API timeout.
pub async fn list_models(
    config: &PipelineConfig,
    credential: &Credential,
) -> Result<Vec<ModelInfo>, DdrError> {
    let provider = provider(config, credential);
    let secs = config.api_timeout_secs;
    let response = tokio::time::timeout(Duration::from_secs(secs), provider.list_models())
        .await
        .map_err(|_| DdrError::ServiceTimeout {
            service: provider.name().to_string(),
            secs,
        })?
        .map_err(|e| map_llm_error(provider.name(), secs, e))?;
    debug!("{} models listed", response.models.len());
    Ok(response.models.into_iter().map(ModelInfo::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::CompletionService;

    fn credential() -> Credential {
        Credential::new("k").unwrap()
    }

    #[test]
    fn model_prefix_is_stripped() {
        let config = PipelineConfig::builder()
            .model("models/gemini-2.5-pro")
            .build()
            .unwrap();
        assert_eq!(provider(&config, &credential()).model(), "gemini-2.5-pro");
    }

    #[test]
    fn service_carries_config_settings() {
        let config = PipelineConfig::builder()
            .temperature(0.5)
            .max_output_tokens(2048)
            .build()
            .unwrap();
        let svc = service(&config, &credential());

        assert_eq!(svc.name(), "gemini");
        assert_eq!(svc.model(), "gemini-2.5-flash");
        assert_eq!(svc.options().temperature, Some(0.5));
        assert_eq!(svc.options().max_tokens, Some(2048));
    }

    #[test]
    fn unset_sampling_leaves_provider_defaults() {
        let opts = completion_options(&PipelineConfig::default());
        assert_eq!(opts.temperature, None);
        assert_eq!(opts.max_tokens, None);
    }

    #[test]
    fn debug_does_not_leak_key() {
        let svc = service(&PipelineConfig::default(), &Credential::new("top-secret").unwrap());
        assert!(!format!("{svc:?}").contains("top-secret"));
    }

    #[test]
    fn model_info_from_listing() {
        let listed: GeminiModelInfo = serde_json::from_value(serde_json::json!({
            "name": "models/gemini-2.5-flash",
            "displayName": "Gemini 2.5 Flash",
            "supportedGenerationMethods": ["generateContent"]
        }))
        .unwrap();
        let info = ModelInfo::from(listed);
        assert_eq!(info.display_name.as_deref(), Some("Gemini 2.5 Flash"));
        assert_eq!(info.supported_generation_methods, vec!["generateContent"]);

        let bare: GeminiModelInfo =
            serde_json::from_value(serde_json::json!({ "name": "models/x" })).unwrap();
        assert_eq!(ModelInfo::from(bare).display_name, None);
    }
}

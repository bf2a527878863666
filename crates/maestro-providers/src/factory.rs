// Driver factory - provider variant to endpoint, auth, and query params

use std::sync::Arc;

use maestro_contracts::ModelProvider;
use maestro_core::{BoundModel, DriverFactory, ExecError, ModelDriver, Result};

use crate::driver::{AuthStyle, ChatCompletionsDriver};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Builds chat-completions drivers for bound models
#[derive(Debug, Default, Clone, Copy)]
pub struct ProviderDriverFactory;

impl ProviderDriverFactory {
    pub fn new() -> Self {
        Self
    }
}

impl DriverFactory for ProviderDriverFactory {
    fn driver(&self, model: &BoundModel) -> Result<Arc<dyn ModelDriver>> {
        let driver = match model.provider {
            ModelProvider::Openai => {
                let endpoint = model
                    .base_url
                    .clone()
                    .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());
                let auth = match &model.api_key {
                    Some(key) => AuthStyle::Bearer(key.clone()),
                    None => AuthStyle::None,
                };
                ChatCompletionsDriver::new(endpoint, auth, &model.model)
            }
            ModelProvider::Azure => {
                // Admission guarantees baseUrl, apiVersion, and apiKey
                let base = model.base_url.clone().ok_or_else(|| {
                    ExecError::ModelRequest {
                        status: 0,
                        message: "azure model without a base url".to_string(),
                    }
                })?;
                let api_version = model.api_version.clone().ok_or_else(|| {
                    ExecError::ModelRequest {
                        status: 0,
                        message: "azure model without an api version".to_string(),
                    }
                })?;
                let auth = match &model.api_key {
                    Some(key) => AuthStyle::ApiKeyHeader(key.clone()),
                    None => AuthStyle::None,
                };
                let endpoint = format!(
                    "{}/openai/deployments/{}/chat/completions",
                    base.trim_end_matches('/'),
                    model.model
                );
                ChatCompletionsDriver::new(endpoint, auth, &model.model)
                    .with_query("api-version", api_version)
            }
            ModelProvider::Bedrock => {
                // Bedrock exposes an OpenAI-compatible endpoint per region
                let endpoint = match (&model.base_url, &model.region) {
                    (Some(base), _) => {
                        format!("{}/openai/v1/chat/completions", base.trim_end_matches('/'))
                    }
                    (None, Some(region)) => format!(
                        "https://bedrock-runtime.{}.amazonaws.com/openai/v1/chat/completions",
                        region
                    ),
                    (None, None) => {
                        return Err(ExecError::ModelRequest {
                            status: 0,
                            message: "bedrock model without a region or base url".to_string(),
                        })
                    }
                };
                let auth = match &model.api_key {
                    Some(key) => AuthStyle::Bearer(key.clone()),
                    None => AuthStyle::None,
                };
                ChatCompletionsDriver::new(endpoint, auth, &model.model)
            }
        };

        let mut properties = serde_json::Map::new();
        for (name, value) in &model.properties {
            properties.insert(name.clone(), value.clone());
        }
        Ok(Arc::new(driver.with_properties(properties)))
    }
}

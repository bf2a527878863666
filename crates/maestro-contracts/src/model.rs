// Model resource - a provider binding for an OpenAI-compatible endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::meta::ObjectMeta;
use crate::value_source::ValueSource;

/// Model resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub metadata: ObjectMeta,
    pub spec: ModelSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ModelStatus>,
}

/// Provider binding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    #[serde(rename = "type")]
    pub provider: ModelProvider,
    /// Deployment or model name, e.g. "gpt-4o"
    pub model: ValueSource,
    #[serde(default)]
    pub config: ModelConfig,
    /// Availability re-probe cadence in seconds; admission bounds this to
    /// [10s, 1h]
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_seconds: u64,
}

impl ModelSpec {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

fn default_poll_interval_secs() -> u64 {
    300
}

/// Supported provider variants; all speak the chat-completions shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Openai,
    Azure,
    Bedrock,
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelProvider::Openai => write!(f, "openai"),
            ModelProvider::Azure => write!(f, "azure"),
            ModelProvider::Bedrock => write!(f, "bedrock"),
        }
    }
}

/// Provider-specific configuration subtree.
///
/// Which fields are required depends on the provider; admission checks the
/// combination (azure needs `baseUrl` + `apiVersion`, bedrock needs
/// `region`, openai defaults its public endpoint).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<ValueSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ValueSource>,
    /// Azure `api-version` query parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<ValueSource>,
    /// Bedrock region, used to derive the endpoint when baseUrl is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<ValueSource>,
    /// Free-form request properties merged into every call body
    /// (e.g. temperature, max_tokens)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Reconciled model availability
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    #[serde(default)]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<DateTime<Utc>>,
}

// Agent resource - a bound configuration of prompt, model, and tools

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;
use crate::value_source::Parameter;

/// Agent resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub metadata: ObjectMeta,
    pub spec: AgentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// System prompt template; `{{param}}` variables resolve against the
    /// merged query and agent parameters
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Model to use; absent means the "default" Model in the namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<String>,
    /// Names of Tool resources exposed to the agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// Replaces the built-in model/tool loop when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_engine: Option<String>,
    /// Agent-level template parameters, overridden by query parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

/// Reconciled agent availability
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    #[serde(default)]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Agent {
    /// Minimal agent for construction in code and tests
    pub fn new(metadata: ObjectMeta, prompt: impl Into<String>) -> Self {
        Self {
            metadata,
            spec: AgentSpec {
                prompt: prompt.into(),
                description: None,
                model_ref: None,
                tools: Vec::new(),
                execution_engine: None,
                parameters: Vec::new(),
            },
            status: None,
        }
    }
}

// Tool resource - an HTTP endpoint, an MCP server tool, or the internal
// terminate signal

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::ObjectMeta;
use crate::value_source::ValueSource;

/// Name of the internal terminate tool.
///
/// Invoking it ends the agent turn and, inside a team, asks the coordinator
/// to stop iterating.
pub const TERMINATE_TOOL: &str = "terminate";

/// Tool resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    pub metadata: ObjectMeta,
    pub spec: ToolSpec,
}

/// Tool variants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolSpec {
    /// Templated HTTP request
    Http(HttpToolSpec),
    /// Named tool on a referenced MCP server
    Mcp(McpToolSpec),
    /// Internal terminate signal
    Terminate,
}

/// HTTP tool: URL, method, headers, and body are templates filled from the
/// model-supplied arguments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpToolSpec {
    pub description: String,
    /// URL template, `{{arg}}` placeholders allowed
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<ToolHeader>,
    /// Body template; `{{arg}}` placeholders allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// JSON Schema for the tool arguments, validated at bind time and
    /// enforced on every call
    #[serde(default = "default_schema")]
    pub input_schema: serde_json::Value,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Header on an HTTP tool request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolHeader {
    pub name: String,
    #[serde(flatten)]
    pub value: ValueSource,
}

/// MCP tool: a named tool exposed by an MCPServer resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct McpToolSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the MCPServer resource in the same namespace
    pub server_ref: String,
    /// Tool name on the remote server
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Tool {
    /// Display description for the model, regardless of variant
    pub fn description(&self) -> &str {
        match &self.spec {
            ToolSpec::Http(http) => &http.description,
            ToolSpec::Mcp(mcp) => mcp.description.as_deref().unwrap_or("Remote MCP tool"),
            ToolSpec::Terminate => "End the current turn and stop the team",
        }
    }
}

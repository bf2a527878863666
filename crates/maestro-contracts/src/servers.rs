// External server resources: MCP tool servers, A2A agent servers, and
// execution-engine plugins. The runtime only speaks their HTTP contracts.

use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;
use crate::message::TokenUsage;
use crate::meta::ObjectMeta;
use crate::value_source::ValueSource;

/// Reserved execution-engine name; rejected at admission
pub const RESERVED_ENGINE_NAME: &str = "a2a";

/// Header on requests to an external server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerHeader {
    pub name: String,
    #[serde(flatten)]
    pub value: ValueSource,
}

/// MCPServer resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServer {
    pub metadata: ObjectMeta,
    pub spec: McpServerSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct McpServerSpec {
    pub address: ValueSource,
    #[serde(default)]
    pub transport: McpTransport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<ServerHeader>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    #[default]
    Http,
    Sse,
}

/// A2AServer resource - an external agent speaking the A2A protocol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct A2aServer {
    pub metadata: ObjectMeta,
    pub spec: A2aServerSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct A2aServerSpec {
    pub address: ValueSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<ServerHeader>,
}

/// ExecutionEngine resource - replaces the built-in agent loop over HTTP
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionEngine {
    pub metadata: ObjectMeta,
    pub spec: ExecutionEngineSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEngineSpec {
    pub address: ValueSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<ServerHeader>,
}

// ----------------------------------------------------------------------------
// Execution-engine wire contract
// ----------------------------------------------------------------------------

/// Request body of `POST /` on an execution engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineRequest {
    /// Agent name, for the engine's own bookkeeping
    pub agent: String,
    pub messages: Vec<ChatMessage>,
    /// Tool definitions in chat-completions function shape
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    /// Resolved model name
    pub model: String,
}

/// Response body of `POST /` on an execution engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineResponse {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

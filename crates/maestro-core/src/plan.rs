// Execution plan - the immutable, fully resolved tree derived from a query
//
// Every referenced resource is flattened into the plan by value; nothing in
// a plan points back into the store. Plans live for one reconcile and are
// never persisted.

use std::collections::BTreeMap;

use maestro_contracts::{GraphEdge, ModelProvider, TargetRef, TeamStrategy};

use crate::error::BindError;

/// Fully resolved plan for one query reconcile
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub namespace: String,
    pub query_name: String,
    /// Query uid as a string; doubles as the default session id
    pub query_id: String,
    pub session_id: String,
    /// Effective input (inputOverride already applied)
    pub input: String,
    /// One entry per target after selector expansion, in dispatch order
    pub targets: Vec<PlannedTarget>,
    pub memory: MemoryBinding,
    /// Outer deadline from the query spec, in seconds
    pub timeout_seconds: Option<u64>,
}

impl QueryPlan {
    /// Effective outer deadline: the query's own timeout, then the
    /// configured default
    pub fn query_deadline(&self, config: &crate::config::EngineConfig) -> Option<std::time::Duration> {
        self.timeout_seconds
            .map(std::time::Duration::from_secs)
            .or(config.query_deadline)
    }
}

/// One dispatchable target, or the bind error that took its place
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTarget {
    pub target: TargetRef,
    pub node: Result<ExecutionNode, BindError>,
}

/// Node of the execution tree
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionNode {
    Agent(BoundAgent),
    Team(Box<BoundTeam>),
    Model(BoundModel),
    Tool(BoundTool),
}

impl ExecutionNode {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExecutionNode::Agent(_) => "agent",
            ExecutionNode::Team(_) => "team",
            ExecutionNode::Model(_) => "model",
            ExecutionNode::Tool(_) => "tool",
        }
    }
}

/// Agent with its prompt templated and references bound
#[derive(Debug, Clone, PartialEq)]
pub struct BoundAgent {
    pub name: String,
    /// System prompt after parameter substitution
    pub prompt: String,
    pub model: BoundModel,
    pub tools: Vec<BoundTool>,
    /// Replaces the built-in model/tool loop when set
    pub engine: Option<BoundEngine>,
}

/// Model with provider configuration resolved to plain values
#[derive(Debug, Clone, PartialEq)]
pub struct BoundModel {
    pub name: String,
    pub provider: ModelProvider,
    /// Resolved deployment/model name
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub region: Option<String>,
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Tool ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum BoundTool {
    Http(BoundHttpTool),
    Mcp(BoundMcpTool),
    Terminate,
}

impl BoundTool {
    pub fn name(&self) -> &str {
        match self {
            BoundTool::Http(t) => &t.name,
            BoundTool::Mcp(t) => &t.name,
            BoundTool::Terminate => maestro_contracts::TERMINATE_TOOL,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            BoundTool::Http(t) => &t.description,
            BoundTool::Mcp(t) => &t.description,
            BoundTool::Terminate => "End the current turn and stop the team",
        }
    }

    /// JSON Schema advertised to the model
    pub fn parameters(&self) -> serde_json::Value {
        match self {
            BoundTool::Http(t) => t.schema.clone(),
            BoundTool::Mcp(t) => t.schema.clone(),
            BoundTool::Terminate => serde_json::json!({
                "type": "object",
                "properties": {},
            }),
        }
    }
}

/// HTTP tool with headers resolved; url and body stay templates filled from
/// call arguments
#[derive(Debug, Clone, PartialEq)]
pub struct BoundHttpTool {
    pub name: String,
    pub description: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub schema: serde_json::Value,
}

/// MCP tool with its server address resolved
#[derive(Debug, Clone, PartialEq)]
pub struct BoundMcpTool {
    pub name: String,
    pub description: String,
    /// Resolved MCP server base URL
    pub server_url: String,
    pub server_name: String,
    pub server_headers: Vec<(String, String)>,
    /// Tool name on the remote server
    pub remote_tool: String,
    pub schema: serde_json::Value,
}

/// Execution engine with its address resolved
#[derive(Debug, Clone, PartialEq)]
pub struct BoundEngine {
    pub name: String,
    pub base_url: String,
    pub headers: Vec<(String, String)>,
}

/// Team with members recursively bound
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTeam {
    pub name: String,
    pub strategy: TeamStrategy,
    pub members: Vec<BoundMember>,
    pub max_turns: Option<u32>,
    pub graph: Vec<GraphEdge>,
    pub selector: Option<BoundSelector>,
}

/// A bound member: an agent or a nested team
#[derive(Debug, Clone, PartialEq)]
pub struct BoundMember {
    pub name: String,
    pub node: ExecutionNode,
}

/// Selector model binding for selector-strategy teams
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSelector {
    pub model: BoundModel,
    pub prompt: String,
}

/// Memory resolution outcome.
///
/// The "default" fallback is not a null pattern: an absent default memory
/// resolves to an explicit `Null` binding so downstream code is uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryBinding {
    /// No persistence; loads return empty, appends are dropped
    Null,
    /// HTTP memory service
    Http { name: String, base_url: String },
}

impl MemoryBinding {
    pub fn name(&self) -> &str {
        match self {
            MemoryBinding::Null => "(null)",
            MemoryBinding::Http { name, .. } => name,
        }
    }
}

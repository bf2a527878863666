// Admission validation (synchronous checks on create/update)
//
// The store runs these before accepting a write. Address reachability is
// deliberately not checked here; a merely unreachable backend at write time
// must not reject the object.

use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::agent::Agent;
use crate::evaluator::Evaluator;
use crate::memory::Memory;
use crate::model::{Model, ModelProvider};
use crate::query::{Query, QueryTarget};
use crate::resource::AnyResource;
use crate::servers::{A2aServer, ExecutionEngine, McpServer, ServerHeader, RESERVED_ENGINE_NAME};
use crate::team::{Team, TeamStrategy};
use crate::tool::{Tool, ToolSpec};

/// Bounds on `pollInterval`
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3600);

/// Rejection produced by admission
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}/{name}: {field}: {message}")]
pub struct AdmissionError {
    pub kind: String,
    pub name: String,
    pub field: String,
    pub message: String,
}

impl AdmissionError {
    fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate any resource on create or update
pub fn validate(resource: &AnyResource) -> Result<(), AdmissionError> {
    let meta = resource.metadata();
    if meta.name.is_empty() {
        return Err(AdmissionError::new(
            resource.kind().to_string(),
            "",
            "metadata.name",
            "name must not be empty",
        ));
    }

    match resource {
        AnyResource::Agent(r) => validate_agent(r),
        AnyResource::Team(r) => validate_team(r),
        AnyResource::Model(r) => validate_model(r),
        AnyResource::Tool(r) => validate_tool(r),
        AnyResource::Query(r) => validate_query(r),
        AnyResource::Memory(r) => validate_memory(r),
        AnyResource::Evaluator(r) => validate_evaluator(r),
        AnyResource::A2AServer(r) => validate_a2a_server(r),
        AnyResource::MCPServer(r) => validate_mcp_server(r),
        AnyResource::ExecutionEngine(r) => validate_execution_engine(r),
        // Evaluations, secrets, configmaps, and services carry no invariants
        // beyond a non-empty name
        _ => Ok(()),
    }
}

pub fn validate_agent(agent: &Agent) -> Result<(), AdmissionError> {
    let err = |field: &str, message: &str| {
        Err(AdmissionError::new(
            "Agent",
            &agent.metadata.name,
            field,
            message,
        ))
    };

    if agent.spec.prompt.trim().is_empty() {
        return err("spec.prompt", "prompt must not be empty");
    }
    let mut seen = HashSet::new();
    for p in &agent.spec.parameters {
        if !seen.insert(p.name.as_str()) {
            return err("spec.parameters", "duplicate parameter name");
        }
    }
    Ok(())
}

pub fn validate_team(team: &Team) -> Result<(), AdmissionError> {
    let err = |field: &str, message: String| {
        Err(AdmissionError::new(
            "Team",
            &team.metadata.name,
            field,
            message,
        ))
    };

    if team.spec.members.is_empty() {
        return err("spec.members", "a team needs at least one member".into());
    }

    let names: HashSet<&str> = team.spec.members.iter().map(|m| m.name.as_str()).collect();
    match team.spec.strategy {
        TeamStrategy::Graph => {
            if team.spec.graph.is_empty() {
                return err("spec.graph", "graph strategy requires edges".into());
            }
            for edge in &team.spec.graph {
                for end in [&edge.from, &edge.to] {
                    if !names.contains(end.as_str()) {
                        return err(
                            "spec.graph",
                            format!("edge references unknown member \"{}\"", end),
                        );
                    }
                }
            }
        }
        TeamStrategy::Selector => {
            if team.spec.selector.is_none() {
                return err(
                    "spec.selector",
                    "selector strategy requires a selector model and prompt".into(),
                );
            }
        }
        TeamStrategy::Sequential | TeamStrategy::RoundRobin => {}
    }

    if let Some(0) = team.spec.max_turns {
        return err("spec.maxTurns", "maxTurns must be at least 1".into());
    }
    Ok(())
}

pub fn validate_model(model: &Model) -> Result<(), AdmissionError> {
    let err = |field: &str, message: &str| {
        Err(AdmissionError::new(
            "Model",
            &model.metadata.name,
            field,
            message,
        ))
    };

    let interval = model.spec.poll_interval();
    if interval < MIN_POLL_INTERVAL || interval > MAX_POLL_INTERVAL {
        return err(
            "spec.pollIntervalSeconds",
            "pollInterval must be between 10s and 1h",
        );
    }

    // Each provider variant needs its config subtree populated
    match model.spec.provider {
        ModelProvider::Openai => {
            if model.spec.config.api_key.is_none() {
                return err("spec.config.apiKey", "openai models require an api key");
            }
        }
        ModelProvider::Azure => {
            if model.spec.config.base_url.is_none() {
                return err("spec.config.baseUrl", "azure models require a base url");
            }
            if model.spec.config.api_version.is_none() {
                return err("spec.config.apiVersion", "azure models require an api version");
            }
            if model.spec.config.api_key.is_none() {
                return err("spec.config.apiKey", "azure models require an api key");
            }
        }
        ModelProvider::Bedrock => {
            if model.spec.config.region.is_none() && model.spec.config.base_url.is_none() {
                return err(
                    "spec.config.region",
                    "bedrock models require a region or an explicit base url",
                );
            }
        }
    }
    Ok(())
}

pub fn validate_tool(tool: &Tool) -> Result<(), AdmissionError> {
    match &tool.spec {
        ToolSpec::Http(http) => {
            if http.url.trim().is_empty() {
                return Err(AdmissionError::new(
                    "Tool",
                    &tool.metadata.name,
                    "spec.url",
                    "url must not be empty",
                ));
            }
            let mut seen = HashSet::new();
            for header in &http.headers {
                if !seen.insert(header.name.to_ascii_lowercase()) {
                    return Err(AdmissionError::new(
                        "Tool",
                        &tool.metadata.name,
                        "spec.headers",
                        format!("duplicate header name \"{}\"", header.name),
                    ));
                }
            }
            if !http.input_schema.is_object() {
                return Err(AdmissionError::new(
                    "Tool",
                    &tool.metadata.name,
                    "spec.inputSchema",
                    "input schema must be a JSON object",
                ));
            }
        }
        ToolSpec::Mcp(mcp) => {
            if mcp.server_ref.trim().is_empty() || mcp.tool_name.trim().is_empty() {
                return Err(AdmissionError::new(
                    "Tool",
                    &tool.metadata.name,
                    "spec.serverRef",
                    "mcp tools require serverRef and toolName",
                ));
            }
        }
        ToolSpec::Terminate => {}
    }
    Ok(())
}

pub fn validate_query(query: &Query) -> Result<(), AdmissionError> {
    let err = |field: &str, message: &str| {
        Err(AdmissionError::new(
            "Query",
            &query.metadata.name,
            field,
            message,
        ))
    };

    if query.spec.targets.is_empty() {
        return err("spec.targets", "a query needs at least one target");
    }
    for (i, target) in query.spec.targets.iter().enumerate() {
        if let Err(message) = validate_target(target) {
            return Err(AdmissionError::new(
                "Query",
                &query.metadata.name,
                format!("spec.targets[{}]", i),
                message,
            ));
        }
    }
    let mut seen = HashSet::new();
    for p in &query.spec.parameters {
        if !seen.insert(p.name.as_str()) {
            return err("spec.parameters", "duplicate parameter name");
        }
    }
    Ok(())
}

fn validate_target(target: &QueryTarget) -> Result<(), &'static str> {
    match (&target.name, &target.selector) {
        (Some(_), Some(_)) => Err("a target sets either name or selector, not both"),
        (None, None) => Err("a target needs a name or a selector"),
        (Some(name), None) if name.trim().is_empty() => Err("target name must not be empty"),
        _ => Ok(()),
    }
}

pub fn validate_memory(_memory: &Memory) -> Result<(), AdmissionError> {
    // Address reachability is probed by the controller, never at admission
    Ok(())
}

pub fn validate_evaluator(_evaluator: &Evaluator) -> Result<(), AdmissionError> {
    Ok(())
}

pub fn validate_a2a_server(server: &A2aServer) -> Result<(), AdmissionError> {
    check_headers("A2AServer", &server.metadata.name, &server.spec.headers)
}

pub fn validate_mcp_server(server: &McpServer) -> Result<(), AdmissionError> {
    check_headers("MCPServer", &server.metadata.name, &server.spec.headers)
}

pub fn validate_execution_engine(engine: &ExecutionEngine) -> Result<(), AdmissionError> {
    if engine.metadata.name == RESERVED_ENGINE_NAME {
        return Err(AdmissionError::new(
            "ExecutionEngine",
            &engine.metadata.name,
            "metadata.name",
            format!("\"{}\" is a reserved engine name", RESERVED_ENGINE_NAME),
        ));
    }
    check_headers("ExecutionEngine", &engine.metadata.name, &engine.spec.headers)
}

fn check_headers(kind: &str, name: &str, headers: &[ServerHeader]) -> Result<(), AdmissionError> {
    let mut seen = HashSet::new();
    for header in headers {
        if !seen.insert(header.name.to_ascii_lowercase()) {
            return Err(AdmissionError::new(
                kind,
                name,
                "spec.headers",
                format!("duplicate header name \"{}\"", header.name),
            ));
        }
    }
    Ok(())
}

// AnyResource - kind-tagged union over every resource the store holds
//
// Manifests deserialize into this; the store fans out into per-kind
// collections. The `apiVersion` field on manifests is accepted and ignored.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::evaluator::{Evaluation, Evaluator};
use crate::memory::Memory;
use crate::meta::ObjectMeta;
use crate::model::Model;
use crate::platform::{ConfigMap, Secret, Service};
use crate::query::Query;
use crate::servers::{A2aServer, ExecutionEngine, McpServer};
use crate::team::Team;
use crate::tool::Tool;

/// Every resource kind the control plane watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Agent,
    Team,
    Model,
    Tool,
    Memory,
    Evaluator,
    Evaluation,
    Query,
    A2AServer,
    MCPServer,
    ExecutionEngine,
    Secret,
    ConfigMap,
    Service,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Agent => "Agent",
            ResourceKind::Team => "Team",
            ResourceKind::Model => "Model",
            ResourceKind::Tool => "Tool",
            ResourceKind::Memory => "Memory",
            ResourceKind::Evaluator => "Evaluator",
            ResourceKind::Evaluation => "Evaluation",
            ResourceKind::Query => "Query",
            ResourceKind::A2AServer => "A2AServer",
            ResourceKind::MCPServer => "MCPServer",
            ResourceKind::ExecutionEngine => "ExecutionEngine",
            ResourceKind::Secret => "Secret",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Service => "Service",
        };
        write!(f, "{}", s)
    }
}

/// Kind-tagged resource union
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum AnyResource {
    Agent(Agent),
    Team(Team),
    Model(Model),
    Tool(Tool),
    Memory(Memory),
    Evaluator(Evaluator),
    Evaluation(Evaluation),
    Query(Query),
    A2AServer(A2aServer),
    MCPServer(McpServer),
    ExecutionEngine(ExecutionEngine),
    Secret(Secret),
    ConfigMap(ConfigMap),
    Service(Service),
}

impl AnyResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            AnyResource::Agent(_) => ResourceKind::Agent,
            AnyResource::Team(_) => ResourceKind::Team,
            AnyResource::Model(_) => ResourceKind::Model,
            AnyResource::Tool(_) => ResourceKind::Tool,
            AnyResource::Memory(_) => ResourceKind::Memory,
            AnyResource::Evaluator(_) => ResourceKind::Evaluator,
            AnyResource::Evaluation(_) => ResourceKind::Evaluation,
            AnyResource::Query(_) => ResourceKind::Query,
            AnyResource::A2AServer(_) => ResourceKind::A2AServer,
            AnyResource::MCPServer(_) => ResourceKind::MCPServer,
            AnyResource::ExecutionEngine(_) => ResourceKind::ExecutionEngine,
            AnyResource::Secret(_) => ResourceKind::Secret,
            AnyResource::ConfigMap(_) => ResourceKind::ConfigMap,
            AnyResource::Service(_) => ResourceKind::Service,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            AnyResource::Agent(r) => &r.metadata,
            AnyResource::Team(r) => &r.metadata,
            AnyResource::Model(r) => &r.metadata,
            AnyResource::Tool(r) => &r.metadata,
            AnyResource::Memory(r) => &r.metadata,
            AnyResource::Evaluator(r) => &r.metadata,
            AnyResource::Evaluation(r) => &r.metadata,
            AnyResource::Query(r) => &r.metadata,
            AnyResource::A2AServer(r) => &r.metadata,
            AnyResource::MCPServer(r) => &r.metadata,
            AnyResource::ExecutionEngine(r) => &r.metadata,
            AnyResource::Secret(r) => &r.metadata,
            AnyResource::ConfigMap(r) => &r.metadata,
            AnyResource::Service(r) => &r.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            AnyResource::Agent(r) => &mut r.metadata,
            AnyResource::Team(r) => &mut r.metadata,
            AnyResource::Model(r) => &mut r.metadata,
            AnyResource::Tool(r) => &mut r.metadata,
            AnyResource::Memory(r) => &mut r.metadata,
            AnyResource::Evaluator(r) => &mut r.metadata,
            AnyResource::Evaluation(r) => &mut r.metadata,
            AnyResource::Query(r) => &mut r.metadata,
            AnyResource::A2AServer(r) => &mut r.metadata,
            AnyResource::MCPServer(r) => &mut r.metadata,
            AnyResource::ExecutionEngine(r) => &mut r.metadata,
            AnyResource::Secret(r) => &mut r.metadata,
            AnyResource::ConfigMap(r) => &mut r.metadata,
            AnyResource::Service(r) => &mut r.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_round_trips() {
        let agent = AnyResource::Agent(Agent::new(ObjectMeta::named("calc"), "You are a calculator"));
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["kind"], "Agent");
        assert_eq!(json["metadata"]["name"], "calc");
        let back: AnyResource = serde_json::from_value(json).unwrap();
        assert_eq!(back, agent);
    }

    #[test]
    fn api_version_is_ignored() {
        let parsed: AnyResource = serde_json::from_value(serde_json::json!({
            "apiVersion": "maestro.dev/v1",
            "kind": "Secret",
            "metadata": {"name": "keys", "namespace": "prod"},
            "data": {"token": "s3cret"}
        }))
        .unwrap();
        assert_eq!(parsed.kind(), ResourceKind::Secret);
        assert_eq!(parsed.metadata().namespace, "prod");
    }
}

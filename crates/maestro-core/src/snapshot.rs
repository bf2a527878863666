// Resource snapshot consumed by the binder
//
// Binding never touches the live store: the controller snapshots one
// namespace before each reconcile and the binder works on that copy.
// Tests build snapshots directly.

use std::collections::HashMap;

use maestro_contracts::{
    Agent, ConfigMap, Evaluator, ExecutionEngine, LabelSelector, McpServer, Memory, Model,
    Secret, Service, Team, Tool,
};

/// By-value copy of every bindable resource in one namespace
#[derive(Debug, Clone, Default)]
pub struct ResourceSnapshot {
    pub namespace: String,
    pub agents: HashMap<String, Agent>,
    pub teams: HashMap<String, Team>,
    pub models: HashMap<String, Model>,
    pub tools: HashMap<String, Tool>,
    pub memories: HashMap<String, Memory>,
    pub evaluators: HashMap<String, Evaluator>,
    pub mcp_servers: HashMap<String, McpServer>,
    pub engines: HashMap<String, ExecutionEngine>,
    pub secrets: HashMap<String, Secret>,
    pub config_maps: HashMap<String, ConfigMap>,
    pub services: HashMap<String, Service>,
}

impl ResourceSnapshot {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    // Builder-style inserts, keyed by metadata name

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agents.insert(agent.metadata.name.clone(), agent);
        self
    }

    pub fn with_team(mut self, team: Team) -> Self {
        self.teams.insert(team.metadata.name.clone(), team);
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.models.insert(model.metadata.name.clone(), model);
        self
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.insert(tool.metadata.name.clone(), tool);
        self
    }

    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memories.insert(memory.metadata.name.clone(), memory);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluators
            .insert(evaluator.metadata.name.clone(), evaluator);
        self
    }

    pub fn with_mcp_server(mut self, server: McpServer) -> Self {
        self.mcp_servers
            .insert(server.metadata.name.clone(), server);
        self
    }

    pub fn with_engine(mut self, engine: ExecutionEngine) -> Self {
        self.engines.insert(engine.metadata.name.clone(), engine);
        self
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.insert(secret.metadata.name.clone(), secret);
        self
    }

    pub fn with_config_map(mut self, config_map: ConfigMap) -> Self {
        self.config_maps
            .insert(config_map.metadata.name.clone(), config_map);
        self
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.insert(service.metadata.name.clone(), service);
        self
    }

    /// Agents whose labels match the selector, sorted by name
    pub fn select_agents(&self, selector: &LabelSelector) -> Vec<&Agent> {
        let mut matched: Vec<&Agent> = self
            .agents
            .values()
            .filter(|a| selector.matches(&a.metadata.labels))
            .collect();
        matched.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        matched
    }

    /// Teams whose labels match the selector, sorted by name
    pub fn select_teams(&self, selector: &LabelSelector) -> Vec<&Team> {
        let mut matched: Vec<&Team> = self
            .teams
            .values()
            .filter(|t| selector.matches(&t.metadata.labels))
            .collect();
        matched.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        matched
    }

    /// Models whose labels match the selector, sorted by name
    pub fn select_models(&self, selector: &LabelSelector) -> Vec<&Model> {
        let mut matched: Vec<&Model> = self
            .models
            .values()
            .filter(|m| selector.matches(&m.metadata.labels))
            .collect();
        matched.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        matched
    }

    /// Tools whose labels match the selector, sorted by name
    pub fn select_tools(&self, selector: &LabelSelector) -> Vec<&Tool> {
        let mut matched: Vec<&Tool> = self
            .tools
            .values()
            .filter(|t| selector.matches(&t.metadata.labels))
            .collect();
        matched.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        matched
    }
}

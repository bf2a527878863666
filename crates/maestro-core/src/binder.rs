// Reference and parameter binder
//
// Bind(query) -> plan. No I/O to the model/tool plane: everything the plan
// needs is resolved from the snapshot, by value, before dispatch starts.
//
// Failure scoping: a bind error inside one target's subtree is captured on
// that planned target and the rest of the plan still materializes; errors
// outside any target (selector expansion, query parameters, memory
// resolution) abort the whole bind.

use std::collections::BTreeMap;

use tracing::warn;

use maestro_contracts::{
    Agent, Model, Parameter, Query, TargetKind, TargetRef, Team, TeamMemberKind, Tool, ToolSpec,
    ValueSource, TERMINATE_TOOL,
};

use crate::config::EngineConfig;
use crate::error::BindError;
use crate::plan::{
    BoundAgent, BoundEngine, BoundHttpTool, BoundMcpTool, BoundMember, BoundModel, BoundSelector,
    BoundTeam, BoundTool, ExecutionNode, MemoryBinding, PlannedTarget, QueryPlan,
};
use crate::resolver::ValueResolver;
use crate::snapshot::ResourceSnapshot;
use crate::template;

/// Teams may nest at most this deep
pub const TEAM_DEPTH_LIMIT: usize = 8;

/// Per-reconcile binder over one snapshot
pub struct Binder<'a> {
    snapshot: &'a ResourceSnapshot,
    resolver: ValueResolver<'a>,
    config: &'a EngineConfig,
}

impl<'a> Binder<'a> {
    pub fn new(
        snapshot: &'a ResourceSnapshot,
        query_parameters: &'a [Parameter],
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            snapshot,
            resolver: ValueResolver::new(snapshot, query_parameters),
            config,
        }
    }

    /// Materialize a plan from a query.
    ///
    /// Binding the same query against the same snapshot yields the same
    /// plan; nothing here reads a clock or performs I/O.
    pub fn bind(&self, query: &Query) -> Result<QueryPlan, BindError> {
        let query_id = query
            .metadata
            .uid
            .map(|uid| uid.to_string())
            .unwrap_or_else(|| query.metadata.name.clone());
        let session_id = query
            .spec
            .session_id
            .clone()
            .unwrap_or_else(|| query_id.clone());

        let refs = self.expand_targets(query)?;
        let memory = self.bind_memory(query)?;

        let targets = refs
            .into_iter()
            .map(|target| {
                let node = self.bind_target(&target);
                if let Err(err) = &node {
                    warn!(target = %target, code = err.code(), "target failed to bind");
                }
                PlannedTarget { target, node }
            })
            .collect();

        Ok(QueryPlan {
            namespace: query.metadata.namespace.clone(),
            query_name: query.metadata.name.clone(),
            query_id,
            session_id,
            input: query.spec.effective_input().to_string(),
            targets,
            memory,
            timeout_seconds: query.spec.timeout_seconds,
        })
    }

    /// Expand selector targets against the label index.
    ///
    /// Expansion of one selector is sorted by `(type, name)` for
    /// determinism; named targets keep their declared position.
    fn expand_targets(&self, query: &Query) -> Result<Vec<TargetRef>, BindError> {
        let mut refs = Vec::new();
        for target in &query.spec.targets {
            match (&target.name, &target.selector) {
                (Some(name), _) => refs.push(TargetRef {
                    kind: target.kind,
                    name: name.clone(),
                }),
                (None, Some(selector)) => {
                    let mut expanded: Vec<TargetRef> = match target.kind {
                        TargetKind::Agent => self
                            .snapshot
                            .select_agents(selector)
                            .iter()
                            .map(|a| TargetRef {
                                kind: TargetKind::Agent,
                                name: a.metadata.name.clone(),
                            })
                            .collect(),
                        TargetKind::Team => self
                            .snapshot
                            .select_teams(selector)
                            .iter()
                            .map(|t| TargetRef {
                                kind: TargetKind::Team,
                                name: t.metadata.name.clone(),
                            })
                            .collect(),
                        TargetKind::Model => self
                            .snapshot
                            .select_models(selector)
                            .iter()
                            .map(|m| TargetRef {
                                kind: TargetKind::Model,
                                name: m.metadata.name.clone(),
                            })
                            .collect(),
                        TargetKind::Tool => self
                            .snapshot
                            .select_tools(selector)
                            .iter()
                            .map(|t| TargetRef {
                                kind: TargetKind::Tool,
                                name: t.metadata.name.clone(),
                            })
                            .collect(),
                    };
                    expanded.sort();
                    if expanded.is_empty() && !self.config.allow_empty_target_selector {
                        return Err(BindError::SelectorEmpty {
                            kind: target.kind.to_string(),
                        });
                    }
                    refs.append(&mut expanded);
                }
                // Admission rejects targets with neither name nor selector;
                // a hand-built query falls through as not-found
                (None, None) => {
                    return Err(BindError::reference_not_found(
                        target.kind.to_string(),
                        &query.metadata.namespace,
                        "",
                    ))
                }
            }
        }
        Ok(refs)
    }

    fn bind_target(&self, target: &TargetRef) -> Result<ExecutionNode, BindError> {
        match target.kind {
            TargetKind::Agent => self.bind_agent(&target.name).map(ExecutionNode::Agent),
            TargetKind::Team => {
                let mut visiting = Vec::new();
                self.bind_team(&target.name, &mut visiting)
                    .map(|team| ExecutionNode::Team(Box::new(team)))
            }
            TargetKind::Model => self
                .lookup_model(&target.name)
                .and_then(|m| self.bind_model(m))
                .map(ExecutionNode::Model),
            TargetKind::Tool => self.bind_tool_by_name(&target.name).map(ExecutionNode::Tool),
        }
    }

    fn bind_agent(&self, name: &str) -> Result<BoundAgent, BindError> {
        let agent = self.snapshot.agents.get(name).ok_or_else(|| {
            BindError::reference_not_found("Agent", &self.snapshot.namespace, name)
        })?;

        let prompt = self.bind_prompt(agent)?;

        let model_name = agent
            .spec
            .model_ref
            .as_deref()
            .unwrap_or(&self.config.model_default_name);
        let model = self.bind_model(self.lookup_model(model_name)?)?;

        let tools = agent
            .spec
            .tools
            .iter()
            .map(|tool_name| self.bind_tool_by_name(tool_name))
            .collect::<Result<Vec<_>, _>>()?;

        let engine = agent
            .spec
            .execution_engine
            .as_deref()
            .map(|engine_name| self.bind_engine(engine_name))
            .transpose()?;

        Ok(BoundAgent {
            name: agent.metadata.name.clone(),
            prompt,
            model,
            tools,
            engine,
        })
    }

    /// Substitute `{{param}}` placeholders in the agent prompt.
    ///
    /// Values come from the merged parameter set; query parameters override
    /// agent parameters of the same name. Only placeholders actually present
    /// in the prompt are resolved, so an unrelated broken parameter cannot
    /// fail this agent.
    fn bind_prompt(&self, agent: &Agent) -> Result<String, BindError> {
        let wanted = template::placeholders(&agent.spec.prompt);
        if wanted.is_empty() {
            return Ok(agent.spec.prompt.clone());
        }

        let mut vars = BTreeMap::new();
        for name in wanted {
            let from_query = ValueSource::query_parameter(&name);
            match self.resolver.resolve(&from_query) {
                Ok(value) => {
                    vars.insert(name, value);
                    continue;
                }
                // Absent from the query: fall back to the agent parameter
                Err(BindError::KeyMissing { kind, .. }) if kind == "Query" => {}
                Err(other) => return Err(other),
            }
            if let Some(parameter) = agent.spec.parameters.iter().find(|p| p.name == name) {
                vars.insert(name, self.resolver.resolve(&parameter.value)?);
            }
            // Placeholders with no parameter anywhere stay verbatim
        }
        Ok(template::substitute(&agent.spec.prompt, &vars))
    }

    fn bind_team(&self, name: &str, visiting: &mut Vec<String>) -> Result<BoundTeam, BindError> {
        if visiting.iter().any(|v| v == name) {
            return Err(BindError::TeamCycle {
                name: name.to_string(),
            });
        }
        if visiting.len() >= TEAM_DEPTH_LIMIT {
            return Err(BindError::DepthExceeded {
                limit: TEAM_DEPTH_LIMIT,
            });
        }

        let team: &Team = self.snapshot.teams.get(name).ok_or_else(|| {
            BindError::reference_not_found("Team", &self.snapshot.namespace, name)
        })?;

        visiting.push(name.to_string());
        let mut members = Vec::with_capacity(team.spec.members.len());
        for member in &team.spec.members {
            let node = match member.kind {
                TeamMemberKind::Agent => ExecutionNode::Agent(self.bind_agent(&member.name)?),
                TeamMemberKind::Team => {
                    ExecutionNode::Team(Box::new(self.bind_team(&member.name, visiting)?))
                }
            };
            members.push(BoundMember {
                name: member.name.clone(),
                node,
            });
        }
        visiting.pop();

        let selector = team
            .spec
            .selector
            .as_ref()
            .map(|spec| {
                let model_name = spec
                    .model_ref
                    .as_deref()
                    .unwrap_or(&self.config.model_default_name);
                Ok(BoundSelector {
                    model: self.bind_model(self.lookup_model(model_name)?)?,
                    prompt: spec.prompt.clone(),
                })
            })
            .transpose()?;

        Ok(BoundTeam {
            name: team.metadata.name.clone(),
            strategy: team.spec.strategy,
            members,
            max_turns: team.spec.max_turns,
            graph: team.spec.graph.clone(),
            selector,
        })
    }

    /// Bind one model by name; used by the availability prober
    pub fn bind_model_by_name(&self, name: &str) -> Result<BoundModel, BindError> {
        self.bind_model(self.lookup_model(name)?)
    }

    fn lookup_model(&self, name: &str) -> Result<&'a Model, BindError> {
        self.snapshot.models.get(name).ok_or_else(|| {
            BindError::reference_not_found("Model", &self.snapshot.namespace, name)
        })
    }

    fn bind_model(&self, model: &Model) -> Result<BoundModel, BindError> {
        let spec = &model.spec;
        Ok(BoundModel {
            name: model.metadata.name.clone(),
            provider: spec.provider,
            model: self.resolver.resolve(&spec.model)?,
            base_url: self.resolver.resolve_opt(spec.config.base_url.as_ref())?,
            api_key: self.resolver.resolve_opt(spec.config.api_key.as_ref())?,
            api_version: self
                .resolver
                .resolve_opt(spec.config.api_version.as_ref())?,
            region: self.resolver.resolve_opt(spec.config.region.as_ref())?,
            properties: spec.config.properties.clone(),
        })
    }

    fn bind_tool_by_name(&self, name: &str) -> Result<BoundTool, BindError> {
        let Some(tool) = self.snapshot.tools.get(name) else {
            // The terminate tool exists even without a Tool resource
            if name == TERMINATE_TOOL {
                return Ok(BoundTool::Terminate);
            }
            return Err(BindError::reference_not_found(
                "Tool",
                &self.snapshot.namespace,
                name,
            ));
        };
        self.bind_tool(tool)
    }

    fn bind_tool(&self, tool: &Tool) -> Result<BoundTool, BindError> {
        match &tool.spec {
            ToolSpec::Http(http) => {
                let headers = http
                    .headers
                    .iter()
                    .map(|h| Ok((h.name.clone(), self.resolver.resolve(&h.value)?)))
                    .collect::<Result<Vec<_>, BindError>>()?;
                Ok(BoundTool::Http(BoundHttpTool {
                    name: tool.metadata.name.clone(),
                    description: http.description.clone(),
                    url: http.url.clone(),
                    method: http.method.clone(),
                    headers,
                    body: http.body.clone(),
                    schema: http.input_schema.clone(),
                }))
            }
            ToolSpec::Mcp(mcp) => {
                let server = self.snapshot.mcp_servers.get(&mcp.server_ref).ok_or_else(|| {
                    BindError::reference_not_found(
                        "MCPServer",
                        &self.snapshot.namespace,
                        &mcp.server_ref,
                    )
                })?;
                let server_headers = server
                    .spec
                    .headers
                    .iter()
                    .map(|h| Ok((h.name.clone(), self.resolver.resolve(&h.value)?)))
                    .collect::<Result<Vec<_>, BindError>>()?;
                Ok(BoundTool::Mcp(BoundMcpTool {
                    name: tool.metadata.name.clone(),
                    description: mcp
                        .description
                        .clone()
                        .unwrap_or_else(|| format!("Tool {} on {}", mcp.tool_name, mcp.server_ref)),
                    server_url: self.resolver.resolve(&server.spec.address)?,
                    server_name: server.metadata.name.clone(),
                    server_headers,
                    remote_tool: mcp.tool_name.clone(),
                    // Remote schemas live on the server; binding does no I/O
                    schema: serde_json::json!({"type": "object", "properties": {}}),
                }))
            }
            ToolSpec::Terminate => Ok(BoundTool::Terminate),
        }
    }

    fn bind_engine(&self, name: &str) -> Result<BoundEngine, BindError> {
        let engine = self.snapshot.engines.get(name).ok_or_else(|| {
            BindError::reference_not_found("ExecutionEngine", &self.snapshot.namespace, name)
        })?;
        let headers = engine
            .spec
            .headers
            .iter()
            .map(|h| Ok((h.name.clone(), self.resolver.resolve(&h.value)?)))
            .collect::<Result<Vec<_>, BindError>>()?;
        Ok(BoundEngine {
            name: engine.metadata.name.clone(),
            base_url: self.resolver.resolve(&engine.spec.address)?,
            headers,
        })
    }

    /// Resolve the memory reference: named memory, then the namespace
    /// default, then the null memory.
    fn bind_memory(&self, query: &Query) -> Result<MemoryBinding, BindError> {
        if let Some(name) = &query.spec.memory {
            let memory = self.snapshot.memories.get(name).ok_or_else(|| {
                BindError::reference_not_found("Memory", &self.snapshot.namespace, name)
            })?;
            return Ok(MemoryBinding::Http {
                name: memory.metadata.name.clone(),
                base_url: self.resolver.resolve(&memory.spec.address)?,
            });
        }
        match self.snapshot.memories.get(&self.config.memory_default_name) {
            // A present-but-broken default memory is an error; only a merely
            // absent default falls back silently
            Some(memory) => Ok(MemoryBinding::Http {
                name: memory.metadata.name.clone(),
                base_url: self.resolver.resolve(&memory.spec.address)?,
            }),
            None => Ok(MemoryBinding::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_contracts::{
        HttpToolSpec, LabelSelector, MemorySpec, ModelConfig, ModelProvider, ModelSpec,
        ObjectMeta, QuerySpec, QueryTarget, TeamMember, TeamSpec, TeamStrategy,
    };
    use uuid::Uuid;

    fn model(name: &str) -> Model {
        Model {
            metadata: ObjectMeta::named(name),
            spec: ModelSpec {
                provider: ModelProvider::Openai,
                model: ValueSource::literal("gpt-4o"),
                config: ModelConfig {
                    api_key: Some(ValueSource::literal("sk-test")),
                    ..Default::default()
                },
                poll_interval_seconds: 300,
            },
            status: None,
        }
    }

    fn agent(name: &str, prompt: &str) -> Agent {
        Agent::new(ObjectMeta::named(name), prompt)
    }

    fn query(targets: Vec<QueryTarget>) -> Query {
        let mut metadata = ObjectMeta::named("q");
        metadata.uid = Some(Uuid::now_v7());
        Query {
            metadata,
            spec: QuerySpec {
                input: "hello".to_string(),
                targets,
                memory: None,
                session_id: None,
                parameters: Vec::new(),
                input_override: None,
                timeout_seconds: None,
            },
            status: Default::default(),
        }
    }

    fn base_snapshot() -> ResourceSnapshot {
        ResourceSnapshot::new("default")
            .with_model(model("default"))
            .with_agent(agent("calc", "You are a calculator"))
    }

    #[test]
    fn binds_a_direct_agent_target() {
        let snapshot = base_snapshot();
        let config = EngineConfig::default();
        let q = query(vec![QueryTarget::agent("calc")]);
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);

        let plan = binder.bind(&q).unwrap();
        assert_eq!(plan.targets.len(), 1);
        match plan.targets[0].node.as_ref().unwrap() {
            ExecutionNode::Agent(bound) => {
                assert_eq!(bound.name, "calc");
                assert_eq!(bound.model.model, "gpt-4o");
                assert_eq!(bound.model.api_key.as_deref(), Some("sk-test"));
            }
            other => panic!("expected agent node, got {:?}", other),
        }
        assert!(matches!(plan.memory, MemoryBinding::Null));
    }

    #[test]
    fn binding_is_idempotent() {
        let snapshot = base_snapshot();
        let config = EngineConfig::default();
        let q = query(vec![QueryTarget::agent("calc")]);
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);
        assert_eq!(binder.bind(&q).unwrap(), binder.bind(&q).unwrap());
    }

    #[test]
    fn missing_reference_is_captured_per_target() {
        let snapshot = base_snapshot();
        let config = EngineConfig::default();
        let q = query(vec![
            QueryTarget::agent("calc"),
            QueryTarget::agent("ghost"),
        ]);
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);

        let plan = binder.bind(&q).unwrap();
        assert!(plan.targets[0].node.is_ok());
        assert_eq!(
            plan.targets[1].node.as_ref().unwrap_err().code(),
            "ReferenceNotFound"
        );
    }

    #[test]
    fn selector_expansion_is_sorted_by_name() {
        let snapshot = base_snapshot()
            .with_agent({
                let mut a = agent("r2", "prompt");
                a.metadata = a.metadata.with_label("team", "research");
                a
            })
            .with_agent({
                let mut a = agent("r1", "prompt");
                a.metadata = a.metadata.with_label("team", "research");
                a
            });
        let config = EngineConfig::default();

        let mut selector = LabelSelector::default();
        selector
            .match_labels
            .insert("team".to_string(), "research".to_string());
        let q = query(vec![QueryTarget::selector(TargetKind::Agent, selector)]);
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);

        let plan = binder.bind(&q).unwrap();
        let names: Vec<&str> = plan.targets.iter().map(|t| t.target.name.as_str()).collect();
        assert_eq!(names, vec!["r1", "r2"]);
    }

    #[test]
    fn empty_selector_fails_the_query_by_default() {
        let snapshot = base_snapshot();
        let config = EngineConfig::default();
        let mut selector = LabelSelector::default();
        selector
            .match_labels
            .insert("team".to_string(), "nobody".to_string());
        let q = query(vec![QueryTarget::selector(TargetKind::Agent, selector)]);
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);

        assert_eq!(binder.bind(&q).unwrap_err().code(), "SelectorEmpty");
    }

    #[test]
    fn empty_selector_allowed_by_policy() {
        let snapshot = base_snapshot();
        let config = EngineConfig {
            allow_empty_target_selector: true,
            ..Default::default()
        };
        let mut selector = LabelSelector::default();
        selector
            .match_labels
            .insert("team".to_string(), "nobody".to_string());
        let q = query(vec![QueryTarget::selector(TargetKind::Agent, selector)]);
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);

        let plan = binder.bind(&q).unwrap();
        assert!(plan.targets.is_empty());
    }

    #[test]
    fn team_cycle_is_detected() {
        let snapshot = base_snapshot()
            .with_team(Team {
                metadata: ObjectMeta::named("a"),
                spec: TeamSpec {
                    members: vec![TeamMember::team("b")],
                    strategy: TeamStrategy::Sequential,
                    max_turns: None,
                    graph: Vec::new(),
                    selector: None,
                },
            })
            .with_team(Team {
                metadata: ObjectMeta::named("b"),
                spec: TeamSpec {
                    members: vec![TeamMember::team("a")],
                    strategy: TeamStrategy::Sequential,
                    max_turns: None,
                    graph: Vec::new(),
                    selector: None,
                },
            });
        let config = EngineConfig::default();
        let q = query(vec![QueryTarget::team("a")]);
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);

        let plan = binder.bind(&q).unwrap();
        assert_eq!(plan.targets[0].node.as_ref().unwrap_err().code(), "TeamCycle");
    }

    #[test]
    fn prompt_parameters_merge_query_over_agent() {
        let mut bound_agent = agent("greeter", "Say hello in {{language}} to {{user}}");
        bound_agent.spec.parameters = vec![
            Parameter::literal("language", "French"),
            Parameter::literal("user", "nobody"),
        ];
        let snapshot = base_snapshot().with_agent(bound_agent);
        let config = EngineConfig::default();

        let mut q = query(vec![QueryTarget::agent("greeter")]);
        q.spec.parameters = vec![Parameter::literal("user", "Ada")];
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);

        let plan = binder.bind(&q).unwrap();
        match plan.targets[0].node.as_ref().unwrap() {
            ExecutionNode::Agent(bound) => {
                assert_eq!(bound.prompt, "Say hello in French to Ada");
            }
            other => panic!("expected agent node, got {:?}", other),
        }
    }

    #[test]
    fn named_memory_binds_and_missing_memory_fails() {
        let snapshot = base_snapshot().with_memory(maestro_contracts::Memory {
            metadata: ObjectMeta::named("chat-history"),
            spec: MemorySpec {
                address: ValueSource::literal("http://memory:8080"),
            },
        });
        let config = EngineConfig::default();

        let mut q = query(vec![QueryTarget::agent("calc")]);
        q.spec.memory = Some("chat-history".to_string());
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);
        let plan = binder.bind(&q).unwrap();
        match &plan.memory {
            MemoryBinding::Http { name, base_url } => {
                assert_eq!(name, "chat-history");
                assert_eq!(base_url, "http://memory:8080");
            }
            other => panic!("expected http memory, got {:?}", other),
        }

        q.spec.memory = Some("ghost".to_string());
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);
        assert_eq!(binder.bind(&q).unwrap_err().code(), "ReferenceNotFound");
    }

    #[test]
    fn terminate_tool_binds_without_a_resource() {
        let mut terminator = agent("stopper", "Stop when done");
        terminator.spec.tools = vec![TERMINATE_TOOL.to_string()];
        let snapshot = base_snapshot().with_agent(terminator);
        let config = EngineConfig::default();
        let q = query(vec![QueryTarget::agent("stopper")]);
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);

        let plan = binder.bind(&q).unwrap();
        match plan.targets[0].node.as_ref().unwrap() {
            ExecutionNode::Agent(bound) => {
                assert!(matches!(bound.tools[0], BoundTool::Terminate));
            }
            other => panic!("expected agent node, got {:?}", other),
        }
    }

    #[test]
    fn http_tool_headers_resolve_at_bind_time() {
        let mut fetcher = agent("fetcher", "Fetch things");
        fetcher.spec.tools = vec!["fetch".to_string()];
        let mut secret_data = std::collections::BTreeMap::new();
        secret_data.insert("token".to_string(), "tkn-1".to_string());
        let snapshot = base_snapshot()
            .with_agent(fetcher)
            .with_secret(maestro_contracts::Secret {
                metadata: ObjectMeta::named("api"),
                data: secret_data,
            })
            .with_tool(Tool {
                metadata: ObjectMeta::named("fetch"),
                spec: ToolSpec::Http(HttpToolSpec {
                    description: "Fetch a page".to_string(),
                    url: "https://example.com/{{path}}".to_string(),
                    method: "GET".to_string(),
                    headers: vec![maestro_contracts::ToolHeader {
                        name: "Authorization".to_string(),
                        value: ValueSource::secret("api", "token"),
                    }],
                    body: None,
                    input_schema: serde_json::json!({
                        "type": "object",
                        "properties": {"path": {"type": "string"}},
                        "required": ["path"]
                    }),
                }),
            });
        let config = EngineConfig::default();
        let q = query(vec![QueryTarget::agent("fetcher")]);
        let binder = Binder::new(&snapshot, &q.spec.parameters, &config);

        let plan = binder.bind(&q).unwrap();
        match plan.targets[0].node.as_ref().unwrap() {
            ExecutionNode::Agent(bound) => match &bound.tools[0] {
                BoundTool::Http(http) => {
                    assert_eq!(http.headers[0], ("Authorization".to_string(), "tkn-1".to_string()));
                    assert_eq!(http.url, "https://example.com/{{path}}");
                }
                other => panic!("expected http tool, got {:?}", other),
            },
            other => panic!("expected agent node, got {:?}", other),
        }
    }
}

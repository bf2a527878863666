// Core execution engine for the Maestro control plane
//
// Module map, leaves first:
// - resolver: ValueSource -> string against one snapshot (per-reconcile cache)
// - binder/plan/snapshot: query -> immutable execution plan
// - memory: session message log (null / http / in-memory)
// - model/retry: model-driver seam, retry with jittered backoff, mock driver
// - tools/mcp: tool dispatch (http templates, pooled MCP sessions, terminate)
// - engine/evaluator: execution-engine and evaluator HTTP clients
// - executor/runner/team: the run tree (agents, teams, direct model/tool)
// - events: verbosity-gated lifecycle events
// - config: recognized engine options

pub mod binder;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod executor;
pub mod mcp;
pub mod memory;
pub mod model;
pub mod plan;
pub mod resolver;
pub mod retry;
mod runner;
pub mod snapshot;
mod team;
pub mod template;
pub mod tools;

pub use binder::{Binder, TEAM_DEPTH_LIMIT};
pub use config::{EngineConfig, ModelCallConfig};
pub use error::{BindError, ExecError, Result};
pub use events::{
    BroadcastEventSink, CollectingEventSink, EventRecord, EventRecorder, EventSink, EventSpan,
    TracingEventSink,
};
pub use executor::{RunContext, RunOutcome, TargetExecutor};
pub use memory::{HttpSessionMemory, InMemorySessionMemory, NullMemory, SessionMemory};
pub use model::{
    call_with_retry, Completion, DriverFactory, MockCompletion, MockDriverFactory,
    MockModelDriver, ModelDriver, ToolFunction,
};
pub use plan::{
    BoundAgent, BoundEngine, BoundHttpTool, BoundMcpTool, BoundMember, BoundModel, BoundSelector,
    BoundTeam, BoundTool, ExecutionNode, MemoryBinding, PlannedTarget, QueryPlan,
};
pub use resolver::ValueResolver;
pub use retry::RetryPolicy;
pub use snapshot::ResourceSnapshot;
pub use tools::{ToolDispatcher, ToolOutcome};

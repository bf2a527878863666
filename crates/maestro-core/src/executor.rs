// Target executor - runs one node of an execution plan
//
// Agents and teams recurse through this type (teams run members, members
// may be teams); model and tool targets are handled inline. All shared
// dependencies live here so runner and coordinators stay free of wiring.

use futures::future::BoxFuture;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

use maestro_contracts::{ChatMessage, TokenUsage};

use crate::config::EngineConfig;
use crate::engine::EngineClient;
use crate::error::{ExecError, Result};
use crate::events::{self, EventRecorder};
use crate::memory::SessionMemory;
use crate::model::{call_with_retry, DriverFactory};
use crate::plan::{BoundModel, BoundTool, ExecutionNode};
use crate::tools::{ToolDispatcher, ToolOutcome};

/// Identity and cancellation for one query dispatch
#[derive(Clone)]
pub struct RunContext {
    pub namespace: String,
    pub query_name: String,
    /// Query uid; memory blocks are attributed to it
    pub query_id: String,
    pub session_id: String,
    cancel: watch::Receiver<bool>,
}

impl RunContext {
    pub fn new(
        namespace: impl Into<String>,
        query_name: impl Into<String>,
        query_id: impl Into<String>,
        session_id: impl Into<String>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            query_name: query_name.into(),
            query_id: query_id.into(),
            session_id: session_id.into(),
            cancel,
        }
    }

    /// Context that can never be cancelled, for tests
    pub fn uncancellable(
        namespace: impl Into<String>,
        query_name: impl Into<String>,
        query_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        // The receiver keeps returning the last value after the sender drops
        let (_tx, rx) = watch::channel(false);
        Self::new(namespace, query_name, query_id, session_id, rx)
    }

    /// Cooperative cancellation checkpoint
    pub fn check_cancelled(&self) -> Result<()> {
        if *self.cancel.borrow() {
            Err(ExecError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Result of running one node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    /// Final assistant content
    pub content: String,
    /// Usage accumulated across every model call underneath this node
    pub usage: TokenUsage,
    /// True when the terminate tool fired somewhere in this subtree
    pub terminated: bool,
}

impl RunOutcome {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            terminated: false,
        }
    }
}

/// Runs plan nodes against the model/tool/memory plane
pub struct TargetExecutor {
    pub(crate) drivers: Arc<dyn DriverFactory>,
    pub(crate) memory: Arc<dyn SessionMemory>,
    pub(crate) dispatcher: ToolDispatcher,
    pub(crate) engines: EngineClient,
    pub(crate) recorder: EventRecorder,
    pub(crate) config: Arc<EngineConfig>,
}

impl TargetExecutor {
    pub fn new(
        drivers: Arc<dyn DriverFactory>,
        memory: Arc<dyn SessionMemory>,
        recorder: EventRecorder,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            drivers,
            memory,
            dispatcher: ToolDispatcher::new(config.tool_call_timeout),
            engines: EngineClient::new(config.engine_call_timeout),
            recorder,
            config,
        }
    }

    /// Run one node to completion
    pub async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &RunContext,
        input: &str,
    ) -> Result<RunOutcome> {
        ctx.check_cancelled()?;
        match node {
            ExecutionNode::Agent(agent) => self.run_agent(agent, ctx, input).await,
            ExecutionNode::Team(team) => self.run_team(team, ctx, input).await,
            ExecutionNode::Model(model) => self.run_model_direct(model, ctx, input).await,
            ExecutionNode::Tool(tool) => self.run_tool_direct(tool, ctx, input).await,
        }
    }

    /// Boxed recursion point for team members
    pub(crate) fn execute_boxed<'a>(
        &'a self,
        node: &'a ExecutionNode,
        ctx: &'a RunContext,
        input: &'a str,
    ) -> BoxFuture<'a, Result<RunOutcome>> {
        Box::pin(self.execute(node, ctx, input))
    }

    /// Direct model target: one exchange, no memory, no tools
    async fn run_model_direct(
        &self,
        model: &BoundModel,
        ctx: &RunContext,
        input: &str,
    ) -> Result<RunOutcome> {
        let driver = self.drivers.driver(model)?;
        let span = self.recorder.span(
            2,
            events::LLM_CALL,
            &ctx.namespace,
            &model.name,
            "model-driver",
        );
        let messages = vec![ChatMessage::user(input)];
        match call_with_retry(driver.as_ref(), &messages, &[], &self.config.model_call).await {
            Ok(completion) => {
                span.complete(events::attrs(&[
                    ("model", json!(model.model)),
                    ("prompt_tokens", json!(completion.usage.prompt_tokens)),
                    ("completion_tokens", json!(completion.usage.completion_tokens)),
                ]));
                Ok(RunOutcome {
                    content: completion.message.content,
                    usage: completion.usage,
                    terminated: false,
                })
            }
            Err(error) => {
                span.fail(&error.to_string());
                Err(error)
            }
        }
    }

    /// Direct tool target: the query input is the argument object
    async fn run_tool_direct(
        &self,
        tool: &BoundTool,
        ctx: &RunContext,
        input: &str,
    ) -> Result<RunOutcome> {
        // Input is JSON arguments when it parses, otherwise wrapped
        let arguments: serde_json::Value = serde_json::from_str(input)
            .ok()
            .filter(|v: &serde_json::Value| v.is_object())
            .unwrap_or_else(|| json!({ "input": input }));

        let span = self.recorder.span(
            1,
            events::TOOL_CALL,
            &ctx.namespace,
            tool.name(),
            "tool-dispatcher",
        );
        match self.dispatcher.invoke(tool, &arguments).await {
            Ok(ToolOutcome::Result(text)) => {
                span.complete(events::attrs(&[("tool", json!(tool.name()))]));
                Ok(RunOutcome::text(text))
            }
            Ok(ToolOutcome::Terminate) => {
                span.complete(events::attrs(&[("tool", json!(tool.name()))]));
                Ok(RunOutcome {
                    content: String::new(),
                    usage: TokenUsage::default(),
                    terminated: true,
                })
            }
            Err(error) => {
                span.fail(&error.to_string());
                Err(error)
            }
        }
    }
}

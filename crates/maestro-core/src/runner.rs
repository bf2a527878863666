// Agent runner - one agent turn
//
// Protocol: load memory, assemble [system, ...prior, user], then loop model
// calls and tool dispatch until the model answers in plain text, terminate
// fires, or the step limit is spent. The whole turn's messages land in
// memory as one atomic append at the end.
//
// When the agent binds an execution engine, the engine replaces the
// model/tool loop only; memory and events still happen here.

use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};

use maestro_contracts::{ChatMessage, MessageRole, TokenUsage};

use crate::error::{ExecError, Result};
use crate::events::{self, attrs};
use crate::executor::{RunContext, RunOutcome, TargetExecutor};
use crate::model::{call_with_retry, ToolFunction};
use crate::plan::{BoundAgent, BoundTool};
use crate::tools::ToolOutcome;

impl TargetExecutor {
    /// Run one agent turn
    pub(crate) async fn run_agent(
        &self,
        agent: &BoundAgent,
        ctx: &RunContext,
        input: &str,
    ) -> Result<RunOutcome> {
        let span = self.recorder.span(
            1,
            events::AGENT_EXECUTION,
            &ctx.namespace,
            &agent.name,
            "agent-runner",
        );
        let result = self.run_agent_inner(agent, ctx, input).await;
        match &result {
            Ok(outcome) => span.complete(attrs(&[
                ("total_tokens", json!(outcome.usage.total_tokens)),
                ("terminated", json!(outcome.terminated)),
            ])),
            Err(error) => span.fail(&error.to_string()),
        }
        result
    }

    async fn run_agent_inner(
        &self,
        agent: &BoundAgent,
        ctx: &RunContext,
        input: &str,
    ) -> Result<RunOutcome> {
        ctx.check_cancelled()?;

        let prior = self.memory.load(&ctx.session_id).await?;
        debug!(
            agent = %agent.name,
            session_id = %ctx.session_id,
            prior = prior.len(),
            "starting agent turn"
        );

        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.push(ChatMessage::system(&agent.prompt));
        messages.extend(prior);
        messages.push(ChatMessage::user(input));

        // The block appended to memory at the end of the turn
        let mut turn_messages = vec![ChatMessage::user(input)];

        let outcome = if let Some(engine) = &agent.engine {
            self.run_engine_turn(agent, engine, ctx, messages, &mut turn_messages)
                .await
        } else {
            self.run_loop_turn(agent, ctx, messages, &mut turn_messages)
                .await
        };
        let outcome = outcome?;

        // Atomic per turn; an in-flight append finishes even under
        // cancellation so no partial block leaks
        self.memory
            .append(&ctx.session_id, &ctx.query_id, turn_messages)
            .await?;

        Ok(outcome)
    }

    /// Built-in model/tool loop, bounded by the per-agent step limit
    async fn run_loop_turn(
        &self,
        agent: &BoundAgent,
        ctx: &RunContext,
        mut messages: Vec<ChatMessage>,
        turn_messages: &mut Vec<ChatMessage>,
    ) -> Result<RunOutcome> {
        let driver = self.drivers.driver(&agent.model)?;
        let tool_functions: Vec<ToolFunction> =
            agent.tools.iter().map(ToolFunction::from_bound).collect();

        let mut usage = TokenUsage::default();
        let mut terminated = false;
        let mut content = String::new();
        // Consecutive schema violations, per tool
        let mut violations: HashMap<String, u32> = HashMap::new();

        for _step in 0..self.config.agent_step_limit {
            ctx.check_cancelled()?;

            let llm_span = self.recorder.span(
                2,
                events::LLM_CALL,
                &ctx.namespace,
                &agent.model.name,
                "model-driver",
            );
            let completion = match call_with_retry(
                driver.as_ref(),
                &messages,
                &tool_functions,
                &self.config.model_call,
            )
            .await
            {
                Ok(completion) => {
                    llm_span.complete(attrs(&[
                        ("model", json!(agent.model.model)),
                        ("prompt_tokens", json!(completion.usage.prompt_tokens)),
                        ("completion_tokens", json!(completion.usage.completion_tokens)),
                    ]));
                    completion
                }
                Err(error) => {
                    llm_span.fail(&error.to_string());
                    return Err(error);
                }
            };
            usage.add(&completion.usage);

            // Sensitive payload: only built when level 3 is on
            if self.recorder.content_enabled() {
                self.recorder.emit(
                    3,
                    events::LLM_RESPONSE,
                    &ctx.namespace,
                    &agent.name,
                    "model-driver",
                    attrs(&[("content", json!(completion.message.content))]),
                );
            }

            let tool_calls = completion.tool_calls().to_vec();
            messages.push(completion.message.clone());
            turn_messages.push(completion.message.clone());
            content = completion.message.content;

            if tool_calls.is_empty() {
                return Ok(RunOutcome {
                    content,
                    usage,
                    terminated,
                });
            }

            // Dispatch in the order the model emitted
            for call in &tool_calls {
                ctx.check_cancelled()?;

                let Some(tool) = agent.tools.iter().find(|t| t.name() == call.name) else {
                    warn!(agent = %agent.name, tool = %call.name, "model requested unknown tool");
                    let message =
                        ChatMessage::tool_result(&call.id, format!("Error: unknown tool \"{}\"", call.name));
                    messages.push(message.clone());
                    turn_messages.push(message);
                    continue;
                };

                let result_message = match self.dispatch_tool(agent, ctx, tool, call).await? {
                    ToolLoopStep::Result(text) => {
                        violations.remove(call.name.as_str());
                        ChatMessage::tool_result(&call.id, text)
                    }
                    ToolLoopStep::Violation(error) => {
                        let strikes = violations.entry(call.name.clone()).or_insert(0);
                        *strikes += 1;
                        if *strikes >= self.config.tool_schema_violation_limit {
                            return Err(error);
                        }
                        ChatMessage::tool_result(&call.id, format!("Error: {}", error))
                    }
                    ToolLoopStep::Failed(error) => {
                        // Surfaced to the model so it can route around
                        ChatMessage::tool_result(&call.id, format!("Error: {}", error))
                    }
                    ToolLoopStep::Terminate => {
                        terminated = true;
                        ChatMessage::tool_result(&call.id, "Conversation terminated.")
                    }
                };
                messages.push(result_message.clone());
                turn_messages.push(result_message);

                if terminated {
                    break;
                }
            }

            if terminated {
                return Ok(RunOutcome {
                    content,
                    usage,
                    terminated,
                });
            }
        }

        warn!(
            agent = %agent.name,
            limit = self.config.agent_step_limit,
            "agent step limit reached"
        );
        Ok(RunOutcome {
            content,
            usage,
            terminated,
        })
    }

    async fn dispatch_tool(
        &self,
        agent: &BoundAgent,
        ctx: &RunContext,
        tool: &BoundTool,
        call: &maestro_contracts::ToolCall,
    ) -> Result<ToolLoopStep> {
        let span = self.recorder.span(
            1,
            events::TOOL_CALL,
            &ctx.namespace,
            tool.name(),
            "tool-dispatcher",
        );
        match self.dispatcher.invoke(tool, &call.arguments).await {
            Ok(ToolOutcome::Result(text)) => {
                span.complete(attrs(&[
                    ("agent", json!(agent.name)),
                    ("tool", json!(tool.name())),
                ]));
                Ok(ToolLoopStep::Result(text))
            }
            Ok(ToolOutcome::Terminate) => {
                span.complete(attrs(&[
                    ("agent", json!(agent.name)),
                    ("tool", json!(tool.name())),
                ]));
                Ok(ToolLoopStep::Terminate)
            }
            Err(error @ ExecError::ToolSchemaViolation { .. }) => {
                span.fail(&error.to_string());
                Ok(ToolLoopStep::Violation(error))
            }
            Err(error @ (ExecError::Cancelled | ExecError::Timeout { .. })) => {
                span.fail(&error.to_string());
                Err(error)
            }
            Err(error) => {
                span.fail(&error.to_string());
                Ok(ToolLoopStep::Failed(error))
            }
        }
    }

    /// Engine override: the engine runs the loop, we keep memory and events
    async fn run_engine_turn(
        &self,
        agent: &BoundAgent,
        engine: &crate::plan::BoundEngine,
        ctx: &RunContext,
        messages: Vec<ChatMessage>,
        turn_messages: &mut Vec<ChatMessage>,
    ) -> Result<RunOutcome> {
        let tool_functions: Vec<ToolFunction> =
            agent.tools.iter().map(ToolFunction::from_bound).collect();

        ctx.check_cancelled()?;
        let (engine_messages, usage) = self
            .engines
            .execute(engine, &agent.name, messages, &tool_functions, &agent.model.model)
            .await?;

        let content = engine_messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.clone())
            .ok_or_else(|| ExecError::EngineBadResponse {
                message: "engine returned no assistant message".to_string(),
            })?;

        turn_messages.extend(engine_messages);
        Ok(RunOutcome {
            content,
            usage,
            terminated: false,
        })
    }
}

/// Outcome of one tool call inside the loop
enum ToolLoopStep {
    Result(String),
    Violation(ExecError),
    Failed(ExecError),
    Terminate,
}

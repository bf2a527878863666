// Team coordinators
//
// One function per strategy; they share the transcript and member-run
// plumbing but keep distinct termination semantics:
//   sequential  - declaration order, output feeds forward, errors stop
//   round-robin - circular until terminate, maxTurns, or no progress
//   graph       - guarded edges, depth-first, cycles bounded by maxTurns
//   selector    - a model names the next member each turn
//
// Termination precedence everywhere: terminate > maxTurns > no-progress.

use serde_json::json;
use tracing::{debug, warn};

use maestro_contracts::{ChatMessage, TokenUsage};

use crate::error::{BindError, ExecError, Result};
use crate::events::{self, attrs};
use crate::executor::{RunContext, RunOutcome, TargetExecutor};
use crate::model::call_with_retry;
use crate::plan::{BoundMember, BoundTeam};

/// Why a team stopped iterating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Finished,
    Terminate,
    MaxTurns,
    NoProgress,
}

impl StopReason {
    fn as_str(&self) -> &'static str {
        match self {
            StopReason::Finished => "finished",
            StopReason::Terminate => "terminate",
            StopReason::MaxTurns => "max-turns",
            StopReason::NoProgress => "no-progress",
        }
    }
}

impl TargetExecutor {
    /// Run a team under its strategy
    pub(crate) async fn run_team(
        &self,
        team: &BoundTeam,
        ctx: &RunContext,
        input: &str,
    ) -> Result<RunOutcome> {
        let span = self.recorder.span(
            1,
            events::TEAM_EXECUTION,
            &ctx.namespace,
            &team.name,
            "team-coordinator",
        );
        let result = match team.strategy {
            maestro_contracts::TeamStrategy::Sequential => {
                self.run_sequential(team, ctx, input).await
            }
            maestro_contracts::TeamStrategy::RoundRobin => {
                self.run_round_robin(team, ctx, input).await
            }
            maestro_contracts::TeamStrategy::Graph => self.run_graph(team, ctx, input).await,
            maestro_contracts::TeamStrategy::Selector => self.run_selector(team, ctx, input).await,
        };
        match &result {
            Ok((outcome, reason)) => span.complete(attrs(&[
                ("strategy", json!(team.strategy.to_string())),
                ("stop_reason", json!(reason.as_str())),
                ("total_tokens", json!(outcome.usage.total_tokens)),
            ])),
            Err(error) => span.fail(&error.to_string()),
        }
        result.map(|(outcome, _)| outcome)
    }

    /// Run one member with its own event span
    async fn run_member(
        &self,
        member: &BoundMember,
        ctx: &RunContext,
        input: &str,
    ) -> Result<RunOutcome> {
        let span = self.recorder.span(
            1,
            events::TEAM_MEMBER,
            &ctx.namespace,
            &member.name,
            "team-coordinator",
        );
        let result = self.execute_boxed(&member.node, ctx, input).await;
        match &result {
            Ok(outcome) => span.complete(attrs(&[
                ("terminated", json!(outcome.terminated)),
                ("total_tokens", json!(outcome.usage.total_tokens)),
            ])),
            Err(error) => span.fail(&error.to_string()),
        }
        result
    }

    fn turn_budget(&self, team: &BoundTeam) -> u32 {
        team.max_turns.unwrap_or(self.config.team_max_turns)
    }

    /// Members run once each, in order; each receives the previous output.
    /// A failed member stops the team and surfaces the error.
    async fn run_sequential(
        &self,
        team: &BoundTeam,
        ctx: &RunContext,
        input: &str,
    ) -> Result<(RunOutcome, StopReason)> {
        let mut usage = TokenUsage::default();
        let mut current = input.to_string();
        let mut reason = StopReason::Finished;

        for member in &team.members {
            ctx.check_cancelled()?;
            let outcome = self.run_member(member, ctx, &current).await?;
            usage.add(&outcome.usage);
            current = outcome.content;
            if outcome.terminated {
                reason = StopReason::Terminate;
                break;
            }
        }

        Ok((
            RunOutcome {
                content: current,
                usage,
                terminated: reason == StopReason::Terminate,
            },
            reason,
        ))
    }

    /// Circular iteration; the current output feeds the next member.
    /// Stops on terminate, the turn budget, or a full cycle without new
    /// content. A failed member stops the team and surfaces the error.
    async fn run_round_robin(
        &self,
        team: &BoundTeam,
        ctx: &RunContext,
        input: &str,
    ) -> Result<(RunOutcome, StopReason)> {
        let max_turns = self.turn_budget(team);
        let mut usage = TokenUsage::default();
        let mut current = input.to_string();
        let mut turns: u32 = 0;
        let mut stale: usize = 0;
        let mut index = 0;
        let reason;

        loop {
            if turns >= max_turns {
                reason = StopReason::MaxTurns;
                break;
            }
            ctx.check_cancelled()?;

            let member = &team.members[index % team.members.len()];
            let outcome = self.run_member(member, ctx, &current).await?;
            turns += 1;
            index += 1;
            usage.add(&outcome.usage);

            if outcome.content.trim().is_empty() {
                stale += 1;
            } else {
                stale = 0;
                current = outcome.content;
            }

            if outcome.terminated {
                reason = StopReason::Terminate;
                break;
            }
            if stale >= team.members.len() {
                debug!(team = %team.name, "no member produced content for a full cycle");
                reason = StopReason::NoProgress;
                break;
            }
        }

        Ok((
            RunOutcome {
                content: current,
                usage,
                terminated: reason == StopReason::Terminate,
            },
            reason,
        ))
    }

    /// Directed edges over members, entry at the first member. Edges with a
    /// guard are followed when the guard substring appears in the member's
    /// output; unguarded edges are followed unconditionally, depth-first.
    /// Cycles are legal; the turn budget bounds them. A failed member's
    /// failure message flows to its successors.
    async fn run_graph(
        &self,
        team: &BoundTeam,
        ctx: &RunContext,
        input: &str,
    ) -> Result<(RunOutcome, StopReason)> {
        let max_turns = self.turn_budget(team);
        let mut usage = TokenUsage::default();
        let mut outputs: Vec<String> = Vec::new();
        let mut turns: u32 = 0;
        let mut reason = StopReason::Finished;

        let entry = match team.members.first() {
            Some(member) => member.name.clone(),
            None => return Ok((RunOutcome::text(""), StopReason::Finished)),
        };
        let mut stack: Vec<(String, String)> = vec![(entry, input.to_string())];

        while let Some((name, node_input)) = stack.pop() {
            if turns >= max_turns {
                reason = StopReason::MaxTurns;
                break;
            }
            ctx.check_cancelled()?;

            let Some(member) = team.members.iter().find(|m| m.name == name) else {
                // Admission validates edges; a hand-built plan may still miss
                warn!(team = %team.name, member = %name, "edge to unknown member");
                continue;
            };

            let content = match self.run_member(member, ctx, &node_input).await {
                Ok(outcome) => {
                    usage.add(&outcome.usage);
                    let content = outcome.content;
                    if outcome.terminated {
                        outputs.push(content);
                        reason = StopReason::Terminate;
                        break;
                    }
                    content
                }
                // Route around: successors see the failure message
                Err(error) => format!("Member {} failed: {}", name, error),
            };
            turns += 1;
            outputs.push(content.clone());

            let followed: Vec<&maestro_contracts::GraphEdge> = team
                .graph
                .iter()
                .filter(|edge| edge.from == name)
                .filter(|edge| match &edge.when {
                    Some(guard) => content.contains(guard.as_str()),
                    None => true,
                })
                .collect();
            // Reverse push so the first-declared edge runs first
            for edge in followed.into_iter().rev() {
                stack.push((edge.to.clone(), content.clone()));
            }
        }

        Ok((
            RunOutcome {
                content: outputs.join("\n\n"),
                usage,
                terminated: reason == StopReason::Terminate,
            },
            reason,
        ))
    }

    /// The selector model picks the next member from the transcript each
    /// turn. Unknown picks stop the team; failed members join the
    /// transcript as failure messages so the selector can route around.
    async fn run_selector(
        &self,
        team: &BoundTeam,
        ctx: &RunContext,
        input: &str,
    ) -> Result<(RunOutcome, StopReason)> {
        let selector = team.selector.as_ref().ok_or_else(|| {
            ExecError::Bind(BindError::KeyMissing {
                kind: "Team".to_string(),
                name: team.name.clone(),
                key: "spec.selector".to_string(),
            })
        })?;
        let driver = self.drivers.driver(&selector.model)?;

        let member_names: Vec<&str> = team.members.iter().map(|m| m.name.as_str()).collect();
        let system = format!(
            "{}\n\nMembers: {}\nReply with exactly one member name.",
            selector.prompt,
            member_names.join(", ")
        );

        let max_turns = self.turn_budget(team);
        let mut usage = TokenUsage::default();
        let mut transcript: Vec<ChatMessage> = vec![ChatMessage::user(input)];
        let mut content = String::new();
        let mut turns: u32 = 0;
        let reason;

        loop {
            if turns >= max_turns {
                reason = StopReason::MaxTurns;
                break;
            }
            ctx.check_cancelled()?;

            let mut messages = Vec::with_capacity(transcript.len() + 1);
            messages.push(ChatMessage::system(&system));
            messages.extend(transcript.iter().cloned());

            let llm_span = self.recorder.span(
                2,
                events::LLM_CALL,
                &ctx.namespace,
                &selector.model.name,
                "team-coordinator",
            );
            let completion =
                match call_with_retry(driver.as_ref(), &messages, &[], &self.config.model_call)
                    .await
                {
                    Ok(completion) => {
                        llm_span.complete(attrs(&[
                            ("model", json!(selector.model.model)),
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

            let pick = completion.message.content.trim().to_string();
            let Some(member) = team
                .members
                .iter()
                .find(|m| m.name == pick)
                .or_else(|| {
                    team.members
                        .iter()
                        .find(|m| m.name.eq_ignore_ascii_case(&pick))
                })
            else {
                self.recorder.emit(
                    1,
                    events::TEAM_SELECTOR_MISS,
                    &ctx.namespace,
                    &team.name,
                    "team-coordinator",
                    attrs(&[("picked", json!(pick))]),
                );
                reason = StopReason::NoProgress;
                break;
            };

            let member_input = transcript
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_else(|| input.to_string());
            match self.run_member(member, ctx, &member_input).await {
                Ok(outcome) => {
                    usage.add(&outcome.usage);
                    turns += 1;
                    content = outcome.content.clone();
                    transcript
                        .push(ChatMessage::assistant(outcome.content).with_name(&member.name));
                    if outcome.terminated {
                        reason = StopReason::Terminate;
                        break;
                    }
                }
                Err(error) => {
                    turns += 1;
                    transcript.push(
                        ChatMessage::assistant(format!(
                            "Member {} failed: {}",
                            member.name, error
                        ))
                        .with_name(&member.name),
                    );
                }
            }
        }

        Ok((
            RunOutcome {
                content,
                usage,
                terminated: reason == StopReason::Terminate,
            },
            reason,
        ))
    }
}

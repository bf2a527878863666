// Execution-engine client
//
// POST / with {agent, messages, tools, model}; the engine runs its own
// model/tool loop and returns the final messages plus usage.

use reqwest::Client;
use std::time::Duration;

use maestro_contracts::{ChatMessage, EngineRequest, EngineResponse, TokenUsage};

use crate::error::{ExecError, Result};
use crate::model::ToolFunction;
use crate::plan::BoundEngine;

/// Client for execution-engine plugins
pub struct EngineClient {
    client: Client,
    timeout: Duration,
}

impl EngineClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    /// Run one agent turn on the engine; returns the messages the engine
    /// produced (excluding the input) and the usage it reported
    pub async fn execute(
        &self,
        engine: &BoundEngine,
        agent_name: &str,
        messages: Vec<ChatMessage>,
        tools: &[ToolFunction],
        model: &str,
    ) -> Result<(Vec<ChatMessage>, TokenUsage)> {
        let request = EngineRequest {
            agent: agent_name.to_string(),
            messages,
            tools: tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect(),
            model: model.to_string(),
        };

        let mut builder = self
            .client
            .post(&engine.base_url)
            .timeout(self.timeout)
            .json(&request);
        for (name, value) in &engine.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ExecError::timeout("engine call")
            } else {
                ExecError::EngineUnavailable {
                    message: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(ExecError::EngineUnavailable {
                message: format!("engine returned {}", response.status()),
            });
        }

        let body: EngineResponse =
            response
                .json()
                .await
                .map_err(|e| ExecError::EngineBadResponse {
                    message: e.to_string(),
                })?;

        if let Some(error) = body.error {
            return Err(ExecError::EngineBadResponse { message: error });
        }
        if body.messages.is_empty() {
            return Err(ExecError::EngineBadResponse {
                message: "engine returned no messages".to_string(),
            });
        }
        Ok((body.messages, body.usage.unwrap_or_default()))
    }
}

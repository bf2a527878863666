// HTTP driver for OpenAI-compatible chat-completions endpoints
//
// One driver serves all three providers; the factory picks the endpoint,
// auth header, and query parameters per provider variant.

use async_trait::async_trait;
use reqwest::Client;

use maestro_contracts::ChatMessage;
use maestro_core::{Completion, ExecError, ModelDriver, Result, ToolFunction};

use crate::protocol::{
    from_wire, to_wire, to_wire_tools, ChatCompletionRequest, ChatCompletionResponse,
};

/// How the provider authenticates requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` (openai, bedrock)
    Bearer(String),
    /// `api-key: <key>` header (azure)
    ApiKeyHeader(String),
    /// No authentication (local gateways)
    None,
}

/// Chat-completions driver bound to one endpoint
pub struct ChatCompletionsDriver {
    client: Client,
    endpoint: String,
    auth: AuthStyle,
    /// Query parameters appended to every request (azure api-version)
    query: Vec<(String, String)>,
    /// Resolved deployment/model name sent in the request body
    model: String,
    /// Request properties merged into every body (temperature, ...)
    properties: serde_json::Map<String, serde_json::Value>,
}

impl ChatCompletionsDriver {
    pub fn new(
        endpoint: impl Into<String>,
        auth: AuthStyle,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            auth,
            query: Vec::new(),
            model: model.into(),
            properties: serde_json::Map::new(),
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_properties(
        mut self,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.properties = properties;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ModelDriver for ChatCompletionsDriver {
    async fn call(&self, messages: &[ChatMessage], tools: &[ToolFunction]) -> Result<Completion> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.iter().map(to_wire).collect(),
            tools: to_wire_tools(tools),
            properties: self.properties.clone(),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        builder = match &self.auth {
            AuthStyle::Bearer(key) => builder.header("Authorization", format!("Bearer {}", key)),
            AuthStyle::ApiKeyHeader(key) => builder.header("api-key", key),
            AuthStyle::None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ExecError::timeout("model call")
            } else {
                ExecError::model_transient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(300).collect();
            // 4xx is terminal for this target; 5xx retries upstream
            return if status.is_client_error() {
                Err(ExecError::ModelRequest {
                    status: status.as_u16(),
                    message: excerpt,
                })
            } else {
                Err(ExecError::model_transient(format!(
                    "{}: {}",
                    status, excerpt
                )))
            };
        }

        let body: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| ExecError::model_transient(format!("malformed response: {}", e)))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ExecError::model_transient("response carried no choices"))?;

        tracing::debug!(
            model = %self.model,
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            "chat completion"
        );

        Ok(Completion {
            message: from_wire(choice.message),
            usage: body.usage.map(Into::into).unwrap_or_default(),
        })
    }
}

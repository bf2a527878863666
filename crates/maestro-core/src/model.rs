// Model driver seam
//
// The driver speaks one request/response exchange with a provider; the tool
// loop lives in the agent runner, never here. Provider implementations are
// in maestro-providers; MockModelDriver lives here for tests across crates.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use maestro_contracts::{ChatMessage, TokenUsage, ToolCall};

use crate::config::ModelCallConfig;
use crate::error::{ExecError, Result};
use crate::plan::{BoundModel, BoundTool};
use crate::retry::RetryPolicy;

/// Tool definition advertised to the model, in function-call shape
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolFunction {
    pub fn from_bound(tool: &BoundTool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
        }
    }
}

/// One completed model exchange
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Assistant message; may carry tool calls
    pub message: ChatMessage,
    pub usage: TokenUsage,
}

impl Completion {
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message.tool_calls.as_deref().unwrap_or_default()
    }
}

/// A provider-bound chat-completions client
#[async_trait]
pub trait ModelDriver: Send + Sync {
    /// One chat-completions exchange. Tool calls come back unexecuted.
    async fn call(&self, messages: &[ChatMessage], tools: &[ToolFunction]) -> Result<Completion>;

    /// Availability probe; the default sends a minimal exchange
    async fn probe(&self) -> Result<()> {
        self.call(&[ChatMessage::user("ping")], &[]).await.map(|_| ())
    }
}

/// Builds a driver for a bound model
pub trait DriverFactory: Send + Sync {
    fn driver(&self, model: &BoundModel) -> Result<Arc<dyn ModelDriver>>;
}

/// Call a driver with the configured deadline and transient-retry policy.
///
/// 4xx responses are terminal immediately; 5xx and timeouts retry with
/// jittered backoff until the attempt budget is spent.
pub async fn call_with_retry(
    driver: &dyn ModelDriver,
    messages: &[ChatMessage],
    tools: &[ToolFunction],
    config: &ModelCallConfig,
) -> Result<Completion> {
    let policy = RetryPolicy::with_retries(
        config.retries,
        config.backoff_initial,
        config.backoff_max,
    );
    let mut attempt: u32 = 1;
    loop {
        let outcome = tokio::time::timeout(config.timeout, driver.call(messages, tools)).await;
        let error = match outcome {
            Ok(Ok(completion)) => return Ok(completion),
            Ok(Err(error)) => error,
            Err(_) => ExecError::timeout("model call"),
        };
        if !error.is_transient() {
            return Err(error);
        }
        match policy.delay_for(attempt) {
            Some(delay) => {
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying model call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => return Err(error),
        }
    }
}

// ============================================================================
// MockModelDriver - returns scripted completions
// ============================================================================

/// A scripted mock response
#[derive(Debug, Clone)]
pub struct MockCompletion {
    pub text: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub usage: TokenUsage,
    pub delay: Option<std::time::Duration>,
}

impl MockCompletion {
    /// Text-only response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: None,
            usage: TokenUsage::new(10, 5),
            delay: None,
        }
    }

    /// Response that requests tool calls
    pub fn with_tools(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Some(tool_calls),
            usage: TokenUsage::new(10, 5),
            delay: None,
        }
    }

    pub fn with_usage(mut self, prompt: u64, completion: u64) -> Self {
        self.usage = TokenUsage::new(prompt, completion);
        self
    }

    /// Hold the response for a while; lets tests exercise deadlines and
    /// cancellation
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Mock driver that replays scripted completions in sequence and logs
/// every call it receives
#[derive(Debug, Default, Clone)]
pub struct MockModelDriver {
    responses: Arc<RwLock<Vec<MockCompletion>>>,
    call_index: Arc<RwLock<usize>>,
    call_log: Arc<RwLock<Vec<Vec<ChatMessage>>>>,
    failures: Arc<RwLock<Vec<ExecError>>>,
}

impl MockModelDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_response(&self, response: MockCompletion) {
        self.responses.write().await.push(response);
    }

    pub async fn set_responses(&self, responses: Vec<MockCompletion>) {
        *self.responses.write().await = responses;
        *self.call_index.write().await = 0;
    }

    /// Queue errors returned before any scripted completion
    pub async fn fail_with(&self, errors: Vec<ExecError>) {
        *self.failures.write().await = errors;
    }

    /// Every message list this driver was called with
    pub async fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.call_log.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.call_log.read().await.len()
    }
}

#[async_trait]
impl ModelDriver for MockModelDriver {
    async fn call(&self, messages: &[ChatMessage], _tools: &[ToolFunction]) -> Result<Completion> {
        self.call_log.write().await.push(messages.to_vec());

        {
            let mut failures = self.failures.write().await;
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }

        let response = {
            let mut index = self.call_index.write().await;
            let responses = self.responses.read().await;
            let response = responses
                .get(*index)
                .cloned()
                .unwrap_or_else(|| MockCompletion::text("(no scripted response)"));
            *index += 1;
            response
        };

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        let message = match response.tool_calls {
            Some(tool_calls) => ChatMessage::assistant_tool_calls(response.text, tool_calls),
            None => ChatMessage::assistant(response.text),
        };
        Ok(Completion {
            message,
            usage: response.usage,
        })
    }
}

/// Factory that hands the same mock driver to every model
#[derive(Debug, Default, Clone)]
pub struct MockDriverFactory {
    pub driver: MockModelDriver,
    /// Optional per-model drivers, keyed by model resource name
    named: Arc<RwLock<std::collections::HashMap<String, MockModelDriver>>>,
}

impl MockDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_driver(driver: MockModelDriver) -> Self {
        Self {
            driver,
            named: Arc::default(),
        }
    }

    /// Register a dedicated driver for one model name
    pub async fn register_async(&self, model_name: impl Into<String>, driver: MockModelDriver) {
        self.named.write().await.insert(model_name.into(), driver);
    }
}

impl DriverFactory for MockDriverFactory {
    fn driver(&self, model: &BoundModel) -> Result<Arc<dyn ModelDriver>> {
        if let Ok(named) = self.named.try_read() {
            if let Some(driver) = named.get(&model.name) {
                return Ok(Arc::new(driver.clone()));
            }
        }
        Ok(Arc::new(self.driver.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_config(retries: u32) -> ModelCallConfig {
        ModelCallConfig {
            timeout: Duration::from_secs(5),
            retries,
            backoff_initial: Duration::from_millis(1),
            backoff_max: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn transient_errors_retry_then_succeed() {
        let driver = MockModelDriver::new();
        driver
            .fail_with(vec![
                ExecError::model_transient("503"),
                ExecError::model_transient("502"),
            ])
            .await;
        driver.add_response(MockCompletion::text("ok")).await;

        let completion = call_with_retry(
            &driver,
            &[ChatMessage::user("hi")],
            &[],
            &fast_config(3),
        )
        .await
        .unwrap();
        assert_eq!(completion.message.content, "ok");
        assert_eq!(driver.call_count().await, 3);
    }

    #[tokio::test]
    async fn request_errors_do_not_retry() {
        let driver = MockModelDriver::new();
        driver
            .fail_with(vec![ExecError::ModelRequest {
                status: 400,
                message: "bad request".to_string(),
            }])
            .await;

        let err = call_with_retry(&driver, &[ChatMessage::user("hi")], &[], &fast_config(3))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ModelRequestError");
        assert_eq!(driver.call_count().await, 1);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let driver = MockModelDriver::new();
        driver
            .fail_with(vec![
                ExecError::model_transient("1"),
                ExecError::model_transient("2"),
                ExecError::model_transient("3"),
                ExecError::model_transient("4"),
            ])
            .await;

        let err = call_with_retry(&driver, &[ChatMessage::user("hi")], &[], &fast_config(2))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ModelTransient");
        // Initial attempt plus two retries
        assert_eq!(driver.call_count().await, 3);
    }
}

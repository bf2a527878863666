// Tool dispatcher
//
// Invoke(tool, args) -> text result. HTTP tools fill URL/header/body
// templates from the arguments after JSON-Schema validation; MCP tools go
// through the pooled session; terminate short-circuits back to the runner.

use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{ExecError, Result};
use crate::mcp::McpSessionPool;
use crate::plan::{BoundHttpTool, BoundTool};
use crate::template;

const EXCERPT_LIMIT: usize = 200;

/// Outcome of one tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Response body or tool text result
    Result(String),
    /// The internal terminate tool was invoked
    Terminate,
}

/// Executes bound tools
pub struct ToolDispatcher {
    client: Client,
    mcp: Arc<McpSessionPool>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            mcp: Arc::new(McpSessionPool::new()),
            timeout,
        }
    }

    /// Dispatch one tool call with already-parsed arguments
    pub async fn invoke(&self, tool: &BoundTool, arguments: &Value) -> Result<ToolOutcome> {
        match tool {
            BoundTool::Terminate => Ok(ToolOutcome::Terminate),
            BoundTool::Http(http) => {
                validate_arguments(&http.name, &http.schema, arguments)?;
                self.invoke_http(http, arguments).await.map(ToolOutcome::Result)
            }
            BoundTool::Mcp(mcp) => {
                let session = self
                    .mcp
                    .session(&mcp.server_url, &mcp.server_headers, self.timeout)
                    .await;
                session
                    .call_tool(&mcp.remote_tool, arguments)
                    .await
                    .map(ToolOutcome::Result)
            }
        }
    }

    async fn invoke_http(&self, tool: &BoundHttpTool, arguments: &Value) -> Result<String> {
        let vars = argument_vars(arguments);
        let url = template::substitute(&tool.url, &vars);
        let method: reqwest::Method = tool
            .method
            .to_ascii_uppercase()
            .parse()
            .unwrap_or(reqwest::Method::GET);

        debug!(tool = %tool.name, method = %method, url = %url, "dispatching http tool");

        let mut builder = self
            .client
            .request(method, &url)
            .timeout(self.timeout);
        for (name, value) in &tool.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &tool.body {
            builder = builder.body(template::substitute(body, &vars));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ExecError::timeout("tool call")
            } else {
                ExecError::ToolHttp {
                    name: tool.name.clone(),
                    status: 0,
                    excerpt: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ExecError::ToolHttp {
                name: tool.name.clone(),
                status: status.as_u16(),
                excerpt: excerpt(&body),
            });
        }
        Ok(body)
    }
}

/// Validate call arguments against the tool's input schema
pub fn validate_arguments(tool_name: &str, schema: &Value, arguments: &Value) -> Result<()> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ExecError::ToolSchemaViolation {
        name: tool_name.to_string(),
        message: format!("invalid schema: {}", e),
    })?;
    if let Err(error) = validator.validate(arguments) {
        return Err(ExecError::ToolSchemaViolation {
            name: tool_name.to_string(),
            message: error.to_string(),
        });
    }
    Ok(())
}

/// Flatten top-level argument fields into template variables
fn argument_vars(arguments: &Value) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    if let Value::Object(fields) = arguments {
        for (name, value) in fields {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            vars.insert(name.clone(), rendered);
        }
    }
    vars
}

fn excerpt(body: &str) -> String {
    if body.len() <= EXCERPT_LIMIT {
        body.to_string()
    } else {
        let mut cut = EXCERPT_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &body[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_violations_are_reported() {
        let schema = json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        });
        let err = validate_arguments("weather", &schema, &json!({})).unwrap_err();
        assert_eq!(err.code(), "ToolSchemaViolation");

        assert!(validate_arguments("weather", &schema, &json!({"city": "Oslo"})).is_ok());
    }

    #[test]
    fn argument_vars_render_non_strings() {
        let vars = argument_vars(&json!({"city": "Oslo", "days": 3}));
        assert_eq!(vars["city"], "Oslo");
        assert_eq!(vars["days"], "3");
    }

    #[test]
    fn excerpts_are_bounded() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), EXCERPT_LIMIT + 3);
        assert_eq!(excerpt("short"), "short");
    }

    #[tokio::test]
    async fn terminate_short_circuits() {
        let dispatcher = ToolDispatcher::new(Duration::from_secs(1));
        let outcome = dispatcher
            .invoke(&BoundTool::Terminate, &json!({}))
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Terminate);
    }
}

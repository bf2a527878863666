// MCP client with session management
//
// Speaks JSON-RPC 2.0 over streamable HTTP: initialize once per server,
// then tools/call. Sessions are pooled per server URL and reused across
// tool calls within the controller process.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ExecError, Result};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SESSION_HEADER: &str = "Mcp-Session-Id";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// One connected MCP server session
pub struct McpSession {
    client: Client,
    base_url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl McpSession {
    fn new(base_url: String, headers: Vec<(String, String)>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url,
            headers,
            timeout,
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    async fn rpc(&self, tool_name: &str, method: &str, params: Value) -> Result<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut builder = self
            .client
            .post(&self.base_url)
            .timeout(self.timeout)
            .header("Accept", "application/json")
            .json(&request);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if let Some(session) = self.session_id.lock().await.as_deref() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ExecError::timeout("mcp call")
            } else {
                ExecError::ToolMcp {
                    name: tool_name.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(ExecError::ToolMcp {
                name: tool_name.to_string(),
                message: format!("server returned {}", response.status()),
            });
        }

        // The server may assign a session on initialize
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock().await = Some(session.to_string());
        }

        let body: JsonRpcResponse = response.json().await.map_err(|e| ExecError::ToolMcp {
            name: tool_name.to_string(),
            message: format!("malformed response: {}", e),
        })?;

        if let Some(error) = body.error {
            return Err(ExecError::ToolMcp {
                name: tool_name.to_string(),
                message: format!("rpc error {}: {}", error.code, error.message),
            });
        }
        body.result.ok_or_else(|| ExecError::ToolMcp {
            name: tool_name.to_string(),
            message: "response carried neither result nor error".to_string(),
        })
    }

    async fn ensure_initialized(&self, tool_name: &str) -> Result<()> {
        if self.session_id.lock().await.is_some() {
            return Ok(());
        }
        debug!(server = %self.base_url, "initializing mcp session");
        self.rpc(
            tool_name,
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "maestro", "version": env!("CARGO_PKG_VERSION")},
            }),
        )
        .await?;
        // Servers without session management still work; mark connected
        let mut session = self.session_id.lock().await;
        if session.is_none() {
            *session = Some(String::new());
        }
        Ok(())
    }

    /// Call a named tool, returning the concatenated text content
    pub async fn call_tool(&self, remote_tool: &str, arguments: &Value) -> Result<String> {
        self.ensure_initialized(remote_tool).await?;
        let result = self
            .rpc(
                remote_tool,
                "tools/call",
                json!({"name": remote_tool, "arguments": arguments}),
            )
            .await?;

        if result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            let message = extract_text(&result);
            return Err(ExecError::ToolMcp {
                name: remote_tool.to_string(),
                message: if message.is_empty() {
                    "tool reported an error".to_string()
                } else {
                    message
                },
            });
        }
        Ok(extract_text(&result))
    }
}

fn extract_text(result: &Value) -> String {
    result
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Pool of MCP sessions keyed by server URL, reused across tool calls
#[derive(Default)]
pub struct McpSessionPool {
    sessions: Mutex<HashMap<String, Arc<McpSession>>>,
}

impl McpSessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or open the session for a server
    pub async fn session(
        &self,
        base_url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Arc<McpSession> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(base_url.to_string())
            .or_insert_with(|| {
                Arc::new(McpSession::new(
                    base_url.to_string(),
                    headers.to_vec(),
                    timeout,
                ))
            })
            .clone()
    }
}

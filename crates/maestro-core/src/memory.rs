// Memory adapter - per-session message log behind a uniform trait
//
// Three implementations:
// - NullMemory for queries with no memory at all
// - HttpSessionMemory speaking the memory-service wire contract
// - InMemorySessionMemory for tests and examples
//
// Appends are atomic per call: one agent turn becomes one append, and a
// failed append never leaves a partial block behind.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use maestro_contracts::{AppendMessagesRequest, ChatMessage, ListMessagesResponse, MessageRecord};

use crate::error::{ExecError, Result};
use crate::plan::MemoryBinding;

/// Session-scoped message log
#[async_trait]
pub trait SessionMemory: Send + Sync {
    /// Prior messages in append order; `[]` when the session is new
    async fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>>;

    /// Append one block of messages atomically
    async fn append(
        &self,
        session_id: &str,
        query_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<()>;
}

/// Build the memory implementation for a plan's binding
pub fn memory_for(binding: &MemoryBinding, timeout: Duration) -> Arc<dyn SessionMemory> {
    match binding {
        MemoryBinding::Null => Arc::new(NullMemory),
        MemoryBinding::Http { base_url, .. } => {
            Arc::new(HttpSessionMemory::new(base_url.clone(), timeout))
        }
    }
}

// ============================================================================
// NullMemory - no persistence
// ============================================================================

/// Memory that remembers nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMemory;

#[async_trait]
impl SessionMemory for NullMemory {
    async fn load(&self, _session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(Vec::new())
    }

    async fn append(
        &self,
        _session_id: &str,
        _query_id: &str,
        _messages: Vec<ChatMessage>,
    ) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// HttpSessionMemory - cluster memory service
// ============================================================================

/// Client for the memory-service HTTP contract
pub struct HttpSessionMemory {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSessionMemory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            timeout,
        }
    }

    /// GET /health; 200 means the backend is reachable
    pub async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ExecError::memory_unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ExecError::memory_unavailable(format!(
                "health returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// DELETE /messages; purges every session
    pub async fn purge(&self) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/messages", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ExecError::memory_unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ExecError::memory_unavailable(format!(
                "purge returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionMemory for HttpSessionMemory {
    async fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let response = self
            .client
            .get(format!("{}/messages", self.base_url))
            .query(&[("session_id", session_id)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecError::timeout("memory load")
                } else {
                    ExecError::memory_unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ExecError::memory_unavailable(format!(
                "load returned {}",
                response.status()
            )));
        }

        let body: ListMessagesResponse = response.json().await.map_err(|e| {
            ExecError::MemoryBadResponse {
                message: e.to_string(),
            }
        })?;

        debug!(
            session_id = %session_id,
            count = body.messages.len(),
            "loaded session messages"
        );
        Ok(body.messages.into_iter().map(|r| r.message).collect())
    }

    async fn append(
        &self,
        session_id: &str,
        query_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let request = AppendMessagesRequest {
            session_id: session_id.to_string(),
            query_id: query_id.to_string(),
            messages,
        };
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecError::timeout("memory append")
                } else {
                    ExecError::memory_unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ExecError::memory_unavailable(format!(
                "append returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// InMemorySessionMemory - for tests and examples
// ============================================================================

/// Memory kept in process, with the same sequencing guarantees as the
/// service contract: sequence numbers are strictly monotonic per session.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionMemory {
    sessions: Arc<RwLock<HashMap<String, Vec<MessageRecord>>>>,
}

impl InMemorySessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full records for a session, including sequence numbers and the query
    /// each block came from
    pub async fn records(&self, session_id: &str) -> Vec<MessageRecord> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionMemory for InMemorySessionMemory {
    async fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|records| records.iter().map(|r| r.message.clone()).collect())
            .unwrap_or_default())
    }

    async fn append(
        &self,
        session_id: &str,
        query_id: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let records = sessions.entry(session_id.to_string()).or_default();
        let mut next = records.last().map(|r| r.sequence + 1).unwrap_or(1);
        for message in messages {
            records.push(MessageRecord {
                sequence: next,
                session_id: session_id.to_string(),
                query_id: query_id.to_string(),
                message,
            });
            next += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_memory_loads_empty_and_drops_appends() {
        let memory = NullMemory;
        memory
            .append("s1", "q1", vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        assert!(memory.load("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_memory_sequences_are_strictly_monotonic() {
        let memory = InMemorySessionMemory::new();
        memory
            .append("s1", "q1", vec![ChatMessage::user("a"), ChatMessage::assistant("b")])
            .await
            .unwrap();
        memory
            .append("s1", "q2", vec![ChatMessage::user("c")])
            .await
            .unwrap();

        let records = memory.records("s1").await;
        let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(records[2].query_id, "q2");

        // Blocks arrive contiguously per query
        assert_eq!(records[0].query_id, "q1");
        assert_eq!(records[1].query_id, "q1");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let memory = InMemorySessionMemory::new();
        memory
            .append("s1", "q1", vec![ChatMessage::user("a")])
            .await
            .unwrap();
        assert!(memory.load("s2").await.unwrap().is_empty());
        assert_eq!(memory.load("s1").await.unwrap().len(), 1);
    }
}

// Memory resource - per-session message log backing conversational continuity

use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;
use crate::meta::ObjectMeta;
use crate::value_source::ValueSource;

/// Memory resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub metadata: ObjectMeta,
    pub spec: MemorySpec,
}

/// Memory backend binding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemorySpec {
    /// Base URL of the backing memory service
    pub address: ValueSource,
}

// ----------------------------------------------------------------------------
// Memory service wire contract (consumed by the memory adapter)
// ----------------------------------------------------------------------------

/// One stored message record; `sequence` is strictly monotonic per session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    pub sequence: u64,
    pub session_id: String,
    pub query_id: String,
    pub message: ChatMessage,
}

/// Response body of `GET /messages`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListMessagesResponse {
    /// Always present; an empty result is `[]`, never null
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub total: u64,
}

/// Request body of `POST /messages`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppendMessagesRequest {
    pub session_id: String,
    pub query_id: String,
    pub messages: Vec<ChatMessage>,
}

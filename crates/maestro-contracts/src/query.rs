// Query resource - the unit of work

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::message::TokenUsage;
use crate::meta::{LabelSelector, ObjectMeta};
use crate::value_source::Parameter;

/// Query resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub metadata: ObjectMeta,
    pub spec: QuerySpec,
    #[serde(default)]
    pub status: QueryStatus,
}

/// Declarative request to run one or more targets over an input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    /// User-supplied input text
    pub input: String,
    /// Ordered targets; selectors expand before dispatch
    pub targets: Vec<QueryTarget>,
    /// Memory resource; absent falls back to the namespace "default"
    /// memory, then to the null memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    /// Conversation session; absent means the query's own uid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Parameters visible to agents via `queryParameterRef`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Replacement input used when re-triggering a completed query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_override: Option<String>,
    /// Outer deadline for the whole query, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl QuerySpec {
    /// The effective input for this run (`inputOverride` wins)
    pub fn effective_input(&self) -> &str {
        self.input_override.as_deref().unwrap_or(&self.input)
    }

    /// Content hash of the spec, recorded on status so unchanged terminal
    /// queries reconcile as a no-op
    pub fn hash(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        hex::encode(digest)
    }
}

/// One element of `spec.targets`: a typed name or a label selector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryTarget {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    /// Name of the referenced resource; mutually exclusive with `selector`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Label selector that expands to zero or more typed references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

impl QueryTarget {
    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Agent,
            name: Some(name.into()),
            selector: None,
        }
    }

    pub fn team(name: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Team,
            name: Some(name.into()),
            selector: None,
        }
    }

    pub fn model(name: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Model,
            name: Some(name.into()),
            selector: None,
        }
    }

    pub fn tool(name: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Tool,
            name: Some(name.into()),
            selector: None,
        }
    }

    pub fn selector(kind: TargetKind, selector: LabelSelector) -> Self {
        Self {
            kind,
            name: None,
            selector: Some(selector),
        }
    }
}

/// What a target points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Agent,
    Team,
    Model,
    Tool,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Agent => write!(f, "agent"),
            TargetKind::Team => write!(f, "team"),
            TargetKind::Model => write!(f, "model"),
            TargetKind::Tool => write!(f, "tool"),
        }
    }
}

/// A fully expanded `(kind, name)` reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub name: String,
}

impl std::fmt::Display for TargetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Query lifecycle phase; transitions are monotonic within one plan revision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPhase {
    #[default]
    Pending,
    Running,
    Error,
    Done,
}

impl QueryPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryPhase::Done | QueryPhase::Error)
    }
}

impl std::fmt::Display for QueryPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryPhase::Pending => write!(f, "pending"),
            QueryPhase::Running => write!(f, "running"),
            QueryPhase::Error => write!(f, "error"),
            QueryPhase::Done => write!(f, "done"),
        }
    }
}

/// Observed state of a query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatus {
    #[serde(default)]
    pub phase: QueryPhase,
    /// One response per resolved target, in expansion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<TargetResponse>,
    /// Aggregate usage across all targets
    #[serde(default, skip_serializing_if = "TokenUsage::is_zero")]
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_resolved_at: Option<DateTime<Utc>>,
    /// Hash of the spec this status was computed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_spec_hash: Option<String>,
}

/// Result of one target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetResponse {
    pub target: TargetRef,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "TokenUsage::is_zero")]
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl TargetResponse {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Machine code plus human message for a failed target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseError {
    /// Stable machine code, e.g. "KeyMissing", "ModelTransient", "Timeout"
    pub code: String,
    pub message: String,
    /// Raw response excerpt when a backend produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> QuerySpec {
        QuerySpec {
            input: "2+2?".to_string(),
            targets: vec![QueryTarget::agent("calc")],
            memory: None,
            session_id: None,
            parameters: Vec::new(),
            input_override: None,
            timeout_seconds: None,
        }
    }

    #[test]
    fn spec_hash_is_stable_and_sensitive() {
        let spec = sample_spec();
        assert_eq!(spec.hash(), spec.hash());

        let mut changed = spec.clone();
        changed.input_override = Some("different".to_string());
        assert_ne!(spec.hash(), changed.hash());
    }

    #[test]
    fn input_override_wins() {
        let mut spec = sample_spec();
        assert_eq!(spec.effective_input(), "2+2?");
        spec.input_override = Some("3+3?".to_string());
        assert_eq!(spec.effective_input(), "3+3?");
    }

    #[test]
    fn phase_terminality() {
        assert!(!QueryPhase::Pending.is_terminal());
        assert!(!QueryPhase::Running.is_terminal());
        assert!(QueryPhase::Done.is_terminal());
        assert!(QueryPhase::Error.is_terminal());
    }
}

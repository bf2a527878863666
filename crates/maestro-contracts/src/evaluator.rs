// Evaluator and Evaluation resources
//
// An Evaluator is an external HTTP service that scores a query's output.
// Evaluations are created by the auto-evaluation hook after a query
// completes; their lifecycle is independent of the query's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::message::TokenUsage;
use crate::meta::{LabelSelector, ObjectMeta};
use crate::value_source::{Parameter, ValueSource};

/// Evaluator resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluator {
    pub metadata: ObjectMeta,
    pub spec: EvaluatorSpec,
}

/// Evaluator service binding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorSpec {
    /// Base URL of the evaluator service
    pub address: ValueSource,
    /// Model exposed to the evaluator, when it asks for one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<String>,
    /// Queries whose labels match are auto-evaluated on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

/// Evaluation resource, created by the auto-evaluation hook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub metadata: ObjectMeta,
    pub spec: EvaluationSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EvaluationStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSpec {
    /// Evaluator that produced (or will produce) the verdict
    pub evaluator_ref: String,
    /// Completed query under evaluation
    pub query_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<EvaluationVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

// ----------------------------------------------------------------------------
// Evaluator service wire contract
// ----------------------------------------------------------------------------

/// Request body of `POST /evaluate` and `POST /evaluate-metrics`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    /// "direct" or "query"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

/// Verdict returned by the evaluator service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationVerdict {
    /// Score in [0, 1], kept as the string the service returned
    pub score: String,
    pub passed: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<EvaluatorTokenUsage>,
}

/// Usage as reported on the evaluator wire (`{prompt, completion, total}`)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluatorTokenUsage {
    #[serde(default)]
    pub prompt: u64,
    #[serde(default)]
    pub completion: u64,
    #[serde(default)]
    pub total: u64,
}

impl From<EvaluatorTokenUsage> for TokenUsage {
    fn from(u: EvaluatorTokenUsage) -> Self {
        TokenUsage {
            prompt_tokens: u.prompt,
            completion_tokens: u.completion,
            total_tokens: u.total,
        }
    }
}

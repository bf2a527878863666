// Error taxonomy for binding and execution
//
// Every error exposes a stable machine code alongside the human message;
// the scheduler records both on the query status.

use thiserror::Error;

use maestro_contracts::ResponseError;

/// Result type alias for execution paths
pub type Result<T, E = ExecError> = std::result::Result<T, E>;

/// Errors produced while materializing a plan from a query.
///
/// Bind errors inside a single target are captured on that target's
/// response; bind errors outside any target (selector expansion, query
/// parameters, memory resolution) fail the whole query.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BindError {
    #[error("{kind} \"{name}\" not found in namespace \"{namespace}\"")]
    ReferenceNotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("key \"{key}\" not present in {kind} \"{name}\"")]
    KeyMissing {
        kind: String,
        name: String,
        key: String,
    },

    #[error("service \"{name}\" has no port matching \"{port}\"")]
    UnresolvableAddress { name: String, port: String },

    #[error("query parameter cycle involving \"{name}\"")]
    ParameterCycle { name: String },

    #[error("team \"{name}\" contains itself")]
    TeamCycle { name: String },

    #[error("team nesting exceeds depth {limit}")]
    DepthExceeded { limit: usize },

    #[error("selector matched no {kind} resources")]
    SelectorEmpty { kind: String },
}

impl BindError {
    pub fn reference_not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        BindError::ReferenceNotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Stable machine code
    pub fn code(&self) -> &'static str {
        match self {
            BindError::ReferenceNotFound { .. } => "ReferenceNotFound",
            BindError::KeyMissing { .. } => "KeyMissing",
            BindError::UnresolvableAddress { .. } => "UnresolvableAddress",
            BindError::ParameterCycle { .. } => "ParameterCycle",
            BindError::TeamCycle { .. } => "TeamCycle",
            BindError::DepthExceeded { .. } => "DepthExceeded",
            BindError::SelectorEmpty { .. } => "SelectorEmpty",
        }
    }

    pub fn to_response_error(&self) -> ResponseError {
        ResponseError {
            code: self.code().to_string(),
            message: self.to_string(),
            excerpt: None,
        }
    }
}

/// Errors produced while executing a plan
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecError {
    /// 4xx from a model provider; terminal for the target
    #[error("model request rejected ({status}): {message}")]
    ModelRequest { status: u16, message: String },

    /// 5xx or transport failure from a model provider; retried, then terminal
    #[error("model call failed: {message}")]
    ModelTransient { message: String },

    #[error("tool \"{name}\" returned HTTP {status}")]
    ToolHttp {
        name: String,
        status: u16,
        excerpt: String,
    },

    #[error("mcp tool \"{name}\" failed: {message}")]
    ToolMcp { name: String, message: String },

    /// Arguments failed the tool's JSON Schema
    #[error("tool \"{name}\" arguments rejected: {message}")]
    ToolSchemaViolation { name: String, message: String },

    #[error("memory backend unavailable: {message}")]
    MemoryUnavailable { message: String },

    #[error("memory backend returned a malformed response: {message}")]
    MemoryBadResponse { message: String },

    #[error("execution engine unavailable: {message}")]
    EngineUnavailable { message: String },

    #[error("execution engine returned a malformed response: {message}")]
    EngineBadResponse { message: String },

    #[error("evaluator unavailable: {message}")]
    EvaluatorUnavailable { message: String },

    #[error("evaluator returned a malformed response: {message}")]
    EvaluatorBadResponse { message: String },

    /// A configured deadline expired
    #[error("{operation} deadline exceeded")]
    Timeout { operation: String },

    /// Cooperative cancellation observed at a suspension point
    #[error("cancelled")]
    Cancelled,

    /// A per-target bind failure, surfaced on that target's response
    #[error(transparent)]
    Bind(#[from] BindError),
}

impl ExecError {
    pub fn timeout(operation: impl Into<String>) -> Self {
        ExecError::Timeout {
            operation: operation.into(),
        }
    }

    pub fn model_transient(message: impl Into<String>) -> Self {
        ExecError::ModelTransient {
            message: message.into(),
        }
    }

    pub fn memory_unavailable(message: impl Into<String>) -> Self {
        ExecError::MemoryUnavailable {
            message: message.into(),
        }
    }

    /// Stable machine code
    pub fn code(&self) -> &'static str {
        match self {
            ExecError::ModelRequest { .. } => "ModelRequestError",
            ExecError::ModelTransient { .. } => "ModelTransient",
            ExecError::ToolHttp { .. } => "ToolHTTPError",
            ExecError::ToolMcp { .. } => "ToolMCPError",
            ExecError::ToolSchemaViolation { .. } => "ToolSchemaViolation",
            ExecError::MemoryUnavailable { .. } => "MemoryUnavailable",
            ExecError::MemoryBadResponse { .. } => "MemoryBadResponse",
            ExecError::EngineUnavailable { .. } => "EngineUnavailable",
            ExecError::EngineBadResponse { .. } => "EngineBadResponse",
            ExecError::EvaluatorUnavailable { .. } => "EvaluatorUnavailable",
            ExecError::EvaluatorBadResponse { .. } => "EvaluatorBadResponse",
            ExecError::Timeout { .. } => "Timeout",
            ExecError::Cancelled => "Cancelled",
            ExecError::Bind(bind) => bind.code(),
        }
    }

    /// True when a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExecError::ModelTransient { .. } | ExecError::Timeout { .. }
        )
    }

    pub fn to_response_error(&self) -> ResponseError {
        let excerpt = match self {
            ExecError::ToolHttp { excerpt, .. } if !excerpt.is_empty() => Some(excerpt.clone()),
            _ => None,
        };
        ResponseError {
            code: self.code().to_string(),
            message: self.to_string(),
            excerpt,
        }
    }
}

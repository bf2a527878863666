// ValueSource - tagged description of where a string value comes from
//
// The enum is externally tagged on the wire, so a document that sets two
// variants at once fails to parse instead of being caught after the fact.

use serde::{Deserialize, Serialize};

/// Where a configuration string comes from.
///
/// Exactly one variant is set; serde enforces this at parse time because the
/// representation is a single-key map (`{"value": ...}`,
/// `{"secretKeyRef": {...}}`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ValueSource {
    /// Inline literal value
    Value(String),
    /// Key of a Secret in the same namespace
    SecretKeyRef(SecretKeyRef),
    /// Key of a ConfigMap in the same namespace
    ConfigMapRef(ConfigMapKeyRef),
    /// Address of a Service in the same namespace
    ServiceRef(ServiceRef),
    /// Named parameter of the Query being reconciled
    QueryParameterRef(QueryParameterRef),
}

impl ValueSource {
    /// Inline literal shorthand
    pub fn literal(value: impl Into<String>) -> Self {
        ValueSource::Value(value.into())
    }

    /// Shorthand for a secret key reference
    pub fn secret(name: impl Into<String>, key: impl Into<String>) -> Self {
        ValueSource::SecretKeyRef(SecretKeyRef {
            name: name.into(),
            key: key.into(),
        })
    }

    /// Shorthand for a query parameter reference
    pub fn query_parameter(name: impl Into<String>) -> Self {
        ValueSource::QueryParameterRef(QueryParameterRef { name: name.into() })
    }
}

/// Reference to one key of a Secret
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

/// Reference to one key of a ConfigMap
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapKeyRef {
    pub name: String,
    pub key: String,
}

/// Reference to a Service port, resolved to an http URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRef {
    pub name: String,
    /// Port number or named port on the service
    pub port: ServicePortRef,
    /// Path appended to the resolved address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A service port referenced by number or by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServicePortRef {
    Number(u16),
    Name(String),
}

impl std::fmt::Display for ServicePortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServicePortRef::Number(n) => write!(f, "{}", n),
            ServicePortRef::Name(n) => write!(f, "{}", n),
        }
    }
}

/// Reference to a parameter of the Query under reconciliation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterRef {
    pub name: String,
}

/// A named parameter whose value is itself a `ValueSource`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub value: ValueSource,
}

impl Parameter {
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ValueSource::literal(value),
        }
    }
}

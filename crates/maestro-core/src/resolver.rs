// Value resolver - turns a ValueSource into a string against one snapshot
//
// Resolution is pure with respect to the snapshot and memoized for the
// lifetime of the resolver. A resolver lives for exactly one reconcile;
// caches are never shared across reconciles.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use maestro_contracts::{Parameter, ServicePortRef, ValueSource};

use crate::error::BindError;
use crate::snapshot::ResourceSnapshot;

/// Per-reconcile value resolver
pub struct ValueResolver<'a> {
    snapshot: &'a ResourceSnapshot,
    /// Parameters of the query under reconciliation, for `queryParameterRef`
    query_parameters: &'a [Parameter],
    memo: RefCell<HashMap<MemoKey, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MemoKey {
    Secret(String, String),
    ConfigMap(String, String),
    Service(String, String, String),
}

impl<'a> ValueResolver<'a> {
    pub fn new(snapshot: &'a ResourceSnapshot, query_parameters: &'a [Parameter]) -> Self {
        Self {
            snapshot,
            query_parameters,
            memo: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve a value source to a string
    pub fn resolve(&self, source: &ValueSource) -> Result<String, BindError> {
        let mut visiting = HashSet::new();
        self.resolve_inner(source, &mut visiting)
    }

    /// Resolve an optional source, mapping absent to `None`
    pub fn resolve_opt(&self, source: Option<&ValueSource>) -> Result<Option<String>, BindError> {
        source.map(|s| self.resolve(s)).transpose()
    }

    fn resolve_inner(
        &self,
        source: &ValueSource,
        visiting: &mut HashSet<String>,
    ) -> Result<String, BindError> {
        match source {
            ValueSource::Value(value) => Ok(value.clone()),

            ValueSource::SecretKeyRef(r) => {
                let key = MemoKey::Secret(r.name.clone(), r.key.clone());
                if let Some(hit) = self.memo.borrow().get(&key) {
                    return Ok(hit.clone());
                }
                let secret = self.snapshot.secrets.get(&r.name).ok_or_else(|| {
                    BindError::reference_not_found("Secret", &self.snapshot.namespace, &r.name)
                })?;
                let value = secret.data.get(&r.key).ok_or_else(|| BindError::KeyMissing {
                    kind: "Secret".to_string(),
                    name: r.name.clone(),
                    key: r.key.clone(),
                })?;
                self.memo.borrow_mut().insert(key, value.clone());
                Ok(value.clone())
            }

            ValueSource::ConfigMapRef(r) => {
                let key = MemoKey::ConfigMap(r.name.clone(), r.key.clone());
                if let Some(hit) = self.memo.borrow().get(&key) {
                    return Ok(hit.clone());
                }
                let config_map = self.snapshot.config_maps.get(&r.name).ok_or_else(|| {
                    BindError::reference_not_found("ConfigMap", &self.snapshot.namespace, &r.name)
                })?;
                let value =
                    config_map
                        .data
                        .get(&r.key)
                        .ok_or_else(|| BindError::KeyMissing {
                            kind: "ConfigMap".to_string(),
                            name: r.name.clone(),
                            key: r.key.clone(),
                        })?;
                self.memo.borrow_mut().insert(key, value.clone());
                Ok(value.clone())
            }

            ValueSource::ServiceRef(r) => {
                let path = r.path.clone().unwrap_or_default();
                let key = MemoKey::Service(r.name.clone(), r.port.to_string(), path.clone());
                if let Some(hit) = self.memo.borrow().get(&key) {
                    return Ok(hit.clone());
                }
                let service = self.snapshot.services.get(&r.name).ok_or_else(|| {
                    BindError::reference_not_found("Service", &self.snapshot.namespace, &r.name)
                })?;
                let port = service
                    .port(&r.port)
                    .ok_or_else(|| BindError::UnresolvableAddress {
                        name: r.name.clone(),
                        port: r.port.to_string(),
                    })?;
                let url = format!(
                    "http://{}.{}.svc:{}{}",
                    r.name, self.snapshot.namespace, port, path
                );
                self.memo.borrow_mut().insert(key, url.clone());
                Ok(url)
            }

            ValueSource::QueryParameterRef(r) => {
                // Transitive: the parameter may itself be any ValueSource
                if !visiting.insert(r.name.clone()) {
                    return Err(BindError::ParameterCycle {
                        name: r.name.clone(),
                    });
                }
                let parameter = self
                    .query_parameters
                    .iter()
                    .find(|p| p.name == r.name)
                    .ok_or_else(|| BindError::KeyMissing {
                        kind: "Query".to_string(),
                        name: "parameters".to_string(),
                        key: r.name.clone(),
                    })?;
                let value = self.resolve_inner(&parameter.value, visiting)?;
                visiting.remove(&r.name);
                Ok(value)
            }
        }
    }
}

// In-memory resource store with change events
//
// Indexed by (kind, namespace, name) with label selection per kind. Writes
// run admission validation and broadcast a change event; reads hand out
// clones so nothing outside the store ever holds a live reference into it.
// The binder never reads the store directly: reconcilers take a snapshot
// of one namespace and bind against that.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use maestro_contracts::{
    validation, AdmissionError, AnyResource, Evaluator, Model, ObjectKey, Query, QueryStatus,
    ResourceKind,
};
use maestro_core::ResourceSnapshot;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A change to one stored object
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ResourceKind,
    pub key: ObjectKey,
    pub op: ChangeOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Applied,
    Deleted,
}

/// Store write failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("{kind} \"{key}\" not found")]
    NotFound { kind: ResourceKind, key: ObjectKey },
}

/// Indexed views over every resource kind, with a change stream
#[derive(Clone)]
pub struct ResourceStore {
    objects: Arc<RwLock<HashMap<(ResourceKind, ObjectKey), AnyResource>>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }

    /// Subscribe to the change stream
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Validate and write a resource; assigns uid and creation timestamp on
    /// first write and preserves them on update
    pub async fn apply(&self, mut resource: AnyResource) -> Result<AnyResource, StoreError> {
        validation::validate(&resource)?;

        let kind = resource.kind();
        let key = resource.metadata().key();
        {
            let mut objects = self.objects.write().await;
            if let Some(existing) = objects.get(&(kind, key.clone())) {
                let meta = resource.metadata_mut();
                meta.uid = existing.metadata().uid;
                meta.creation_timestamp = existing.metadata().creation_timestamp;
            } else {
                let meta = resource.metadata_mut();
                if meta.uid.is_none() {
                    meta.uid = Some(Uuid::now_v7());
                }
                if meta.creation_timestamp.is_none() {
                    meta.creation_timestamp = Some(Utc::now());
                }
            }
            objects.insert((kind, key.clone()), resource.clone());
        }

        debug!(kind = %kind, key = %key, "applied resource");
        let _ = self.changes.send(ChangeEvent {
            kind,
            key,
            op: ChangeOp::Applied,
        });
        Ok(resource)
    }

    pub async fn delete(
        &self,
        kind: ResourceKind,
        key: &ObjectKey,
    ) -> Result<AnyResource, StoreError> {
        let removed = self
            .objects
            .write()
            .await
            .remove(&(kind, key.clone()))
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;
        let _ = self.changes.send(ChangeEvent {
            kind,
            key: key.clone(),
            op: ChangeOp::Deleted,
        });
        Ok(removed)
    }

    pub async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> Option<AnyResource> {
        self.objects.read().await.get(&(kind, key.clone())).cloned()
    }

    /// Objects of one kind in a namespace, sorted by name
    pub async fn list(&self, kind: ResourceKind, namespace: &str) -> Vec<AnyResource> {
        let mut items: Vec<AnyResource> = self
            .objects
            .read()
            .await
            .iter()
            .filter(|((k, key), _)| *k == kind && key.namespace == namespace)
            .map(|(_, resource)| resource.clone())
            .collect();
        items.sort_by(|a, b| a.metadata().name.cmp(&b.metadata().name));
        items
    }

    // Typed accessors used by the reconcilers

    pub async fn query(&self, key: &ObjectKey) -> Option<Query> {
        match self.get(ResourceKind::Query, key).await {
            Some(AnyResource::Query(query)) => Some(query),
            _ => None,
        }
    }

    pub async fn model(&self, key: &ObjectKey) -> Option<Model> {
        match self.get(ResourceKind::Model, key).await {
            Some(AnyResource::Model(model)) => Some(model),
            _ => None,
        }
    }

    pub async fn evaluators(&self, namespace: &str) -> Vec<Evaluator> {
        self.list(ResourceKind::Evaluator, namespace)
            .await
            .into_iter()
            .filter_map(|resource| match resource {
                AnyResource::Evaluator(evaluator) => Some(evaluator),
                _ => None,
            })
            .collect()
    }

    /// Objects of one kind across every namespace, sorted by key
    pub async fn list_all(&self, kind: ResourceKind) -> Vec<AnyResource> {
        let mut items: Vec<AnyResource> = self
            .objects
            .read()
            .await
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, resource)| resource.clone())
            .collect();
        items.sort_by_key(|r| r.metadata().key());
        items
    }

    /// Write a model status without re-running admission
    pub async fn update_model_status(
        &self,
        key: &ObjectKey,
        status: maestro_contracts::ModelStatus,
    ) -> Result<Model, StoreError> {
        let updated = {
            let mut objects = self.objects.write().await;
            let entry = objects
                .get_mut(&(ResourceKind::Model, key.clone()))
                .ok_or_else(|| StoreError::NotFound {
                    kind: ResourceKind::Model,
                    key: key.clone(),
                })?;
            match entry {
                AnyResource::Model(model) => {
                    model.status = Some(status);
                    model.clone()
                }
                _ => unreachable!("model key holds a model"),
            }
        };
        let _ = self.changes.send(ChangeEvent {
            kind: ResourceKind::Model,
            key: key.clone(),
            op: ChangeOp::Applied,
        });
        Ok(updated)
    }

    /// Write a query status in one store write.
    ///
    /// Skips admission (the spec is untouched) but still emits a change
    /// event; reconcilers converge through the observed-spec hash.
    pub async fn update_query_status(
        &self,
        key: &ObjectKey,
        status: QueryStatus,
    ) -> Result<Query, StoreError> {
        let updated = {
            let mut objects = self.objects.write().await;
            let entry = objects
                .get_mut(&(ResourceKind::Query, key.clone()))
                .ok_or_else(|| StoreError::NotFound {
                    kind: ResourceKind::Query,
                    key: key.clone(),
                })?;
            match entry {
                AnyResource::Query(query) => {
                    query.status = status;
                    query.clone()
                }
                _ => unreachable!("query key holds a query"),
            }
        };
        let _ = self.changes.send(ChangeEvent {
            kind: ResourceKind::Query,
            key: key.clone(),
            op: ChangeOp::Applied,
        });
        Ok(updated)
    }

    /// Copy every bindable resource of one namespace, by value
    pub async fn snapshot(&self, namespace: &str) -> ResourceSnapshot {
        let objects = self.objects.read().await;
        let mut snapshot = ResourceSnapshot::new(namespace);
        for ((_, key), resource) in objects.iter() {
            if key.namespace != namespace {
                continue;
            }
            match resource {
                AnyResource::Agent(r) => {
                    snapshot.agents.insert(key.name.clone(), r.clone());
                }
                AnyResource::Team(r) => {
                    snapshot.teams.insert(key.name.clone(), r.clone());
                }
                AnyResource::Model(r) => {
                    snapshot.models.insert(key.name.clone(), r.clone());
                }
                AnyResource::Tool(r) => {
                    snapshot.tools.insert(key.name.clone(), r.clone());
                }
                AnyResource::Memory(r) => {
                    snapshot.memories.insert(key.name.clone(), r.clone());
                }
                AnyResource::Evaluator(r) => {
                    snapshot.evaluators.insert(key.name.clone(), r.clone());
                }
                AnyResource::MCPServer(r) => {
                    snapshot.mcp_servers.insert(key.name.clone(), r.clone());
                }
                AnyResource::ExecutionEngine(r) => {
                    snapshot.engines.insert(key.name.clone(), r.clone());
                }
                AnyResource::Secret(r) => {
                    snapshot.secrets.insert(key.name.clone(), r.clone());
                }
                AnyResource::ConfigMap(r) => {
                    snapshot.config_maps.insert(key.name.clone(), r.clone());
                }
                AnyResource::Service(r) => {
                    snapshot.services.insert(key.name.clone(), r.clone());
                }
                // Queries, evaluations, and A2A servers are not bind inputs
                AnyResource::Query(_) | AnyResource::Evaluation(_) | AnyResource::A2AServer(_) => {}
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_contracts::{Agent, ObjectMeta};

    fn agent(name: &str) -> AnyResource {
        AnyResource::Agent(Agent::new(ObjectMeta::named(name), "prompt"))
    }

    #[tokio::test]
    async fn apply_assigns_uid_once() {
        let store = ResourceStore::new();
        let stored = store.apply(agent("calc")).await.unwrap();
        let uid = stored.metadata().uid.expect("uid assigned");

        let again = store.apply(agent("calc")).await.unwrap();
        assert_eq!(again.metadata().uid, Some(uid));
    }

    #[tokio::test]
    async fn admission_rejects_invalid_resources() {
        let store = ResourceStore::new();
        let empty_prompt = AnyResource::Agent(Agent::new(ObjectMeta::named("bad"), "  "));
        assert!(matches!(
            store.apply(empty_prompt).await,
            Err(StoreError::Admission(_))
        ));
    }

    #[tokio::test]
    async fn changes_are_broadcast() {
        let store = ResourceStore::new();
        let mut changes = store.subscribe();

        store.apply(agent("calc")).await.unwrap();
        let event = changes.recv().await.unwrap();
        assert_eq!(event.kind, ResourceKind::Agent);
        assert_eq!(event.op, ChangeOp::Applied);
        assert_eq!(event.key, ObjectKey::new("default", "calc"));

        store
            .delete(ResourceKind::Agent, &ObjectKey::new("default", "calc"))
            .await
            .unwrap();
        let event = changes.recv().await.unwrap();
        assert_eq!(event.op, ChangeOp::Deleted);
    }

    #[tokio::test]
    async fn snapshots_are_namespace_scoped_copies() {
        let store = ResourceStore::new();
        store.apply(agent("calc")).await.unwrap();
        store
            .apply(AnyResource::Agent(Agent::new(
                ObjectMeta::namespaced("other", "prod"),
                "prompt",
            )))
            .await
            .unwrap();

        let snapshot = store.snapshot("default").await;
        assert!(snapshot.agents.contains_key("calc"));
        assert!(!snapshot.agents.contains_key("other"));

        // Later writes do not leak into the snapshot
        store.apply(agent("late")).await.unwrap();
        assert!(!snapshot.agents.contains_key("late"));
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let store = ResourceStore::new();
        store.apply(agent("zeta")).await.unwrap();
        store.apply(agent("alpha")).await.unwrap();
        let names: Vec<String> = store
            .list(ResourceKind::Agent, "default")
            .await
            .iter()
            .map(|r| r.metadata().name.clone())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}

// Manifest loading - YAML/JSON resource files into the store
//
// Multi-document YAML is supported; a directory load applies files in
// name order so fixtures behave deterministically.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use maestro_contracts::AnyResource;

use crate::store::{ResourceStore, StoreError};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parse every document in a YAML (or JSON) string
pub fn parse_manifests(content: &str) -> Result<Vec<AnyResource>, String> {
    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| e.to_string())?;
        // Skip empty documents between separators
        if matches!(value, serde_yaml::Value::Null) {
            continue;
        }
        let resource: AnyResource =
            serde_yaml::from_value(value).map_err(|e| e.to_string())?;
        resources.push(resource);
    }
    Ok(resources)
}

/// Load every manifest file in a directory into the store
pub async fn load_dir(store: &ResourceStore, dir: &Path) -> Result<usize, ManifestError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| ManifestError::Io {
            path: dir.display().to_string(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml") | Some("json")
            )
        })
        .collect();
    paths.sort();

    let mut applied = 0;
    for path in paths {
        let content = std::fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let resources = parse_manifests(&content).map_err(|message| ManifestError::Parse {
            path: path.display().to_string(),
            message,
        })?;
        for resource in resources {
            store.apply(resource).await?;
            applied += 1;
        }
    }
    info!(dir = %dir.display(), applied, "loaded manifests");
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_contracts::{AnyResource, ResourceKind};

    #[test]
    fn parses_multi_document_yaml() {
        let content = r#"
kind: Agent
metadata:
  name: calc
spec:
  prompt: You are a calculator
---
kind: Model
metadata:
  name: default
spec:
  type: openai
  model:
    value: gpt-4o
  config:
    apiKey:
      secretKeyRef:
        name: openai
        key: token
---
"#;
        let resources = parse_manifests(content).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].kind(), ResourceKind::Agent);
        assert_eq!(resources[1].kind(), ResourceKind::Model);
        match &resources[1] {
            AnyResource::Model(model) => {
                assert_eq!(model.spec.poll_interval_seconds, 300);
            }
            other => panic!("expected model, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse_manifests("kind: Agent\nmetadata: {name: x}\n").is_err());
    }
}

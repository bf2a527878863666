// Platform objects referenced by ValueSource: Secret, ConfigMap, Service

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::ObjectMeta;

/// Secret resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Secret {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// ConfigMap resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigMap {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Service resource; `serviceRef` sources resolve against its ports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub port: u16,
}

impl Service {
    /// Look up a port by number or name
    pub fn port(&self, wanted: &crate::value_source::ServicePortRef) -> Option<u16> {
        use crate::value_source::ServicePortRef;
        self.spec.ports.iter().find_map(|p| match wanted {
            ServicePortRef::Number(n) => (p.port == *n).then_some(p.port),
            ServicePortRef::Name(name) => {
                (p.name.as_deref() == Some(name.as_str())).then_some(p.port)
            }
        })
    }
}

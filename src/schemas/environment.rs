//! The `environment` section: resources, scheduling and storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Requests and limits for one resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct K8sResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<f64>,
}

/// Compute resources requested by a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<K8sResources>,
    /// Memory in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<K8sResources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<K8sResources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpu: Option<K8sResources>,
}

/// Named volumes mounted for data and outputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<String>,
}

/// Outputs of earlier jobs and experiments made available to this run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputsConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experiments: Vec<Value>,
}

/// The `environment` section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence: Option<PersistenceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<OutputsConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configmap_refs: Vec<String>,
}

impl EnvironmentConfig {
    /// GPU limit, falling back to the request.
    pub fn gpus(&self) -> Option<f64> {
        let gpu = self.resources.as_ref()?.gpu.as_ref()?;
        gpu.limits.or(gpu.requests)
    }
}

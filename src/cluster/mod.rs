//! Cluster resources and the handle the pipeline stages read them through.
//!
//! The submitter lists resources to build work units; the evaluator looks up
//! related objects (e.g. a pod's ServiceAccount). Both share one read-only
//! handle.

pub mod manifest;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClusterConfig;
use crate::error::{Result, ScanError};
use crate::request::ScanRequest;

/// Read-only access to the resources under scan.
pub trait ClusterApi: Send + Sync {
    /// Every resource in the inventory, in load order.
    fn list_resources(&self) -> Result<Vec<Resource>>;

    /// Look up a single namespaced or cluster-scoped object.
    fn get(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<Resource>;
}

/// One Kubernetes object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// `None` for cluster-scoped objects.
    pub namespace: Option<String>,
    /// Manifest file the object was read from.
    pub origin: Option<PathBuf>,
    /// The full object as decoded from the manifest.
    pub object: Value,
}

/// Short identity of a resource used in findings and reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

const WORKLOAD_KINDS: &[&str] = &[
    "Pod",
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "ReplicaSet",
    "ReplicationController",
    "Job",
    "CronJob",
];

impl Resource {
    /// Decode a resource from a manifest object.
    pub fn from_value(object: Value, origin: Option<PathBuf>) -> Result<Self> {
        let file = origin
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<inline>".into());

        let kind = object
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| ScanError::Manifest {
                file: file.clone(),
                message: "object has no 'kind'".into(),
            })?
            .to_string();
        let metadata = object.get("metadata");
        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| ScanError::Manifest {
                file,
                message: format!("{kind} has no metadata.name"),
            })?
            .to_string();
        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let api_version = object
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or("v1")
            .to_string();

        Ok(Self {
            api_version,
            kind,
            name,
            namespace,
            origin,
            object,
        })
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind.clone(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    pub fn is_workload(&self) -> bool {
        WORKLOAD_KINDS.contains(&self.kind.as_str())
    }

    /// The pod spec of a workload, wherever the kind nests it.
    pub fn pod_spec(&self) -> Option<&Value> {
        let spec = self.object.get("spec")?;
        match self.kind.as_str() {
            "Pod" => Some(spec),
            "CronJob" => spec
                .get("jobTemplate")?
                .get("spec")?
                .get("template")?
                .get("spec"),
            k if WORKLOAD_KINDS.contains(&k) => spec.get("template")?.get("spec"),
            _ => None,
        }
    }

    /// Init containers followed by regular containers.
    pub fn containers(&self) -> Vec<&Value> {
        let Some(spec) = self.pod_spec() else {
            return Vec::new();
        };
        ["initContainers", "containers"]
            .iter()
            .filter_map(|key| spec.get(*key).and_then(Value::as_array))
            .flatten()
            .collect()
    }
}

/// Name of a container, or `"<unnamed>"`.
pub fn container_name(container: &Value) -> &str {
    container
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
}

/// In-memory inventory backed by manifests on disk.
#[derive(Debug, Default, Clone)]
pub struct Inventory {
    resources: Vec<Resource>,
    index: BTreeMap<(String, Option<String>, String), usize>,
}

impl Inventory {
    pub fn new(resources: Vec<Resource>) -> Self {
        let index = resources
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.kind.clone(), r.namespace.clone(), r.name.clone()), i))
            .collect();
        Self { resources, index }
    }

    /// Build the inventory for a request: the request's input patterns when
    /// given, otherwise the configured cluster snapshot.
    pub fn connect(request: &ScanRequest, config: &ClusterConfig) -> Result<Self> {
        let resources = if !request.input_patterns.is_empty() {
            manifest::load_patterns(&request.input_patterns)?
        } else if let Some(snapshot) = &config.snapshot {
            manifest::load_file(snapshot)?
        } else {
            return Err(ScanError::Setup(
                "no resources to scan: pass manifest paths or set cluster.snapshot in config"
                    .into(),
            ));
        };

        tracing::debug!(resources = resources.len(), "inventory loaded");
        Ok(Self::new(resources))
    }
}

impl ClusterApi for Inventory {
    fn list_resources(&self) -> Result<Vec<Resource>> {
        Ok(self.resources.clone())
    }

    fn get(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<Resource> {
        let key = (kind.to_string(), namespace.map(str::to_string), name.to_string());
        self.index.get(&key).map(|&i| self.resources[i].clone())
    }
}

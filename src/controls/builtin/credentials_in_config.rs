use serde_json::Value;

use crate::cluster::{container_name, Resource};
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

const SENSITIVE_KEY_MARKERS: &[&str] = &[
    "PASSWORD",
    "PASSWD",
    "SECRET",
    "TOKEN",
    "API_KEY",
    "APIKEY",
    "ACCESS_KEY",
    "PRIVATE_KEY",
    "CREDENTIAL",
];

/// C-0012: Applications credentials in configuration files
///
/// Flags literal values for sensitive-looking keys in container `env` and in
/// ConfigMap `data`. Values pulled from Secrets via `valueFrom` pass.
pub struct CredentialsInConfigControl;

impl Control for CredentialsInConfigControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0012".into(),
            name: "Applications credentials in configuration files".into(),
            description: "Credentials stored in plain text in pod specs or ConfigMaps".into(),
            severity: Severity::High,
            remediation: "Move credentials into a Secret and reference them with \
                          valueFrom.secretKeyRef or envFrom.secretRef."
                .into(),
        }
    }

    fn applies_to(&self, resource: &Resource) -> bool {
        resource.is_workload() || resource.kind == "ConfigMap"
    }

    fn evaluate(&self, resource: &Resource, _ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        let exposed = if resource.kind == "ConfigMap" {
            configmap_keys(resource)
        } else {
            env_keys(resource)
        };
        if exposed.is_empty() {
            return None;
        }
        Some(ControlFinding::new(
            &self.metadata(),
            resource,
            format!("Plain-text credential key(s): {}", exposed.join(", ")),
        ))
    }
}

fn is_sensitive(key: &str) -> bool {
    let upper = key.to_uppercase().replace('-', "_");
    SENSITIVE_KEY_MARKERS.iter().any(|m| upper.contains(m))
}

fn env_keys(resource: &Resource) -> Vec<String> {
    let mut keys = Vec::new();
    for container in resource.containers() {
        let Some(env) = container.get("env").and_then(Value::as_array) else {
            continue;
        };
        for var in env {
            let Some(name) = var.get("name").and_then(Value::as_str) else {
                continue;
            };
            let literal = var
                .get("value")
                .and_then(Value::as_str)
                .is_some_and(|v| !v.is_empty());
            if literal && is_sensitive(name) {
                keys.push(format!("{}.{}", container_name(container), name));
            }
        }
    }
    keys
}

fn configmap_keys(resource: &Resource) -> Vec<String> {
    resource
        .object
        .get("data")
        .and_then(Value::as_object)
        .map(|data| {
            data.keys()
                .filter(|k| is_sensitive(k))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

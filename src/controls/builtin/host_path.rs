use serde_json::Value;

use crate::cluster::Resource;
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

/// C-0048: HostPath mount
///
/// Flags pods declaring `hostPath` volumes, which expose the node filesystem
/// to the container.
pub struct HostPathControl;

impl Control for HostPathControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0048".into(),
            name: "HostPath mount".into(),
            description: "Volumes mounting a path from the node filesystem".into(),
            severity: Severity::High,
            remediation: "Replace hostPath volumes with emptyDir, ConfigMap or a PersistentVolume."
                .into(),
        }
    }

    fn evaluate(&self, resource: &Resource, _ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        let volumes = resource.pod_spec()?.get("volumes")?.as_array()?;
        let mounts: Vec<String> = volumes
            .iter()
            .filter_map(|v| {
                let path = v.get("hostPath")?.get("path").and_then(Value::as_str)?;
                let name = v.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
                Some(format!("'{name}' ({path})"))
            })
            .collect();
        if mounts.is_empty() {
            return None;
        }
        Some(ControlFinding::new(
            &self.metadata(),
            resource,
            format!("hostPath volume(s): {}", mounts.join(", ")),
        ))
    }
}

use serde_json::Value;

use super::{failing_containers, quoted, security_context_field};
use crate::cluster::Resource;
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

/// C-0017: Immutable container filesystem
pub struct ImmutableFilesystemControl;

impl Control for ImmutableFilesystemControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0017".into(),
            name: "Immutable container filesystem".into(),
            description: "Containers with a writable root filesystem".into(),
            severity: Severity::Low,
            remediation: "Set readOnlyRootFilesystem: true and mount emptyDir volumes for paths \
                          that must be writable."
                .into(),
        }
    }

    fn evaluate(&self, resource: &Resource, _ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        let writable = failing_containers(resource, |c| {
            security_context_field(c, "readOnlyRootFilesystem").and_then(Value::as_bool)
                != Some(true)
        });
        if writable.is_empty() {
            return None;
        }
        Some(ControlFinding::new(
            &self.metadata(),
            resource,
            format!("Writable root filesystem in: {}", quoted(&writable)),
        ))
    }
}

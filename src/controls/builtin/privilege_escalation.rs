use serde_json::Value;

use super::{failing_containers, quoted, security_context_field};
use crate::cluster::Resource;
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

/// C-0016: Allow privilege escalation
///
/// Escalation is allowed unless `allowPrivilegeEscalation: false` is set
/// explicitly on the container.
pub struct PrivilegeEscalationControl;

impl Control for PrivilegeEscalationControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0016".into(),
            name: "Allow privilege escalation".into(),
            description: "Containers whose processes can gain more privileges than their parent"
                .into(),
            severity: Severity::Medium,
            remediation: "Set allowPrivilegeEscalation: false in the container securityContext."
                .into(),
        }
    }

    fn evaluate(&self, resource: &Resource, _ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        let escalating = failing_containers(resource, |c| {
            security_context_field(c, "allowPrivilegeEscalation").and_then(Value::as_bool)
                != Some(false)
        });
        if escalating.is_empty() {
            return None;
        }
        Some(ControlFinding::new(
            &self.metadata(),
            resource,
            format!("Privilege escalation allowed in: {}", quoted(&escalating)),
        ))
    }
}

use serde_json::Value;

use super::{failing_containers, quoted, security_context_field};
use crate::cluster::Resource;
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

const DANGEROUS_CAPABILITIES: &[&str] = &["SYS_ADMIN", "ALL"];

/// C-0057: Privileged container
///
/// Flags containers running with `privileged: true` or adding a capability
/// equivalent to it.
pub struct PrivilegedContainerControl;

impl Control for PrivilegedContainerControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0057".into(),
            name: "Privileged container".into(),
            description: "Containers with full access to the host's devices and kernel".into(),
            severity: Severity::High,
            remediation: "Remove 'privileged: true' and the SYS_ADMIN/ALL capabilities from the \
                          container securityContext."
                .into(),
        }
    }

    fn evaluate(&self, resource: &Resource, _ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        let privileged = failing_containers(resource, is_privileged);
        if privileged.is_empty() {
            return None;
        }
        Some(ControlFinding::new(
            &self.metadata(),
            resource,
            format!("Privileged container(s): {}", quoted(&privileged)),
        ))
    }
}

fn is_privileged(container: &Value) -> bool {
    if security_context_field(container, "privileged").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    security_context_field(container, "capabilities")
        .and_then(|caps| caps.get("add"))
        .and_then(Value::as_array)
        .is_some_and(|added| {
            added
                .iter()
                .filter_map(Value::as_str)
                .any(|cap| DANGEROUS_CAPABILITIES.contains(&cap))
        })
}

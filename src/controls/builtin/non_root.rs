use serde_json::Value;

use super::{
    failing_containers, pod_security_context_field, quoted, security_context_field,
};
use crate::cluster::Resource;
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

/// C-0013: Non-root containers
///
/// A container passes when `runAsNonRoot: true` or a non-zero `runAsUser`
/// is in effect. Container settings take precedence over the pod's.
pub struct NonRootControl;

impl Control for NonRootControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0013".into(),
            name: "Non-root containers".into(),
            description: "Containers that may run as the root user".into(),
            severity: Severity::Medium,
            remediation: "Set runAsNonRoot: true or a non-zero runAsUser in the pod or container \
                          securityContext."
                .into(),
        }
    }

    fn evaluate(&self, resource: &Resource, _ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        let pod_non_root = pod_security_context_field(resource, "runAsNonRoot").and_then(Value::as_bool);
        let pod_user = pod_security_context_field(resource, "runAsUser").and_then(Value::as_i64);

        let root = failing_containers(resource, |c| {
            let non_root = security_context_field(c, "runAsNonRoot")
                .and_then(Value::as_bool)
                .or(pod_non_root);
            let user = security_context_field(c, "runAsUser")
                .and_then(Value::as_i64)
                .or(pod_user);
            match user {
                Some(0) => true,
                Some(_) => false,
                None => non_root != Some(true),
            }
        });
        if root.is_empty() {
            return None;
        }
        Some(ControlFinding::new(
            &self.metadata(),
            resource,
            format!("Container(s) may run as root: {}", quoted(&root)),
        ))
    }
}

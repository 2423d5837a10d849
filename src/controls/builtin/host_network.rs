use super::pod_flag;
use crate::cluster::Resource;
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

/// C-0041: HostNetwork access
pub struct HostNetworkControl;

impl Control for HostNetworkControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0041".into(),
            name: "HostNetwork access".into(),
            description: "Pods attached to the node's network namespace".into(),
            severity: Severity::Medium,
            remediation: "Remove hostNetwork from the pod spec; expose ports through a Service."
                .into(),
        }
    }

    fn evaluate(&self, resource: &Resource, _ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        pod_flag(resource, "hostNetwork").then(|| {
            ControlFinding::new(
                &self.metadata(),
                resource,
                "Pod spec enables hostNetwork".into(),
            )
        })
    }
}

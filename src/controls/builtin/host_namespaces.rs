use super::pod_flag;
use crate::cluster::Resource;
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

/// C-0038: Host PID/IPC privileges
///
/// Flags pods sharing the host's process or IPC namespace.
pub struct HostNamespacesControl;

impl Control for HostNamespacesControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0038".into(),
            name: "Host PID/IPC privileges".into(),
            description: "Pods sharing the host PID or IPC namespace".into(),
            severity: Severity::High,
            remediation: "Remove hostPID and hostIPC from the pod spec unless strictly required."
                .into(),
        }
    }

    fn evaluate(&self, resource: &Resource, _ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        let shared: Vec<&str> = ["hostPID", "hostIPC"]
            .into_iter()
            .filter(|key| pod_flag(resource, key))
            .collect();
        if shared.is_empty() {
            return None;
        }
        Some(ControlFinding::new(
            &self.metadata(),
            resource,
            format!("Pod spec enables {}", shared.join(" and ")),
        ))
    }
}

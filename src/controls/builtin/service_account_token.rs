use serde_json::Value;

use crate::cluster::Resource;
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

/// C-0034: Automatic mapping of service account
///
/// The pod's `automountServiceAccountToken` wins when set. Otherwise the
/// setting on the pod's ServiceAccount is looked up in the cluster; a
/// missing or unset ServiceAccount means the token is mounted.
pub struct ServiceAccountTokenControl;

impl Control for ServiceAccountTokenControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0034".into(),
            name: "Automatic mapping of service account".into(),
            description: "Pods that get an API token mounted without needing one".into(),
            severity: Severity::Medium,
            remediation: "Set automountServiceAccountToken: false on the pod or its \
                          ServiceAccount unless the workload talks to the API server."
                .into(),
        }
    }

    fn evaluate(&self, resource: &Resource, ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        let spec = resource.pod_spec()?;
        let account = spec
            .get("serviceAccountName")
            .and_then(Value::as_str)
            .unwrap_or("default");

        let pod_setting = spec.get("automountServiceAccountToken").and_then(Value::as_bool);
        let mounted = match pod_setting {
            Some(mount) => mount,
            None => ctx
                .cluster
                .get("ServiceAccount", resource.namespace.as_deref(), account)
                .and_then(|sa| {
                    sa.object
                        .get("automountServiceAccountToken")
                        .and_then(Value::as_bool)
                })
                .unwrap_or(true),
        };

        mounted.then(|| {
            ControlFinding::new(
                &self.metadata(),
                resource,
                format!("Token of service account '{account}' is mounted automatically"),
            )
        })
    }
}

use serde_json::Value;

use crate::cluster::{container_name, Resource};
use crate::controls::{Control, ControlFinding, ControlMetadata, EvaluationContext, Severity};

const REQUIRED_LIMITS: &[&str] = &["cpu", "memory"];

/// C-0009: Resource limits
///
/// Every container must declare CPU and memory limits.
pub struct ResourceLimitsControl;

impl Control for ResourceLimitsControl {
    fn metadata(&self) -> ControlMetadata {
        ControlMetadata {
            id: "C-0009".into(),
            name: "Resource limits".into(),
            description: "Containers without CPU or memory limits".into(),
            severity: Severity::Medium,
            remediation: "Set resources.limits.cpu and resources.limits.memory on every container."
                .into(),
        }
    }

    fn evaluate(&self, resource: &Resource, _ctx: &EvaluationContext<'_>) -> Option<ControlFinding> {
        let missing: Vec<String> = resource
            .containers()
            .into_iter()
            .filter_map(|c| {
                let limits = c.get("resources").and_then(|r| r.get("limits"));
                let absent: Vec<&str> = REQUIRED_LIMITS
                    .iter()
                    .copied()
                    .filter(|key| limits.and_then(|l| l.get(*key)).map_or(true, Value::is_null))
                    .collect();
                (!absent.is_empty())
                    .then(|| format!("'{}' ({})", container_name(c), absent.join(", ")))
            })
            .collect();
        if missing.is_empty() {
            return None;
        }
        Some(ControlFinding::new(
            &self.metadata(),
            resource,
            format!("Missing limits: {}", missing.join("; ")),
        ))
    }
}

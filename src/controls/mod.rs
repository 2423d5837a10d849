pub mod builtin;
pub mod finding;
pub mod framework;
pub mod policy;

use crate::cluster::{ClusterApi, Resource};

pub use finding::{ControlFinding, ControlMetadata, ControlReport, ControlStatus, Severity};

/// What a control may consult besides the resource under evaluation.
pub struct EvaluationContext<'a> {
    pub cluster: &'a dyn ClusterApi,
}

/// A control checks one resource and reports whether it fails.
pub trait Control: Send + Sync {
    /// Metadata about this control (id, name, severity, remediation).
    fn metadata(&self) -> ControlMetadata;

    /// Whether the control has anything to say about this resource.
    fn applies_to(&self, resource: &Resource) -> bool {
        resource.is_workload()
    }

    /// Evaluate an applicable resource. `Some` means the resource fails.
    fn evaluate(&self, resource: &Resource, ctx: &EvaluationContext<'_>)
        -> Option<ControlFinding>;
}

/// The registry holds every built-in control, keyed by id.
pub struct ControlRegistry {
    controls: Vec<Box<dyn Control>>,
}

impl ControlRegistry {
    /// Create a new registry with all built-in controls registered.
    pub fn new() -> Self {
        Self {
            controls: builtin::all_controls(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&dyn Control> {
        self.controls
            .iter()
            .find(|c| c.metadata().id == id)
            .map(|c| c.as_ref())
    }

    /// Run one control over a set of resources.
    pub fn run(
        &self,
        control: &dyn Control,
        resources: &[Resource],
        ctx: &EvaluationContext<'_>,
    ) -> ControlReport {
        let mut report = ControlReport::new(&control.metadata());
        for resource in resources.iter().filter(|r| control.applies_to(r)) {
            report.resources_checked += 1;
            if let Some(finding) = control.evaluate(resource, ctx) {
                report.failed.push(finding);
            }
        }
        report
    }

    /// List metadata for all registered controls.
    pub fn list_controls(&self) -> Vec<ControlMetadata> {
        self.controls.iter().map(|c| c.metadata()).collect()
    }
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

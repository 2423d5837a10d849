//! Framework membership: which controls make up `nsa` and `mitre`.

use crate::error::{Result, ScanError};
use crate::request::{PolicyIdentifier, PolicyKind};

use super::ControlRegistry;

/// NSA/CISA Kubernetes Hardening Guidance.
const NSA: &[&str] = &[
    "C-0057", "C-0038", "C-0041", "C-0048", "C-0013", "C-0016", "C-0017", "C-0009", "C-0034",
];

/// MITRE ATT&CK for containers.
const MITRE: &[&str] = &["C-0057", "C-0038", "C-0041", "C-0048", "C-0034", "C-0012"];

/// Control IDs belonging to a framework, or `None` for an unknown name.
pub fn framework_controls(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "nsa" => Some(NSA),
        "mitre" => Some(MITRE),
        _ => None,
    }
}

/// Resolve a policy identifier into the control IDs to evaluate.
pub fn resolve(identifier: &PolicyIdentifier, registry: &ControlRegistry) -> Result<Vec<String>> {
    match identifier.kind {
        PolicyKind::Framework => framework_controls(&identifier.name)
            .map(|ids| ids.iter().map(|id| id.to_string()).collect())
            .ok_or_else(|| ScanError::InvalidArgument(format!("unknown {identifier}"))),
        PolicyKind::Control => registry
            .get(&identifier.name)
            .map(|c| vec![c.metadata().id])
            .ok_or_else(|| ScanError::InvalidArgument(format!("unknown {identifier}"))),
    }
}

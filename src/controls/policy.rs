use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{ControlReport, ControlStatus, Severity};

/// Policy verdict: the final pass/fail decision over control reports after
/// ignores and overrides have been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub pass: bool,
    pub failed_controls: usize,
    pub highest_severity: Option<Severity>,
    pub fail_threshold: Option<Severity>,
}

/// Policy configuration loaded from `.kubeposture.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    /// Minimum severity of a failed control that fails the scan.
    #[serde(default)]
    pub fail_on: Option<Severity>,
    /// Control IDs to ignore entirely.
    #[serde(default)]
    pub ignore_controls: HashSet<String>,
    /// Per-control severity overrides.
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl Policy {
    /// Drop ignored controls and apply severity overrides.
    pub fn apply(&self, reports: Vec<ControlReport>) -> Vec<ControlReport> {
        reports
            .into_iter()
            .filter(|r| !self.ignore_controls.contains(&r.control_id))
            .map(|mut r| {
                if let Some(&severity) = self.overrides.get(&r.control_id) {
                    r.severity = severity;
                    for finding in &mut r.failed {
                        finding.severity = severity;
                    }
                }
                r
            })
            .collect()
    }

    /// Evaluate reports against this policy and produce a verdict.
    pub fn evaluate(&self, reports: &[ControlReport]) -> PolicyVerdict {
        let failed: Vec<Severity> = reports
            .iter()
            .filter(|r| r.status() == ControlStatus::Failed)
            .map(|r| r.severity)
            .collect();

        let highest = failed.iter().copied().max();
        let pass = match (self.fail_on, highest) {
            (Some(threshold), Some(highest)) => highest < threshold,
            _ => true,
        };

        PolicyVerdict {
            pass,
            failed_controls: failed.len(),
            highest_severity: highest,
            fail_threshold: self.fail_on,
        }
    }
}

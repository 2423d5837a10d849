use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cluster::{Resource, ResourceRef};

/// A resource that failed a control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFinding {
    /// Control identifier (e.g., "C-0057").
    pub control_id: String,
    pub control_name: String,
    pub severity: Severity,
    /// The failing resource.
    pub resource: ResourceRef,
    /// Human-readable description of what failed.
    pub message: String,
    /// Suggested remediation.
    pub remediation: Option<String>,
    /// Stable hash of control id, resource identity and message.
    pub fingerprint: String,
}

impl ControlFinding {
    pub fn new(metadata: &ControlMetadata, resource: &Resource, message: String) -> Self {
        let reference = resource.reference();
        let fingerprint = fingerprint(&metadata.id, &reference, &message);
        Self {
            control_id: metadata.id.clone(),
            control_name: metadata.name.clone(),
            severity: metadata.severity,
            resource: reference,
            message,
            remediation: Some(metadata.remediation.clone()),
            fingerprint,
        }
    }
}

fn fingerprint(control_id: &str, resource: &ResourceRef, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(control_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(resource.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(message.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

/// Outcome of one control over every applicable resource of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReport {
    pub control_id: String,
    pub control_name: String,
    pub severity: Severity,
    /// Resources the control applied to.
    pub resources_checked: usize,
    pub failed: Vec<ControlFinding>,
}

impl ControlReport {
    pub fn new(metadata: &ControlMetadata) -> Self {
        Self {
            control_id: metadata.id.clone(),
            control_name: metadata.name.clone(),
            severity: metadata.severity,
            resources_checked: 0,
            failed: Vec::new(),
        }
    }

    pub fn status(&self) -> ControlStatus {
        if self.resources_checked == 0 {
            ControlStatus::Skipped
        } else if self.failed.is_empty() {
            ControlStatus::Passed
        } else {
            ControlStatus::Failed
        }
    }

    /// Fold another report for the same control into this one.
    pub fn merge(&mut self, other: &ControlReport) {
        self.resources_checked += other.resources_checked;
        self.failed.extend(other.failed.iter().cloned());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlStatus {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Metadata about a control, used for `list-controls` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub remediation: String,
}

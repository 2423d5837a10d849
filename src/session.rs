//! Units of scan work and the notification that starts a scan.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cluster::Resource;
use crate::controls::ControlReport;
use crate::request::PolicyIdentifier;

/// Progress of a session through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Submitted,
    Evaluated,
}

/// One unit of scan work: the resources of a single namespace (or the
/// cluster-scoped resources) plus the controls to run over them.
///
/// Owned by exactly one stage at a time; ownership moves at each handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionObject {
    pub id: Uuid,
    pub policy: PolicyIdentifier,
    /// `None` for cluster-scoped resources.
    pub namespace: Option<String>,
    /// Control IDs resolved from the policy.
    pub controls: Vec<String>,
    pub resources: Vec<Resource>,
    /// Filled in by the evaluator.
    pub reports: Vec<ControlReport>,
    pub status: SessionStatus,
}

impl SessionObject {
    pub fn new(
        policy: PolicyIdentifier,
        namespace: Option<String>,
        controls: Vec<String>,
        resources: Vec<Resource>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            policy,
            namespace,
            controls,
            resources,
            reports: Vec::new(),
            status: SessionStatus::Submitted,
        }
    }

    /// Display label for the session's scope.
    pub fn scope(&self) -> &str {
        self.namespace.as_deref().unwrap_or("<cluster>")
    }
}

/// Kinds of request the dispatcher can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Run a posture scan. The only kind the CLI pipeline executes.
    ExecPostureScan,
    /// Check rule definitions without scanning.
    ValidateRules,
    /// Refresh rule definitions.
    UpdateRules,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExecPostureScan => write!(f, "exec_posture_scan"),
            Self::ValidateRules => write!(f, "validate_rules"),
            Self::UpdateRules => write!(f, "update_rules"),
        }
    }
}

/// The request handed to the dispatch step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyNotification {
    pub notification_type: NotificationType,
    pub rules: Vec<PolicyIdentifier>,
}

impl PolicyNotification {
    pub fn posture_scan(policy: PolicyIdentifier) -> Self {
        Self {
            notification_type: NotificationType::ExecPostureScan,
            rules: vec![policy],
        }
    }
}
